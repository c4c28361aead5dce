use crate::reading::Reading;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn build_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(8))
        .connect(database_url)
        .await
        .context("failed to connect to database")?;
    Ok(pool)
}

/// Create-if-absent bootstrap for the readings table. Must succeed
/// before the service accepts any broker or query traffic.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            id SERIAL PRIMARY KEY,
            temperature REAL,
            humidity REAL,
            light INTEGER,
            soil INTEGER,
            soil_percent INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create sensor_data table")?;
    tracing::info!("sensor_data table is ready");
    Ok(())
}

/// Inserts one reading; `created_at` is assigned by the database at
/// insert time, not when the device captured the sample.
pub async fn insert_reading(pool: &PgPool, reading: &Reading) -> Result<()> {
    sqlx::query(
        "INSERT INTO sensor_data (temperature, humidity, light, soil, soil_percent) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(reading.temperature)
    .bind(reading.humidity)
    .bind(reading.light)
    .bind(reading.soil_raw)
    .bind(reading.soil_percent)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct StoredReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub light: Option<i32>,
    pub soil: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// All rows whose storage timestamp falls in the lookback window,
/// newest first. An empty window yields an empty vec, not an error.
pub async fn recent_readings(pool: &PgPool, window_hours: i64) -> Result<Vec<StoredReading>> {
    let cutoff = Utc::now() - Duration::hours(window_hours);
    let rows = sqlx::query_as::<_, StoredReading>(
        "SELECT temperature, humidity, light, soil, created_at FROM sensor_data \
         WHERE created_at >= $1 ORDER BY created_at DESC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod testutil {
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use std::env;

    /// Gated integration-test pool: returns None unless
    /// BRIDGE_INTEGRATION_TEST=1 and BRIDGE_TEST_DATABASE_URL are set.
    /// Each caller works in its own schema so tests do not collide.
    pub(crate) async fn integration_pool(schema: &str) -> Result<Option<PgPool>> {
        if env::var("BRIDGE_INTEGRATION_TEST").ok().as_deref() != Some("1") {
            return Ok(None);
        }
        let database_url = match env::var("BRIDGE_TEST_DATABASE_URL") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };

        let admin_pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
            .execute(&admin_pool)
            .await?;
        drop(admin_pool);

        let schema_name = schema.to_string();
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .after_connect(move |conn, _meta| {
                let schema = schema_name.clone();
                Box::pin(async move {
                    sqlx::query(&format!("SET search_path TO {}", schema))
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&database_url)
            .await?;
        Ok(Some(pool))
    }

    pub(crate) async fn drop_test_schema(schema: &str) -> Result<()> {
        let Ok(database_url) = env::var("BRIDGE_TEST_DATABASE_URL") else {
            return Ok(());
        };
        let admin_pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;
        let _ = sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
            .execute(&admin_pool)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_schema, insert_reading, recent_readings, testutil};
    use crate::reading::Reading;
    use anyhow::Result;

    #[tokio::test]
    async fn test_schema_bootstrap_is_idempotent() -> Result<()> {
        let schema = format!("bridge_test_schema_{}", std::process::id());
        let Some(pool) = testutil::integration_pool(&schema).await? else {
            return Ok(());
        };

        ensure_schema(&pool).await?;
        ensure_schema(&pool).await?;

        insert_reading(
            &pool,
            &Reading {
                temperature: 22.5,
                humidity: 55.0,
                light: 300,
                soil_raw: 410,
                soil_percent: 60,
            },
        )
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sensor_data")
            .fetch_one(&pool)
            .await?;
        assert_eq!(count, 1);

        testutil::drop_test_schema(&schema).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_history_window_orders_descending() -> Result<()> {
        let schema = format!("bridge_test_history_{}", std::process::id());
        let Some(pool) = testutil::integration_pool(&schema).await? else {
            return Ok(());
        };
        ensure_schema(&pool).await?;

        let empty = recent_readings(&pool, 24).await?;
        assert!(empty.is_empty());

        // Explicit timestamps: two inside the window, one outside.
        for (temperature, age) in [(18.0f32, "2 hours"), (19.5, "1 hour"), (21.0, "25 hours")] {
            sqlx::query(&format!(
                "INSERT INTO sensor_data (temperature, humidity, light, soil, soil_percent, created_at) \
                 VALUES ($1, 50.0, 100, 400, 50, NOW() - INTERVAL '{}')",
                age
            ))
            .bind(temperature)
            .execute(&pool)
            .await?;
        }

        let rows = recent_readings(&pool, 24).await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].temperature, Some(19.5));
        assert_eq!(rows[1].temperature, Some(18.0));
        assert!(rows[0].created_at > rows[1].created_at);

        testutil::drop_test_schema(&schema).await?;
        Ok(())
    }
}

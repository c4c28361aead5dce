use crate::config::Config;
use crate::db::{self, StoredReading};
use crate::hub::FanOutHub;
use crate::ws;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: PgPool,
    pub hub: FanOutHub,
    pub http: reqwest::Client,
}

async fn keep_alive() -> Json<Value> {
    tracing::debug!("keep-alive request received");
    Json(json!({ "status": "Server is awake" }))
}

async fn history(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredReading>>, (StatusCode, Json<Value>)> {
    match db::recent_readings(&state.db, state.config.history_window_hours).await {
        Ok(rows) => Ok(Json(rows)),
        Err(err) => {
            tracing::error!(error = %err, "failed to query sensor history");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "database query failed" })),
            ))
        }
    }
}

async fn fetch_weather(state: &AppState) -> Result<Value> {
    let api_key = state
        .config
        .weather_api_key
        .as_deref()
        .context("BRIDGE_WEATHER_API_KEY is not set")?;
    let url = format!(
        "https://api.openweathermap.org/data/3.0/onecall?lat={}&lon={}&appid={}&units=metric",
        state.config.weather_lat, state.config.weather_lon, api_key
    );
    let body = state
        .http
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json::<Value>()
        .await?;
    Ok(body)
}

/// Pass-through proxy to the upstream weather API at the configured
/// coordinate; the dashboard never holds the API key.
async fn weather(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match fetch_weather(&state).await {
        Ok(body) => {
            tracing::debug!("weather request served");
            Ok(Json(body))
        }
        Err(err) => {
            tracing::error!(error = %err, "weather proxy request failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to fetch weather data" })),
            ))
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    if config.cors_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/api/history", get(history))
        .route("/api/keep-alive", get(keep_alive))
        .route("/weather", get(weather))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

use crate::cache::ReadingCache;
use crate::config::Config;
use crate::hub::FanOutHub;
use crate::reading::parse_reading_payload;
use anyhow::Result;
use rand::Rng;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Owns the broker connection: subscribes to the sensor and pump-status
/// topics, dispatches inbound messages to the cache and the fan-out
/// hub, and relays viewer commands to the command topic. Reconnects
/// forever on a fixed delay; subscriptions are re-established on every
/// attempt since each one uses a fresh clean-session client.
pub async fn run_client(
    config: Config,
    cache: ReadingCache,
    hub: FanOutHub,
    commands: mpsc::Receiver<String>,
) -> Result<()> {
    let mut commands = commands;

    loop {
        let mut options = MqttOptions::new(
            random_client_id(),
            config.mqtt_host.clone(),
            config.mqtt_port,
        );
        options.set_keep_alive(config.mqtt_keepalive());
        options.set_clean_session(true);
        if let Some(username) = &config.mqtt_username {
            options.set_credentials(
                username.clone(),
                config.mqtt_password.clone().unwrap_or_default(),
            );
        }

        let (client, mut eventloop) = AsyncClient::new(options, 32);

        if let Err(err) = client
            .subscribe(config.sensor_topic.clone(), QoS::AtLeastOnce)
            .await
        {
            tracing::warn!(error = %err, "failed to queue sensor subscription; retrying");
            sleep(config.mqtt_reconnect_delay()).await;
            continue;
        }
        if let Err(err) = client
            .subscribe(config.pump_status_topic.clone(), QoS::AtLeastOnce)
            .await
        {
            tracing::warn!(error = %err, "failed to queue pump status subscription; retrying");
            sleep(config.mqtt_reconnect_delay()).await;
            continue;
        }

        match timeout(config.mqtt_connect_timeout(), wait_for_connack(&mut eventloop)).await {
            Ok(Ok(())) => {
                tracing::info!(host = %config.mqtt_host, port = config.mqtt_port, "connected to MQTT broker");
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "MQTT connect failed; retrying");
                sleep(config.mqtt_reconnect_delay()).await;
                continue;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = config.mqtt_connect_timeout_secs,
                    "MQTT connect timed out; retrying"
                );
                sleep(config.mqtt_reconnect_delay()).await;
                continue;
            }
        }

        let mut poller = spawn_poller(eventloop, config.clone(), cache.clone(), hub.clone());

        let reconnect = loop {
            tokio::select! {
                _ = &mut poller => break true,
                maybe = commands.recv() => {
                    let Some(command) = maybe else { break false; };
                    if let Err(err) = client
                        .publish(config.pump_cmd_topic.clone(), QoS::AtLeastOnce, false, command)
                        .await
                    {
                        tracing::warn!(error = %err, "failed to publish pump command");
                    }
                }
            }
        };

        if !reconnect {
            poller.abort();
            return Ok(());
        }

        sleep(config.mqtt_reconnect_delay()).await;
    }
}

fn spawn_poller(
    mut eventloop: rumqttc::EventLoop,
    config: Config,
    cache: ReadingCache,
    hub: FanOutHub,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    handle_publish(
                        &config.sensor_topic,
                        &config.pump_status_topic,
                        &cache,
                        &hub,
                        &publish.topic,
                        &publish.payload,
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "MQTT connection dropped; reconnecting");
                    return;
                }
            }
        }
    })
}

/// Fresh id per connection attempt so restarts never collide with a
/// stale broker-side session.
fn random_client_id() -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("greenhouse-bridge-{suffix:08x}")
}

async fn wait_for_connack(eventloop: &mut rumqttc::EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(err) => return Err(err.into()),
        }
    }
}

fn handle_publish(
    sensor_topic: &str,
    pump_status_topic: &str,
    cache: &ReadingCache,
    hub: &FanOutHub,
    topic: &str,
    payload: &[u8],
) {
    if topic == sensor_topic {
        match parse_reading_payload(payload) {
            Ok(reading) => {
                tracing::debug!(temperature = %reading.temperature, "sensor reading received");
                cache.set(reading.clone());
                hub.broadcast_reading(reading);
            }
            Err(err) => {
                tracing::warn!(error = %err, topic = %topic, "failed to decode sensor payload");
            }
        }
    } else if topic == pump_status_topic {
        let status = String::from_utf8_lossy(payload).to_string();
        tracing::debug!(status = %status, "pump status received");
        hub.broadcast_status(status);
    }
}

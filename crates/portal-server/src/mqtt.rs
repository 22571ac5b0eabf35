//! MQTT transport
//!
//! Polls the rumqttc event loop on its own task. Subscriptions are made on
//! every `ConnAck`, so they come back after a reconnect. Incoming publishes
//! go straight to the [`EventRouter`], which never waits for a run.

use portal_config::MqttConfig;
use portal_scenario::{EventRouter, RouteOutcome};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 16;

pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);
    options
}

/// Run the bus loop until `shutdown` is cancelled
pub async fn run_mqtt(config: MqttConfig, router: EventRouter, shutdown: CancellationToken) {
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(&config), REQUEST_CAPACITY);
    let state = router.engine().state().clone();
    info!(host = %config.host, port = config.port, "Connecting to MQTT broker");

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(code = ?ack.code, "Connected to MQTT broker");
                state.set_bus_connected(true);
                for topic in router.topics() {
                    // Non-blocking: the request is queued for this event loop
                    if let Err(e) = client.try_subscribe(topic, QoS::AtMostOnce) {
                        error!(%topic, error = %e, "Failed to subscribe");
                    } else {
                        info!(%topic, "Subscribed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let outcome = router.handle_message(&publish.topic, &publish.payload).await;
                if outcome == RouteOutcome::Ignored {
                    debug!(topic = %publish.topic, "Message on unhandled topic");
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker sent disconnect");
                state.set_bus_connected(false);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection error, retrying in {:?}", config.reconnect_delay());
                state.set_bus_connected(false);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(config.reconnect_delay()) => {}
                }
            }
        }
    }

    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "Disconnect request not sent");
    }
    state.set_bus_connected(false);
    info!("MQTT loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_options_from_config() {
        let config = MqttConfig {
            host: "broker.local".to_string(),
            port: 1884,
            keep_alive_secs: 30,
            ..MqttConfig::default()
        };
        let options = mqtt_options(&config);
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.client_id(), "haunted-portal");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
    }
}

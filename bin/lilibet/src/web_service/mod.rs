use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use str_derive::Str;
use zigbee::map::PLACEHOLDER_MAP;
use zigbee::{Bridge, MapRequestOutcome};

#[derive(Copy, Clone, Debug, Deserialize, Serialize, Str, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ApiAction {
    Init,
    UpdateMap,
    WaitingForMap,
    UpdateDevice,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct ApiRequest {
    pub action: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

pub fn router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route("/ajax", post(ajax))
        .with_state(bridge)
}

async fn ajax(State(bridge): State<Arc<Bridge>>, Json(request): Json<ApiRequest>) -> Json<Value> {
    Json(handle(&bridge, request).await)
}

/// Every response carries a `status` string, failures included.
pub async fn handle(bridge: &Bridge, request: ApiRequest) -> Value {
    debug!("api action {}", request.action);

    let Ok(action) = request.action.parse::<ApiAction>() else {
        warn!("unhandled api action {}", request.action);
        return json!({ "status": "incorrect action" });
    };

    match action {
        ApiAction::Init => json!({ "status": "ok", "devices": bridge.summaries().await }),
        ApiAction::UpdateMap => match bridge.request_map().await {
            Ok(MapRequestOutcome::Accepted) => {
                json!({ "status": "A new network map has been requested. Please wait." })
            }
            Ok(MapRequestOutcome::Throttled) => json!({
                "status": "A new network map can only be requested once every 3 minutes.",
                "map": PLACEHOLDER_MAP,
            }),
            Err(err) => failure("Error requesting network map", err),
        },
        ApiAction::WaitingForMap => {
            let status = bridge.map_status().await;
            json!({
                "status": "updating map... this may take up to 3 minutes",
                "pending": status.pending,
                "map": status.map,
            })
        }
        ApiAction::UpdateDevice => {
            let Some(name) = request.friendly_name else {
                return json!({ "status": "missing friendly_name" });
            };

            match bridge.update_device_firmware(&name).await {
                Ok(()) => json!({ "status": "Requested a firmware update of the device" }),
                Err(err) => failure("Error requesting firmware update", err),
            }
        }
        ApiAction::Delete => {
            let Some(name) = request.friendly_name else {
                return json!({ "status": "missing friendly_name" });
            };

            match bridge.force_remove(&name).await {
                Ok(()) => json!({ "status": "Attempted a force-remove of the device" }),
                Err(err) => failure("Error removing device", err),
            }
        }
    }
}

fn failure(context: &str, err: zigbee::Error) -> Value {
    error!("{context}: {err}");
    json!({ "status": format!("{context}: {err}") })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc::unbounded_channel;
    use zigbee::{Bus, Resolver};

    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Bus for RecordingBus {
        fn subscribe(&self, _topic: &str) {}

        async fn publish(&self, topic: &str, payload: Vec<u8>) -> zigbee::Result<()> {
            let payload = serde_json::from_slice(&payload).unwrap_or(Value::Null);
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }
    }

    fn bridge() -> (Arc<RecordingBus>, Bridge) {
        let bus = Arc::new(RecordingBus::default());
        let (tx, _rx) = unbounded_channel();
        let bridge = Bridge::new("zigbee2mqtt", bus.clone(), Resolver::default(), tx);

        (bus, bridge)
    }

    fn request(action: &str, friendly_name: Option<&str>) -> ApiRequest {
        ApiRequest {
            action: action.to_string(),
            friendly_name: friendly_name.map(str::to_string),
        }
    }

    #[test]
    fn test_action_names() {
        assert_eq!(
            "waiting-for-map".parse::<ApiAction>().unwrap(),
            ApiAction::WaitingForMap
        );
        assert_eq!(ApiAction::UpdateDevice.to_string(), "update-device");
        assert!("update_map".parse::<ApiAction>().is_err());
    }

    #[tokio::test]
    async fn test_incorrect_action() {
        let (bus, bridge) = bridge();

        assert_eq!(
            handle(&bridge, request("reboot", None)).await,
            json!({ "status": "incorrect action" })
        );
        assert!(bus.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init() {
        let (_bus, bridge) = bridge();

        bridge
            .handle_message(
                "zigbee2mqtt/bridge/devices",
                json!([{
                    "friendly_name": "bulb1",
                    "model_id": "LCT015",
                    "software_build_id": "1.50.2",
                    "definition": { "vendor": "Philips", "description": "Hue bulb", "exposes": [] }
                }])
                .to_string()
                .as_bytes(),
            )
            .await
            .unwrap();

        assert_eq!(
            handle(&bridge, request("init", None)).await,
            json!({
                "status": "ok",
                "devices": [{
                    "friendly_name": "bulb1",
                    "update_available": false,
                    "model_id": "LCT015",
                    "description": "Hue bulb",
                    "software_build_id": "1.50.2",
                    "vendor": "Philips"
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_update_map_throttled() {
        let (bus, bridge) = bridge();

        let first = handle(&bridge, request("update-map", None)).await;
        assert_eq!(
            first["status"],
            "A new network map has been requested. Please wait."
        );

        let second = handle(&bridge, request("update-map", None)).await;
        assert_eq!(second["map"], PLACEHOLDER_MAP);

        let waiting = handle(&bridge, request("waiting-for-map", None)).await;
        assert_eq!(waiting["pending"], true);
        assert_eq!(waiting["map"], "");

        assert_eq!(
            *bus.published.lock().unwrap(),
            vec![(
                "zigbee2mqtt/bridge/request/networkmap".to_string(),
                json!({ "type": "graphviz", "routes": false })
            )]
        );
    }

    #[tokio::test]
    async fn test_device_requests() {
        let (bus, bridge) = bridge();

        handle(&bridge, request("update-device", Some("bulb1"))).await;
        handle(&bridge, request("delete", Some("bulb1"))).await;

        assert_eq!(
            handle(&bridge, request("delete", None)).await,
            json!({ "status": "missing friendly_name" })
        );

        assert_eq!(
            *bus.published.lock().unwrap(),
            vec![
                (
                    "zigbee2mqtt/bridge/request/device/ota_update/update".to_string(),
                    json!({ "id": "bulb1" })
                ),
                (
                    "zigbee2mqtt/bridge/request/device/remove".to_string(),
                    json!({ "id": "bulb1", "force": true })
                ),
            ]
        );
    }
}

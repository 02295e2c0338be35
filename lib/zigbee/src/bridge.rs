use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;

use crate::transform::{self, hex_to_xy, to_raw};
use crate::{
    Bus, DeviceSummary, Error, HostEvent, MapRequest, MapRequestOutcome, MapStatus, Registry,
    Resolver, Result, Topic,
};

#[derive(Debug, PartialEq, Eq)]
pub enum DeviceRemoval {
    Removed,
    /// Detached locally, but zigbee2mqtt was not told.
    Local,
}

/// Shared context between the broker listener, the HTTP API and the
/// supervisor. Each piece of mutable state sits behind its own lock.
pub struct Bridge {
    pub(crate) prefix: String,
    pub(crate) bus: Arc<dyn Bus>,
    pub(crate) resolver: Resolver,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) map: Mutex<MapRequest>,
}

impl Bridge {
    pub fn new(
        prefix: impl Into<String>,
        bus: Arc<dyn Bus>,
        resolver: Resolver,
        events: UnboundedSender<HostEvent>,
    ) -> Bridge {
        Bridge {
            prefix: prefix.into(),
            bus,
            resolver,
            registry: Mutex::new(Registry::new(events)),
            map: Mutex::new(MapRequest::default()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Subscribes to the bridge topics and to every device already known.
    /// Called again after a reconnect.
    pub async fn subscribe(&self) {
        self.bus.subscribe(&Topic::Devices.with_prefix(&self.prefix));
        self.bus
            .subscribe(&Topic::NetworkMapResponse.with_prefix(&self.prefix));

        let registry = self.registry.lock().await;
        for id in registry.device_ids() {
            self.bus
                .subscribe(&Topic::Device(id.clone()).with_prefix(&self.prefix));
        }
    }

    pub(crate) async fn publish(&self, topic: Topic, payload: &Value) -> Result<()> {
        let topic = topic.with_prefix(&self.prefix);
        debug!("publishing {payload} to {topic}");

        let payload = serde_json::to_vec(payload)?;
        self.bus.publish(&topic, payload).await
    }

    pub async fn remove_device(&self, device_id: &str) -> Result<DeviceRemoval> {
        self.registry
            .lock()
            .await
            .remove(device_id)
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))?;

        match self
            .publish(Topic::DeviceRemove, &json!({ "id": device_id }))
            .await
        {
            Ok(()) => Ok(DeviceRemoval::Removed),
            Err(err) => {
                error!("Error publishing removal of {device_id}: {err}");
                Ok(DeviceRemoval::Local)
            }
        }
    }

    /// Removes a device zigbee2mqtt can no longer reach. Unknown devices are
    /// still sent to zigbee2mqtt, which may know them even if we don't.
    pub async fn force_remove(&self, device_id: &str) -> Result<()> {
        self.registry.lock().await.remove(device_id);

        self.publish(
            Topic::DeviceRemove,
            &json!({ "id": device_id, "force": true }),
        )
        .await
    }

    pub async fn update_device_firmware(&self, device_id: &str) -> Result<()> {
        info!("requesting firmware update for {device_id}");
        self.publish(Topic::DeviceOtaUpdate, &json!({ "id": device_id }))
            .await
    }

    /// Writes a host value to the device, translated to what the device
    /// expects on the bus. The cached value is the host value. The registry
    /// is not locked while publishing.
    pub async fn set_property(&self, device_id: &str, key: &str, value: Value) -> Result<()> {
        let bus_value = {
            let registry = self.registry.lock().await;

            let property = registry
                .device(device_id)
                .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))?
                .find_property(key)
                .ok_or_else(|| Error::PropertyNotFound(device_id.to_string(), key.to_string()))?;

            if property.is_read_only() {
                return Err(Error::ReadOnly(device_id.to_string(), key.to_string()));
            }

            if property.is_color() {
                let hex = value
                    .as_str()
                    .ok_or(Error::UnexpectedPayload("a #rrggbb color"))?;
                let (x, y) = hex_to_xy(hex)?;
                json!({ "x": x, "y": y })
            } else if let Some(maximum) = property.scaled_maximum() {
                let percentage = value
                    .as_f64()
                    .ok_or_else(|| transform::Error::NotANumber(value.to_string()))?;
                json!(to_raw(percentage, maximum))
            } else {
                property.description.bus.to_bus(value.clone())
            }
        };

        self.publish(
            Topic::DeviceSet(device_id.to_string()),
            &json!({ key: bus_value }),
        )
        .await?;

        self.registry
            .lock()
            .await
            .update_property(device_id, key, value)
    }

    pub async fn perform_action(&self, device_id: &str, name: &str, input: Value) -> Result<()> {
        if self.registry.lock().await.device(device_id).is_none() {
            return Err(Error::DeviceNotFound(device_id.to_string()));
        }

        self.publish(Topic::DeviceSet(device_id.to_string()), &json!({ name: input }))
            .await
    }

    /// Only a request that reached the bus starts the cooldown.
    pub async fn request_map(&self) -> Result<MapRequestOutcome> {
        if self.map.lock().await.check(Instant::now()) == MapRequestOutcome::Throttled {
            return Ok(MapRequestOutcome::Throttled);
        }

        info!("requesting network map");
        self.publish(
            Topic::NetworkMapRequest,
            &json!({ "type": "graphviz", "routes": false }),
        )
        .await?;

        self.map.lock().await.mark_requested(Instant::now());

        Ok(MapRequestOutcome::Accepted)
    }

    pub async fn map_status(&self) -> MapStatus {
        self.map.lock().await.status()
    }

    /// Opens the network for joining and asks zigbee2mqtt to announce its
    /// devices again so the new ones get picked up.
    pub async fn start_pairing(&self) -> Result<()> {
        info!("permitting devices to join");
        self.publish(Topic::PermitJoin, &json!({ "value": true })).await?;

        let topic = Topic::DevicesGet.with_prefix(&self.prefix);
        self.bus.publish(&topic, Vec::new()).await
    }

    pub fn cancel_pairing(&self) {
        // joining stays open so slow devices can finish the interview
        info!("pairing cancelled");
    }

    pub async fn summaries(&self) -> Vec<DeviceSummary> {
        self.registry.lock().await.summaries()
    }
}

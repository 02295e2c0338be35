use log::{debug, error, info, trace, warn};
use serde_json::{Map, Value};

use crate::device::POWER_STATE;
use crate::transform::{to_percentage, xy_to_hex, DEFAULT_BRIGHTNESS};
use crate::{AddOutcome, Bridge, DeviceInfo, Error, Property, Registry, Result, Topic};

impl Bridge {
    /// Entry point for everything received from the broker. Errors concern
    /// the single message and are for the caller to log.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let Some(topic) = Topic::parse(&self.prefix, topic) else {
            trace!("ignoring message on {topic}");
            return Ok(());
        };

        if topic == Topic::Logging {
            return Ok(());
        }

        if !payload.contains(&b':') {
            trace!("ignoring payload without fields on {topic}");
            return Ok(());
        }

        let payload: Value = serde_json::from_slice(payload)?;

        match topic {
            Topic::Devices => self.on_devices(payload).await,
            Topic::NetworkMapResponse => self.on_map_response(payload).await,
            Topic::Device(name) => self.on_device_state(&name, payload).await,
            other => {
                trace!("ignoring message on {other}");
                Ok(())
            }
        }
    }

    async fn on_devices(&self, payload: Value) -> Result<()> {
        let Value::Array(entries) = payload else {
            return Err(Error::UnexpectedPayload("an array of devices"));
        };

        let mut registry = self.registry.lock().await;
        let mut added = 0;

        for entry in entries {
            let info: DeviceInfo = match serde_json::from_value(entry) {
                Ok(info) => info,
                Err(err) => {
                    error!("Error parsing device descriptor: {err}");
                    continue;
                }
            };

            let name = info.friendly_name.clone();
            if registry.add_device(info, &self.resolver) == AddOutcome::Added {
                self.bus.subscribe(&Topic::Device(name).with_prefix(&self.prefix));
                added += 1;
            }
        }

        if added > 0 {
            info!("{added} new devices");
        }

        Ok(())
    }

    async fn on_map_response(&self, payload: Value) -> Result<()> {
        let map = payload["data"]["value"]
            .as_str()
            .ok_or(Error::UnexpectedPayload("a network map in data.value"))?;

        debug!("received network map");
        self.map.lock().await.on_response(map.to_string());

        Ok(())
    }

    async fn on_device_state(&self, name: &str, payload: Value) -> Result<()> {
        let Value::Object(fields) = payload else {
            return Err(Error::UnexpectedPayload("an object of device state"));
        };

        let mut registry = self.registry.lock().await;

        let Some(device) = registry.device(name) else {
            debug!("state for unknown device {name}");
            return Ok(());
        };

        if let Some(action) = fields.get("action").and_then(Value::as_str) {
            if let Some(event) = device.events.get(action) {
                let data = event
                    .data_key
                    .as_ref()
                    .and_then(|key| fields.get(key))
                    .cloned();
                registry.emit_event(name, action, data);
            }

            update_power_state(&mut registry, name, action, &fields)?;
        }

        if let Some(update_available) = update_available(&fields) {
            registry.set_update_available(name, update_available);
        }

        for (key, value) in &fields {
            let Some(property) = registry.find_property(name, key) else {
                if key != "update" && is_scalar(value) {
                    registry.attempt_new_property(name, key, value)?;
                } else {
                    trace!("ignoring {key} of {name}");
                }
                continue;
            };

            match from_bus(property, key, value, &fields) {
                Ok(value) => registry.update_property(name, key, value)?,
                Err(err) => warn!("Error converting {key} of {name}: {err}"),
            }
        }

        Ok(())
    }
}

/// Remotes only report `action`, so an on/off action without an explicit
/// `state` is mirrored into the power state property when there is one.
fn update_power_state(
    registry: &mut Registry,
    name: &str,
    action: &str,
    fields: &Map<String, Value>,
) -> Result<()> {
    if fields.contains_key("state") || registry.find_property(name, POWER_STATE).is_none() {
        return Ok(());
    }

    let on = match action.to_lowercase().as_str() {
        "on" => true,
        "off" => false,
        _ => return Ok(()),
    };

    registry.update_property(name, POWER_STATE, Value::Bool(on))
}

fn update_available(fields: &Map<String, Value>) -> Option<bool> {
    if let Some(available) = fields.get("update_available").and_then(Value::as_bool) {
        return Some(available);
    }

    fields
        .get("update")
        .and_then(|update| update.get("state"))
        .and_then(Value::as_str)
        .map(|state| state == "available")
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Converts one value as published by zigbee2mqtt into the host value of
/// `property`. Sibling keys come from the untouched payload.
fn from_bus(
    property: &Property,
    key: &str,
    value: &Value,
    fields: &Map<String, Value>,
) -> Result<Value> {
    if let (Some(x), Some(y)) = (value["x"].as_f64(), value["y"].as_f64()) {
        if property.is_color() || key == "color" {
            let brightness = fields
                .get("brightness")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_BRIGHTNESS);

            return Ok(Value::String(xy_to_hex(x, y, brightness)?));
        }
    }

    if let Some(maximum) = property.scaled_maximum() {
        let raw = value
            .as_f64()
            .ok_or_else(|| crate::transform::Error::NotANumber(value.to_string()))?;

        return Ok(Value::from(to_percentage(raw, maximum)));
    }

    Ok(property.description.bus.from_bus(value.clone()))
}

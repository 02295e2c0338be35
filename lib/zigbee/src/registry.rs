use std::collections::{BTreeMap, HashMap};

use log::{debug, info, trace};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::transform::sentence_case;
use crate::{
    Device, DeviceInfo, DeviceSummary, Error, HostEvent, Property, PropertyDescription,
    PropertyType, Resolver, Result,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Exists,
    Unresolved,
}

/// Known devices keyed by friendly name, plus the overview served to the UI.
pub struct Registry {
    devices: HashMap<String, Device>,
    overview: BTreeMap<String, DeviceSummary>,
    events: UnboundedSender<HostEvent>,
}

impl Registry {
    pub fn new(events: UnboundedSender<HostEvent>) -> Registry {
        Registry {
            devices: HashMap::new(),
            overview: BTreeMap::new(),
            events,
        }
    }

    pub fn add_device(&mut self, info: DeviceInfo, resolver: &Resolver) -> AddOutcome {
        if let Some(mut summary) = DeviceSummary::from_info(&info) {
            if let Some(existing) = self.overview.get(&info.friendly_name) {
                summary.update_available = existing.update_available;
            }
            self.overview.insert(info.friendly_name.clone(), summary);
        }

        if let Some(device) = self.devices.get(&info.friendly_name) {
            if device.model_id == info.model_id {
                return AddOutcome::Exists;
            }
        }

        let Some(definition) = resolver.resolve(&info) else {
            debug!(
                "no definition for {} ({})",
                info.friendly_name,
                info.model_id.as_deref().unwrap_or("no model")
            );
            return AddOutcome::Unresolved;
        };

        let device = Device::new(info.friendly_name.clone(), info.model_id, definition);
        info!("added device {}", device.id);

        self.notify(HostEvent::DeviceAdded(device.clone()));
        self.devices.insert(info.friendly_name, device);

        AddOutcome::Added
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &String> {
        self.devices.keys()
    }

    pub fn find_property(&self, device_id: &str, key: &str) -> Option<&Property> {
        self.devices.get(device_id)?.find_property(key)
    }

    /// Installs a read-only property for a key no definition mentioned,
    /// typed after the value it arrived with.
    pub fn attempt_new_property(&mut self, device_id: &str, key: &str, value: &Value) -> Result<()> {
        let device = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))?;

        let description = PropertyDescription {
            title: Some(sentence_case(key)),
            description: Some(key.to_string()),
            property_type: PropertyType::infer(value),
            read_only: true,
            value: Some(value.clone()),
            ..Default::default()
        };

        debug!("adding property {key} to {device_id}");
        device
            .properties
            .insert(key.to_string(), Property::new(key, description));

        let device = device.clone();
        self.notify(HostEvent::DeviceUpdated(device));

        Ok(())
    }

    pub fn update_property(&mut self, device_id: &str, key: &str, value: Value) -> Result<()> {
        let property = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))?
            .find_property_mut(key)
            .ok_or_else(|| Error::PropertyNotFound(device_id.to_string(), key.to_string()))?;

        property.value = value.clone();

        self.notify(HostEvent::PropertyChanged {
            device_id: device_id.to_string(),
            property: key.to_string(),
            value,
        });

        Ok(())
    }

    pub fn emit_event(&self, device_id: &str, name: &str, data: Option<Value>) {
        self.notify(HostEvent::Event {
            device_id: device_id.to_string(),
            name: name.to_string(),
            data,
        });
    }

    pub fn remove(&mut self, device_id: &str) -> Option<Device> {
        let device = self.devices.remove(device_id)?;
        self.overview.remove(device_id);

        info!("removed device {device_id}");
        self.notify(HostEvent::DeviceRemoved(device_id.to_string()));

        Some(device)
    }

    pub fn set_update_available(&mut self, device_id: &str, update_available: bool) {
        match self.overview.get_mut(device_id) {
            Some(summary) => summary.update_available = update_available,
            None => trace!("no overview entry for {device_id}"),
        }
    }

    pub fn summaries(&self) -> Vec<DeviceSummary> {
        self.overview.values().cloned().collect()
    }

    fn notify(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            trace!("host event receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{from_value, json};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use crate::StaticTable;

    fn resolver() -> Resolver {
        let table = StaticTable::from_json(
            json!({
                "X": {
                    "name": "Bulb",
                    "properties": {
                        "state": { "title": "On", "type": "boolean" }
                    }
                }
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap();

        Resolver::new(vec![Box::new(table)])
    }

    fn info(name: &str, model_id: &str) -> DeviceInfo {
        from_value(json!({
            "friendly_name": name,
            "model_id": model_id,
            "software_build_id": "1.0",
            "definition": { "vendor": "Acme", "description": "A bulb" }
        }))
        .unwrap()
    }

    fn drain(rx: &mut UnboundedReceiver<HostEvent>) -> Vec<HostEvent> {
        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_add_device() {
        let (tx, mut rx) = unbounded_channel();
        let mut registry = Registry::new(tx);
        let resolver = resolver();

        assert_eq!(registry.add_device(info("bulb1", "X"), &resolver), AddOutcome::Added);
        assert_eq!(registry.add_device(info("bulb1", "X"), &resolver), AddOutcome::Exists);
        assert_eq!(
            registry.add_device(info("bulb2", "Y"), &resolver),
            AddOutcome::Unresolved
        );

        assert!(registry.device("bulb1").is_some());
        assert!(registry.device("bulb2").is_none());
        assert!(registry.find_property("bulb1", "state").is_some());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], HostEvent::DeviceAdded(device) if device.name == "Bulb"));

        // unresolved devices still show up in the overview
        let names: Vec<_> = registry
            .summaries()
            .into_iter()
            .map(|s| s.friendly_name)
            .collect();
        assert_eq!(names, vec!["bulb1", "bulb2"]);
    }

    #[test]
    fn test_announcement_keeps_update_flag() {
        let (tx, _rx) = unbounded_channel();
        let mut registry = Registry::new(tx);
        let resolver = resolver();

        registry.add_device(info("bulb1", "X"), &resolver);
        registry.set_update_available("bulb1", true);
        registry.add_device(info("bulb1", "X"), &resolver);

        assert!(registry.summaries()[0].update_available);
    }

    #[test]
    fn test_attempt_new_property() {
        let (tx, mut rx) = unbounded_channel();
        let mut registry = Registry::new(tx);

        registry.add_device(info("bulb1", "X"), &resolver());
        drain(&mut rx);

        registry
            .attempt_new_property("bulb1", "linkquality", &json!(87))
            .unwrap();

        let property = registry.find_property("bulb1", "linkquality").unwrap();
        assert_eq!(property.description.title.as_deref(), Some("Link quality"));
        assert_eq!(property.description.property_type, PropertyType::Number);
        assert!(property.is_read_only());
        assert_eq!(property.value, json!(87));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], HostEvent::DeviceUpdated(device) if device.properties.len() == 2));

        assert!(matches!(
            registry.attempt_new_property("ghost", "battery", &json!(true)),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_update_property() {
        let (tx, mut rx) = unbounded_channel();
        let mut registry = Registry::new(tx);

        registry.add_device(info("bulb1", "X"), &resolver());
        drain(&mut rx);

        registry.update_property("bulb1", "state", json!(true)).unwrap();
        assert_eq!(registry.find_property("bulb1", "state").unwrap().value, json!(true));

        assert_eq!(
            drain(&mut rx),
            vec![HostEvent::PropertyChanged {
                device_id: "bulb1".to_string(),
                property: "state".to_string(),
                value: json!(true),
            }]
        );

        assert!(matches!(
            registry.update_property("bulb1", "color", json!("#ffffff")),
            Err(Error::PropertyNotFound(_, _))
        ));
    }

    #[test]
    fn test_remove() {
        let (tx, mut rx) = unbounded_channel();
        let mut registry = Registry::new(tx);

        registry.add_device(info("bulb1", "X"), &resolver());
        drain(&mut rx);

        assert!(registry.remove("bulb1").is_some());
        assert!(registry.remove("bulb1").is_none());
        assert!(registry.summaries().is_empty());

        assert_eq!(
            drain(&mut rx),
            vec![HostEvent::DeviceRemoved("bulb1".to_string())]
        );
    }
}

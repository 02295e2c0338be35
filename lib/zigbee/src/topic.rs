use std::fmt;

/// A zigbee2mqtt topic, relative to the configured base topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topic {
    Devices,
    Logging,
    NetworkMapRequest,
    NetworkMapResponse,
    PermitJoin,
    DeviceRemove,
    DeviceOtaUpdate,
    DevicesGet,
    Bridge(String),
    Device(String),
    DeviceSet(String),
}

impl Topic {
    pub fn with_prefix(&self, prefix: &str) -> String {
        format!("{prefix}/{self}")
    }

    /// Parses a full topic as received from the broker. Returns `None` when
    /// the topic does not live under `prefix`.
    pub fn parse(prefix: &str, topic: &str) -> Option<Topic> {
        let relative = topic.trim().strip_prefix(prefix)?.strip_prefix('/')?;

        let topic = match relative {
            "bridge/devices" => Topic::Devices,
            "bridge/logging" => Topic::Logging,
            "bridge/request/networkmap" => Topic::NetworkMapRequest,
            "bridge/response/networkmap" => Topic::NetworkMapResponse,
            "bridge/request/permit_join" => Topic::PermitJoin,
            "bridge/request/device/remove" => Topic::DeviceRemove,
            "bridge/request/device/ota_update/update" => Topic::DeviceOtaUpdate,
            "bridge/config/devices/get" => Topic::DevicesGet,
            "bridge" => Topic::Bridge(String::new()),
            _ => match relative.strip_prefix("bridge/") {
                Some(rest) => Topic::Bridge(rest.to_string()),
                None => Topic::Device(relative.to_string()),
            },
        };

        Some(topic)
    }

    pub fn is_bridge(&self) -> bool {
        !matches!(self, Topic::Device(_) | Topic::DeviceSet(_))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Topic::Devices => write!(f, "bridge/devices"),
            Topic::Logging => write!(f, "bridge/logging"),
            Topic::NetworkMapRequest => write!(f, "bridge/request/networkmap"),
            Topic::NetworkMapResponse => write!(f, "bridge/response/networkmap"),
            Topic::PermitJoin => write!(f, "bridge/request/permit_join"),
            Topic::DeviceRemove => write!(f, "bridge/request/device/remove"),
            Topic::DeviceOtaUpdate => write!(f, "bridge/request/device/ota_update/update"),
            Topic::DevicesGet => write!(f, "bridge/config/devices/get"),
            Topic::Bridge(rest) if rest.is_empty() => write!(f, "bridge"),
            Topic::Bridge(rest) => write!(f, "bridge/{}", rest),
            Topic::Device(name) => write!(f, "{}", name),
            Topic::DeviceSet(name) => write!(f, "{}/set", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization() {
        assert_eq!(Topic::Devices.to_string(), "bridge/devices");
        assert_eq!(
            Topic::NetworkMapResponse.with_prefix("zigbee2mqtt"),
            "zigbee2mqtt/bridge/response/networkmap"
        );
        assert_eq!(
            Topic::DeviceOtaUpdate.with_prefix("z2m"),
            "z2m/bridge/request/device/ota_update/update"
        );
        assert_eq!(
            Topic::DeviceSet("kitchen/bulb".to_string()).with_prefix("zigbee2mqtt"),
            "zigbee2mqtt/kitchen/bulb/set"
        );
        assert_eq!(
            Topic::Bridge("state".to_string()).with_prefix("zigbee2mqtt"),
            "zigbee2mqtt/bridge/state"
        );
    }

    #[test]
    fn test_parsing() {
        assert_eq!(
            Topic::parse("zigbee2mqtt", "zigbee2mqtt/bridge/devices"),
            Some(Topic::Devices)
        );
        assert_eq!(
            Topic::parse("zigbee2mqtt", " zigbee2mqtt/bridge/logging "),
            Some(Topic::Logging)
        );
        assert_eq!(
            Topic::parse("zigbee2mqtt", "zigbee2mqtt/bridge/response/networkmap"),
            Some(Topic::NetworkMapResponse)
        );
        assert_eq!(
            Topic::parse("zigbee2mqtt", "zigbee2mqtt/bridge/state"),
            Some(Topic::Bridge("state".to_string()))
        );
        assert_eq!(
            Topic::parse("zigbee2mqtt", "zigbee2mqtt/living room/lamp"),
            Some(Topic::Device("living room/lamp".to_string()))
        );
        assert_eq!(Topic::parse("zigbee2mqtt", "other/bulb1"), None);
        assert_eq!(Topic::parse("zigbee2mqtt", "zigbee2mqttbulb1"), None);
    }

    #[test]
    fn test_bridge_topics() {
        assert!(Topic::Devices.is_bridge());
        assert!(Topic::Bridge("info".to_string()).is_bridge());
        assert!(!Topic::Device("bulb1".to_string()).is_bridge());
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use str_derive::Str;

use crate::DeviceDefinition;

/// Boolean property mirrored from `on`/`off` actions of remotes and switches.
pub const POWER_STATE: &str = "power state";

#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, Str, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Boolean,
    Number,
    #[default]
    String,
    Enum,
}

impl PropertyType {
    /// Guesses the type of a property nobody described, from a value seen on
    /// the bus.
    pub fn infer(value: &Value) -> PropertyType {
        match value {
            Value::Bool(_) => PropertyType::Boolean,
            Value::Number(number) if number.as_f64().is_some_and(f64::is_finite) => {
                PropertyType::Number
            }
            _ => PropertyType::String,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Origin {
    /// The device reports `0..=maximum`, the host sees `0..=100`.
    ScaledPercentage { maximum: f64 },
}

/// How values are mapped between the bus and the host model.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusMapping {
    #[default]
    Identity,
    Binary {
        on: Value,
        off: Value,
    },
}

impl BusMapping {
    pub fn from_bus(&self, value: Value) -> Value {
        match self {
            BusMapping::Identity => value,
            BusMapping::Binary { on, off } => {
                if value == *on {
                    Value::Bool(true)
                } else if value == *off {
                    Value::Bool(false)
                } else {
                    value
                }
            }
        }
    }

    pub fn to_bus(&self, value: Value) -> Value {
        match (self, value) {
            (BusMapping::Binary { on, .. }, Value::Bool(true)) => on.clone(),
            (BusMapping::Binary { off, .. }, Value::Bool(false)) => off.clone(),
            (_, value) => value,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescription {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub bus: BusMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub description: PropertyDescription,
    pub value: Value,
}

impl Property {
    pub fn new(name: impl Into<String>, description: PropertyDescription) -> Property {
        let value = description.value.clone().unwrap_or(Value::Null);

        Property {
            name: name.into(),
            description,
            value,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.description.read_only
    }

    /// Color properties carry `#rrggbb` on the host side and CIE xy on the bus.
    pub fn is_color(&self) -> bool {
        self.description.property_type == PropertyType::String
            && self.description.title.as_deref() == Some("Color")
    }

    pub fn scaled_maximum(&self) -> Option<f64> {
        match self.description.origin {
            Some(Origin::ScaledPercentage { maximum }) => Some(maximum),
            None => None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ActionDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct EventDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Payload key whose value is attached to the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    pub id: String,
    pub model_id: Option<String>,
    pub name: String,
    pub types: Vec<String>,
    pub properties: HashMap<String, Property>,
    pub actions: HashMap<String, ActionDescription>,
    pub events: HashMap<String, EventDescription>,
}

impl Device {
    pub fn new(id: String, model_id: Option<String>, definition: DeviceDefinition) -> Device {
        let properties = definition
            .properties
            .into_iter()
            .map(|(name, description)| (name.clone(), Property::new(name, description)))
            .collect();

        Device {
            id,
            model_id,
            name: definition.name,
            types: definition.types,
            properties,
            actions: definition.actions,
            events: definition.events,
        }
    }

    pub fn find_property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    pub fn find_property_mut(&mut self, key: &str) -> Option<&mut Property> {
        self.properties.get_mut(key)
    }
}

/// One entry of the `bridge/devices` announcement.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DeviceInfo {
    pub friendly_name: String,
    pub ieee_address: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub model_id: Option<String>,
    pub software_build_id: Option<String>,
    pub definition: Option<VendorDefinition>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct VendorDefinition {
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub exposes: Vec<Value>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DeviceSummary {
    pub friendly_name: String,
    pub update_available: bool,
    pub model_id: String,
    pub description: Option<String>,
    pub software_build_id: Option<String>,
    pub vendor: Option<String>,
}

impl DeviceSummary {
    pub fn from_info(info: &DeviceInfo) -> Option<DeviceSummary> {
        let definition = info.definition.as_ref();

        Some(DeviceSummary {
            friendly_name: info.friendly_name.clone(),
            update_available: false,
            model_id: info.model_id.clone()?,
            description: definition.and_then(|d| d.description.clone()),
            software_build_id: info.software_build_id.clone(),
            vendor: definition.and_then(|d| d.vendor.clone()),
        })
    }
}

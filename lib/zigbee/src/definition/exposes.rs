use log::trace;
use serde_json::Value;

use super::{DefinitionSource, DeviceDefinition};
use crate::device::POWER_STATE;
use crate::transform::sentence_case;
use crate::{BusMapping, DeviceInfo, EventDescription, Origin, PropertyDescription, PropertyType};

const ACCESS_SET: u64 = 0b010;

/// Builds definitions from the `exposes` list zigbee2mqtt publishes for every
/// supported device.
#[derive(Debug, Default)]
pub struct ExposesGenerator;

impl DefinitionSource for ExposesGenerator {
    fn name(&self) -> &'static str {
        "exposes"
    }

    fn definition(&self, info: &DeviceInfo) -> Option<DeviceDefinition> {
        let vendor = info.definition.as_ref()?;

        let mut definition = DeviceDefinition {
            name: vendor
                .description
                .clone()
                .unwrap_or_else(|| info.friendly_name.clone()),
            ..Default::default()
        };

        for expose in &vendor.exposes {
            add_expose(&mut definition, expose);
        }

        if definition.properties.is_empty() && definition.events.is_empty() {
            return None;
        }

        Some(definition)
    }
}

fn add_expose(definition: &mut DeviceDefinition, expose: &Value) {
    match expose["type"].as_str() {
        Some("light") => {
            add_type(definition, "Light");
            add_features(definition, expose);
        }
        Some("switch") => {
            add_type(definition, "OnOffSwitch");
            add_features(definition, expose);
        }
        Some("lock" | "climate" | "fan" | "cover") => add_features(definition, expose),
        Some("composite") if expose["property"] == "color" => add_color(definition, expose),
        Some("binary") => add_binary(definition, expose),
        Some("numeric") => add_numeric(definition, expose),
        Some("enum") => add_enum(definition, expose),
        Some("text") => add_text(definition, expose),
        other => trace!("skipping expose of type {:?}", other),
    }
}

fn add_features(definition: &mut DeviceDefinition, expose: &Value) {
    if let Some(features) = expose["features"].as_array() {
        for feature in features {
            add_expose(definition, feature);
        }
    }
}

fn add_type(definition: &mut DeviceDefinition, device_type: &str) {
    if !definition.types.iter().any(|t| t == device_type) {
        definition.types.push(device_type.to_string());
    }
}

fn base_description(expose: &Value, property_type: PropertyType) -> PropertyDescription {
    let name = expose["name"]
        .as_str()
        .or(expose["property"].as_str())
        .unwrap_or_default();
    let access = expose["access"].as_u64().unwrap_or(1);

    PropertyDescription {
        title: Some(
            expose["label"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| sentence_case(name)),
        ),
        description: expose["description"].as_str().map(str::to_string),
        property_type,
        read_only: access & ACCESS_SET == 0,
        unit: expose["unit"].as_str().map(str::to_string),
        ..Default::default()
    }
}

fn insert(definition: &mut DeviceDefinition, expose: &Value, description: PropertyDescription) {
    if let Some(property) = expose["property"].as_str() {
        definition
            .properties
            .insert(property.to_string(), description);
    }
}

fn add_binary(definition: &mut DeviceDefinition, expose: &Value) {
    let mut description = base_description(expose, PropertyType::Boolean);
    description.bus = BusMapping::Binary {
        on: expose["value_on"].clone(),
        off: expose["value_off"].clone(),
    };

    if expose["property"] == "state" {
        description.semantic_type = Some("OnOffProperty".to_string());
        add_type(definition, "OnOffSwitch");
    }

    insert(definition, expose, description);
}

fn add_numeric(definition: &mut DeviceDefinition, expose: &Value) {
    let mut description = base_description(expose, PropertyType::Number);
    description.minimum = expose["value_min"].as_f64();
    description.maximum = expose["value_max"].as_f64();

    if expose["property"] == "brightness" {
        if let Some(maximum) = description.maximum {
            description.semantic_type = Some("BrightnessProperty".to_string());
            description.origin = Some(Origin::ScaledPercentage { maximum });
            description.unit = Some("percent".to_string());
            description.minimum = Some(0.0);
            description.maximum = Some(100.0);
        }
    }

    insert(definition, expose, description);
}

fn add_enum(definition: &mut DeviceDefinition, expose: &Value) {
    let mut description = base_description(expose, PropertyType::Enum);
    description.values = expose["values"].as_array().cloned().unwrap_or_default();

    if expose["property"] == "action" {
        description.read_only = true;

        for value in description.values.iter().filter_map(Value::as_str) {
            definition.events.insert(
                value.to_string(),
                EventDescription {
                    title: Some(sentence_case(value)),
                    ..Default::default()
                },
            );
        }

        let has_value = |v: &str| description.values.iter().any(|value| value == v);

        if has_value("on") && has_value("off") {
            definition.properties.insert(
                POWER_STATE.to_string(),
                PropertyDescription {
                    title: Some(sentence_case(POWER_STATE)),
                    property_type: PropertyType::Boolean,
                    read_only: true,
                    ..Default::default()
                },
            );
        }
    }

    insert(definition, expose, description);
}

fn add_text(definition: &mut DeviceDefinition, expose: &Value) {
    let description = base_description(expose, PropertyType::String);
    insert(definition, expose, description);
}

fn add_color(definition: &mut DeviceDefinition, expose: &Value) {
    let mut description = base_description(expose, PropertyType::String);
    description.title = Some("Color".to_string());
    description.semantic_type = Some("ColorProperty".to_string());

    add_type(definition, "ColorControl");
    insert(definition, expose, description);
}

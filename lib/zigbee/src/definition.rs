mod exposes;
pub use exposes::ExposesGenerator;

use std::collections::HashMap;

use log::debug;
use serde::Deserialize;

use crate::{ActionDescription, DeviceInfo, EventDescription, PropertyDescription, Result};

/// Everything needed to build a [`crate::Device`], however it was obtained.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DeviceDefinition {
    pub name: String,
    #[serde(rename = "@type", default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyDescription>,
    #[serde(default)]
    pub actions: HashMap<String, ActionDescription>,
    #[serde(default)]
    pub events: HashMap<String, EventDescription>,
}

pub trait DefinitionSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self, info: &DeviceInfo) -> Option<DeviceDefinition>;
}

/// Hand-written definitions keyed by model id.
#[derive(Debug, Default)]
pub struct StaticTable {
    definitions: HashMap<String, DeviceDefinition>,
}

impl StaticTable {
    pub fn new(definitions: HashMap<String, DeviceDefinition>) -> StaticTable {
        StaticTable { definitions }
    }

    pub fn from_json(json: &[u8]) -> Result<StaticTable> {
        let definitions = serde_json::from_slice(json)?;
        Ok(StaticTable { definitions })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionSource for StaticTable {
    fn name(&self) -> &'static str {
        "static table"
    }

    fn definition(&self, info: &DeviceInfo) -> Option<DeviceDefinition> {
        let model_id = info.model_id.as_ref()?;
        self.definitions.get(model_id).cloned()
    }
}

/// Asks each source in order and takes the first definition found.
pub struct Resolver {
    sources: Vec<Box<dyn DefinitionSource>>,
}

impl Resolver {
    pub fn new(sources: Vec<Box<dyn DefinitionSource>>) -> Resolver {
        Resolver { sources }
    }

    pub fn resolve(&self, info: &DeviceInfo) -> Option<DeviceDefinition> {
        self.sources.iter().find_map(|source| {
            let definition = source.definition(info)?;
            debug!(
                "device {} created from {}",
                info.friendly_name,
                source.name()
            );
            Some(definition)
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new(vec![
            Box::new(StaticTable::default()),
            Box::new(ExposesGenerator),
        ])
    }
}

mod bridge;
pub use bridge::{Bridge, DeviceRemoval};

mod bus;
pub use bus::{connect_mqtt, Bus};

mod definition;
pub use definition::{
    DefinitionSource, DeviceDefinition, ExposesGenerator, Resolver, StaticTable,
};

mod device;
pub use device::{
    ActionDescription, BusMapping, Device, DeviceInfo, DeviceSummary, EventDescription, Origin,
    Property, PropertyDescription, PropertyType, VendorDefinition,
};

mod error;
pub use error::Error;

mod host;
pub use host::HostEvent;

pub mod map;
pub use map::{MapRequest, MapRequestOutcome, MapStatus};

mod registry;
pub use registry::{AddOutcome, Registry};

mod router;

mod topic;
pub use topic::Topic;

pub mod transform;

pub type Result<T> = std::result::Result<T, Error>;

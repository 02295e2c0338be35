use serde_json::Value;

use crate::Device;

/// Notifications for the application that owns the device model.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    DeviceAdded(Device),
    /// A device gained properties after it was added.
    DeviceUpdated(Device),
    DeviceRemoved(String),
    PropertyChanged {
        device_id: String,
        property: String,
        value: Value,
    },
    Event {
        device_id: String,
        name: String,
        data: Option<Value>,
    },
}

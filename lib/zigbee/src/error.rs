use std::fmt;

use crate::transform;

#[derive(Debug)]
pub enum Error {
    Json(serde_json::Error),
    Mqtt(paho_mqtt::Error),
    Transform(transform::Error),
    DeviceNotFound(String),
    PropertyNotFound(String, String),
    ReadOnly(String, String),
    UnexpectedPayload(&'static str),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<paho_mqtt::Error> for Error {
    fn from(err: paho_mqtt::Error) -> Self {
        Self::Mqtt(err)
    }
}

impl From<transform::Error> for Error {
    fn from(err: transform::Error) -> Self {
        Self::Transform(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Mqtt(err) => write!(f, "mqtt error: {err}"),
            Self::Transform(err) => write!(f, "transform error: {err}"),
            Self::DeviceNotFound(id) => write!(f, "device {id} not found"),
            Self::PropertyNotFound(id, key) => write!(f, "property {key} of {id} not found"),
            Self::ReadOnly(id, key) => write!(f, "property {key} of {id} is read-only"),
            Self::UnexpectedPayload(expected) => write!(f, "unexpected payload, expected {expected}"),
        }
    }
}

impl std::error::Error for Error {}

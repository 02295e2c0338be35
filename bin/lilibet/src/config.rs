use std::path::PathBuf;

use crate::{Error, Result};

const DEFAULT_PREFIX: &str = "zigbee2mqtt";
const DEFAULT_CHANNEL: u8 = 11;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub mqtt_address: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub prefix: String,
    pub debug: bool,
    /// Whether zigbee2mqtt is installed and run by us, or already running
    /// somewhere else.
    pub local_zigbee2mqtt: bool,
    pub auto_update: bool,
    pub serial_port: Option<String>,
    pub channel: u8,
    pub data_dir: PathBuf,
    /// Release cloned on a fresh install. The default branch when unset.
    pub release: Option<String>,
    pub devices_file: Option<PathBuf>,
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let flag = |name: &'static str, default: bool| match var(name) {
            Some(value) => parse_bool(name, &value),
            None => Ok(default),
        };

        let channel = match var("ZIGBEE_CHANNEL") {
            Some(value) => value
                .parse::<u8>()
                .ok()
                .filter(|channel| (11..=26).contains(channel))
                .ok_or(Error::InvalidVar("ZIGBEE_CHANNEL", value))?,
            None => DEFAULT_CHANNEL,
        };

        let http_port = match var("HTTP_PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| Error::InvalidVar("HTTP_PORT", value))?,
            None => DEFAULT_HTTP_PORT,
        };

        Ok(Config {
            mqtt_address: var("MQTT_ADDRESS").ok_or(Error::MissingVar("MQTT_ADDRESS"))?,
            mqtt_username: var("MQTT_USER"),
            mqtt_password: var("MQTT_PASS"),
            prefix: var("ZIGBEE2MQTT_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            debug: flag("DEBUG", false)?,
            local_zigbee2mqtt: flag("LOCAL_ZIGBEE2MQTT", true)?,
            auto_update: flag("AUTO_UPDATE", true)?,
            serial_port: var("SERIAL_PORT"),
            channel,
            data_dir: var("DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            release: var("ZIGBEE2MQTT_RELEASE"),
            devices_file: var("DEVICES_FILE").map(PathBuf::from),
            http_port,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidVar(name, value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("MQTT_ADDRESS", "tcp://localhost:1883")]).unwrap();

        assert_eq!(
            config,
            Config {
                mqtt_address: "tcp://localhost:1883".to_string(),
                mqtt_username: None,
                mqtt_password: None,
                prefix: "zigbee2mqtt".to_string(),
                debug: false,
                local_zigbee2mqtt: true,
                auto_update: true,
                serial_port: None,
                channel: 11,
                data_dir: PathBuf::from("./data"),
                release: None,
                devices_file: None,
                http_port: 8080,
            }
        );
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("MQTT_ADDRESS", "tcp://broker:1883"),
            ("MQTT_USER", "lilibet"),
            ("MQTT_PASS", "secret"),
            ("ZIGBEE2MQTT_PREFIX", "z2m"),
            ("DEBUG", "yes"),
            ("LOCAL_ZIGBEE2MQTT", "0"),
            ("AUTO_UPDATE", "Off"),
            ("SERIAL_PORT", "/dev/ttyACM0"),
            ("ZIGBEE_CHANNEL", "25"),
            ("DATA_DIR", "/var/lib/lilibet"),
            ("ZIGBEE2MQTT_RELEASE", "1.35.1"),
            ("HTTP_PORT", "9000"),
        ])
        .unwrap();

        assert_eq!(config.mqtt_username.as_deref(), Some("lilibet"));
        assert_eq!(config.prefix, "z2m");
        assert!(config.debug);
        assert!(!config.local_zigbee2mqtt);
        assert!(!config.auto_update);
        assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.channel, 25);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/lilibet"));
        assert_eq!(config.release.as_deref(), Some("1.35.1"));
        assert_eq!(config.http_port, 9000);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[]), Err(Error::MissingVar("MQTT_ADDRESS"))));
        assert!(matches!(
            config(&[("MQTT_ADDRESS", "  ")]),
            Err(Error::MissingVar("MQTT_ADDRESS"))
        ));
        assert!(matches!(
            config(&[("MQTT_ADDRESS", "tcp://broker"), ("ZIGBEE_CHANNEL", "27")]),
            Err(Error::InvalidVar("ZIGBEE_CHANNEL", _))
        ));
        assert!(matches!(
            config(&[("MQTT_ADDRESS", "tcp://broker"), ("DEBUG", "maybe")]),
            Err(Error::InvalidVar("DEBUG", _))
        ));
    }
}

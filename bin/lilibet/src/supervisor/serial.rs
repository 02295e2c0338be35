use std::collections::BTreeMap;

use log::trace;
use serialport::SerialPortType;
use tokio::{fs, task};

use crate::Result;

const BY_ID: &str = "/dev/serial/by-id";

#[derive(Clone, Debug, PartialEq)]
pub struct PortInfo {
    pub path: String,
    /// Vendor identification, e.g. the `/dev/serial/by-id` link name.
    pub hardware_id: Option<String>,
}

impl PortInfo {
    fn is_known_coordinator(&self) -> bool {
        self.hardware_id
            .as_deref()
            .is_some_and(|id| id.contains("CC253") || id.contains("if00"))
    }
}

/// Picks the port a Zigbee coordinator is most likely attached to. The first
/// Raspberry Pi UART is taken unless a known USB coordinator shows up, in
/// which case the last one listed wins.
pub fn select_port(ports: &[PortInfo]) -> Option<String> {
    let mut selected: Option<&str> = None;

    for port in ports {
        if port.path.starts_with("/dev/ttyAMA") && selected.is_none() {
            selected = Some(port.path.as_str());
        }

        if port.is_known_coordinator() {
            trace!("coordinator spotted at {}", port.path);
            selected = Some(port.path.as_str());
        }
    }

    selected.map(str::to_string)
}

pub async fn scan() -> Result<Vec<PortInfo>> {
    let mut by_id = links_by_device().await?;

    let ports = task::spawn_blocking(serialport::available_ports).await??;

    let mut infos: Vec<PortInfo> = ports
        .into_iter()
        .map(|port| {
            let hardware_id = by_id
                .remove(&port.port_name)
                .or_else(|| usb_description(&port.port_type));

            PortInfo {
                path: port.port_name,
                hardware_id,
            }
        })
        .collect();

    infos.extend(by_id.into_iter().map(|(path, link)| PortInfo {
        path,
        hardware_id: Some(link),
    }));

    Ok(infos)
}

async fn links_by_device() -> Result<BTreeMap<String, String>> {
    let mut links = BTreeMap::new();

    let mut entries = match fs::read_dir(BY_ID).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(links),
        Err(err) => return Err(err.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let device = fs::canonicalize(entry.path()).await?;
        links.insert(
            device.to_string_lossy().into_owned(),
            entry.file_name().to_string_lossy().into_owned(),
        );
    }

    Ok(links)
}

fn usb_description(port_type: &SerialPortType) -> Option<String> {
    let SerialPortType::UsbPort(usb) = port_type else {
        return None;
    };

    let parts: Vec<&str> = [&usb.manufacturer, &usb.product, &usb.serial_number]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

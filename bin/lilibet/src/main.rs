use lilibet::{router, Config, ErasedError, Supervisor, SupervisorEvent};
use zigbee::{connect_mqtt, Bridge, DefinitionSource, ExposesGenerator, HostEvent, Resolver};
use zigbee::StaticTable;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info, warn, LevelFilter};
use paho_mqtt::AsyncClient as MqClient;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::{self, JoinError};
use tokio::time;

type Result<T> = std::result::Result<T, ErasedError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logger(config.debug);

    info!("lilibet version {VERSION}");

    let resolver = Resolver::new(definition_sources(&config).await?);

    let mqtt = connect_mqtt(
        config.mqtt_address.clone(),
        config.mqtt_username.clone(),
        config.mqtt_password.clone(),
        "lilibet",
    )
    .await?;
    info!("connected mqtt");

    let (host_tx, host_rx) = unbounded_channel();
    let bridge = Arc::new(Bridge::new(
        config.prefix.clone(),
        Arc::new(mqtt.clone()),
        resolver,
        host_tx,
    ));
    task::spawn(log_host_events(host_rx));

    let supervisor = if config.local_zigbee2mqtt {
        let (events_tx, events_rx) = unbounded_channel();
        task::spawn(log_supervisor_events(events_rx));

        Some(Supervisor::new(config.clone(), events_tx)?.spawn())
    } else {
        info!("using an external zigbee2mqtt");
        None
    };

    let web_handle = task::spawn(listen_web(bridge.clone(), config.http_port));
    let state_handle = task::spawn(subscribe_state(mqtt, bridge));

    let mut sigterm = signal(SignalKind::terminate())?;

    let result = tokio::select! {
        result = web_handle => joined(result),
        result = state_handle => joined(result),
        _ = sigterm.recv() => {
            info!("got SIGTERM, exiting...");
            Ok(())
        }
    };

    if let Some(supervisor) = supervisor {
        supervisor.stop().await;
    }

    result
}

fn joined(result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    result?
}

fn init_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(level);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.init();
}

async fn definition_sources(config: &Config) -> Result<Vec<Box<dyn DefinitionSource>>> {
    let table = match &config.devices_file {
        Some(path) => {
            let json = tokio::fs::read(path).await?;
            let table = StaticTable::from_json(&json)?;
            info!("loaded {} definitions from {}", table.len(), path.display());
            table
        }
        None => StaticTable::default(),
    };

    Ok(vec![Box::new(table), Box::new(ExposesGenerator)])
}

async fn listen_web(bridge: Arc<Bridge>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening http://{}", listener.local_addr()?);

    axum::serve(listener, router(bridge)).await?;

    Ok(())
}

async fn subscribe_state(mut mqtt: MqClient, bridge: Arc<Bridge>) -> Result<()> {
    let mut stream = mqtt.get_stream(None);

    bridge.subscribe().await;
    info!("Subscribed to {}", bridge.prefix());

    while let Some(msg_opt) = stream.next().await {
        if let Some(msg) = msg_opt {
            debug!("got message on {}", msg.topic());

            if let Err(err) = bridge.handle_message(msg.topic(), msg.payload()).await {
                error!("Error handling message on {}: {}", msg.topic(), err);
            }
        } else {
            error!("Lost MQTT connection. Attempting reconnect.");
            while let Err(err) = mqtt.reconnect().await {
                error!("Error MQTT reconnecting: {}", err);
                time::sleep(Duration::from_secs(1)).await;
            }

            bridge.subscribe().await;
        }
    }

    Ok(())
}

async fn log_host_events(mut rx: UnboundedReceiver<HostEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            HostEvent::DeviceAdded(device) => info!("device {} ({}) added", device.id, device.name),
            HostEvent::DeviceUpdated(device) => debug!(
                "device {} has {} properties",
                device.id,
                device.properties.len()
            ),
            HostEvent::DeviceRemoved(id) => info!("device {id} removed"),
            HostEvent::PropertyChanged {
                device_id,
                property,
                value,
            } => debug!("{device_id}: {property} = {value}"),
            HostEvent::Event {
                device_id,
                name,
                data,
            } => info!("{device_id}: event {name} {data:?}"),
        }
    }
}

async fn log_supervisor_events(mut rx: UnboundedReceiver<SupervisorEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SupervisorEvent::State(state) => info!("zigbee2mqtt {state}"),
            SupervisorEvent::Prompt(message) => warn!("{message}"),
            SupervisorEvent::Exited(Some(code)) => warn!("zigbee2mqtt exited with code {code}"),
            SupervisorEvent::Exited(None) => warn!("zigbee2mqtt was terminated"),
        }
    }
}

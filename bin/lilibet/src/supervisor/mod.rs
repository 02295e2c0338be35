//! Installs, updates and runs the local zigbee2mqtt process.

mod installation;
mod release;
mod serial;

pub use installation::Installation;
pub use release::{is_up_to_date, Release};
pub use serial::{select_port, PortInfo};

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, error, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use str_derive::Str;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use crate::{Config, Result};

/// How long zigbee2mqtt gets to shut down after SIGTERM before it is killed.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Copy, Clone, Debug, Deserialize, Serialize, Str, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Uninstalled,
    Downloading,
    Checking,
    UpToDate,
    Upgrading,
    Starting,
    Running,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupervisorEvent {
    State(SupervisorState),
    /// Something the operator should see, like a missing USB stick.
    Prompt(String),
    Exited(Option<i32>),
}

pub struct Supervisor {
    config: Config,
    installation: Installation,
    http: reqwest::Client,
    events: UnboundedSender<SupervisorEvent>,
    /// Replaces `node <entry point>` when set.
    program: Option<(String, Vec<OsString>)>,
}

/// Owned by whoever may stop the supervisor. Dropping it stops the process
/// as well.
pub struct SupervisorHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub async fn stop(self) {
        if self.stop.send(()).is_err() {
            debug!("supervisor already finished");
        }

        if let Err(err) = self.task.await {
            error!("Error joining supervisor: {err}");
        }
    }
}

impl Supervisor {
    pub fn new(config: Config, events: UnboundedSender<SupervisorEvent>) -> Result<Supervisor> {
        Ok(Supervisor {
            installation: Installation::new(&config.data_dir),
            http: release::http_client()?,
            config,
            events,
            program: None,
        })
    }

    pub fn with_installation(mut self, installation: Installation) -> Supervisor {
        self.installation = installation;
        self
    }

    /// Runs `program` with `args` instead of node with the zigbee2mqtt entry
    /// point. The environment stays the same.
    pub fn with_program<I, S>(mut self, program: impl Into<String>, args: I) -> Supervisor
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = Some((program.into(), args.into_iter().map(Into::into).collect()));
        self
    }

    pub fn spawn(self) -> SupervisorHandle {
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(self.run(stopped));

        SupervisorHandle { stop, task }
    }

    async fn run(self, mut stopped: oneshot::Receiver<()>) {
        let child = tokio::select! {
            child = self.prepare() => child,
            _ = &mut stopped => None,
        };

        let Some(mut child) = child else {
            self.set_state(SupervisorState::Stopped);
            return;
        };

        self.set_state(SupervisorState::Running);

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => {
                    warn!("zigbee2mqtt exited with {status}");
                    self.emit(SupervisorEvent::Exited(status.code()));
                }
                Err(err) => error!("Error waiting for zigbee2mqtt: {err}"),
            },
            _ = &mut stopped => {
                info!("stopping zigbee2mqtt");
                if let Some(status) = terminate(&mut child).await {
                    info!("zigbee2mqtt stopped with {status}");
                    self.emit(SupervisorEvent::Exited(status.code()));
                }
            }
        }

        self.set_state(SupervisorState::Stopped);
    }

    /// Brings the installation up to date and starts zigbee2mqtt. Every step
    /// logs its own failure; `None` means nothing was started.
    async fn prepare(&self) -> Option<Child> {
        let ready = if self.installation.is_installed().await {
            !self.config.auto_update || self.check_for_update().await
        } else {
            self.set_state(SupervisorState::Uninstalled);
            self.install(self.config.release.as_deref()).await
        };

        if !ready || !self.installation.is_installed().await {
            error!(
                "zigbee2mqtt is not installed in {}",
                self.installation.dir().display()
            );
            return None;
        }

        match self.installation.ensure_config().await {
            Ok(_) => (),
            Err(err) => warn!("Error preparing configuration: {err}"),
        }

        let port = self.select_port().await?;

        self.set_state(SupervisorState::Starting);
        match self.start(&port) {
            Ok(child) => Some(child),
            Err(err) => {
                error!("Error starting zigbee2mqtt: {err}");
                None
            }
        }
    }

    /// Returns whether a complete installation is in place. A checkout whose
    /// dependencies failed to install is removed so the next start retries.
    async fn install(&self, release: Option<&str>) -> bool {
        self.set_state(SupervisorState::Downloading);

        info!("downloading zigbee2mqtt");
        if let Err(err) = self.installation.clone_release(release).await {
            error!("Error downloading zigbee2mqtt: {err}");
            return false;
        }

        info!("installing zigbee2mqtt, this may take up to 10 minutes");
        if let Err(err) = self.installation.install_dependencies().await {
            error!("Error installing zigbee2mqtt: {err}");

            if let Err(err) = self.installation.delete().await {
                error!("Error removing incomplete zigbee2mqtt: {err}");
            }
            return false;
        }

        self.prompt("Ready!");
        true
    }

    /// Returns whether the installation can still be started. A failed check
    /// keeps the current version.
    async fn check_for_update(&self) -> bool {
        self.set_state(SupervisorState::Checking);

        let release = match release::latest_release(&self.http).await {
            Ok(release) => release,
            Err(err) => {
                error!("Error checking latest zigbee2mqtt release: {err}");
                return true;
            }
        };

        let local_version = match self.installation.local_version().await {
            Ok(version) => version,
            Err(err) => {
                error!("Error reading local zigbee2mqtt version: {err}");
                return true;
            }
        };

        debug!(
            "local zigbee2mqtt {local_version}, latest {}",
            release.tag_name
        );

        if is_up_to_date(&local_version, &release) {
            info!("zigbee2mqtt {local_version} is up to date");
            self.set_state(SupervisorState::UpToDate);
            return true;
        }

        self.set_state(SupervisorState::Upgrading);
        self.prompt(format!("Updating Zigbee2MQTT to {}", release.tag_name));

        if let Err(err) = self.installation.delete().await {
            error!("Error deleting zigbee2mqtt: {err}");
            return false;
        }

        self.install(Some(&release.tag_name)).await
    }

    async fn select_port(&self) -> Option<String> {
        if let Some(port) = &self.config.serial_port {
            info!("using configured serial port {port}");
            return Some(port.clone());
        }

        let ports = match serial::scan().await {
            Ok(ports) => ports,
            Err(err) => {
                warn!("Error scanning serial ports: {err}");
                vec![]
            }
        };
        debug!("serial ports: {ports:?}");

        match select_port(&ports) {
            Some(port) => {
                info!("selected serial port {port}");
                Some(port)
            }
            None => {
                self.prompt("No USB stick detected");
                error!("No Zigbee USB stick detected, set SERIAL_PORT to pick one");
                None
            }
        }
    }

    fn start(&self, port: &str) -> Result<Child> {
        let mut command = match &self.program {
            Some((program, args)) => {
                info!("starting {program}");
                let mut command = Command::new(program);
                command.args(args);
                command
            }
            None => {
                let entry_point = self.installation.entry_point();
                info!("starting node {}", entry_point.display());
                let mut command = Command::new("node");
                command.arg(entry_point);
                command
            }
        };

        command
            .envs(companion_env(&self.config, &self.installation, port))
            .kill_on_drop(true);

        if self.config.debug {
            command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::inherit());
        }

        Ok(command.spawn()?)
    }

    fn set_state(&self, state: SupervisorState) {
        debug!("supervisor state {state}");
        self.emit(SupervisorEvent::State(state));
    }

    fn prompt(&self, message: impl Into<String>) {
        self.emit(SupervisorEvent::Prompt(message.into()));
    }

    fn emit(&self, event: SupervisorEvent) {
        if self.events.send(event).is_err() {
            debug!("supervisor event receiver is gone");
        }
    }
}

/// Sends SIGTERM so zigbee2mqtt can save its state, and kills it when it
/// has not exited within [`STOP_TIMEOUT`].
async fn terminate(child: &mut Child) -> Option<ExitStatus> {
    if let Some(pid) = child.id() {
        match i32::try_from(pid) {
            Ok(pid) => {
                if let Err(err) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                    error!("Error sending SIGTERM to zigbee2mqtt: {err}");
                }
            }
            Err(err) => error!("Error converting pid {pid}: {err}"),
        }
    }

    match time::timeout(STOP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(err)) => {
            error!("Error waiting for zigbee2mqtt: {err}");
            None
        }
        Err(_) => {
            warn!("zigbee2mqtt ignored SIGTERM, killing it");
            if let Err(err) = child.kill().await {
                error!("Error killing zigbee2mqtt: {err}");
            }
            None
        }
    }
}

/// Environment zigbee2mqtt reads its configuration overrides from.
pub fn companion_env(
    config: &Config,
    installation: &Installation,
    port: &str,
) -> Vec<(&'static str, String)> {
    let mut env = vec![
        (
            "ZIGBEE2MQTT_DATA",
            installation.data_dir().display().to_string(),
        ),
        ("ZIGBEE2MQTT_CONFIG_MQTT_BASE_TOPIC", config.prefix.clone()),
        ("ZIGBEE2MQTT_CONFIG_MQTT_SERVER", config.mqtt_address.clone()),
        ("ZIGBEE2MQTT_CONFIG_SERIAL_PORT", port.to_string()),
        (
            "ZIGBEE2MQTT_CONFIG_ADVANCED_LOG_DIRECTORY",
            installation.log_dir().display().to_string(),
        ),
        (
            "ZIGBEE2MQTT_CONFIG_ADVANCED_LOG_FILE",
            "%TIMESTAMP%.txt".to_string(),
        ),
    ];

    if config.debug {
        env.push(("ZIGBEE2MQTT_CONFIG_ADVANCED_LOG_LEVEL", "debug".to_string()));
    }

    env.push((
        "ZIGBEE2MQTT_CONFIG_ADVANCED_CHANNEL",
        config.channel.to_string(),
    ));

    env
}

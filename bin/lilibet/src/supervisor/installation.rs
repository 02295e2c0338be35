use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info};
use serde::Deserialize;
use tokio::fs;
use tokio::process::Command;

use crate::{Error, Result};

const REPOSITORY: &str = "https://github.com/Koenkk/zigbee2mqtt";

/// Layout of a zigbee2mqtt checkout inside the data directory. The
/// configuration lives next to the checkout so it survives reinstalls.
#[derive(Clone, Debug)]
pub struct Installation {
    data_dir: PathBuf,
    dir: PathBuf,
    repository: String,
}

#[derive(Deserialize)]
struct PackageJson {
    version: String,
}

impl Installation {
    pub fn new(data_dir: impl Into<PathBuf>) -> Installation {
        let data_dir = data_dir.into();
        let dir = data_dir.join("zigbee2mqtt");

        Installation {
            data_dir,
            dir,
            repository: REPOSITORY.to_string(),
        }
    }

    /// Clones from `repository` instead of upstream zigbee2mqtt.
    pub fn with_repository(mut self, repository: impl Into<String>) -> Installation {
        self.repository = repository.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_point(&self) -> PathBuf {
        self.dir.join("index.js")
    }

    pub fn config_template(&self) -> PathBuf {
        self.dir.join("data").join("configuration.yaml")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("configuration.yaml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }

    fn package_file(&self) -> PathBuf {
        self.dir.join("package.json")
    }

    pub async fn is_installed(&self) -> bool {
        fs::try_exists(&self.dir).await.unwrap_or(false)
    }

    pub async fn local_version(&self) -> Result<String> {
        let package = fs::read(self.package_file()).await?;
        let package: PackageJson = serde_json::from_slice(&package)?;

        Ok(package.version)
    }

    pub async fn clone_release(&self, release: Option<&str>) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;

        let mut command = Command::new("git");
        command.args(["clone", "--depth=1"]);

        if let Some(release) = release {
            command.args(["--branch", release]);
        }

        command.arg(&self.repository).arg(&self.dir);

        run(command, "git clone").await
    }

    pub async fn install_dependencies(&self) -> Result<()> {
        let mut command = Command::new("npm");
        command.args(["ci", "--production"]).current_dir(&self.dir);

        run(command, "npm ci").await
    }

    pub async fn delete(&self) -> Result<()> {
        info!("deleting {}", self.dir.display());
        fs::remove_dir_all(&self.dir).await?;

        Ok(())
    }

    /// Copies the configuration template shipped with zigbee2mqtt unless a
    /// configuration already exists. Returns whether a copy was made.
    pub async fn ensure_config(&self) -> Result<bool> {
        let config = self.config_file();

        if fs::try_exists(&config).await? {
            debug!("{} exists", config.display());
            return Ok(false);
        }

        let template = self.config_template();
        if !fs::try_exists(&template).await? {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no configuration template at {}", template.display()),
            )));
        }

        fs::copy(&template, &config).await?;
        info!("copied configuration template to {}", config.display());

        Ok(true)
    }
}

async fn run(mut command: Command, name: &str) -> Result<()> {
    debug!("running {command:?}");

    let status = command.stdin(Stdio::null()).status().await?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Command(name.to_string(), status.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    async fn installed() -> (TempDir, Installation) {
        let data_dir = tempfile::tempdir().unwrap();
        let installation = Installation::new(data_dir.path());

        fs::create_dir_all(installation.dir().join("data"))
            .await
            .unwrap();

        (data_dir, installation)
    }

    #[test]
    fn test_paths() {
        let installation = Installation::new("/var/lib/lilibet");

        assert_eq!(
            installation.entry_point(),
            PathBuf::from("/var/lib/lilibet/zigbee2mqtt/index.js")
        );
        assert_eq!(
            installation.config_template(),
            PathBuf::from("/var/lib/lilibet/zigbee2mqtt/data/configuration.yaml")
        );
        assert_eq!(
            installation.config_file(),
            PathBuf::from("/var/lib/lilibet/configuration.yaml")
        );
        assert_eq!(installation.log_dir(), PathBuf::from("/var/lib/lilibet/log"));
    }

    #[tokio::test]
    async fn test_is_installed() {
        let data_dir = tempfile::tempdir().unwrap();
        let installation = Installation::new(data_dir.path());
        assert!(!installation.is_installed().await);

        fs::create_dir(installation.dir()).await.unwrap();
        assert!(installation.is_installed().await);

        installation.delete().await.unwrap();
        assert!(!installation.is_installed().await);
    }

    #[tokio::test]
    async fn test_local_version() {
        let (_data_dir, installation) = installed().await;

        fs::write(
            installation.dir().join("package.json"),
            r#"{ "name": "zigbee2mqtt", "version": "1.35.1", "main": "index.js" }"#,
        )
        .await
        .unwrap();

        assert_eq!(installation.local_version().await.unwrap(), "1.35.1");
    }

    #[tokio::test]
    async fn test_local_version_without_package() {
        let (_data_dir, installation) = installed().await;

        assert!(matches!(
            installation.local_version().await,
            Err(Error::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_config() {
        let (_data_dir, installation) = installed().await;

        assert!(installation.ensure_config().await.is_err());

        fs::write(installation.config_template(), "homeassistant: false\n")
            .await
            .unwrap();

        assert!(installation.ensure_config().await.unwrap());
        assert_eq!(
            fs::read_to_string(installation.config_file()).await.unwrap(),
            "homeassistant: false\n"
        );

        // an existing configuration is never overwritten
        fs::write(installation.config_file(), "permit_join: true\n")
            .await
            .unwrap();

        assert!(!installation.ensure_config().await.unwrap());
        assert_eq!(
            fs::read_to_string(installation.config_file()).await.unwrap(),
            "permit_join: true\n"
        );
    }
}

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use paho_mqtt::{
    AsyncClient, ConnectOptionsBuilder, CreateOptionsBuilder, MessageBuilder, QOS_1,
};

use crate::Result;

/// The part of the broker connection the bridge needs. Implemented for the
/// paho client; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bus: Send + Sync {
    fn subscribe(&self, topic: &str);
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

#[async_trait]
impl Bus for AsyncClient {
    fn subscribe(&self, topic: &str) {
        debug!("subscribing to {topic}");
        AsyncClient::subscribe(self, topic, QOS_1);
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let message = MessageBuilder::new()
            .topic(topic)
            .payload(payload)
            .qos(QOS_1)
            .finalize();

        AsyncClient::publish(self, message).await?;

        Ok(())
    }
}

pub async fn connect_mqtt(
    address: String,
    username: Option<String>,
    password: Option<String>,
    client_id: &str,
) -> Result<AsyncClient> {
    let create_opts = CreateOptionsBuilder::new_v3()
        .server_uri(address)
        .client_id(client_id)
        .finalize();

    let client = AsyncClient::new(create_opts).inspect_err(|err| {
        error!("Error creating the client: {}", err);
    })?;

    let mut conn_opts = ConnectOptionsBuilder::new_v3();
    conn_opts
        .keep_alive_interval(Duration::from_secs(30))
        .clean_session(true);

    if let Some(username) = username {
        conn_opts.user_name(username);
    }

    if let Some(password) = password {
        conn_opts.password(password);
    }

    client.connect(conn_opts.finalize()).await?;

    Ok(client)
}

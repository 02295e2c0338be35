mod config;
mod error;
mod supervisor;
mod web_service;

pub use config::Config;
pub use error::Error;
pub use supervisor::{
    companion_env, is_up_to_date, select_port, Installation, PortInfo, Release, Supervisor,
    SupervisorEvent, SupervisorHandle, SupervisorState,
};
pub use web_service::{router, ApiAction, ApiRequest};

pub type ErasedError = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

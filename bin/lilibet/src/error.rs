use std::fmt;

#[derive(Debug)]
pub enum Error {
    Json(serde_json::Error),
    Io(std::io::Error),
    Join(tokio::task::JoinError),
    Http(reqwest::Error),
    Serial(serialport::Error),
    MissingVar(&'static str),
    InvalidVar(&'static str, String),
    Command(String, Option<i32>),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Self::Serial(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Join(err) => write!(f, "join error: {err}"),
            Self::Http(err) => write!(f, "http error: {err}"),
            Self::Serial(err) => write!(f, "serial error: {err}"),
            Self::MissingVar(name) => write!(f, "set ENV variable {name}"),
            Self::InvalidVar(name, value) => write!(f, "invalid value {value:?} for {name}"),
            Self::Command(command, Some(code)) => write!(f, "{command} exited with code {code}"),
            Self::Command(command, None) => write!(f, "{command} was terminated"),
        }
    }
}

impl std::error::Error for Error {}

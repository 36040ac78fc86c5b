use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Provisioning Error - {0}")]
    Provisioning(String),

    #[error("Resource Unavailable - {0}")]
    ResourceUnavailable(String),

    #[error("Delivery Error - {0}")]
    Delivery(String),

    #[error("Receive Error - {0}")]
    Receive(String),

    #[error("Dispatch Error - {0}")]
    Dispatch(String),

    #[error("Precondition Error - {0}")]
    Precondition(String),

    #[error("Unknown Target - {module}.{method}")]
    UnknownTarget { module: String, method: String },

    #[error("Argument Error - {0}")]
    Argument(String),

    #[error("Codec Error - {0}")]
    Codec(String),

    #[error("Task Error - {0}")]
    Task(String),

    #[error("Config Error - {0}")]
    Config(String),
}

impl Error {
    /// Application failure raised from inside a task body.
    pub fn task(message: impl Into<String>) -> Self {
        Error::Task(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Codec(value.to_string())
    }
}

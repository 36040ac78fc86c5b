use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub(crate) enum Error {
    #[error("Config Error - {0}")]
    Config(String),

    #[error("SQS Error - {0}")]
    Sqs(String),

    #[error("Lambda Error - {0}")]
    Lambda(String),

    #[error("Lambda Runtime Error - {0}")]
    Runtime(String),
}

impl From<awsync_sqs::Error> for Error {
    fn from(value: awsync_sqs::Error) -> Self {
        match value {
            awsync_sqs::Error::InvalidConfig(e) => Error::Config(e),
            e => Error::Sqs(e.to_string()),
        }
    }
}

impl From<awsync_lambda::Error> for Error {
    fn from(value: awsync_lambda::Error) -> Self {
        match value {
            awsync_lambda::Error::InvalidConfig(e) => Error::Config(e),
            e => Error::Lambda(e.to_string()),
        }
    }
}

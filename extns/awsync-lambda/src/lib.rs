//! Fire-and-forget AWS Lambda invocation.
//!
//! Workers are started by invoking the currently running function again with
//! `InvocationType::Event`: Lambda queues the request and answers `202 Accepted` without
//! waiting for the new instance to run. What happens inside that instance is never
//! reported back to the caller.
use aws_config::{BehaviorVersion, Region, meta::region::RegionProviderChain};
use aws_sdk_lambda::Client;
use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Asynchronous invocation on top of a Lambda client.
pub mod invoker;

pub const LAMBDA_DEFAULT_REGION: &str = "us-west-2";

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("Failed with Lambda error - {}: {message}", code.as_deref().unwrap_or("Unknown"))]
    Lambda {
        code: Option<String>,
        message: String,
    },

    #[error("Invocation not accepted, status code {0}")]
    NotAccepted(i32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Flattens an SDK error into the service error code and the most specific message available.
pub fn extract_aws_error<E, R>(err: &SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(err).to_string());
    Error::Lambda {
        code: err.code().map(str::to_string),
        message,
    }
}

pub fn aws_behavior_version() -> BehaviorVersion {
    BehaviorVersion::latest()
}

#[derive(Clone, Debug, PartialEq)]
pub struct LambdaConfig {
    /// AWS region the functions are deployed in
    pub region: String,
    /// Overrides the Lambda endpoint, e.g. a localstack URL
    pub endpoint_url: Option<String>,
}

impl Default for LambdaConfig {
    fn default() -> Self {
        Self {
            region: LAMBDA_DEFAULT_REGION.to_string(),
            endpoint_url: None,
        }
    }
}

impl LambdaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(Error::InvalidConfig("region is required".to_string()));
        }
        Ok(())
    }
}

pub async fn create_lambda_client(config: &LambdaConfig) -> Result<Client> {
    config.validate()?;

    tracing::info!(region = config.region, "Creating Lambda client in region");

    let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()))
        .or_default_provider()
        .or_else(Region::new(LAMBDA_DEFAULT_REGION));

    let mut config_builder = aws_config::defaults(aws_behavior_version()).region(region_provider);

    if let Some(endpoint_url) = &config.endpoint_url {
        config_builder = config_builder.endpoint_url(endpoint_url);
    }

    let shared_config = config_builder.load().await;
    Ok(Client::new(&shared_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Lambda {
            code: Some("TooManyRequestsException".to_string()),
            message: "Rate exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed with Lambda error - TooManyRequestsException: Rate exceeded"
        );

        let err: Error = "custom error message".to_string().into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[tokio::test]
    async fn test_client_creation_validation() {
        assert!(create_lambda_client(&LambdaConfig::default()).await.is_ok());

        let config = LambdaConfig {
            region: "".to_string(),
            endpoint_url: None,
        };
        assert!(matches!(
            create_lambda_client(&config).await,
            Err(Error::InvalidConfig(_))
        ));
    }

    pub(crate) fn make_lambda_test_credentials() -> aws_sdk_lambda::config::Credentials {
        aws_sdk_lambda::config::Credentials::new(
            "ATESTCLIENT",
            "astestsecretkey",
            Some("atestsessiontoken".to_string()),
            None,
            "",
        )
    }
}

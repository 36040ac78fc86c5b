//! Thin wrapper over Amazon SQS used as the mailbox behind a rendezvous channel.
//!
//! Queues created here are short lived: one per coordinator run. The wrapper only exposes
//! the handful of operations a channel needs (create, resolve, delete, send, long-poll
//! receive, delete message, pending count) and turns AWS SDK errors into an [Error] that
//! keeps the service error code, so callers can tell a missing queue from a transport
//! failure.
use aws_config::{BehaviorVersion, Region, meta::region::RegionProviderChain};
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Mailbox operations on top of an SQS client.
pub mod mailbox;

pub const SQS_DEFAULT_REGION: &str = "us-west-2";

/// Longest long-poll SQS accepts for a single ReceiveMessage call.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Longest visibility timeout SQS accepts (12 hours).
pub const MAX_VISIBILITY_TIMEOUT: i32 = 43_200;

/// Error codes SQS returns when the queue named or addressed by a request is gone. The query
/// protocol uses the long form, the JSON protocol the modeled exception name.
const MISSING_QUEUE_CODES: [&str; 2] = [
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
];

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("Failed with SQS error - {}: {message}", code.as_deref().unwrap_or("Unknown"))]
    Sqs {
        code: Option<String>,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when SQS reported that the queue does not exist (never created or already deleted).
    pub fn is_missing_queue(&self) -> bool {
        match self {
            Error::Sqs {
                code: Some(code), ..
            } => MISSING_QUEUE_CODES.contains(&code.as_str()),
            _ => false,
        }
    }
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
    Error::Sqs {
        code: err.code().map(str::to_string),
        message,
    }
}

pub fn aws_behavior_version() -> BehaviorVersion {
    BehaviorVersion::latest()
}

/// Configuration for the SQS backed mailbox.
#[derive(Clone, Debug, PartialEq)]
pub struct SqsConfig {
    /// AWS region where the queues are created
    pub region: String,
    /// Overrides the SQS endpoint, e.g. a localstack URL
    pub endpoint_url: Option<String>,
    /// How long a single receive call long-polls before returning empty
    pub wait_time_seconds: i32,
    /// Visibility timeout applied to received messages, queue default when unset
    pub visibility_timeout: Option<i32>,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            region: SQS_DEFAULT_REGION.to_string(),
            endpoint_url: None,
            wait_time_seconds: MAX_WAIT_TIME_SECONDS,
            visibility_timeout: None,
        }
    }
}

impl SqsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(Error::InvalidConfig("region is required".to_string()));
        }

        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(Error::InvalidConfig(format!(
                "wait_time_seconds must be between 0 and {MAX_WAIT_TIME_SECONDS}, got {}",
                self.wait_time_seconds
            )));
        }

        if let Some(timeout) = self.visibility_timeout {
            if !(0..=MAX_VISIBILITY_TIMEOUT).contains(&timeout) {
                return Err(Error::InvalidConfig(format!(
                    "visibility_timeout must be between 0 and {MAX_VISIBILITY_TIMEOUT}, got {timeout}"
                )));
            }
        }

        Ok(())
    }
}

/// Creates an SQS client for the configured region, falling back to the default provider chain.
pub async fn create_sqs_client(config: &SqsConfig) -> Result<Client> {
    config.validate()?;

    tracing::info!(region = config.region, "Creating SQS client in region");

    let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()))
        .or_default_provider()
        .or_else(Region::new(SQS_DEFAULT_REGION));

    let mut config_builder = aws_config::defaults(aws_behavior_version()).region(region_provider);

    if let Some(endpoint_url) = &config.endpoint_url {
        config_builder = config_builder.endpoint_url(endpoint_url);
    }

    let shared_config = config_builder.load().await;
    Ok(Client::new(&shared_config))
}

#[cfg(test)]
mod tests {
    use aws_smithy_mocks::{MockResponseInterceptor, RuleMode, create_mock_http_client, mock};
    use aws_smithy_types::error::ErrorMetadata;

    use super::*;

    #[tokio::test]
    async fn test_sqs_error_conversion() {
        let modeled_error = mock!(aws_sdk_sqs::Client::get_queue_url).then_error(|| {
            aws_sdk_sqs::operation::get_queue_url::GetQueueUrlError::generic(
                ErrorMetadata::builder()
                    .code("AWS.SimpleQueueService.NonExistentQueue")
                    .message("The specified queue does not exist.")
                    .build(),
            )
        });

        let interceptor = MockResponseInterceptor::new()
            .rule_mode(RuleMode::MatchAny)
            .with_rule(&modeled_error);

        let sqs = aws_sdk_sqs::Client::from_conf(
            aws_sdk_sqs::Config::builder()
                .behavior_version(aws_behavior_version())
                .region(aws_sdk_sqs::config::Region::new(SQS_DEFAULT_REGION))
                .credentials_provider(make_sqs_test_credentials())
                .interceptor(interceptor)
                .http_client(create_mock_http_client())
                .build(),
        );
        let err = sqs
            .get_queue_url()
            .queue_name("gone")
            .send()
            .await
            .unwrap_err();

        let converted = extract_aws_error(&err);
        assert!(converted.is_missing_queue());
        assert!(converted.to_string().contains("Failed with SQS error"));
        assert!(
            converted
                .to_string()
                .contains("The specified queue does not exist.")
        );
    }

    #[test]
    fn test_string_error_conversion() {
        let err: Error = "custom error message".to_string().into();
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(err.to_string(), "custom error message");
        assert!(!err.is_missing_queue());
    }

    #[test]
    fn test_missing_queue_codes() {
        let json_protocol = Error::Sqs {
            code: Some("QueueDoesNotExist".to_string()),
            message: "gone".to_string(),
        };
        assert!(json_protocol.is_missing_queue());

        let throttled = Error::Sqs {
            code: Some("RequestThrottled".to_string()),
            message: "slow down".to_string(),
        };
        assert!(!throttled.is_missing_queue());

        let no_code = Error::Sqs {
            code: None,
            message: "dispatch failure".to_string(),
        };
        assert!(!no_code.is_missing_queue());
        assert_eq!(
            no_code.to_string(),
            "Failed with SQS error - Unknown: dispatch failure"
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(SqsConfig::default().validate().is_ok());

        let empty_region = SqsConfig {
            region: "".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            empty_region.validate(),
            Err(Error::InvalidConfig(_))
        ));

        let long_poll = SqsConfig {
            wait_time_seconds: 30,
            ..Default::default()
        };
        assert!(matches!(long_poll.validate(), Err(Error::InvalidConfig(_))));

        let visibility = SqsConfig {
            visibility_timeout: Some(50_000),
            ..Default::default()
        };
        assert!(matches!(visibility.validate(), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_client_creation_with_custom_endpoint() {
        let config = SqsConfig {
            endpoint_url: Some("http://localhost:4566".to_string()),
            ..Default::default()
        };
        assert!(create_sqs_client(&config).await.is_ok());

        let invalid = SqsConfig {
            wait_time_seconds: -1,
            ..Default::default()
        };
        assert!(matches!(
            create_sqs_client(&invalid).await,
            Err(Error::InvalidConfig(_))
        ));
    }

    pub(crate) fn make_sqs_test_credentials() -> aws_sdk_sqs::config::Credentials {
        aws_sdk_sqs::config::Credentials::new(
            "ATESTCLIENT",
            "astestsecretkey",
            Some("atestsessiontoken".to_string()),
            None,
            "",
        )
    }
}

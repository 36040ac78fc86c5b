use std::collections::HashMap;

use awsync_lambda::LambdaConfig;
use awsync_sqs::{MAX_WAIT_TIME_SECONDS, SQS_DEFAULT_REGION, SqsConfig};

use crate::error::{Error, Result};

const ENV_AWS_REGION: &str = "AWS_REGION";
const ENV_SQS_ENDPOINT_URL: &str = "AWSYNC_SQS_ENDPOINT_URL";
const ENV_LAMBDA_ENDPOINT_URL: &str = "AWSYNC_LAMBDA_ENDPOINT_URL";
const ENV_RECEIVE_WAIT_SECONDS: &str = "AWSYNC_RECEIVE_WAIT_SECONDS";
const ENV_VISIBILITY_TIMEOUT: &str = "AWSYNC_VISIBILITY_TIMEOUT";
const ENV_FANOUT: &str = "AWSYNC_FANOUT";

const DEFAULT_FANOUT: usize = 5;

/// Settings of the deployed function, read from its environment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub(crate) region: String,
    pub(crate) sqs_endpoint_url: Option<String>,
    pub(crate) lambda_endpoint_url: Option<String>,
    pub(crate) receive_wait_seconds: i32,
    pub(crate) visibility_timeout: Option<i32>,
    /// Number of workers the demo coordinator fans out to.
    pub(crate) fanout: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: SQS_DEFAULT_REGION.to_string(),
            sqs_endpoint_url: None,
            lambda_endpoint_url: None,
            receive_wait_seconds: MAX_WAIT_TIME_SECONDS,
            visibility_timeout: None,
            fanout: DEFAULT_FANOUT,
        }
    }
}

impl Settings {
    pub(crate) fn load(
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let env_vars: HashMap<String, String> = env_vars
            .into_iter()
            .map(|(key, val)| (key.into(), val.into()))
            .filter(|(key, _val)| {
                [
                    ENV_AWS_REGION,
                    ENV_SQS_ENDPOINT_URL,
                    ENV_LAMBDA_ENDPOINT_URL,
                    ENV_RECEIVE_WAIT_SECONDS,
                    ENV_VISIBILITY_TIMEOUT,
                    ENV_FANOUT,
                ]
                .contains(&key.as_str())
            })
            .collect();

        let defaults = Self::default();
        let get_var = |var: &str| env_vars.get(var).filter(|v| !v.is_empty()).cloned();

        let settings = Self {
            region: get_var(ENV_AWS_REGION).unwrap_or(defaults.region),
            sqs_endpoint_url: get_var(ENV_SQS_ENDPOINT_URL),
            lambda_endpoint_url: get_var(ENV_LAMBDA_ENDPOINT_URL),
            receive_wait_seconds: parse_var(ENV_RECEIVE_WAIT_SECONDS, get_var)?
                .unwrap_or(defaults.receive_wait_seconds),
            visibility_timeout: parse_var(ENV_VISIBILITY_TIMEOUT, get_var)?,
            fanout: parse_var(ENV_FANOUT, get_var)?.unwrap_or(defaults.fanout),
        };

        if settings.fanout == 0 {
            return Err(Error::Config(format!("{ENV_FANOUT} must be at least 1")));
        }
        settings
            .sqs_config()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        settings
            .lambda_config()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(settings)
    }

    pub(crate) fn sqs_config(&self) -> SqsConfig {
        SqsConfig {
            region: self.region.clone(),
            endpoint_url: self.sqs_endpoint_url.clone(),
            wait_time_seconds: self.receive_wait_seconds,
            visibility_timeout: self.visibility_timeout,
        }
    }

    pub(crate) fn lambda_config(&self) -> LambdaConfig {
        LambdaConfig {
            region: self.region.clone(),
            endpoint_url: self.lambda_endpoint_url.clone(),
        }
    }
}

fn parse_var<T>(var: &str, get_var: impl Fn(&str) -> Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_var(var)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid {var} {value:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let settings = Settings::load(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.sqs_config(), SqsConfig::default());
        assert_eq!(settings.lambda_config(), LambdaConfig::default());
    }

    #[test]
    fn test_load_from_env() {
        let env_vars = [
            ("AWS_REGION", "eu-central-1"),
            ("AWSYNC_SQS_ENDPOINT_URL", "http://localhost:4566"),
            ("AWSYNC_RECEIVE_WAIT_SECONDS", "5"),
            ("AWSYNC_VISIBILITY_TIMEOUT", "60"),
            ("AWSYNC_FANOUT", "12"),
            ("UNRELATED", "ignored"),
        ];
        let settings = Settings::load(env_vars).unwrap();

        assert_eq!(settings.region, "eu-central-1");
        assert_eq!(settings.fanout, 12);
        assert_eq!(settings.lambda_endpoint_url, None);

        let sqs = settings.sqs_config();
        assert_eq!(sqs.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(sqs.wait_time_seconds, 5);
        assert_eq!(sqs.visibility_timeout, Some(60));
        assert_eq!(settings.lambda_config().region, "eu-central-1");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let cases = [
            ("AWSYNC_RECEIVE_WAIT_SECONDS", "21"),
            ("AWSYNC_RECEIVE_WAIT_SECONDS", "soon"),
            ("AWSYNC_VISIBILITY_TIMEOUT", "-1"),
            ("AWSYNC_VISIBILITY_TIMEOUT", "43201"),
            ("AWSYNC_FANOUT", "0"),
            ("AWSYNC_FANOUT", "-3"),
        ];
        for (key, value) in cases {
            let result = Settings::load([(key, value)]);
            assert!(
                matches!(result, Err(Error::Config(_))),
                "{key}={value} was accepted"
            );
        }
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let settings = Settings::load([("AWS_REGION", ""), ("AWSYNC_FANOUT", "")]).unwrap();
        assert_eq!(settings.region, SQS_DEFAULT_REGION);
        assert_eq!(settings.fanout, DEFAULT_FANOUT);
    }
}

use aws_sdk_lambda::Client;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use bytes::Bytes;

use crate::{Error, LambdaConfig, Result, extract_aws_error};

/// Status Lambda answers with once an `Event` invocation has been queued.
const ACCEPTED: i32 = 202;

/// Issues asynchronous (`Event`) invocations. Cheap to clone, the SDK client is shared.
#[derive(Clone, Debug)]
pub struct LambdaInvoker {
    client: Client,
}

impl LambdaInvoker {
    pub async fn new(config: &LambdaConfig) -> Result<Self> {
        Ok(Self {
            client: crate::create_lambda_client(config).await?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Queues an invocation of `function_name` with `payload` as the event. Returns as soon as
    /// Lambda accepted the request.
    pub async fn invoke_event(&self, function_name: &str, payload: Bytes) -> Result<()> {
        let size = payload.len();
        let output = self
            .client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload.to_vec()))
            .send()
            .await
            .map_err(|err| {
                tracing::error!(?err, function_name, "Failed to invoke function");
                extract_aws_error(&err)
            })?;

        if output.status_code != ACCEPTED {
            return Err(Error::NotAccepted(output.status_code));
        }

        tracing::debug!(function_name, payload_bytes = size, "Invocation accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_lambda::Config;
    use aws_sdk_lambda::operation::invoke::{InvokeError, InvokeOutput};
    use aws_smithy_mocks::{MockResponseInterceptor, Rule, RuleMode, create_mock_http_client, mock};
    use aws_smithy_types::error::ErrorMetadata;
    use test_log::test;

    use super::*;
    use crate::tests::make_lambda_test_credentials;
    use crate::{LAMBDA_DEFAULT_REGION, aws_behavior_version};

    #[test(tokio::test)]
    async fn test_invoke_event() {
        let invoke = mock!(aws_sdk_lambda::Client::invoke)
            .match_requests(|inp| {
                inp.function_name() == Some("awsync")
                    && inp.invocation_type() == Some(&InvocationType::Event)
                    && inp.payload().map(|p| p.as_ref()) == Some(b"{\"method\":\"square\"}".as_slice())
            })
            .then_output(|| InvokeOutput::builder().status_code(202).build());

        let invoker = mock_invoker(&invoke);
        let result = invoker
            .invoke_event("awsync", Bytes::from_static(b"{\"method\":\"square\"}"))
            .await;
        assert!(result.is_ok());
    }

    #[test(tokio::test)]
    async fn test_invoke_event_not_accepted() {
        let invoke = mock!(aws_sdk_lambda::Client::invoke)
            .then_output(|| InvokeOutput::builder().status_code(200).build());

        let invoker = mock_invoker(&invoke);
        let result = invoker.invoke_event("awsync", Bytes::from_static(b"{}")).await;
        assert!(matches!(result, Err(Error::NotAccepted(200))));
    }

    #[test(tokio::test)]
    async fn test_invoke_event_rejected() {
        let invoke = mock!(aws_sdk_lambda::Client::invoke).then_error(|| {
            InvokeError::generic(
                ErrorMetadata::builder()
                    .code("ResourceNotFoundException")
                    .message("Function not found: arn:aws:lambda:us-west-2:123456789012:function:missing")
                    .build(),
            )
        });

        let invoker = mock_invoker(&invoke);
        let err = invoker
            .invoke_event("missing", Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            Error::Lambda { code: Some(code), .. } if code == "ResourceNotFoundException"
        ));
        assert!(err.to_string().contains("Function not found"));
    }

    fn mock_invoker(rule: &Rule) -> LambdaInvoker {
        let interceptor = MockResponseInterceptor::new()
            .rule_mode(RuleMode::MatchAny)
            .with_rule(rule);
        LambdaInvoker::from_client(Client::from_conf(get_test_config_with_interceptor(
            interceptor,
        )))
    }

    fn get_test_config_with_interceptor(interceptor: MockResponseInterceptor) -> Config {
        aws_sdk_lambda::Config::builder()
            .behavior_version(aws_behavior_version())
            .credentials_provider(make_lambda_test_credentials())
            .region(aws_sdk_lambda::config::Region::new(LAMBDA_DEFAULT_REGION))
            .interceptor(interceptor)
            .http_client(create_mock_http_client())
            .build()
    }
}

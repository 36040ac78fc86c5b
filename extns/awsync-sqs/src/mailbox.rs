use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::QueueAttributeName;

use crate::{Error, Result, SqsConfig, extract_aws_error};

/// A message received from a queue. The receipt handle is what deletes it.
#[derive(Debug, Clone, PartialEq)]
pub struct SqsMessage {
    pub message_id: String,
    pub body: String,
    pub receipt_handle: String,
}

/// SQS client scoped to the mailbox operations. Cheap to clone, the SDK client is shared.
#[derive(Clone, Debug)]
pub struct SqsMailbox {
    client: Client,
    config: SqsConfig,
}

/// Builder for creating and configuring an [SqsMailbox].
#[derive(Clone, Default)]
pub struct SqsMailboxBuilder {
    config: SqsConfig,
    client: Option<Client>,
}

impl SqsMailboxBuilder {
    pub fn new(config: SqsConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    pub fn config(mut self, config: SqsConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an already configured client instead of loading one from the environment.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub async fn build(self) -> Result<SqsMailbox> {
        self.config.validate()?;
        let client = match self.client {
            Some(client) => client,
            None => crate::create_sqs_client(&self.config).await?,
        };
        Ok(SqsMailbox {
            client,
            config: self.config,
        })
    }
}

impl SqsMailbox {
    pub fn config(&self) -> &SqsConfig {
        &self.config
    }

    /// Creates a standard queue and returns the URL SQS reports for it, if any.
    pub async fn create_queue(&self, queue_name: &str) -> Result<Option<String>> {
        let output = self
            .client
            .create_queue()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(?err, queue_name, "Failed to create queue");
                extract_aws_error(&err)
            })?;

        tracing::info!(queue_name, queue_url = ?output.queue_url, "Created queue");
        Ok(output.queue_url)
    }

    pub async fn get_queue_url(&self, queue_name: &str) -> Result<String> {
        tracing::debug!(queue_name, "Getting queue URL");
        let output = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|err| extract_aws_error(&err))?;

        output
            .queue_url
            .ok_or_else(|| Error::Other(format!("Queue URL not found for {queue_name}")))
    }

    pub async fn delete_queue(&self, queue_url: &str) -> Result<()> {
        self.client
            .delete_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(?err, queue_url, "Failed to delete queue");
                extract_aws_error(&err)
            })?;

        tracing::info!(queue_url, "Deleted queue");
        Ok(())
    }

    /// Enqueues a single message body and returns the message id assigned by SQS.
    pub async fn send_message(&self, queue_url: &str, body: String) -> Result<String> {
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(?err, queue_url, "Failed to send message to SQS");
                extract_aws_error(&err)
            })?;

        Ok(output.message_id.unwrap_or_default())
    }

    /// Long-polls the queue for up to `wait_time_seconds`. An empty result is not an error.
    pub async fn receive_messages(&self, queue_url: &str, count: i32) -> Result<Vec<SqsMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(count)
            .wait_time_seconds(self.config.wait_time_seconds)
            .set_visibility_timeout(self.config.visibility_timeout)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(?err, queue_url, "Failed to receive messages from SQS");
                extract_aws_error(&err)
            })?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|msg| SqsMessage {
                message_id: msg.message_id.unwrap_or_default(),
                body: msg.body.unwrap_or_default(),
                receipt_handle: msg.receipt_handle.unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        tracing::debug!(queue_url, count = messages.len(), "Received messages");
        Ok(messages)
    }

    pub async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(?err, queue_url, "Error while deleting message from SQS");
                extract_aws_error(&err)
            })?;
        Ok(())
    }

    /// Approximate number of visible messages, `None` if SQS did not report the attribute.
    pub async fn pending_count(&self, queue_url: &str) -> Result<Option<usize>> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(?err, queue_url, "Failed to get queue attributes from SQS");
                extract_aws_error(&err)
            })?;

        let Some(value) = output
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
        else {
            return Ok(None);
        };

        value.parse::<usize>().map(Some).map_err(|err| {
            Error::Other(format!(
                "Failed to parse ApproximateNumberOfMessages {value:?}: {err}"
            ))
        })
    }
}

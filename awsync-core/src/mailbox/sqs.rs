use awsync_sqs::mailbox::SqsMailbox;

use crate::Error;
use crate::mailbox::{MailboxService, ReceivedMessage};

/// A channel pops one message at a time, anything more would sit invisible until the
/// visibility timeout.
const RECEIVE_BATCH_SIZE: i32 = 1;

/// Maps an SQS failure to the channel error taxonomy. A missing queue is always
/// `ResourceUnavailable`, anything else gets the operation specific variant.
fn map_sqs_error(err: awsync_sqs::Error, otherwise: fn(String) -> Error) -> Error {
    match err {
        err if err.is_missing_queue() => Error::ResourceUnavailable(err.to_string()),
        awsync_sqs::Error::InvalidConfig(e) => Error::Config(e),
        err => otherwise(err.to_string()),
    }
}

impl MailboxService for SqsMailbox {
    async fn create_mailbox(&self, name: &str) -> crate::Result<Option<String>> {
        self.create_queue(name)
            .await
            .map_err(|e| map_sqs_error(e, Error::Provisioning))
    }

    async fn resolve_address(&self, name: &str) -> crate::Result<String> {
        self.get_queue_url(name)
            .await
            .map_err(|e| map_sqs_error(e, Error::Provisioning))
    }

    async fn delete_mailbox(&self, address: &str) -> crate::Result<()> {
        self.delete_queue(address)
            .await
            .map_err(|e| map_sqs_error(e, Error::Provisioning))
    }

    async fn send(&self, address: &str, body: String) -> crate::Result<()> {
        self.send_message(address, body)
            .await
            .map(|_| ())
            .map_err(|e| map_sqs_error(e, Error::Delivery))
    }

    async fn receive(&self, address: &str) -> crate::Result<Vec<ReceivedMessage>> {
        let messages = self
            .receive_messages(address, RECEIVE_BATCH_SIZE)
            .await
            .map_err(|e| map_sqs_error(e, Error::Receive))?;

        Ok(messages
            .into_iter()
            .map(|msg| ReceivedMessage {
                body: msg.body,
                receipt: msg.receipt_handle,
            })
            .collect())
    }

    async fn acknowledge(&self, address: &str, receipt: &str) -> crate::Result<()> {
        self.delete_message(address, receipt)
            .await
            .map_err(|e| map_sqs_error(e, Error::Receive))
    }

    async fn pending(&self, address: &str) -> crate::Result<Option<usize>> {
        self.pending_count(address)
            .await
            .map_err(|e| map_sqs_error(e, Error::Receive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_queue_is_unavailable() {
        let err = awsync_sqs::Error::Sqs {
            code: Some("AWS.SimpleQueueService.NonExistentQueue".to_string()),
            message: "The specified queue does not exist.".to_string(),
        };
        assert!(matches!(
            map_sqs_error(err, Error::Delivery),
            Error::ResourceUnavailable(_)
        ));
    }

    #[test]
    fn test_other_errors_keep_operation_variant() {
        let err = awsync_sqs::Error::Sqs {
            code: Some("RequestThrottled".to_string()),
            message: "Rate exceeded".to_string(),
        };
        let mapped = map_sqs_error(err, Error::Delivery);
        assert!(matches!(&mapped, Error::Delivery(msg) if msg.contains("RequestThrottled")));

        let err = awsync_sqs::Error::Other("Queue URL not found for q".to_string());
        assert!(matches!(
            map_sqs_error(err, Error::Provisioning),
            Error::Provisioning(_)
        ));

        let err = awsync_sqs::Error::InvalidConfig("region is required".to_string());
        assert!(matches!(map_sqs_error(err, Error::Receive), Error::Config(_)));
    }
}

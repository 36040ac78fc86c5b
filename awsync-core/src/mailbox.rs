//! The backing message service a channel is built on. A mailbox is created under a name,
//! addressed by the opaque locator the service resolves for that name, and deleted through
//! the same locator.

use crate::Result;

/// In-memory mailboxes for tests and local runs.
pub mod memory;

/// [awsync_sqs::mailbox::SqsMailbox] as a [MailboxService].
pub mod sqs;

/// A message handed out by [MailboxService::receive]. It stays owned by the service until it
/// is acknowledged with its receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt: String,
}

/// Operations a channel needs from the message service. Implementations are shared between
/// the coordinator and every handle it gives out, so they must be cheap to clone.
#[trait_variant::make(Send)]
pub trait MailboxService: Clone + Send + Sync + 'static {
    /// Provisions a mailbox. Fails with `Provisioning` if the service refuses. Returns the
    /// mailbox address when the service reports it on creation, so no separate
    /// [MailboxService::resolve_address] round trip is needed.
    async fn create_mailbox(&self, name: &str) -> Result<Option<String>>;

    /// Address of the mailbox created under `name`.
    async fn resolve_address(&self, name: &str) -> Result<String>;

    /// Deprovisions the mailbox. Fails with `ResourceUnavailable` if it does not exist.
    async fn delete_mailbox(&self, address: &str) -> Result<()>;

    async fn send(&self, address: &str, body: String) -> Result<()>;

    /// Long-polls for messages. Returning none is normal and means the poll window elapsed.
    async fn receive(&self, address: &str) -> Result<Vec<ReceivedMessage>>;

    /// Removes a received message for good.
    async fn acknowledge(&self, address: &str, receipt: &str) -> Result<()>;

    /// Approximate number of messages waiting to be received, if the service reports it.
    async fn pending(&self, address: &str) -> Result<Option<usize>>;
}

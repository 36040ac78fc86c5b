//! A [RendezvousChannel] is a temporary mailbox that a coordinator opens, hands to the workers
//! it dispatches, and pops their results from. The coordinator owns it and is the only one
//! that can close it; workers get a [ChannelHandle] rebuilt from the channel's
//! [ChannelProjection] and can only push and pop.
//!
//! Popping has no upper bound on how long it waits. A worker that fails never pushes, and a
//! coordinator popping for its result waits until its own instance is terminated. Use
//! [Channel::pop_timeout] where giving up is preferable.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::mailbox::MailboxService;
use crate::{Error, Result};

/// Wire form of a channel, `{"id": ..., "url": ...}`. Only `url` is needed to rebuild a
/// handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProjection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
}

/// Push and pop, implemented by the live channel and by handles alike so tasks can take either.
#[trait_variant::make(Send)]
pub trait Channel: Sync {
    /// Address of the backing mailbox.
    fn address(&self) -> &str;

    /// Encodes `message` as JSON and enqueues it.
    async fn push<T: Serialize + Sync + ?Sized>(&self, message: &T) -> Result<()>;

    /// Waits for the next message and decodes it. Never gives up while the mailbox exists.
    async fn pop<T: DeserializeOwned + Send>(&self) -> Result<T>;

    /// Like [Channel::pop] but returns `None` once `timeout` elapsed without a message.
    async fn pop_timeout<T: DeserializeOwned + Send>(&self, timeout: Duration)
    -> Result<Option<T>>;

    /// Approximate number of messages waiting in the mailbox.
    async fn pending(&self) -> Result<Option<usize>>;
}

/// Pops exactly `count` messages, in whatever order the mailbox returns them.
pub async fn gather<C, T>(channel: &C, count: usize) -> Result<Vec<T>>
where
    C: Channel,
    T: DeserializeOwned + Send,
{
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        results.push(channel.pop().await?);
    }
    Ok(results)
}

/// Push/pop access to a mailbox the caller does not own.
#[derive(Clone, Debug)]
pub struct ChannelHandle<M> {
    id: Option<String>,
    url: String,
    mailbox: M,
}

impl<M: MailboxService> ChannelHandle<M> {
    pub fn new(projection: ChannelProjection, mailbox: M) -> Self {
        Self {
            id: projection.id,
            url: projection.url,
            mailbox,
        }
    }

    pub fn projection(&self) -> ChannelProjection {
        ChannelProjection {
            id: self.id.clone(),
            url: self.url.clone(),
        }
    }

    async fn pop_until<T>(&self, deadline: Option<Instant>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(None);
            }

            let receive = self.mailbox.receive(&self.url);
            let messages = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, receive).await {
                    Ok(messages) => messages?,
                    Err(_) => return Ok(None),
                },
                None => receive.await?,
            };

            let Some(message) = messages.into_iter().next() else {
                debug!(url = self.url, "No message yet, polling again");
                continue;
            };

            let value = serde_json::from_str(&message.body)?;
            self.mailbox.acknowledge(&self.url, &message.receipt).await?;
            return Ok(Some(value));
        }
    }
}

impl<M: MailboxService> Channel for ChannelHandle<M> {
    fn address(&self) -> &str {
        &self.url
    }

    async fn push<T: Serialize + Sync + ?Sized>(&self, message: &T) -> Result<()> {
        let body = serde_json::to_string(message)?;
        self.mailbox.send(&self.url, body).await
    }

    async fn pop<T: DeserializeOwned + Send>(&self) -> Result<T> {
        loop {
            if let Some(value) = self.pop_until(None).await? {
                return Ok(value);
            }
        }
    }

    async fn pop_timeout<T: DeserializeOwned + Send>(
        &self,
        timeout: Duration,
    ) -> Result<Option<T>> {
        self.pop_until(Some(Instant::now() + timeout)).await
    }

    async fn pending(&self) -> Result<Option<usize>> {
        self.mailbox.pending(&self.url).await
    }
}

impl<M> Serialize for ChannelHandle<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ChannelProjection {
            id: self.id.clone(),
            url: self.url.clone(),
        }
        .serialize(serializer)
    }
}

/// A mailbox owned by the coordinator that opened it. Close it exactly once, preferably
/// through [RendezvousChannel::scoped] so it is closed on every exit path.
#[derive(Debug)]
pub struct RendezvousChannel<M: MailboxService> {
    handle: ChannelHandle<M>,
    closed: bool,
}

impl<M: MailboxService> RendezvousChannel<M> {
    /// Provisions a mailbox under a fresh random name. The address comes from the creation
    /// response, or from a separate lookup when the service does not report it there.
    pub async fn open(mailbox: M) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        let url = match mailbox.create_mailbox(&id).await? {
            Some(url) => url,
            None => mailbox.resolve_address(&id).await.inspect_err(|e| {
                error!(?e, id, "Mailbox created but its address is unknown, it is leaked");
            })?,
        };
        info!(id, url, "Opened channel");

        Ok(Self {
            handle: ChannelHandle {
                id: Some(id),
                url,
                mailbox,
            },
            closed: false,
        })
    }

    /// Opens a channel, runs `body` with a handle to it and closes the channel afterwards,
    /// also when `body` fails or panics. A panic is resumed once the channel is closed.
    pub async fn scoped<F, Fut, T>(mailbox: M, body: F) -> Result<T>
    where
        F: FnOnce(ChannelHandle<M>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let channel = Self::open(mailbox).await?;
        let outcome = AssertUnwindSafe(body(channel.handle()))
            .catch_unwind()
            .await;
        let closed = channel.close().await;

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                if let Err(e) = closed {
                    warn!(?e, "Failed to close channel after the scope panicked");
                }
                std::panic::resume_unwind(panic);
            }
        };

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(?close_err, "Failed to close channel after the scope failed");
                Err(e)
            }
        }
    }

    pub fn id(&self) -> &str {
        self.handle.id.as_deref().unwrap_or_default()
    }

    pub fn projection(&self) -> ChannelProjection {
        self.handle.projection()
    }

    /// A push/pop handle sharing this channel's mailbox.
    pub fn handle(&self) -> ChannelHandle<M> {
        self.handle.clone()
    }

    /// Deprovisions the mailbox. Handles given out earlier fail with `ResourceUnavailable`
    /// from now on.
    pub async fn close(mut self) -> Result<()> {
        self.deprovision().await
    }

    async fn deprovision(&mut self) -> Result<()> {
        let deleted = self.handle.mailbox.delete_mailbox(&self.handle.url).await;
        // a mailbox that is already gone is not leaked
        self.closed = matches!(deleted, Ok(()) | Err(Error::ResourceUnavailable(_)));
        deleted?;
        info!(url = self.handle.url, "Closed channel");
        Ok(())
    }
}

impl<M: MailboxService> Channel for RendezvousChannel<M> {
    fn address(&self) -> &str {
        self.handle.address()
    }

    async fn push<T: Serialize + Sync + ?Sized>(&self, message: &T) -> Result<()> {
        self.handle.push(message).await
    }

    async fn pop<T: DeserializeOwned + Send>(&self) -> Result<T> {
        self.handle.pop().await
    }

    async fn pop_timeout<T: DeserializeOwned + Send>(
        &self,
        timeout: Duration,
    ) -> Result<Option<T>> {
        self.handle.pop_timeout(timeout).await
    }

    async fn pending(&self) -> Result<Option<usize>> {
        self.handle.pending().await
    }
}

impl<M: MailboxService> Serialize for RendezvousChannel<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.handle.serialize(serializer)
    }
}

impl<M: MailboxService> Drop for RendezvousChannel<M> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                url = self.handle.url,
                "Channel dropped without being closed, its mailbox is leaked"
            );
        }
    }
}

//! In-memory implementation of [MailboxService] for tests and local runs. Every clone shares
//! the same set of mailboxes, so a coordinator and the workers of a
//! [LocalRuntime](crate::dispatch::local::LocalRuntime) see the same queues.
//!
//! Delivery follows SQS: a received message stays invisible until it is acknowledged or its
//! visibility timeout runs out, after which the next receive hands it out again under a new
//! receipt.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::mailbox::{MailboxService, ReceivedMessage};
use crate::{Error, Result};

const ADDRESS_SCHEME: &str = "memory://";

/// Same as the SQS queue default.
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct InMemoryMailboxService {
    inner: Arc<Mutex<Mailboxes>>,
    /// how long a single receive waits for a message before returning empty
    wait_time: Duration,
    /// how long a received message stays invisible without being acknowledged
    visibility_timeout: Duration,
}

#[derive(Default, Debug)]
struct Mailboxes {
    /// name -> address
    names: HashMap<String, String>,
    /// address -> mailbox
    queues: HashMap<String, Mailbox>,
}

#[derive(Default, Debug)]
struct Mailbox {
    visible: VecDeque<String>,
    /// receipt -> messages handed out but not yet acknowledged
    in_flight: HashMap<String, InFlight>,
    arrived: Arc<Notify>,
}

#[derive(Debug)]
struct InFlight {
    body: String,
    visible_at: Instant,
}

impl Mailbox {
    /// Makes messages whose visibility timeout ran out receivable again, oldest first.
    fn requeue_expired(&mut self, now: Instant) {
        let mut expired: Vec<(Instant, String)> = self
            .in_flight
            .iter()
            .filter(|(_, msg)| msg.visible_at <= now)
            .map(|(receipt, msg)| (msg.visible_at, receipt.clone()))
            .collect();
        expired.sort();
        for (_, receipt) in expired.into_iter().rev() {
            if let Some(msg) = self.in_flight.remove(&receipt) {
                self.visible.push_front(msg.body);
            }
        }
    }
}

impl Default for InMemoryMailboxService {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl InMemoryMailboxService {
    pub fn new(wait_time: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Mailboxes::default())),
            wait_time,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    pub fn with_visibility_timeout(mut self, visibility_timeout: Duration) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    /// Number of mailboxes currently provisioned.
    pub fn mailbox_count(&self) -> usize {
        self.inner.lock().queues.len()
    }

    fn unavailable(address: &str) -> Error {
        Error::ResourceUnavailable(format!("mailbox {address} does not exist"))
    }
}

impl MailboxService for InMemoryMailboxService {
    async fn create_mailbox(&self, name: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock();
        if inner.names.contains_key(name) {
            return Err(Error::Provisioning(format!("mailbox {name} already exists")));
        }
        let address = format!("{ADDRESS_SCHEME}{name}");
        inner.names.insert(name.to_string(), address.clone());
        inner.queues.insert(address.clone(), Mailbox::default());
        Ok(Some(address))
    }

    async fn resolve_address(&self, name: &str) -> Result<String> {
        self.inner
            .lock()
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ResourceUnavailable(format!("no mailbox named {name}")))
    }

    async fn delete_mailbox(&self, address: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let mailbox = inner
            .queues
            .remove(address)
            .ok_or_else(|| Self::unavailable(address))?;
        inner.names.retain(|_, addr| addr != address);
        // receivers parked on this mailbox re-check and find it gone
        mailbox.arrived.notify_waiters();
        mailbox.arrived.notify_one();
        Ok(())
    }

    async fn send(&self, address: &str, body: String) -> Result<()> {
        let mut inner = self.inner.lock();
        let mailbox = inner
            .queues
            .get_mut(address)
            .ok_or_else(|| Self::unavailable(address))?;
        mailbox.visible.push_back(body);
        mailbox.arrived.notify_one();
        Ok(())
    }

    async fn receive(&self, address: &str) -> Result<Vec<ReceivedMessage>> {
        let deadline = Instant::now() + self.wait_time;
        loop {
            let arrived = {
                let mut inner = self.inner.lock();
                let mailbox = inner
                    .queues
                    .get_mut(address)
                    .ok_or_else(|| Self::unavailable(address))?;

                let now = Instant::now();
                mailbox.requeue_expired(now);
                if let Some(body) = mailbox.visible.pop_front() {
                    let receipt = Uuid::new_v4().to_string();
                    mailbox.in_flight.insert(
                        receipt.clone(),
                        InFlight {
                            body: body.clone(),
                            visible_at: now + self.visibility_timeout,
                        },
                    );
                    return Ok(vec![ReceivedMessage { body, receipt }]);
                }
                Arc::clone(&mailbox.arrived)
            };

            if tokio::time::timeout_at(deadline, arrived.notified())
                .await
                .is_err()
            {
                return Ok(Vec::new());
            }
        }
    }

    async fn acknowledge(&self, address: &str, receipt: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let mailbox = inner
            .queues
            .get_mut(address)
            .ok_or_else(|| Self::unavailable(address))?;
        mailbox
            .in_flight
            .remove(receipt)
            .map(|_| ())
            .ok_or_else(|| Error::Receive(format!("unknown receipt {receipt} for {address}")))
    }

    async fn pending(&self, address: &str) -> Result<Option<usize>> {
        let mut inner = self.inner.lock();
        let mailbox = inner
            .queues
            .get_mut(address)
            .ok_or_else(|| Self::unavailable(address))?;
        mailbox.requeue_expired(Instant::now());
        Ok(Some(mailbox.visible.len()))
    }
}

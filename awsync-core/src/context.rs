use serde::{Deserialize, Serialize};

use crate::Result;
use crate::channel::{ChannelHandle, ChannelProjection, RendezvousChannel};
use crate::dispatch::{Invoker, TaskDispatcher};
use crate::mailbox::MailboxService;
use crate::task::TaskDescriptor;

/// Who is running: the deployable unit's name at the invocation service and the id of the
/// current request. Dispatching targets `function_name`, so a worker replicates whatever
/// unit it was itself started as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeIdentity {
    pub function_name: String,
    pub request_id: String,
}

impl RuntimeIdentity {
    pub fn new(function_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            request_id: request_id.into(),
        }
    }
}

/// Everything a task can reach while it runs: the identity of its invocation, the mailbox
/// service channels are opened on, and the dispatcher for further fan-out.
#[derive(Clone, Debug)]
pub struct Context<M, I> {
    identity: Option<RuntimeIdentity>,
    mailbox: M,
    dispatcher: TaskDispatcher<I>,
}

impl<M, I> Context<M, I>
where
    M: MailboxService,
    I: Invoker,
{
    /// Context of an invocation entered through the entrypoint.
    pub fn for_invocation(identity: RuntimeIdentity, mailbox: M, invoker: I) -> Self {
        Self {
            identity: Some(identity),
            mailbox,
            dispatcher: TaskDispatcher::new(invoker),
        }
    }

    /// Context outside of any invocation. Channels work, dispatching does not.
    pub fn detached(mailbox: M, invoker: I) -> Self {
        Self {
            identity: None,
            mailbox,
            dispatcher: TaskDispatcher::new(invoker),
        }
    }

    pub fn identity(&self) -> Option<&RuntimeIdentity> {
        self.identity.as_ref()
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub async fn open_channel(&self) -> Result<RendezvousChannel<M>> {
        RendezvousChannel::open(self.mailbox.clone()).await
    }

    /// See [RendezvousChannel::scoped].
    pub async fn with_channel<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce(ChannelHandle<M>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        RendezvousChannel::scoped(self.mailbox.clone(), body).await
    }

    /// Rebuilds a handle from a projection received as an argument.
    pub fn channel(&self, projection: ChannelProjection) -> ChannelHandle<M> {
        ChannelHandle::new(projection, self.mailbox.clone())
    }

    /// Fire-and-forget execution of `task` in a new instance of the current unit.
    pub async fn dispatch(&self, task: &TaskDescriptor) -> Result<()> {
        self.dispatcher.dispatch(self.identity.as_ref(), task).await
    }
}

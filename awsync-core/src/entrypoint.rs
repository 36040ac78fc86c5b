//! The single entry point of every execution instance, the externally triggered coordinator
//! and every dispatched worker alike.

use std::sync::Arc;

use tracing::{error, info};

use crate::Result;
use crate::context::{Context, RuntimeIdentity};
use crate::dispatch::Invoker;
use crate::mailbox::MailboxService;
use crate::registry::Registry;
use crate::task::{Arguments, InvocationEvent, InvocationResponse};

pub struct WorkerEntrypoint<M, I> {
    registry: Arc<Registry<M, I>>,
    mailbox: M,
    invoker: I,
}

impl<M: Clone, I: Clone> Clone for WorkerEntrypoint<M, I> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            mailbox: self.mailbox.clone(),
            invoker: self.invoker.clone(),
        }
    }
}

impl<M, I> WorkerEntrypoint<M, I>
where
    M: MailboxService,
    I: Invoker,
{
    pub fn new(registry: Registry<M, I>, mailbox: M, invoker: I) -> Self {
        Self {
            registry: Arc::new(registry),
            mailbox,
            invoker,
        }
    }

    pub fn registry(&self) -> &Registry<M, I> {
        &self.registry
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Runs the task the event names with the event's arguments, on behalf of `identity`.
    ///
    /// A missing `module` means the registry's default module and a missing `method` means
    /// `main`, which is how the first, externally triggered invocation reaches the
    /// coordinator. Failures are not caught: an unknown target or an error raised by the task
    /// is returned as is and no response envelope is produced.
    pub async fn handle(
        &self,
        event: InvocationEvent,
        identity: RuntimeIdentity,
    ) -> Result<InvocationResponse> {
        let (task, task_fn) = self
            .registry
            .resolve(event.module.as_deref(), event.method.as_deref())
            .inspect_err(|e| error!(?e, request_id = identity.request_id, "Unresolvable task"))?;

        info!(
            %task,
            function_name = identity.function_name,
            request_id = identity.request_id,
            "Handling invocation"
        );

        let request_id = identity.request_id.clone();
        let ctx = Context::for_invocation(identity, self.mailbox.clone(), self.invoker.clone());
        let args = Arguments::new(event.args, event.kwargs);

        let value = task_fn(ctx, args)
            .await
            .inspect_err(|e| error!(?e, %task, request_id, "Task failed"))?;

        InvocationResponse::ok(&value)
    }
}

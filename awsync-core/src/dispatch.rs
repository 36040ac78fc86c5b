//! Fan-out: asking the invocation service to run a task in a new, independent instance of
//! the deployable unit the caller is running in.

use bytes::Bytes;
use tracing::info;

use crate::context::RuntimeIdentity;
use crate::task::TaskDescriptor;
use crate::{Error, Result};

/// [awsync_lambda::invoker::LambdaInvoker] as an [Invoker].
pub mod lambda;

/// In-process invocation service for tests and local runs.
pub mod local;

/// The invocation service. `invoke_async` returns once the request is accepted; the
/// execution itself happens out of band and its outcome is never reported back.
#[trait_variant::make(Send)]
pub trait Invoker: Clone + Send + Sync + 'static {
    async fn invoke_async(&self, target: &str, payload: Bytes) -> Result<()>;
}

/// Serializes task descriptors and fires them at the invocation service.
#[derive(Clone, Debug)]
pub struct TaskDispatcher<I> {
    invoker: I,
}

impl<I: Invoker> TaskDispatcher<I> {
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Requests a fire-and-forget execution of `task` in the unit named by `identity`. Only
    /// invocations entered through the entrypoint have an identity, anything else cannot know
    /// what to replicate and fails with `Precondition`.
    pub async fn dispatch(
        &self,
        identity: Option<&RuntimeIdentity>,
        task: &TaskDescriptor,
    ) -> Result<()> {
        let Some(identity) = identity else {
            return Err(Error::Precondition(format!(
                "cannot dispatch {}, no invocation identity recorded",
                task.task()
            )));
        };

        let payload = task.to_payload()?;
        self.invoker
            .invoke_async(&identity.function_name, payload)
            .await?;

        info!(
            function_name = identity.function_name,
            parent_request_id = identity.request_id,
            task = %task.task(),
            "Dispatched task"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use crate::task::TaskRef;

    #[derive(Clone, Default)]
    struct RecordingInvoker {
        requests: Arc<Mutex<Vec<(String, Bytes)>>>,
    }

    impl Invoker for RecordingInvoker {
        async fn invoke_async(&self, target: &str, payload: Bytes) -> Result<()> {
            self.requests.lock().push((target.to_string(), payload));
            Ok(())
        }
    }

    #[derive(Clone)]
    struct RejectingInvoker;

    impl Invoker for RejectingInvoker {
        async fn invoke_async(&self, target: &str, _payload: Bytes) -> Result<()> {
            Err(Error::Dispatch(format!("{target} is throttled")))
        }
    }

    #[tokio::test]
    async fn test_dispatch_targets_own_unit() {
        let invoker = RecordingInvoker::default();
        let dispatcher = TaskDispatcher::new(invoker.clone());
        let identity = RuntimeIdentity::new("awsync-fn", "req-1");
        let task = TaskRef::new("awsync", "square").call().arg(&3).unwrap();

        dispatcher.dispatch(Some(&identity), &task).await.unwrap();

        let requests = invoker.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "awsync-fn");
        let payload: Value = serde_json::from_slice(&requests[0].1).unwrap();
        assert_eq!(payload["method"], "square");
        assert_eq!(payload["args"][0], 3);
    }

    #[tokio::test]
    async fn test_dispatch_without_identity() {
        let invoker = RecordingInvoker::default();
        let dispatcher = TaskDispatcher::new(invoker.clone());
        let task = TaskRef::new("awsync", "square").call();

        let result = dispatcher.dispatch(None, &task).await;
        assert!(matches!(result, Err(Error::Precondition(_))));
        assert!(invoker.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_rejected() {
        let dispatcher = TaskDispatcher::new(RejectingInvoker);
        let identity = RuntimeIdentity::new("awsync-fn", "req-1");
        let task = TaskRef::new("awsync", "square").call();

        let result = dispatcher.dispatch(Some(&identity), &task).await;
        assert!(matches!(result, Err(Error::Dispatch(_))));
    }
}

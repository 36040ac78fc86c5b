//! A stand-in for the invocation service that runs every dispatched task as a tokio task of
//! the current process. Requests go through an actor that owns the receiving end of an mpsc
//! channel, the same way a remote service would pick them up out of band, and the outcome of
//! each execution is recorded in an [ExecutionReport] since nothing reports it back to the
//! dispatcher.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::RuntimeIdentity;
use crate::dispatch::Invoker;
use crate::entrypoint::WorkerEntrypoint;
use crate::mailbox::MailboxService;
use crate::registry::Registry;
use crate::task::{InvocationEvent, InvocationResponse};
use crate::{Error, Result};

const REQUEST_QUEUE_SIZE: usize = 100;

#[derive(Debug)]
struct LocalInvocation {
    target: String,
    payload: Bytes,
}

/// Outcome of a single dispatched execution.
#[derive(Debug, Clone)]
pub struct Execution {
    pub request_id: String,
    pub target: String,
    pub outcome: Result<InvocationResponse>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub executions: Vec<Execution>,
}

impl ExecutionReport {
    pub fn completed(&self) -> impl Iterator<Item = &Execution> {
        self.executions.iter().filter(|e| e.outcome.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Execution> {
        self.executions.iter().filter(|e| e.outcome.is_err())
    }
}

#[derive(Debug)]
struct Shared {
    in_flight: watch::Sender<usize>,
    report: Mutex<ExecutionReport>,
}

impl Shared {
    fn new() -> Arc<Self> {
        let (in_flight, _) = watch::channel(0);
        Arc::new(Self {
            in_flight,
            report: Mutex::new(ExecutionReport::default()),
        })
    }

    fn started(&self) {
        self.in_flight.send_modify(|n| *n += 1);
    }

    fn finished(&self, execution: Option<Execution>) {
        if let Some(execution) = execution {
            self.report.lock().executions.push(execution);
        }
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// The [Invoker] handed to tasks run by a [LocalRuntime].
#[derive(Clone, Debug)]
pub struct LocalInvoker {
    tx: mpsc::Sender<LocalInvocation>,
    shared: Arc<Shared>,
}

impl LocalInvoker {
    /// An invoker whose runtime is gone, every request is rejected.
    pub fn disconnected() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self {
            tx,
            shared: Shared::new(),
        }
    }
}

impl Invoker for LocalInvoker {
    async fn invoke_async(&self, target: &str, payload: Bytes) -> Result<()> {
        self.shared.started();
        let invocation = LocalInvocation {
            target: target.to_string(),
            payload,
        };
        if let Err(e) = self.tx.send(invocation).await {
            self.shared.finished(None);
            return Err(Error::Dispatch(format!(
                "local runtime is not accepting requests for {target}: {e}"
            )));
        }
        Ok(())
    }
}

/// Runs a registry in-process under a single function name.
pub struct LocalRuntime<M> {
    function_name: String,
    entrypoint: WorkerEntrypoint<M, LocalInvoker>,
    shared: Arc<Shared>,
    actor: JoinHandle<()>,
}

impl<M: MailboxService> LocalRuntime<M> {
    /// Starts the request actor. Must be called from within a tokio runtime.
    pub fn start(
        function_name: impl Into<String>,
        registry: Registry<M, LocalInvoker>,
        mailbox: M,
    ) -> Self {
        let function_name = function_name.into();
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let shared = Shared::new();
        let invoker = LocalInvoker {
            tx,
            shared: Arc::clone(&shared),
        };
        let entrypoint = WorkerEntrypoint::new(registry, mailbox, invoker);

        let actor = tokio::spawn(run_requests(
            rx,
            function_name.clone(),
            entrypoint.clone(),
            Arc::clone(&shared),
        ));

        Self {
            function_name,
            entrypoint,
            shared,
            actor,
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Synchronous invocation of the unit, the way an external trigger starts a coordinator.
    /// Unlike dispatched executions it is not part of the report.
    pub async fn invoke(&self, event: InvocationEvent) -> Result<InvocationResponse> {
        let identity = RuntimeIdentity::new(&self.function_name, Uuid::new_v4().to_string());
        self.entrypoint.handle(event, identity).await
    }

    /// Waits until every dispatched execution, including ones dispatched by dispatched
    /// executions, has finished.
    pub async fn settled(&self) {
        let mut in_flight = self.shared.in_flight.subscribe();
        // the sender lives in `shared`, so the watch cannot close while we hold it
        let _ = in_flight.wait_for(|n| *n == 0).await;
    }

    pub fn invoker(&self) -> &LocalInvoker {
        self.entrypoint.invoker()
    }

    pub fn report(&self) -> ExecutionReport {
        self.shared.report.lock().clone()
    }
}

impl<M> Drop for LocalRuntime<M> {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

async fn run_requests<M: MailboxService>(
    mut rx: mpsc::Receiver<LocalInvocation>,
    function_name: String,
    entrypoint: WorkerEntrypoint<M, LocalInvoker>,
    shared: Arc<Shared>,
) {
    while let Some(LocalInvocation { target, payload }) = rx.recv().await {
        let request_id = Uuid::new_v4().to_string();

        if target != function_name {
            warn!(function_name = target, "Dispatched to an unknown function");
            shared.finished(Some(Execution {
                request_id,
                outcome: Err(Error::Dispatch(format!("function {target} not found"))),
                target,
            }));
            continue;
        }

        let event = match InvocationEvent::from_payload(&payload) {
            Ok(event) => event,
            Err(e) => {
                error!(?e, request_id, "Undecodable invocation payload");
                shared.finished(Some(Execution {
                    request_id,
                    target,
                    outcome: Err(e),
                }));
                continue;
            }
        };

        info!(request_id, function_name = target, "Starting execution");
        let entrypoint = entrypoint.clone();
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let identity = RuntimeIdentity::new(target.clone(), request_id.clone());
            let outcome = AssertUnwindSafe(entrypoint.handle(event, identity))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::task("task panicked")));

            shared.finished(Some(Execution {
                request_id,
                target,
                outcome,
            }));
        });
    }
}

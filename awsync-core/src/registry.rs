//! Every task an invocation may run is registered up front under a stable [TaskRef]. The
//! entrypoint resolves the `module`/`method` strings of the inbound envelope against this
//! table only.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::context::Context;
use crate::task::{Arguments, DEFAULT_METHOD, TaskRef};
use crate::{Error, Result};

pub type TaskFuture = BoxFuture<'static, Result<Value>>;

pub(crate) type TaskFn<M, I> = Arc<dyn Fn(Context<M, I>, Arguments) -> TaskFuture + Send + Sync>;

pub struct Registry<M, I> {
    default_module: String,
    tasks: HashMap<TaskRef, TaskFn<M, I>>,
}

impl<M, I> Registry<M, I>
where
    M: Send + 'static,
    I: Send + 'static,
{
    /// `default_module` is the unit the entrypoint itself lives in, used when an envelope
    /// does not name a module.
    pub fn new(default_module: impl Into<String>) -> Self {
        Self {
            default_module: default_module.into(),
            tasks: HashMap::new(),
        }
    }

    pub fn default_module(&self) -> &str {
        &self.default_module
    }

    /// Registers `f` as `method` of the default module.
    pub fn register<F, Fut, R>(&mut self, method: &str, f: F) -> TaskRef
    where
        F: Fn(Context<M, I>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Serialize + 'static,
    {
        let module = self.default_module.clone();
        self.register_in(&module, method, f)
    }

    pub fn register_in<F, Fut, R>(&mut self, module: &str, method: &str, f: F) -> TaskRef
    where
        F: Fn(Context<M, I>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Serialize + 'static,
    {
        let task = TaskRef::new(module, method);
        let task_fn: TaskFn<M, I> = Arc::new(move |ctx: Context<M, I>, args: Arguments| {
            f(ctx, args)
                .map(|result: Result<R>| -> Result<Value> { Ok(serde_json::to_value(result?)?) })
                .boxed()
        });

        if self.tasks.insert(task.clone(), task_fn).is_some() {
            warn!(%task, "Task registered twice, keeping the latest");
        }
        task
    }

    /// Resolves the envelope's target. `module` defaults to the default module and `method`
    /// to `main`.
    pub(crate) fn resolve(
        &self,
        module: Option<&str>,
        method: Option<&str>,
    ) -> Result<(TaskRef, TaskFn<M, I>)> {
        let task = TaskRef::new(
            module.unwrap_or(&self.default_module),
            method.unwrap_or(DEFAULT_METHOD),
        );
        match self.tasks.get(&task) {
            Some(task_fn) => Ok((task, Arc::clone(task_fn))),
            None => Err(Error::UnknownTarget {
                module: task.module,
                method: task.method,
            }),
        }
    }

    pub fn contains(&self, task: &TaskRef) -> bool {
        self.tasks.contains_key(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::local::LocalInvoker;
    use crate::mailbox::memory::InMemoryMailboxService;

    type TestRegistry = Registry<InMemoryMailboxService, LocalInvoker>;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = TestRegistry::new("app");
        let main = registry.register("main", |_ctx, _args| async { Ok(1) });
        let other = registry.register_in("reports", "weekly", |_ctx, _args| async { Ok("ok") });

        assert_eq!(main, TaskRef::new("app", "main"));
        assert_eq!(other, TaskRef::new("reports", "weekly"));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&other));

        let (resolved, _) = registry.resolve(None, None).unwrap();
        assert_eq!(resolved, main);
        let (resolved, _) = registry.resolve(Some("reports"), Some("weekly")).unwrap();
        assert_eq!(resolved, other);
    }

    #[test]
    fn test_unknown_target() {
        let mut registry = TestRegistry::new("app");
        registry.register("main", |_ctx, _args| async { Ok(()) });

        let err = registry.resolve(Some("app"), Some("missing")).err().unwrap();
        assert!(matches!(
            &err,
            Error::UnknownTarget { module, method } if module == "app" && method == "missing"
        ));
        assert_eq!(err.to_string(), "Unknown Target - app.missing");

        // a registered method in another module does not match
        assert!(registry.resolve(Some("reports"), None).is_err());
    }

    #[test]
    fn test_reregistration_keeps_latest() {
        let mut registry = TestRegistry::new("app");
        registry.register("main", |_ctx, _args| async { Ok(1) });
        registry.register("main", |_ctx, _args| async { Ok(2) });
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}

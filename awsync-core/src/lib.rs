//! Scatter-gather over serverless invocations.
//!
//! A coordinator opens a [RendezvousChannel] on a temporary mailbox, dispatches tasks through
//! the [TaskDispatcher] to new instances of its own deployable unit, and pops one result per
//! dispatched task from the channel before closing it. Every instance, coordinator or worker,
//! starts in the [WorkerEntrypoint], which resolves the task named by the inbound envelope in
//! the [Registry] and runs it with a [Context] carrying the instance's [RuntimeIdentity].
//!
//! The mailbox and invocation services sit behind [MailboxService] and [Invoker]. SQS and
//! Lambda implement them for deployments, [InMemoryMailboxService] and [LocalRuntime] for tests
//! and local runs.

pub use crate::channel::{Channel, ChannelHandle, ChannelProjection, RendezvousChannel, gather};
pub use crate::context::{Context, RuntimeIdentity};
pub use crate::dispatch::local::{ExecutionReport, LocalInvoker, LocalRuntime};
pub use crate::dispatch::{Invoker, TaskDispatcher};
pub use crate::entrypoint::WorkerEntrypoint;
pub use crate::error::{Error, Result};
pub use crate::mailbox::MailboxService;
pub use crate::mailbox::memory::InMemoryMailboxService;
pub use crate::registry::Registry;
pub use crate::task::{Arguments, InvocationEvent, InvocationResponse, TaskDescriptor, TaskRef};

/// Custom Error and Result types for awsync-core.
mod error;

/// Task references, descriptors, and the invocation envelopes.
pub mod task;

/// Temporary mailboxes and the services providing them.
pub mod mailbox;

/// [RendezvousChannel] and [ChannelHandle].
pub mod channel;

/// Fire-and-forget invocation of tasks.
pub mod dispatch;

/// Per-invocation state handed to tasks.
pub mod context;

/// Table of invocable tasks.
pub mod registry;

/// Entry point of every invocation.
pub mod entrypoint;

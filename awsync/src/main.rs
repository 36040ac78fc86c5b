use std::env;

use awsync_core::{InvocationEvent, Registry, RuntimeIdentity, WorkerEntrypoint};
use awsync_lambda::invoker::LambdaInvoker;
use awsync_sqs::mailbox::SqsMailboxBuilder;
use lambda_runtime::{LambdaEvent, service_fn};
use tracing::{error, info};

use crate::config::Settings;
use crate::error::{Error, Result};

mod config;
mod error;
mod setup_tracing;
mod squares;

#[tokio::main]
async fn main() -> std::result::Result<(), lambda_runtime::Error> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e.into());
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<()> {
    let settings = Settings::load(env::vars())?;
    info!(?settings, "Starting awsync function");

    let mailbox = SqsMailboxBuilder::new(settings.sqs_config())
        .build()
        .await?;
    let invoker = LambdaInvoker::new(&settings.lambda_config()).await?;

    let mut registry = Registry::new(squares::MODULE);
    squares::register(&mut registry, settings.fanout);
    let entrypoint = WorkerEntrypoint::new(registry, mailbox, invoker);

    lambda_runtime::run(service_fn(|event: LambdaEvent<InvocationEvent>| {
        let entrypoint = entrypoint.clone();
        async move {
            let (event, context) = event.into_parts();
            let identity =
                RuntimeIdentity::new(context.env_config.function_name.clone(), context.request_id);
            Ok::<_, lambda_runtime::Error>(entrypoint.handle(event, identity).await?)
        }
    }))
    .await
    .map_err(|e| Error::Runtime(e.to_string()))
}

use awsync_lambda::invoker::LambdaInvoker;
use bytes::Bytes;

use crate::Error;
use crate::dispatch::Invoker;

impl From<awsync_lambda::Error> for Error {
    fn from(value: awsync_lambda::Error) -> Self {
        match value {
            awsync_lambda::Error::InvalidConfig(e) => Error::Config(e),
            e => Error::Dispatch(e.to_string()),
        }
    }
}

impl Invoker for LambdaInvoker {
    async fn invoke_async(&self, target: &str, payload: Bytes) -> crate::Result<()> {
        Ok(self.invoke_event(target, payload).await?)
    }
}

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::envelope::RemoteError;

/// Future produced by a request handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, RemoteError>> + Send>>;

pub(crate) type RequestHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;
pub(crate) type NotificationHandler = Arc<dyn Fn(Value) -> Result<(), RemoteError> + Send + Sync>;

pub(crate) fn request_handler<F, Fut>(handler: F) -> RequestHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RemoteError>> + Send + 'static,
{
    Arc::new(move |payload: Value| -> HandlerFuture { Box::pin(handler(payload)) })
}

pub(crate) fn notification_handler<F>(handler: F) -> NotificationHandler
where
    F: Fn(Value) -> Result<(), RemoteError> + Send + Sync + 'static,
{
    Arc::new(handler)
}

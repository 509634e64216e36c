//! Handler trait and transport conversion traits.

use std::future::Future;

use async_trait::async_trait;

use super::{event::Event, message::Message, user::User};

/// Converts a transport-specific user type to core [`User`].
pub trait ToCoreUser: Send + Sync {
    fn to_core(&self) -> User;
}

/// Converts a transport-specific message type to core [`Message`].
pub trait ToCoreMessage: Send + Sync {
    fn to_core(&self) -> Message;
}

/// Application logic bound to a command (or installed as the default). Errors are returned to
/// the caller of `process_event`; the core does not retry them.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &Event) -> crate::error::Result<()>;
}

/// [`Handler`] backed by an async closure. Build with [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an async closure taking an owned [`Event`] as a [`Handler`].
///
/// ```ignore
/// dispatcher.register_handler("/ping", Arc::new(handler_fn(|event| async move {
///     tracing::info!(update_id = event.id, "pong");
///     Ok(())
/// }))).await?;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = crate::error::Result<()>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = crate::error::Result<()>> + Send,
{
    async fn handle(&self, event: &Event) -> crate::error::Result<()> {
        (self.f)(event.clone()).await
    }
}

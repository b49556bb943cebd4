//! The capability that actually delivers one message to one recipient.

use async_trait::async_trait;

use crate::errors::TransportError;

/// Delivers a rendered message to an identity (a phone number for chat
/// transports).
///
/// `Ok(true)` means the message was sent, `Ok(false)` that the recipient is
/// not reachable on the messaging surface. `Err` is reserved for hard faults
/// of the transport itself.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, identity: &str, text: &str) -> Result<bool, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, identity: &str, text: &str) -> Result<bool, TransportError> {
        (**self).send(identity, text).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, identity: &str, text: &str) -> Result<bool, TransportError> {
        (**self).send(identity, text).await
    }
}

/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Per-type message dispatch.
//!
//! A processor that cares about specific message types builds a
//! [`Dispatcher`] at construction: a static table from [`MsgType`] to a
//! handler function. At traversal time the processor asks the dispatcher
//! first and falls back to its plain `on_receive` / `on_send` when no
//! handler is registered. The table never changes after construction.

use crate::processor::ProcessorError;
use fixweave_core::message::{Message, MsgType};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// The boxed future a handler returns.
pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<Message>, ProcessorError>> + Send + 'a>>;

/// A handler: a plain function from (&processor, message) to a future.
///
/// Using fn pointers keeps the table `Send + Sync` for free and registration
/// static, at the cost of a one-line `Box::pin` shim per async method.
pub type Handler<P> = for<'a> fn(&'a P, Message) -> HandlerFuture<'a>;

/// Outcome of a dispatch attempt.
#[derive(Debug)]
pub enum Dispatched {
    /// A handler ran; `None` means it swallowed the message.
    Handled(Option<Message>),
    /// No handler for this type; the message is handed back untouched.
    Unhandled(Message),
}

/// Static MsgType → handler table for one processor type.
pub struct Dispatcher<P> {
    handlers: HashMap<MsgType, Handler<P>>,
}

impl<P> Dispatcher<P> {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for a message type. Later registrations for the
    /// same type replace earlier ones.
    #[must_use]
    pub fn route(mut self, msg_type: MsgType, handler: Handler<P>) -> Self {
        self.handlers.insert(msg_type, handler);
        self
    }

    /// Returns true if a handler is registered for `msg_type`.
    #[must_use]
    pub fn handles(&self, msg_type: &MsgType) -> bool {
        self.handlers.contains_key(msg_type)
    }

    /// Dispatches `message` to its handler, or hands it back when no
    /// handler is registered so the caller can run its fallback path.
    ///
    /// # Errors
    /// Propagates the handler's `ProcessorError`.
    pub async fn dispatch(
        &self,
        processor: &P,
        message: Message,
    ) -> Result<Dispatched, ProcessorError> {
        match self.handlers.get(message.msg_type()) {
            Some(handler) => handler(processor, message).await.map(Dispatched::Handled),
            None => Ok(Dispatched::Unhandled(message)),
        }
    }
}

impl<P> Default for Dispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counter {
        heartbeats: AtomicU32,
    }

    impl Counter {
        async fn on_heartbeat(&self, message: Message) -> Result<Option<Message>, ProcessorError> {
            self.heartbeats.fetch_add(1, Ordering::SeqCst);
            Ok(Some(message))
        }

        async fn on_logout(&self, _message: Message) -> Result<Option<Message>, ProcessorError> {
            Ok(None)
        }
    }

    fn heartbeat_shim(p: &Counter, m: Message) -> HandlerFuture<'_> {
        Box::pin(p.on_heartbeat(m))
    }

    fn logout_shim(p: &Counter, m: Message) -> HandlerFuture<'_> {
        Box::pin(p.on_logout(m))
    }

    fn dispatcher() -> Dispatcher<Counter> {
        Dispatcher::new()
            .route(MsgType::Heartbeat, heartbeat_shim)
            .route(MsgType::Logout, logout_shim)
    }

    #[tokio::test]
    async fn routes_by_msg_type() {
        let counter = Counter::default();
        let table = dispatcher();

        let out = table
            .dispatch(&counter, Message::new(MsgType::Heartbeat))
            .await
            .unwrap();
        assert!(matches!(out, Dispatched::Handled(Some(_))));
        assert_eq!(counter.heartbeats.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_may_swallow_message() {
        let counter = Counter::default();
        let table = dispatcher();

        let out = table
            .dispatch(&counter, Message::new(MsgType::Logout))
            .await
            .unwrap();
        assert!(matches!(out, Dispatched::Handled(None)));
    }

    #[tokio::test]
    async fn unrouted_type_hands_message_back() {
        let counter = Counter::default();
        let table = dispatcher();

        let out = table
            .dispatch(&counter, Message::new(MsgType::NewOrderSingle))
            .await
            .unwrap();
        match out {
            Dispatched::Unhandled(msg) => {
                assert_eq!(*msg.msg_type(), MsgType::NewOrderSingle);
            }
            Dispatched::Handled(_) => panic!("no handler should exist"),
        }
        assert!(!table.handles(&MsgType::NewOrderSingle));
    }
}

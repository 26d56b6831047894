/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Broker seam: pub/sub integration at the top of the pipeline.
//!
//! External systems see two logical channels: every outbound message is
//! published as interchange JSON on the send channel, and JSON arriving on
//! the receive channel is injected into the outbound pipeline. The broker
//! itself (Redis, NATS, a test harness) lives behind [`BrokerLink`].

use crate::context::EngineContext;
use async_trait::async_trait;
use fixweave_core::json;
use fixweave_pipeline::{Envelope, PipelineHandle, Processor, ProcessorError};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Connection to an external pub/sub broker.
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// Publishes one outbound message, already serialized as JSON.
    async fn publish(&self, message_json: String);

    /// Waits for the next injected JSON message; `None` means the channel
    /// closed and injection is over.
    async fn next_inject(&self) -> Option<String>;
}

/// In-process [`BrokerLink`] over tokio channels, for tests and embedding.
#[derive(Debug)]
pub struct ChannelBroker {
    publish_tx: mpsc::UnboundedSender<String>,
    inject_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

/// The far side of a [`ChannelBroker`].
#[derive(Debug)]
pub struct ChannelBrokerRemote {
    /// Receives everything the session publishes.
    pub published: mpsc::UnboundedReceiver<String>,
    /// Sends JSON messages into the session.
    pub inject: mpsc::UnboundedSender<String>,
}

impl ChannelBroker {
    /// Creates the broker and its remote counterpart.
    #[must_use]
    pub fn pair() -> (Arc<Self>, ChannelBrokerRemote) {
        let (publish_tx, published) = mpsc::unbounded_channel();
        let (inject, inject_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                publish_tx,
                inject_rx: Mutex::new(inject_rx),
            }),
            ChannelBrokerRemote { published, inject },
        )
    }
}

#[async_trait]
impl BrokerLink for ChannelBroker {
    async fn publish(&self, message_json: String) {
        let _ = self.publish_tx.send(message_json);
    }

    async fn next_inject(&self) -> Option<String> {
        self.inject_rx.lock().await.recv().await
    }
}

/// Bridges the pipeline to a [`BrokerLink`].
pub struct BrokerProcessor {
    ctx: EngineContext,
    link: Arc<dyn BrokerLink>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl BrokerProcessor {
    /// Creates the processor over the given broker link.
    #[must_use]
    pub fn new(ctx: EngineContext, link: Arc<dyn BrokerLink>) -> Self {
        Self {
            ctx,
            link,
            task: parking_lot::Mutex::new(None),
        }
    }
}

async fn inject_loop(link: Arc<dyn BrokerLink>, handle: PipelineHandle) {
    while let Some(raw) = link.next_inject().await {
        match json::from_json(&raw) {
            Ok(message) => {
                debug!(msg_type = %message.msg_type(), "injecting message from broker");
                handle.send(message);
            }
            Err(e) => warn!(error = %e, "dropping unparseable injected message"),
        }
    }
    debug!("broker inject channel closed");
}

#[async_trait]
impl Processor for BrokerProcessor {
    fn name(&self) -> &str {
        "broker"
    }

    async fn start(&self) -> Result<(), ProcessorError> {
        let task = tokio::spawn(inject_loop(
            Arc::clone(&self.link),
            self.ctx.handle.clone(),
        ));
        *self.task.lock() = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ProcessorError> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        if let Envelope::Parsed(message) = &envelope {
            match json::to_json(message) {
                Ok(serialized) => self.link.publish(serialized).await,
                Err(e) => warn!(error = %e, "could not publish outbound message"),
            }
        }
        Ok(Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use fixweave_core::message::{Message, MsgType};
    use std::time::Duration;

    #[tokio::test]
    async fn outbound_messages_are_published_as_json() {
        let (ctx, _wiring) = test_context();
        let (link, mut remote) = ChannelBroker::pair();
        let broker = BrokerProcessor::new(ctx, link);

        let mut msg = Message::heartbeat(Some("probe"));
        msg.set_seq_num(5);
        let out = broker.on_send(Envelope::Parsed(msg)).await.unwrap();
        assert!(out.is_some(), "publishing must not consume the message");

        let published = remote.published.recv().await.unwrap();
        assert!(published.contains("\"type\":\"0\""));
        assert!(published.contains("probe"));
    }

    #[tokio::test]
    async fn injected_json_enters_the_outbound_pipeline() {
        let (ctx, mut wiring) = test_context();
        let (link, remote) = ChannelBroker::pair();
        let broker = BrokerProcessor::new(ctx, link);
        broker.start().await.unwrap();

        remote
            .inject
            .send(r#"{"type":"D","fields":[[55,"EURUSD"],[54,"1"]]}"#.into())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let injected = wiring.try_next_outbound().unwrap().into_message().unwrap();
        assert_eq!(*injected.msg_type(), MsgType::NewOrderSingle);
        assert_eq!(injected.get_str(55), Some("EURUSD"));

        broker.stop().await.unwrap();
    }

    #[tokio::test]
    async fn bad_injected_json_is_dropped() {
        let (ctx, mut wiring) = test_context();
        let (link, remote) = ChannelBroker::pair();
        let broker = BrokerProcessor::new(ctx, link);
        broker.start().await.unwrap();

        remote.inject.send("not json at all".into()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(wiring.try_next_outbound().is_none());
        broker.stop().await.unwrap();
    }
}

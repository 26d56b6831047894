/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Heartbeat processor: keeps the session demonstrably alive.
//!
//! A monitor task watches both directions for silence. Outbound silence
//! produces a Heartbeat; inbound silence produces a TestRequest; a
//! TestRequest that goes unanswered for another interval-plus-grace window
//! means the peer is gone and the session errors out.

use crate::context::EngineContext;
use async_trait::async_trait;
use fixweave_core::message::{Message, MsgType};
use fixweave_core::tags;
use fixweave_pipeline::{
    Dispatched, Dispatcher, Envelope, HandlerFuture, PipelineHandle, Processor, ProcessorError,
    StopCause,
};
use fixweave_session::heartbeat::{new_test_req_id, HeartbeatAction, HeartbeatMonitor};
use fixweave_session::{SessionCore, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Emits Heartbeats and TestRequests; escalates unanswered probes.
#[derive(Debug)]
pub struct HeartbeatProcessor {
    ctx: EngineContext,
    monitor: Arc<Mutex<HeartbeatMonitor>>,
    dispatcher: Dispatcher<Self>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatProcessor {
    /// Creates the processor with timing from the session config.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        let interval = ctx.config.heartbeat();
        let grace = ctx.config.grace();
        Self::with_timing(ctx, interval, grace)
    }

    /// Creates the processor with explicit timing (tests use millisecond
    /// intervals).
    #[must_use]
    pub fn with_timing(ctx: EngineContext, interval: Duration, grace: Duration) -> Self {
        let dispatcher = Dispatcher::new()
            .route(MsgType::Logon, logon_shim)
            .route(MsgType::TestRequest, test_request_shim);
        Self {
            ctx,
            monitor: Arc::new(Mutex::new(HeartbeatMonitor::new(interval, grace))),
            dispatcher,
            task: parking_lot::Mutex::new(None),
        }
    }

    /// The peer's Logon confirms the heartbeat interval in force.
    async fn on_logon(&self, message: Message) -> Result<Option<Message>, ProcessorError> {
        if let Some(secs) = message.get(tags::HEART_BT_INT).and_then(|f| f.as_u64().ok()) {
            debug!(secs, "heartbeat interval confirmed by counterparty");
            self.monitor
                .lock()
                .await
                .set_interval(Duration::from_secs(secs));
        }
        Ok(Some(message))
    }

    /// Answer the peer's TestRequest with a Heartbeat echoing its id.
    async fn on_test_request(&self, message: Message) -> Result<Option<Message>, ProcessorError> {
        let id = message.get_str(tags::TEST_REQ_ID);
        debug!(id = id.unwrap_or(""), "answering test request");
        self.ctx.handle.send(Message::heartbeat(id));
        Ok(Some(message))
    }
}

fn logon_shim(p: &HeartbeatProcessor, m: Message) -> HandlerFuture<'_> {
    Box::pin(p.on_logon(m))
}

fn test_request_shim(p: &HeartbeatProcessor, m: Message) -> HandlerFuture<'_> {
    Box::pin(p.on_test_request(m))
}

async fn monitor_loop(
    monitor: Arc<Mutex<HeartbeatMonitor>>,
    handle: PipelineHandle,
    core: Arc<SessionCore>,
) {
    loop {
        let action = monitor.lock().await.poll();
        match action {
            HeartbeatAction::Wait(remaining) => tokio::time::sleep(remaining).await,
            HeartbeatAction::SendHeartbeat => {
                monitor.lock().await.on_sent();
                handle.send(Message::heartbeat(None));
            }
            HeartbeatAction::SendTestRequest => {
                let id = new_test_req_id();
                warn!(test_req_id = %id, "no inbound traffic; probing counterparty");
                monitor.lock().await.on_test_request_sent(id.clone());
                handle.send(Message::test_request(&id));
            }
            HeartbeatAction::PeerDead { silent_for } => {
                error!(?silent_for, "test request unanswered; declaring peer dead");
                let _ = core.transition(SessionStatus::Errored);
                handle.shutdown(StopCause::Transport(format!(
                    "heartbeat timeout after {} ms of inbound silence",
                    silent_for.as_millis()
                )));
                return;
            }
        }
    }
}

#[async_trait]
impl Processor for HeartbeatProcessor {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn start(&self) -> Result<(), ProcessorError> {
        let interval = self.monitor.lock().await.interval();
        info!(?interval, "heartbeat monitor running");
        let task = tokio::spawn(monitor_loop(
            Arc::clone(&self.monitor),
            self.ctx.handle.clone(),
            Arc::clone(&self.ctx.core),
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

    async fn on_receive(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        let Envelope::Parsed(message) = envelope else {
            return Ok(Some(envelope));
        };

        {
            let mut monitor = self.monitor.lock().await;
            monitor.on_received(
                *message.msg_type() == MsgType::Heartbeat,
                message.get_str(tags::TEST_REQ_ID),
            );
        }

        match self.dispatcher.dispatch(self, message).await? {
            Dispatched::Handled(out) => Ok(out.map(Envelope::Parsed)),
            Dispatched::Unhandled(message) => Ok(Some(Envelope::Parsed(message))),
        }
    }

    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        if envelope.message().is_some() {
            self.monitor.lock().await.on_sent();
        }
        Ok(Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use fixweave_pipeline::PipelineWiring;

    const INTERVAL: Duration = Duration::from_millis(80);
    const GRACE: Duration = Duration::from_millis(16);

    fn inbound(msg_type: MsgType) -> Envelope {
        let mut msg = Message::new(msg_type);
        msg.set_seq_num(1);
        Envelope::Parsed(msg)
    }

    fn next_sent(wiring: &mut PipelineWiring) -> Option<Message> {
        wiring.try_next_outbound().and_then(Envelope::into_message)
    }

    #[tokio::test]
    async fn outbound_silence_emits_one_heartbeat() {
        let (ctx, mut wiring) = test_context();
        let hb = HeartbeatProcessor::with_timing(ctx, INTERVAL, GRACE);
        hb.start().await.unwrap();

        // Keep the inbound side fresh so only the outbound timer fires.
        let deadline = tokio::time::Instant::now() + INTERVAL + Duration::from_millis(40);
        while tokio::time::Instant::now() < deadline {
            hb.on_receive(inbound(MsgType::News)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        hb.stop().await.unwrap();

        let sent = next_sent(&mut wiring).expect("a heartbeat should have been sent");
        assert_eq!(*sent.msg_type(), MsgType::Heartbeat);
        assert!(sent.get(tags::TEST_REQ_ID).is_none());
    }

    #[tokio::test]
    async fn inbound_silence_probes_then_declares_peer_dead() {
        let (ctx, mut wiring) = test_context();
        let hb = HeartbeatProcessor::with_timing(ctx.clone(), INTERVAL, GRACE);
        hb.start().await.unwrap();

        tokio::time::sleep(2 * (INTERVAL + GRACE) + Duration::from_millis(50)).await;
        hb.stop().await.unwrap();

        // First a heartbeat or probe, eventually a TestRequest, then death.
        let mut saw_probe = false;
        while let Some(msg) = next_sent(&mut wiring) {
            if *msg.msg_type() == MsgType::TestRequest {
                saw_probe = true;
                assert!(msg.get(tags::TEST_REQ_ID).is_some());
            }
        }
        assert!(saw_probe, "a TestRequest should have been emitted");
        assert!(matches!(
            wiring.try_next_stop(),
            Some(StopCause::Transport(_))
        ));
        assert!(ctx.core.status().is_errored());
    }

    #[tokio::test]
    async fn answers_test_request_with_matching_heartbeat() {
        let (ctx, mut wiring) = test_context();
        let hb = HeartbeatProcessor::with_timing(ctx, INTERVAL, GRACE);

        let mut probe = Message::test_request("ping-7");
        probe.set_seq_num(1);
        let out = hb.on_receive(Envelope::Parsed(probe)).await.unwrap();
        assert!(out.is_some(), "the probe continues up the pipeline");

        let reply = next_sent(&mut wiring).unwrap();
        assert_eq!(*reply.msg_type(), MsgType::Heartbeat);
        assert_eq!(reply.get_str(tags::TEST_REQ_ID), Some("ping-7"));
    }

    #[tokio::test]
    async fn logon_reconfigures_interval() {
        let (ctx, _wiring) = test_context();
        let hb = HeartbeatProcessor::with_timing(ctx, Duration::from_secs(30), Duration::from_secs(6));

        let mut logon = Message::logon("u", "p", 30, false);
        logon.set_seq_num(1);
        logon.set(tags::HEART_BT_INT, &b"10"[..]).unwrap();
        hb.on_receive(Envelope::Parsed(logon)).await.unwrap();

        assert_eq!(
            hb.monitor.lock().await.interval(),
            Duration::from_secs(10)
        );
    }
}

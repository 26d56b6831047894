/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Authentication processor: logon and logout exchange.
//!
//! On start it sends the Logon and blocks the pipeline start until the
//! counterparty confirms (or the logon timeout expires). The confirmation is
//! checked against what we sent: HeartBtInt, ResetSeqNumFlag, and
//! TestMessageIndicator must all echo back. Outbound application traffic is
//! held until the session is logged in; on stop it runs the Logout exchange.

use crate::context::EngineContext;
use async_trait::async_trait;
use fixweave_core::error::SessionError;
use fixweave_core::message::{Message, MsgType};
use fixweave_core::tags;
use fixweave_pipeline::{
    Dispatched, Dispatcher, Envelope, HandlerFuture, Processor, ProcessorError, StopCause,
};
use fixweave_session::SessionStatus;
use tokio::sync::watch;
use tracing::{info, warn};

/// Drives the administrative session bracket: Logon in, Logout out.
#[derive(Debug)]
pub struct AuthProcessor {
    ctx: EngineContext,
    /// Whether this session sends ResetSeqNumFlag=Y (config, or forced when
    /// the sid could not be resumed).
    reset_seq_nums: bool,
    dispatcher: Dispatcher<Self>,
    logged_in: watch::Sender<bool>,
    logged_out: watch::Sender<bool>,
}

impl AuthProcessor {
    /// Creates the processor from the engine context.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        let reset_seq_nums = ctx.config.reset_on_logon || !ctx.resumed;
        let dispatcher = Dispatcher::new()
            .route(MsgType::Logon, logon_shim)
            .route(MsgType::Logout, logout_shim);
        Self {
            ctx,
            reset_seq_nums,
            dispatcher,
            logged_in: watch::Sender::new(false),
            logged_out: watch::Sender::new(false),
        }
    }

    /// Validates the counterparty's Logon echo against what we sent.
    async fn on_logon(&self, message: Message) -> Result<Option<Message>, ProcessorError> {
        let confirmed_interval = message
            .get(tags::HEART_BT_INT)
            .and_then(|f| f.as_u64().ok())
            .ok_or(SessionError::LogonRejected {
                reason: "logon response missing HeartBtInt".into(),
            })?;
        if confirmed_interval != self.ctx.config.heartbeat_interval {
            return Err(SessionError::LogonMismatch {
                field: "HeartBtInt".into(),
                sent: self.ctx.config.heartbeat_interval.to_string(),
                received: confirmed_interval.to_string(),
            }
            .into());
        }

        let echoed_reset = message
            .get(tags::RESET_SEQ_NUM_FLAG)
            .and_then(|f| f.as_bool().ok())
            .unwrap_or(false);
        if echoed_reset != self.reset_seq_nums {
            return Err(SessionError::LogonMismatch {
                field: "ResetSeqNumFlag".into(),
                sent: flag(self.reset_seq_nums).into(),
                received: flag(echoed_reset).into(),
            }
            .into());
        }

        let echoed_test_mode = message
            .get(tags::TEST_MESSAGE_INDICATOR)
            .and_then(|f| f.as_bool().ok())
            .unwrap_or(false);
        if echoed_test_mode != self.ctx.config.test_mode {
            return Err(SessionError::LogonMismatch {
                field: "TestMessageIndicator".into(),
                sent: flag(self.ctx.config.test_mode).into(),
                received: flag(echoed_test_mode).into(),
            }
            .into());
        }

        self.ctx
            .core
            .transition(SessionStatus::LoggedIn)
            .map_err(ProcessorError::from)?;
        info!("logged in");
        let _ = self.logged_in.send(true);
        Ok(Some(message))
    }

    /// The peer's Logout: the confirmation of ours, or their initiative.
    async fn on_logout(&self, message: Message) -> Result<Option<Message>, ProcessorError> {
        let status = self.ctx.core.status();
        if status == SessionStatus::LogoutSent {
            info!("logout confirmed by counterparty");
        } else {
            info!("counterparty initiated logout");
            let _ = self.ctx.core.transition(SessionStatus::LogoutSent);
        }
        let _ = self.logged_out.send(true);
        self.ctx.handle.shutdown(StopCause::Requested);
        Ok(Some(message))
    }

    async fn await_flag(tx: &watch::Sender<bool>) {
        let mut rx = tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value { "Y" } else { "N" }
}

fn logon_shim(p: &AuthProcessor, m: Message) -> HandlerFuture<'_> {
    Box::pin(p.on_logon(m))
}

fn logout_shim(p: &AuthProcessor, m: Message) -> HandlerFuture<'_> {
    Box::pin(p.on_logout(m))
}

#[async_trait]
impl Processor for AuthProcessor {
    fn name(&self) -> &str {
        "authentication"
    }

    async fn start(&self) -> Result<(), ProcessorError> {
        let config = &self.ctx.config;
        let mut logon = Message::logon(
            &config.username,
            &config.password,
            config.heartbeat_interval,
            self.reset_seq_nums,
        );
        if config.test_mode {
            let _ = logon.set(tags::TEST_MESSAGE_INDICATOR, &b"Y"[..]);
        }
        if self.reset_seq_nums {
            self.ctx.core.sequences().reset();
        }

        info!(reset = self.reset_seq_nums, "logging in");
        self.ctx.handle.send(logon);
        self.ctx
            .core
            .transition(SessionStatus::LogonSent)
            .map_err(ProcessorError::from)?;

        match tokio::time::timeout(config.logon_timeout(), Self::await_flag(&self.logged_in)).await
        {
            Ok(()) => Ok(()),
            Err(_) => {
                let _ = self.ctx.core.transition(SessionStatus::Errored);
                Err(SessionError::Timeout {
                    what: "logon".into(),
                    timeout_ms: config.logon_timeout().as_millis() as u64,
                }
                .into())
            }
        }
    }

    async fn stop(&self) -> Result<(), ProcessorError> {
        let status = self.ctx.core.status();
        if matches!(status, SessionStatus::LoggedIn | SessionStatus::Resending) {
            info!("logging out");
            self.ctx.handle.send(Message::logout(None));
            let _ = self.ctx.core.transition(SessionStatus::LogoutSent);

            let deadline = self.ctx.config.logout_timeout();
            if tokio::time::timeout(deadline, Self::await_flag(&self.logged_out))
                .await
                .is_err()
            {
                warn!("no logout confirmation; disconnecting anyway");
            }
        }
        let _ = self.ctx.core.transition(SessionStatus::Disconnected);
        Ok(())
    }

    async fn on_receive(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        let Envelope::Parsed(message) = envelope else {
            return Ok(Some(envelope));
        };
        match self.dispatcher.dispatch(self, message).await? {
            Dispatched::Handled(out) => Ok(out.map(Envelope::Parsed)),
            Dispatched::Unhandled(message) => Ok(Some(Envelope::Parsed(message))),
        }
    }

    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        // Application traffic waits for the session; admin traffic (the
        // Logon itself, Heartbeats, the resend machinery) flows freely.
        if let Envelope::Parsed(message) = &envelope
            && message.msg_type().is_app()
            && !*self.logged_in.borrow()
        {
            let deadline = self.ctx.config.logon_timeout();
            if tokio::time::timeout(deadline, Self::await_flag(&self.logged_in))
                .await
                .is_err()
            {
                return Err(SessionError::Timeout {
                    what: "outbound hold for logon".into(),
                    timeout_ms: deadline.as_millis() as u64,
                }
                .into());
            }
        }
        Ok(Some(envelope))
    }
}

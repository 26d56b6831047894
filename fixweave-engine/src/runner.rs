/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Engine runner: session bootstrap, lifecycle, and exit codes.
//!
//! The runner resolves the session identity, opens the configured message
//! store, restores sequence numbers on resume, assembles the pipeline from
//! the registry, and finally maps the pipeline's stop cause onto the
//! process exit code contract.

use crate::broker::BrokerLink;
use crate::context::EngineContext;
use crate::registry::build_processors;
use fixweave_pipeline::{Pipeline, StopCause};
use fixweave_session::{SessionConfig, SessionCore, SidFile, StoreSelector};
use fixweave_store::{Direction, FileStore, MemoryStore, MessageStore};
use fixweave_tagvalue::TemplateRegistry;
use std::sync::Arc;
use tracing::{error, info};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Normal logout.
    CleanLogout = 0,
    /// Fatal protocol error: sequence mismatch, malformed logon response.
    ProtocolError = 1,
    /// Transport failure or unresponsive counterparty.
    TransportFailure = 2,
    /// Unusable configuration.
    ConfigError = 3,
}

impl ExitCode {
    /// The numeric code handed to the OS.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Maps a pipeline stop cause to its exit code.
#[must_use]
pub fn exit_code_for(cause: &StopCause) -> ExitCode {
    match cause {
        StopCause::Requested => ExitCode::CleanLogout,
        StopCause::Protocol(_) | StopCause::Processor(_) => ExitCode::ProtocolError,
        StopCause::Transport(_) => ExitCode::TransportFailure,
    }
}

/// One configured FIX client engine.
pub struct Engine {
    config: SessionConfig,
    templates: TemplateRegistry,
    broker: Option<Arc<dyn BrokerLink>>,
}

impl Engine {
    /// Creates an engine from its configuration.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            templates: TemplateRegistry::new(),
            broker: None,
        }
    }

    /// Supplies repeating-group templates for the wire codec.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    /// Connects a pub/sub broker (required when `pipeline_apps` names
    /// `broker`).
    #[must_use]
    pub fn with_broker(mut self, broker: Arc<dyn BrokerLink>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Runs the session to completion and returns the exit code.
    pub async fn run(self) -> ExitCode {
        match self.run_inner().await {
            Ok(code) => code,
            Err(code) => code,
        }
    }

    async fn run_inner(self) -> Result<ExitCode, ExitCode> {
        let Self {
            config,
            templates,
            broker,
        } = self;

        if let Err(e) = config.validate() {
            error!(error = %e, "configuration rejected");
            return Err(ExitCode::ConfigError);
        }

        // Session identity: resume unless a reset was asked for.
        let sid = SidFile::new(config.sid_path());
        let identity = sid.load_or_create(config.reset_on_logon).map_err(|e| {
            error!(error = %e, "cannot read or write sid file");
            ExitCode::ConfigError
        })?;

        let store: Arc<dyn MessageStore> = match config.message_store {
            StoreSelector::Memory => Arc::new(MemoryStore::new()),
            StoreSelector::File => Arc::new(
                FileStore::open(config.store_path()).await.map_err(|e| {
                    error!(error = %e, "cannot open message store");
                    ExitCode::ConfigError
                })?,
            ),
        };

        let core = if identity.resumed {
            let next_send = current_plus_one(&*store, Direction::Sent).await?;
            let next_expect = current_plus_one(&*store, Direction::Received).await?;
            info!(sid = %identity.sid, next_send, next_expect, "resuming session");
            Arc::new(SessionCore::resumed(identity.sid.clone(), next_send, next_expect))
        } else {
            for direction in [Direction::Sent, Direction::Received] {
                if store.reset(direction).await.is_err() {
                    error!("cannot clear message store for new session");
                    return Err(ExitCode::ConfigError);
                }
            }
            info!(sid = %identity.sid, "starting new session");
            Arc::new(SessionCore::new(identity.sid.clone()))
        };

        let (handle, wiring) = Pipeline::channel();
        let ctx = EngineContext {
            config: Arc::new(config),
            core,
            store,
            handle: handle.clone(),
            templates,
            resumed: identity.resumed,
        };

        let processors = build_processors(&ctx, broker).map_err(|e| {
            error!(error = %e, "cannot build pipeline");
            ExitCode::ConfigError
        })?;

        let cause = Pipeline::new(handle, wiring, processors).run().await;
        let code = exit_code_for(&cause);
        info!(?cause, code = code.code(), "session finished");
        Ok(code)
    }
}

async fn current_plus_one(
    store: &dyn MessageStore,
    direction: Direction,
) -> Result<u64, ExitCode> {
    store
        .current_seq(direction)
        .await
        .map(|seq| seq + 1)
        .map_err(|e| {
            error!(error = %e, "cannot read sequence numbers from store");
            ExitCode::ConfigError
        })
}

/// Installs the default tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}

/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Shared construction context for the engine processors.
//!
//! Everything a processor needs is handed to it here at construction time;
//! no component reaches for ambient configuration after start.

use fixweave_pipeline::PipelineHandle;
use fixweave_session::{SessionConfig, SessionCore};
use fixweave_store::MessageStore;
use fixweave_tagvalue::TemplateRegistry;
use std::sync::Arc;

/// The context threaded through processor construction.
#[derive(Clone)]
pub struct EngineContext {
    /// Session configuration.
    pub config: Arc<SessionConfig>,
    /// Shared status machine and sequence counters.
    pub core: Arc<SessionCore>,
    /// Message persistence.
    pub store: Arc<dyn MessageStore>,
    /// Handle for enqueueing traffic and requesting shutdown.
    pub handle: PipelineHandle,
    /// Repeating-group templates for the wire codec.
    pub templates: TemplateRegistry,
    /// True when this run resumed an existing session id.
    pub resumed: bool,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("connection", &self.config.connection_name)
            .field("session_id", &self.core.session_id())
            .field("resumed", &self.resumed)
            .finish_non_exhaustive()
    }
}

/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave
//!
//! A client-side FIX engine built around a bidirectional pipeline of async
//! processors.
//!
//! fixweave decodes and encodes tag=value wire messages, maintains the FIX
//! session (heartbeats, logon/logout, sequence continuity, gap recovery
//! over a durable message store), and pushes every message through an
//! ordered chain of pluggable processors.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use fixweave::prelude::*;
//!
//! let config = SessionConfig::new(
//!     "prod",
//!     CompId::new("CLIENT").unwrap(),
//!     CompId::new("BROKER").unwrap(),
//! )
//! .with_endpoint("fix.example.com", 9876)
//! .with_credentials("user", "secret");
//!
//! let code = Engine::new(config).run().await;
//! std::process::exit(code.code());
//! ```
//!
//! ## Crate organization
//!
//! - [`core`]: fields, field maps, messages, errors, the tag dictionary
//! - [`tagvalue`]: the wire codec and group-template registry
//! - [`store`]: direction-keyed message persistence
//! - [`session`]: configuration, state machine, sequences, heartbeats
//! - [`pipeline`]: the processor chain and dispatcher
//! - [`transport`]: byte transports and the frame splitter
//! - [`engine`]: the concrete processors and the runner

pub mod core {
    //! Message model and error types.
    pub use fixweave_core::*;
}

pub mod tagvalue {
    //! tag=value wire codec.
    pub use fixweave_tagvalue::*;
}

pub mod store {
    //! Message persistence.
    pub use fixweave_store::*;
}

pub mod session {
    //! Session layer state.
    pub use fixweave_session::*;
}

pub mod pipeline {
    //! The processor pipeline.
    pub use fixweave_pipeline::*;
}

pub mod transport {
    //! Byte transports.
    pub use fixweave_transport::*;
}

pub mod engine {
    //! Concrete processors and the runner.
    pub use fixweave_engine::*;
}

/// The names most embedders need.
pub mod prelude {
    pub use fixweave_core::{CompId, Field, FieldMap, Group, GroupTemplate, Message, MsgType};
    pub use fixweave_engine::{Engine, ExitCode};
    pub use fixweave_pipeline::{Envelope, Pipeline, PipelineHandle, Processor, ProcessorError};
    pub use fixweave_session::{SessionConfig, SessionStatus, StoreSelector};
    pub use fixweave_store::{Direction, MessageStore};
    pub use fixweave_tagvalue::{Decoder, Encoder, TemplateRegistry};
}

/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! The bidirectional processor pipeline.
//!
//! Processors are ordered `[P0, .., Pn-1]` with P0 at the top (application
//! side) and Pn-1 at the bottom (wire side). Inbound envelopes traverse
//! Pn-1 → P0, outbound P0 → Pn-1. Each direction runs on its own worker so
//! the two progress independently, while traversal within a direction is
//! strictly serial: message N+1 does not enter the chain until message N has
//! left it.

use crate::processor::{Envelope, Processor};
use fixweave_core::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long each processor gets to start before the pipeline gives up.
pub const START_TIMEOUT: Duration = Duration::from_secs(10);
/// How long each processor gets to stop before the pipeline moves on.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the pipeline came to rest. The supervisor maps this to an exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    /// Orderly shutdown: local request or a clean peer logout.
    Requested,
    /// Fatal protocol violation (sequence mismatch, bad logon response).
    Protocol(String),
    /// The transport failed or disconnected unexpectedly.
    Transport(String),
    /// A processor raised an unrecoverable error.
    Processor(String),
}

/// Cloneable handle for feeding the pipeline.
///
/// `send` is the outbound-inject entry point: it places a message at the top
/// of the outbound pipeline, whether it comes from a handler or a broker
/// subscription.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    outbound_tx: mpsc::UnboundedSender<Envelope>,
    stop_tx: mpsc::UnboundedSender<StopCause>,
}

impl PipelineHandle {
    /// Enqueues a message for outbound traversal from the top.
    pub fn send(&self, message: Message) {
        let _ = self.outbound_tx.send(Envelope::Parsed(message));
    }

    /// Enqueues an envelope for inbound traversal from the bottom.
    pub fn receive(&self, envelope: Envelope) {
        let _ = self.inbound_tx.send(envelope);
    }

    /// Requests a pipeline stop with the given cause. The first cause wins;
    /// later calls are ignored.
    pub fn shutdown(&self, cause: StopCause) {
        let _ = self.stop_tx.send(cause);
    }
}

/// Receiver bundle created alongside a [`PipelineHandle`].
///
/// Normally consumed by [`Pipeline::new`]; the accessors below let a harness
/// drive processors directly and observe what they enqueue.
#[derive(Debug)]
pub struct PipelineWiring {
    inbound_rx: mpsc::UnboundedReceiver<Envelope>,
    outbound_rx: mpsc::UnboundedReceiver<Envelope>,
    stop_rx: mpsc::UnboundedReceiver<StopCause>,
}

impl PipelineWiring {
    /// Takes the next queued outbound envelope, if any.
    pub fn try_next_outbound(&mut self) -> Option<Envelope> {
        self.outbound_rx.try_recv().ok()
    }

    /// Takes the next queued inbound envelope, if any.
    pub fn try_next_inbound(&mut self) -> Option<Envelope> {
        self.inbound_rx.try_recv().ok()
    }

    /// Takes the next requested stop cause, if any.
    pub fn try_next_stop(&mut self) -> Option<StopCause> {
        self.stop_rx.try_recv().ok()
    }
}

/// An assembled pipeline, ready to run.
pub struct Pipeline {
    processors: Arc<[Arc<dyn Processor>]>,
    handle: PipelineHandle,
    wiring: PipelineWiring,
}

impl Pipeline {
    /// Creates the handle/wiring pair. The handle can be cloned into
    /// processors before the pipeline itself is assembled.
    #[must_use]
    pub fn channel() -> (PipelineHandle, PipelineWiring) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        (
            PipelineHandle {
                inbound_tx,
                outbound_tx,
                stop_tx,
            },
            PipelineWiring {
                inbound_rx,
                outbound_rx,
                stop_rx,
            },
        )
    }

    /// Assembles a pipeline from its wiring and ordered processors
    /// (top first).
    #[must_use]
    pub fn new(
        handle: PipelineHandle,
        wiring: PipelineWiring,
        processors: Vec<Arc<dyn Processor>>,
    ) -> Self {
        info!(
            apps = ?processors.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            "assembled pipeline"
        );
        Self {
            processors: processors.into(),
            handle,
            wiring,
        }
    }

    /// Returns a handle for feeding this pipeline.
    #[must_use]
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Runs the pipeline to completion.
    ///
    /// Workers for both directions are spawned first so traffic can flow
    /// while processors start (bottom-up). The call returns after a stop was
    /// requested and every processor's `stop` ran (top-down, errors
    /// collected).
    pub async fn run(self) -> StopCause {
        let Self {
            processors,
            handle,
            mut wiring,
        } = self;

        let inbound_worker = spawn_worker(
            Arc::clone(&processors),
            wiring.inbound_rx,
            TraversalDirection::Inbound,
            handle.clone(),
        );
        let outbound_worker = spawn_worker(
            Arc::clone(&processors),
            wiring.outbound_rx,
            TraversalDirection::Outbound,
            handle.clone(),
        );

        // Start bottom-up: each app may assume everything below it is live.
        for processor in processors.iter().rev() {
            info!(app = processor.name(), "starting");
            match tokio::time::timeout(START_TIMEOUT, processor.start()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(app = processor.name(), error = %e, "failed to start");
                    handle.shutdown(StopCause::Processor(format!(
                        "{} failed to start: {e}",
                        processor.name()
                    )));
                    break;
                }
                Err(_) => {
                    error!(app = processor.name(), "start timed out");
                    handle.shutdown(StopCause::Processor(format!(
                        "{} start timed out",
                        processor.name()
                    )));
                    break;
                }
            }
        }

        let cause = wiring
            .stop_rx
            .recv()
            .await
            .unwrap_or(StopCause::Requested);
        info!(?cause, "stopping pipeline");

        // Stop top-down; a misbehaving stop must not block the rest.
        for processor in processors.iter() {
            match tokio::time::timeout(STOP_TIMEOUT, processor.stop()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(app = processor.name(), error = %e, "error while stopping"),
                Err(_) => warn!(app = processor.name(), "stop timed out"),
            }
        }

        inbound_worker.abort();
        outbound_worker.abort();

        info!("pipeline stopped");
        cause
    }
}

#[derive(Debug, Clone, Copy)]
enum TraversalDirection {
    Inbound,
    Outbound,
}

fn spawn_worker(
    processors: Arc<[Arc<dyn Processor>]>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    direction: TraversalDirection,
    handle: PipelineHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let mut current = Some(envelope);

            let order: Box<dyn Iterator<Item = &Arc<dyn Processor>> + Send> = match direction {
                TraversalDirection::Inbound => Box::new(processors.iter().rev()),
                TraversalDirection::Outbound => Box::new(processors.iter()),
            };

            for processor in order {
                let Some(envelope) = current.take() else { break };
                let result = match direction {
                    TraversalDirection::Inbound => processor.on_receive(envelope).await,
                    TraversalDirection::Outbound => processor.on_send(envelope).await,
                };
                match result {
                    Ok(next) => current = next,
                    Err(e) => {
                        error!(
                            app = processor.name(),
                            direction = ?direction,
                            error = %e,
                            "processor failed; stopping pipeline"
                        );
                        handle.shutdown(StopCause::Processor(format!(
                            "{}: {e}",
                            processor.name()
                        )));
                        return;
                    }
                }
            }
        }
    })
}

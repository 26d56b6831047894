/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Transport processor: the bottom of the pipeline.
//!
//! Owns the connection: a reader task feeds framed bytes into the inbound
//! pipeline, outbound raw envelopes are written to the socket, and a peer
//! disconnect surfaces as a transport stop cause. Receive-loop cancellation
//! belongs to this processor (the transport owner), not the pipeline.

use crate::context::EngineContext;
use async_trait::async_trait;
use bytes::BytesMut;
use fixweave_pipeline::{Envelope, PipelineHandle, Processor, ProcessorError, StopCause};
use fixweave_session::SessionStatus;
use fixweave_transport::{FrameCodec, TcpTransport, Transport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder as _;
use tracing::{error, info, warn};

/// Connects the pipeline to the byte stream.
pub struct TransportProcessor {
    ctx: EngineContext,
    /// Pre-wired transport (tests, acceptors); `None` means dial out.
    preset: parking_lot::Mutex<Option<Arc<dyn Transport>>>,
    active: tokio::sync::Mutex<Option<Arc<dyn Transport>>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl TransportProcessor {
    /// Creates a processor that dials `host:port` from the config on start.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            preset: parking_lot::Mutex::new(None),
            active: tokio::sync::Mutex::new(None),
            reader: parking_lot::Mutex::new(None),
        }
    }

    /// Creates a processor over an already-established transport.
    #[must_use]
    pub fn with_transport(ctx: EngineContext, transport: Arc<dyn Transport>) -> Self {
        let this = Self::new(ctx);
        *this.preset.lock() = Some(transport);
        this
    }
}

/// Reads chunks, cuts frames, and feeds them to the pipeline until EOF or a
/// read error.
async fn read_loop(
    transport: Arc<dyn Transport>,
    handle: PipelineHandle,
    max_message_size: usize,
) {
    let mut codec = FrameCodec::new().with_max_message_size(max_message_size);
    let mut buf = BytesMut::with_capacity(8 * 1024);

    loop {
        match transport.read().await {
            Ok(Some(chunk)) => {
                buf.extend_from_slice(&chunk);
                loop {
                    match codec.decode(&mut buf) {
                        Ok(Some(frame)) => handle.receive(Envelope::Raw(frame.freeze())),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "framing error; scanning for next message");
                            if !FrameCodec::resync(&mut buf) {
                                break;
                            }
                        }
                    }
                }
            }
            Ok(None) => {
                info!("connection closed by peer");
                handle.shutdown(StopCause::Transport("connection closed by peer".into()));
                return;
            }
            Err(e) => {
                error!(error = %e, "transport read failed");
                handle.shutdown(StopCause::Transport(e.to_string()));
                return;
            }
        }
    }
}

#[async_trait]
impl Processor for TransportProcessor {
    fn name(&self) -> &str {
        "transport"
    }

    async fn start(&self) -> Result<(), ProcessorError> {
        self.ctx
            .core
            .transition(SessionStatus::Connecting)
            .map_err(ProcessorError::from)?;

        let preset = self.preset.lock().take();
        let transport: Arc<dyn Transport> = match preset {
            Some(preset) => preset,
            None => {
                let config = &self.ctx.config;
                Arc::new(
                    TcpTransport::connect(&config.host, config.port)
                        .await
                        .map_err(|e| ProcessorError::Fix(e.into()))?,
                )
            }
        };

        *self.active.lock().await = Some(Arc::clone(&transport));
        let task = tokio::spawn(read_loop(
            transport,
            self.ctx.handle.clone(),
            self.ctx.config.max_message_size,
        ));
        *self.reader.lock() = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ProcessorError> {
        if let Some(task) = self.reader.lock().take() {
            task.abort();
        }
        if let Some(transport) = self.active.lock().await.take()
            && let Err(e) = transport.close().await
        {
            warn!(error = %e, "error closing transport");
        }
        Ok(())
    }

    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        let Envelope::Raw(bytes) = &envelope else {
            // A parsed message at the wire boundary means the pipeline is
            // misconfigured (no wire processor above us).
            return Err(ProcessorError::Failed(
                "unencoded message reached the transport".into(),
            ));
        };

        let guard = self.active.lock().await;
        let Some(transport) = guard.as_ref() else {
            return Err(ProcessorError::Failed("transport not connected".into()));
        };
        if let Err(e) = transport.write(bytes).await {
            error!(error = %e, "transport write failed");
            self.ctx
                .handle
                .shutdown(StopCause::Transport(e.to_string()));
            return Ok(None);
        }
        Ok(Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use fixweave_tagvalue::{checksum, encode_checksum};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn frame(body: &str) -> Vec<u8> {
        let mut msg = format!("8=FIX.4.4\x019={}\x01{}", body.len(), body).into_bytes();
        let sum = checksum(&msg);
        msg.extend_from_slice(b"10=");
        msg.extend_from_slice(&encode_checksum(sum));
        msg.push(0x01);
        msg
    }

    #[tokio::test]
    async fn reader_feeds_frames_into_pipeline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (ctx, mut wiring) = test_context();
        let transport = TransportProcessor::new(EngineContext {
            config: Arc::new(
                (*ctx.config).clone().with_endpoint("127.0.0.1", addr.port()),
            ),
            ..ctx.clone()
        });

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // Two frames split across three writes.
            let data = [frame("35=0\x0134=1\x01"), frame("35=1\x0134=2\x01112=x\x01")].concat();
            sock.write_all(&data[..10]).await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            sock.write_all(&data[10..]).await.unwrap();
            sock
        });

        transport.start().await.unwrap();
        let _sock = server.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let first = wiring.try_next_inbound().unwrap();
        assert!(first.bytes().unwrap().starts_with(b"8=FIX.4.4"));
        let second = wiring.try_next_inbound().unwrap();
        assert!(second.bytes().is_some());
        assert!(wiring.try_next_inbound().is_none());

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn preset_transport_skips_dialing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&frame("35=0\x0134=1\x01")).await.unwrap();
            sock
        });

        // An acceptor-style connection established before the processor
        // exists. The context still points at a dead endpoint, proving the
        // processor never dials when pre-wired.
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let preset: Arc<dyn Transport> = Arc::new(TcpTransport::from_stream(stream));

        let (ctx, mut wiring) = test_context();
        let transport = TransportProcessor::with_transport(
            EngineContext {
                config: Arc::new((*ctx.config).clone().with_endpoint("127.0.0.1", 1)),
                ..ctx.clone()
            },
            preset,
        );

        transport.start().await.unwrap();
        let _sock = server.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let inbound = wiring.try_next_inbound().unwrap();
        assert!(inbound.bytes().unwrap().starts_with(b"8=FIX.4.4"));

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn eof_surfaces_as_transport_stop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (ctx, mut wiring) = test_context();
        let transport = TransportProcessor::new(EngineContext {
            config: Arc::new(
                (*ctx.config).clone().with_endpoint("127.0.0.1", addr.port()),
            ),
            ..ctx.clone()
        });

        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock);
        });

        transport.start().await.unwrap();
        server.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            wiring.try_next_stop(),
            Some(StopCause::Transport(_))
        ));
        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn outbound_bytes_hit_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (ctx, _wiring) = test_context();
        let transport = TransportProcessor::new(EngineContext {
            config: Arc::new(
                (*ctx.config).clone().with_endpoint("127.0.0.1", addr.port()),
            ),
            ..ctx.clone()
        });

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            buf.truncate(n);
            buf
        });

        transport.start().await.unwrap();
        let wire = frame("35=0\x0134=1\x01");
        transport
            .on_send(Envelope::Raw(bytes::Bytes::from(wire.clone())))
            .await
            .unwrap();

        assert_eq!(server.await.unwrap(), wire);
        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dial_failure_fails_start() {
        let (ctx, _wiring) = test_context();
        // Port 1 on localhost should refuse quickly.
        let transport = TransportProcessor::new(EngineContext {
            config: Arc::new((*ctx.config).clone().with_endpoint("127.0.0.1", 1)),
            ..ctx.clone()
        });
        assert!(transport.start().await.is_err());
    }
}

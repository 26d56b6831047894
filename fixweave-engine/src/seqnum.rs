/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Sequence-number processor: continuity, gap recovery, and resend replay.
//!
//! Outbound it stamps MsgSeqNum on everything that is not a possible
//! duplicate. Inbound it enforces the acceptance policy: in-order messages
//! are delivered and the expectation advances; too-high messages are
//! buffered behind a ResendRequest; too-low messages are duplicates (when
//! flagged) or fatal. It also answers the counterparty's ResendRequests by
//! replaying the sent store, collapsing admin runs into gap-fill
//! SequenceResets.

use crate::context::EngineContext;
use async_trait::async_trait;
use fixweave_core::error::SessionError;
use fixweave_core::message::{Message, MsgType};
use fixweave_core::tags;
use fixweave_pipeline::{Envelope, Processor, ProcessorError, StopCause};
use fixweave_session::{SeqCheck, SessionStatus};
use fixweave_store::Direction;
use fixweave_tagvalue::Decoder;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Enforces sequence continuity in both directions.
#[derive(Debug)]
pub struct SeqNumProcessor {
    ctx: EngineContext,
    decoder: Decoder,
    /// Too-high inbound messages parked until the gap closes.
    buffer: Mutex<BTreeMap<u64, Message>>,
    /// The `[begin, end]` range of the outstanding ResendRequest, if any.
    pending_resend: Mutex<Option<(u64, u64)>>,
}

impl SeqNumProcessor {
    /// Creates the processor from the engine context.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        let decoder = Decoder::with_registry(ctx.templates.clone());
        Self {
            ctx,
            decoder,
            buffer: Mutex::new(BTreeMap::new()),
            pending_resend: Mutex::new(None),
        }
    }

    /// Checks the inbound CompIDs against the session identity.
    fn comp_id_reject(&self, message: &Message) -> Option<Message> {
        let seq = message.seq_num().unwrap_or(0);
        let config = &self.ctx.config;

        if message.sender_comp_id() != Some(config.target_comp_id.as_str()) {
            return Some(Message::reject(
                seq,
                Some(tags::SENDER_COMP_ID),
                &format!(
                    "SenderCompID '{}' does not belong to this session",
                    message.sender_comp_id().unwrap_or("")
                ),
            ));
        }
        if message.target_comp_id() != Some(config.sender_comp_id.as_str()) {
            return Some(Message::reject(
                seq,
                Some(tags::TARGET_COMP_ID),
                &format!(
                    "TargetCompID '{}' does not belong to this session",
                    message.target_comp_id().unwrap_or("")
                ),
            ));
        }
        None
    }

    /// SequenceReset skips the normal acceptance check entirely.
    async fn on_sequence_reset(&self, message: &Message) {
        let gap_fill = message
            .get(tags::GAP_FILL_FLAG)
            .and_then(|f| f.as_bool().ok())
            .unwrap_or(false);
        let Some(new_seq) = message.get(tags::NEW_SEQ_NO).and_then(|f| f.as_u64().ok()) else {
            self.ctx.handle.send(Message::reject(
                message.seq_num().unwrap_or(0),
                Some(tags::NEW_SEQ_NO),
                "SequenceReset without NewSeqNo",
            ));
            return;
        };

        let sequences = self.ctx.core.sequences();
        if new_seq > sequences.next_expect() {
            info!(new_seq, gap_fill, "sequence reset advances expectation");
            sequences.set_next_expect(new_seq);
        } else {
            warn!(
                new_seq,
                expected = sequences.next_expect(),
                "ignoring sequence reset that would move backwards"
            );
        }
        self.after_accept().await;
    }

    /// Replays the sent store for the counterparty's ResendRequest.
    async fn on_resend_request(&self, message: &Message) -> Result<(), ProcessorError> {
        let begin = message
            .get(tags::BEGIN_SEQ_NO)
            .and_then(|f| f.as_u64().ok())
            .unwrap_or(1);
        let end = message
            .get(tags::END_SEQ_NO)
            .and_then(|f| f.as_u64().ok())
            .unwrap_or(0);

        let next_send = self.ctx.core.sequences().next_send();
        let effective_end = if end == 0 { next_send.saturating_sub(1) } else { end };
        info!(begin, end, effective_end, "counterparty requested resend");

        let records = self
            .ctx
            .store
            .range(Direction::Sent, begin, effective_end)
            .await?;

        if records.is_empty() {
            // Nothing to replay: tell the peer where the sequence stands.
            self.ctx.handle.send(gap_fill_reset(begin, next_send));
            return Ok(());
        }

        let mut admin_run: Option<(u64, u64)> = None;
        for record in records {
            let decoded = match self.decoder.decode(&record.raw) {
                Ok((msg, _)) => msg,
                Err(e) => {
                    warn!(seq = record.seq_num, error = %e, "unreadable store record skipped");
                    continue;
                }
            };

            if decoded.msg_type().is_admin() {
                admin_run = Some(match admin_run {
                    Some((start, _)) => (start, record.seq_num),
                    None => (record.seq_num, record.seq_num),
                });
                continue;
            }

            if let Some((start, _)) = admin_run.take() {
                self.ctx.handle.send(gap_fill_reset(start, record.seq_num));
            }

            let mut replay = decoded;
            let _ = replay.set(tags::POSS_DUP_FLAG, &b"Y"[..]);
            let _ = replay.set(
                tags::ORIG_SENDING_TIME,
                record.sending_time.to_wire().into_bytes(),
            );
            self.ctx.handle.send(replay);
        }

        if let Some((start, last)) = admin_run {
            self.ctx.handle.send(gap_fill_reset(start, last + 1));
        }
        Ok(())
    }

    /// After any accepted message: re-inject buffered messages that are now
    /// next in line, and settle the gap state once the range is covered.
    async fn after_accept(&self) {
        let sequences = self.ctx.core.sequences();

        let mut buffer = self.buffer.lock().await;
        let mut next = sequences.next_expect();
        while let Some(parked) = buffer.remove(&next) {
            debug!(seq = next, "re-injecting buffered message");
            self.ctx.handle.receive(Envelope::Parsed(parked));
            next += 1;
        }

        let mut pending = self.pending_resend.lock().await;
        if let Some((_, end)) = *pending
            && sequences.next_expect() > end
            && buffer.is_empty()
        {
            *pending = None;
            let _ = self.ctx.core.transition(SessionStatus::LoggedIn);
            info!("gap closed; resuming normal delivery");
        }
    }

    /// Drops all recovery state; a peer-initiated sequence reset makes any
    /// buffered history meaningless.
    async fn discard_recovery_state(&self) {
        self.buffer.lock().await.clear();
        *self.pending_resend.lock().await = None;
    }
}

/// Builds a gap-fill SequenceReset positioned at `at`, pointing to
/// `new_seq_no`. PossDupFlag keeps the outbound stamper's hands off it.
fn gap_fill_reset(at: u64, new_seq_no: u64) -> Message {
    let mut message = Message::sequence_reset(new_seq_no, true);
    message.set_seq_num(at);
    let _ = message.set(tags::POSS_DUP_FLAG, &b"Y"[..]);
    message
}

#[async_trait]
impl Processor for SeqNumProcessor {
    fn name(&self) -> &str {
        "seqnum"
    }

    async fn on_receive(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        let Envelope::Parsed(message) = envelope else {
            return Ok(Some(envelope));
        };

        if let Some(reject) = self.comp_id_reject(&message) {
            warn!("comp id mismatch; rejecting");
            self.ctx.handle.send(reject);
            return Ok(None);
        }

        let Some(seq) = message.seq_num() else {
            self.ctx.handle.send(Message::reject(
                0,
                Some(tags::MSG_SEQ_NUM),
                "missing MsgSeqNum",
            ));
            return Ok(None);
        };

        // A mid-session ResetSeqNumFlag=Y logon obsoletes any recovery in
        // progress: the peer renumbered history out from under it.
        if *message.msg_type() == MsgType::Logon
            && message
                .get(tags::RESET_SEQ_NUM_FLAG)
                .and_then(|f| f.as_bool().ok())
                .unwrap_or(false)
            && self.ctx.core.sequences().next_expect() > 1
        {
            warn!("peer reset sequence numbers; discarding buffered recovery state");
            self.discard_recovery_state().await;
            self.ctx.core.sequences().set_next_expect(1);
        }

        if *message.msg_type() == MsgType::SequenceReset {
            self.on_sequence_reset(&message).await;
            return Ok(None);
        }

        match self.ctx.core.sequences().check_inbound(seq) {
            SeqCheck::InOrder => {
                self.ctx.core.sequences().advance_expect();
                self.after_accept().await;
                if *message.msg_type() == MsgType::ResendRequest {
                    self.on_resend_request(&message).await?;
                }
                Ok(Some(Envelope::Parsed(message)))
            }
            SeqCheck::Gap { expected, received } => {
                self.buffer.lock().await.insert(received, message);
                let mut pending = self.pending_resend.lock().await;
                if pending.is_none() {
                    let end = received - 1;
                    *pending = Some((expected, end));
                    let _ = self.ctx.core.transition(SessionStatus::Resending);
                    error!(expected, received, "sequence gap detected; requesting resend");
                    self.ctx
                        .handle
                        .send(Message::resend_request(expected, end));
                } else {
                    info!(seq = received, "queued while gap fill is in progress");
                }
                Ok(None)
            }
            SeqCheck::TooLow { expected, received } => {
                if message.poss_dup() {
                    debug!(received, "discarding possible duplicate");
                    return Ok(None);
                }
                let cause = SessionError::SequenceTooLow { expected, received };
                error!(%cause, "sequence regression without PossDupFlag is fatal");
                self.ctx
                    .handle
                    .send(Message::logout(Some(&cause.to_string())));
                let _ = self.ctx.core.transition(SessionStatus::Errored);
                self.ctx
                    .handle
                    .shutdown(StopCause::Protocol(cause.to_string()));
                Ok(None)
            }
        }
    }

    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        let Envelope::Parsed(mut message) = envelope else {
            return Ok(Some(envelope));
        };

        // Replayed duplicates keep their original number.
        if !message.poss_dup() {
            let seq = self.ctx.core.sequences().allocate_send();
            message.set_seq_num(seq);
        }
        Ok(Some(Envelope::Parsed(message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use fixweave_core::types::UtcTimestamp;
    use fixweave_pipeline::PipelineWiring;
    use fixweave_tagvalue::Encoder;

    /// Builds an inbound message carrying the counterparty's CompIDs.
    fn inbound(msg_type: MsgType, seq: u64) -> Message {
        let mut msg = Message::new(msg_type);
        msg.set_seq_num(seq);
        msg.set(tags::SENDER_COMP_ID, &b"BROKER"[..]).unwrap();
        msg.set(tags::TARGET_COMP_ID, &b"CLIENT"[..]).unwrap();
        msg
    }

    fn outbound_message(wiring: &mut PipelineWiring) -> Option<Message> {
        wiring.try_next_outbound().and_then(Envelope::into_message)
    }

    async fn seed_sent(ctx: &EngineContext, seq: u64, msg_type: MsgType) {
        let mut msg = Message::new(msg_type);
        msg.set_seq_num(seq);
        msg.set(tags::SENDER_COMP_ID, &b"CLIENT"[..]).unwrap();
        msg.set(tags::TARGET_COMP_ID, &b"BROKER"[..]).unwrap();
        msg.set(tags::SENDING_TIME, &b"20240115-13:00:00"[..]).unwrap();
        let wire = Encoder::default().encode(&msg).unwrap();
        ctx.store
            .put(
                Direction::Sent,
                seq,
                wire.freeze(),
                UtcTimestamp::parse("20240115-13:00:00").unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn outbound_seq_is_monotonic() {
        let (ctx, _wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx);

        for expected in 1..=3 {
            let out = seqnum
                .on_send(Envelope::Parsed(Message::heartbeat(None)))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(out.message().unwrap().seq_num(), Some(expected));
        }
    }

    #[tokio::test]
    async fn duplicates_keep_their_number_on_send() {
        let (ctx, _wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx);

        let mut replay = Message::heartbeat(None);
        replay.set_seq_num(42);
        replay.set(tags::POSS_DUP_FLAG, &b"Y"[..]).unwrap();

        let out = seqnum.on_send(Envelope::Parsed(replay)).await.unwrap().unwrap();
        assert_eq!(out.message().unwrap().seq_num(), Some(42));
    }

    #[tokio::test]
    async fn in_order_messages_are_delivered_once() {
        let (ctx, _wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());

        let out = seqnum
            .on_receive(Envelope::Parsed(inbound(MsgType::Heartbeat, 1)))
            .await
            .unwrap();
        assert!(out.is_some());
        assert_eq!(ctx.core.sequences().next_expect(), 2);
    }

    #[tokio::test]
    async fn gap_detected_buffers_and_requests_resend() {
        let (ctx, mut wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());
        ctx.core.sequences().set_next_expect(2);

        let out = seqnum
            .on_receive(Envelope::Parsed(inbound(MsgType::News, 5)))
            .await
            .unwrap();
        assert!(out.is_none());

        let resend = outbound_message(&mut wiring).unwrap();
        assert_eq!(*resend.msg_type(), MsgType::ResendRequest);
        assert_eq!(resend.get(tags::BEGIN_SEQ_NO).unwrap().as_u64().unwrap(), 2);
        assert_eq!(resend.get(tags::END_SEQ_NO).unwrap().as_u64().unwrap(), 4);

        // A second too-high message queues without another request.
        seqnum
            .on_receive(Envelope::Parsed(inbound(MsgType::News, 6)))
            .await
            .unwrap();
        assert!(outbound_message(&mut wiring).is_none());

        // Replays 2..4 arrive; each is delivered and the buffer drains.
        for seq in 2..=4 {
            let mut replay = inbound(MsgType::News, seq);
            replay.set(tags::POSS_DUP_FLAG, &b"Y"[..]).unwrap();
            let out = seqnum.on_receive(Envelope::Parsed(replay)).await.unwrap();
            assert!(out.is_some(), "replay {seq} should deliver");
        }

        // The buffered 5 and 6 were re-injected at the bottom, in order.
        let first = wiring.try_next_inbound().unwrap().into_message().unwrap();
        assert_eq!(first.seq_num(), Some(5));
        seqnum.on_receive(Envelope::Parsed(first)).await.unwrap();
        let second = wiring.try_next_inbound().unwrap().into_message().unwrap();
        assert_eq!(second.seq_num(), Some(6));
        seqnum.on_receive(Envelope::Parsed(second)).await.unwrap();

        assert_eq!(ctx.core.sequences().next_expect(), 7);
        assert!(wiring.try_next_inbound().is_none());
    }

    #[tokio::test]
    async fn flagged_duplicate_is_discarded_silently() {
        let (ctx, mut wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());
        ctx.core.sequences().set_next_expect(3);

        let mut dup = inbound(MsgType::News, 2);
        dup.set(tags::POSS_DUP_FLAG, &b"Y"[..]).unwrap();

        let out = seqnum.on_receive(Envelope::Parsed(dup)).await.unwrap();
        assert!(out.is_none());
        assert!(outbound_message(&mut wiring).is_none());
        assert!(wiring.try_next_stop().is_none());
        assert_eq!(ctx.core.sequences().next_expect(), 3);
    }

    #[tokio::test]
    async fn unflagged_low_sequence_is_fatal() {
        let (ctx, mut wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());
        ctx.core.sequences().set_next_expect(3);

        let out = seqnum
            .on_receive(Envelope::Parsed(inbound(MsgType::News, 2)))
            .await
            .unwrap();
        assert!(out.is_none());

        let logout = outbound_message(&mut wiring).unwrap();
        assert_eq!(*logout.msg_type(), MsgType::Logout);
        assert!(matches!(
            wiring.try_next_stop(),
            Some(StopCause::Protocol(_))
        ));
        assert!(ctx.core.status().is_errored());
    }

    #[tokio::test]
    async fn comp_id_mismatch_draws_reject_not_death() {
        let (ctx, mut wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());

        let mut msg = Message::new(MsgType::News);
        msg.set_seq_num(1);
        msg.set(tags::SENDER_COMP_ID, &b"INTRUDER"[..]).unwrap();
        msg.set(tags::TARGET_COMP_ID, &b"CLIENT"[..]).unwrap();

        let out = seqnum.on_receive(Envelope::Parsed(msg)).await.unwrap();
        assert!(out.is_none());

        let reject = outbound_message(&mut wiring).unwrap();
        assert_eq!(*reject.msg_type(), MsgType::Reject);
        assert_eq!(reject.get(tags::REF_TAG_ID).unwrap().as_u64().unwrap(), 49);
        assert!(wiring.try_next_stop().is_none());
    }

    #[tokio::test]
    async fn sequence_reset_gap_fill_advances_expectation() {
        let (ctx, _wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());
        ctx.core.sequences().set_next_expect(2);

        let mut reset = inbound(MsgType::SequenceReset, 2);
        reset.set(tags::GAP_FILL_FLAG, &b"Y"[..]).unwrap();
        reset.set(tags::NEW_SEQ_NO, &b"6"[..]).unwrap();

        let out = seqnum.on_receive(Envelope::Parsed(reset)).await.unwrap();
        assert!(out.is_none());
        assert_eq!(ctx.core.sequences().next_expect(), 6);

        // A reset pointing backwards is ignored.
        let mut stale = inbound(MsgType::SequenceReset, 9);
        stale.set(tags::NEW_SEQ_NO, &b"3"[..]).unwrap();
        seqnum.on_receive(Envelope::Parsed(stale)).await.unwrap();
        assert_eq!(ctx.core.sequences().next_expect(), 6);
    }

    #[tokio::test]
    async fn resend_request_replays_apps_and_gap_fills_admins() {
        let (ctx, mut wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());

        seed_sent(&ctx, 2, MsgType::NewOrderSingle).await;
        seed_sent(&ctx, 3, MsgType::Heartbeat).await;
        seed_sent(&ctx, 4, MsgType::NewOrderSingle).await;

        let mut request = inbound(MsgType::ResendRequest, 1);
        request.set(tags::BEGIN_SEQ_NO, &b"2"[..]).unwrap();
        request.set(tags::END_SEQ_NO, &b"4"[..]).unwrap();

        let out = seqnum.on_receive(Envelope::Parsed(request)).await.unwrap();
        assert!(out.is_some());

        // Replay of 2, with PossDupFlag and the original sending time.
        let replay = outbound_message(&mut wiring).unwrap();
        assert_eq!(*replay.msg_type(), MsgType::NewOrderSingle);
        assert_eq!(replay.seq_num(), Some(2));
        assert!(replay.poss_dup());
        assert_eq!(
            replay.get_str(tags::ORIG_SENDING_TIME),
            Some("20240115-13:00:00")
        );

        // The heartbeat at 3 collapses into a gap-fill to 4.
        let reset = outbound_message(&mut wiring).unwrap();
        assert_eq!(*reset.msg_type(), MsgType::SequenceReset);
        assert_eq!(reset.get_str(tags::GAP_FILL_FLAG), Some("Y"));
        assert_eq!(reset.get(tags::NEW_SEQ_NO).unwrap().as_u64().unwrap(), 4);

        // Replay of 4.
        let replay = outbound_message(&mut wiring).unwrap();
        assert_eq!(replay.seq_num(), Some(4));
        assert!(replay.poss_dup());

        assert!(outbound_message(&mut wiring).is_none());
    }

    #[tokio::test]
    async fn resend_request_over_empty_store_sends_single_reset() {
        let (ctx, mut wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());
        ctx.core.sequences().set_next_send(8);

        let mut request = inbound(MsgType::ResendRequest, 1);
        request.set(tags::BEGIN_SEQ_NO, &b"1"[..]).unwrap();
        request.set(tags::END_SEQ_NO, &b"0"[..]).unwrap();

        seqnum.on_receive(Envelope::Parsed(request)).await.unwrap();

        let reset = outbound_message(&mut wiring).unwrap();
        assert_eq!(*reset.msg_type(), MsgType::SequenceReset);
        assert_eq!(reset.get_str(tags::GAP_FILL_FLAG), Some("Y"));
        assert_eq!(reset.get(tags::NEW_SEQ_NO).unwrap().as_u64().unwrap(), 8);
        assert!(outbound_message(&mut wiring).is_none());
    }

    #[tokio::test]
    async fn mid_session_reset_logon_discards_recovery_state() {
        let (ctx, mut wiring) = test_context();
        let seqnum = SeqNumProcessor::new(ctx.clone());
        ctx.core.sequences().set_next_expect(4);

        // Open a gap so there is state to discard.
        seqnum
            .on_receive(Envelope::Parsed(inbound(MsgType::News, 7)))
            .await
            .unwrap();
        assert!(outbound_message(&mut wiring).is_some()); // the ResendRequest

        let mut logon = inbound(MsgType::Logon, 1);
        logon.set(tags::RESET_SEQ_NUM_FLAG, &b"Y"[..]).unwrap();
        logon.set(tags::HEART_BT_INT, &b"30"[..]).unwrap();

        let out = seqnum.on_receive(Envelope::Parsed(logon)).await.unwrap();
        assert!(out.is_some(), "the reset logon itself is delivered");
        assert_eq!(ctx.core.sequences().next_expect(), 2);
        // The parked message at 7 is gone, not re-injected.
        assert!(wiring.try_next_inbound().is_none());
    }
}

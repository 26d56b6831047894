/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Heartbeat and TestRequest timing.
//!
//! The monitor tracks outbound and inbound silence against the negotiated
//! interval. Outbound silence past the interval calls for a Heartbeat;
//! inbound silence past the interval plus a grace period calls for a
//! TestRequest; continued silence past another grace window is a dead peer.

use std::time::{Duration, Instant};

/// What the heartbeat monitor wants done right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Everything on schedule; check again at the embedded deadline.
    Wait(Duration),
    /// Outbound silence reached the interval: emit a Heartbeat.
    SendHeartbeat,
    /// Inbound silence reached interval + grace: emit a TestRequest.
    SendTestRequest,
    /// The outstanding TestRequest expired: the peer is gone.
    PeerDead {
        /// How long the inbound side has been silent.
        silent_for: Duration,
    },
}

/// Heartbeat state for one session.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    grace: Duration,
    last_sent: Instant,
    last_received: Instant,
    outstanding: Option<OutstandingProbe>,
}

#[derive(Debug)]
struct OutstandingProbe {
    test_req_id: String,
    sent_at: Instant,
}

impl HeartbeatMonitor {
    /// Creates a monitor with the given interval and grace period.
    #[must_use]
    pub fn new(interval: Duration, grace: Duration) -> Self {
        let now = Instant::now();
        Self {
            interval,
            grace,
            last_sent: now,
            last_received: now,
            outstanding: None,
        }
    }

    /// Replaces the interval, e.g. after the counterparty's Logon confirms a
    /// different HeartBtInt. Keeps the grace in proportion.
    pub fn set_interval(&mut self, interval: Duration) {
        let ratio = if self.interval.is_zero() {
            0.2
        } else {
            self.grace.as_secs_f64() / self.interval.as_secs_f64()
        };
        self.interval = interval;
        self.grace = interval.mul_f64(ratio);
    }

    /// The current interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Records an outbound message.
    pub fn on_sent(&mut self) {
        self.last_sent = Instant::now();
    }

    /// Records an inbound message; a Heartbeat echoing the outstanding
    /// TestReqID settles the probe.
    pub fn on_received(&mut self, is_heartbeat: bool, test_req_id: Option<&str>) {
        self.last_received = Instant::now();
        if is_heartbeat
            && let Some(probe) = &self.outstanding
            && test_req_id == Some(probe.test_req_id.as_str())
        {
            self.outstanding = None;
        }
    }

    /// Records that a TestRequest with `test_req_id` went out.
    pub fn on_test_request_sent(&mut self, test_req_id: String) {
        self.outstanding = Some(OutstandingProbe {
            test_req_id,
            sent_at: Instant::now(),
        });
        self.last_sent = Instant::now();
    }

    /// The TestReqID we are waiting on, if any.
    #[must_use]
    pub fn outstanding(&self) -> Option<&str> {
        self.outstanding.as_ref().map(|p| p.test_req_id.as_str())
    }

    /// Decides the next action from the current clock.
    #[must_use]
    pub fn poll(&self) -> HeartbeatAction {
        let probe_deadline = self.interval + self.grace;

        if let Some(probe) = &self.outstanding {
            let waited = probe.sent_at.elapsed();
            if waited >= probe_deadline {
                return HeartbeatAction::PeerDead {
                    silent_for: self.last_received.elapsed(),
                };
            }
            return HeartbeatAction::Wait(probe_deadline - waited);
        }

        let received_silence = self.last_received.elapsed();
        if received_silence >= probe_deadline {
            return HeartbeatAction::SendTestRequest;
        }

        let sent_silence = self.last_sent.elapsed();
        if sent_silence >= self.interval {
            return HeartbeatAction::SendHeartbeat;
        }

        let next_heartbeat = self.interval - sent_silence;
        let next_probe = probe_deadline - received_silence;
        HeartbeatAction::Wait(next_heartbeat.min(next_probe))
    }
}

/// Generates a unique TestReqID.
#[must_use]
pub fn new_test_req_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

//! Sequential worker for accounting calls.
//!
//! The session never awaits the accounting collaborator; it queues requests
//! here and gets results back as [`MeterEvent`]s. Requests are served in
//! order, each retried per the configured policy.

use std::sync::Arc;

use castr_proto::Mode;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::accounting::{Accounting, TierCounts};
use crate::config::RetryConfig;
use crate::retry::with_retry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterRequest {
    /// Announce the current rate without charging; to one master or all.
    Quote {
        counts: TierCounts,
        only: Option<u32>,
    },
    /// Charge one interval at the rate for `counts`.
    Charge { counts: TierCounts },
    Status(Mode),
    HighWater(u32),
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterEvent {
    CreditRate {
        cost: u32,
        rate: u32,
        only: Option<u32>,
    },
    /// The recording is forgotten; nothing else will be sent.
    Discarded,
}

/// Queue side of the worker. Dropping it lets the worker drain and stop.
#[derive(Debug, Clone)]
pub struct MeterHandle {
    tx: mpsc::UnboundedSender<MeterRequest>,
}

impl MeterHandle {
    pub fn send(&self, request: MeterRequest) {
        if self.tx.send(request).is_err() {
            warn!("accounting worker has stopped");
        }
    }
}

pub fn spawn_meter(
    accounting: Arc<dyn Accounting>,
    rid: u32,
    retry: RetryConfig,
    events: mpsc::UnboundedSender<MeterEvent>,
    tracker: &TaskTracker,
) -> MeterHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tracker.spawn(async move {
        let mut cost = 0u32;
        while let Some(request) = rx.recv().await {
            debug!(rid, ?request, "accounting request");
            match request {
                MeterRequest::Quote { counts, only } => {
                    let Some(rate) =
                        with_retry(&retry, "compute_charge_rate", || {
                            accounting.compute_charge_rate(counts)
                        })
                        .await
                    else {
                        continue;
                    };
                    let _ = events.send(MeterEvent::CreditRate { cost, rate, only });
                }
                MeterRequest::Charge { counts } => {
                    let Some(rate) =
                        with_retry(&retry, "compute_charge_rate", || {
                            accounting.compute_charge_rate(counts)
                        })
                        .await
                    else {
                        continue;
                    };
                    if let Some(total) =
                        with_retry(&retry, "apply_charge", || accounting.apply_charge(rid, rate))
                            .await
                    {
                        cost = total;
                    }
                    let _ = events.send(MeterEvent::CreditRate {
                        cost,
                        rate,
                        only: None,
                    });
                }
                MeterRequest::Status(mode) => {
                    with_retry(&retry, "persist_status", || {
                        accounting.persist_status(rid, mode)
                    })
                    .await;
                }
                MeterRequest::HighWater(count) => {
                    with_retry(&retry, "persist_track_high_water_mark", || {
                        accounting.persist_track_high_water_mark(rid, count)
                    })
                    .await;
                }
                MeterRequest::Discard => {
                    with_retry(&retry, "discard_recording", || {
                        accounting.discard_recording(rid)
                    })
                    .await;
                    let _ = events.send(MeterEvent::Discarded);
                }
            }
        }
        debug!(rid, cost, "accounting worker stopped");
    });
    MeterHandle { tx }
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use castr_proto::Mode;
use serde::Serialize;
use tracing::info;

use crate::config::Pricing;
use crate::error::AccountingError;

/// Tracks counted for a charge, by quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    /// FLAC or continuous tracks.
    pub hq: u32,
    pub basic: u32,
}

/// External accounting and persistence.
///
/// Every call may be retried, so implementations must tolerate repeats.
#[async_trait]
pub trait Accounting: Send + Sync {
    /// Credits per metering interval for the given tracks.
    async fn compute_charge_rate(&self, counts: TierCounts) -> Result<u32, AccountingError>;

    /// Add `rate` to the recording's cost. Returns the cumulative cost.
    async fn apply_charge(&self, rid: u32, rate: u32) -> Result<u32, AccountingError>;

    async fn persist_status(&self, rid: u32, mode: Mode) -> Result<(), AccountingError>;

    /// Record that the recording has at least `count` tracks.
    async fn persist_track_high_water_mark(&self, rid: u32, count: u32)
        -> Result<(), AccountingError>;

    /// Forget a recording that never started.
    async fn discard_recording(&self, rid: u32) -> Result<(), AccountingError>;
}

/// Tiered rate for `counts`.
///
/// If any high-quality track is present, the high-quality base charge
/// covers its first `n` tracks, filled up with basic tracks when fewer
/// high-quality ones are present; otherwise the basic base charge covers
/// the first `n` basic tracks. Each track left over adds its tier's
/// surcharge.
pub fn tiered_rate(pricing: &Pricing, counts: TierCounts) -> u32 {
    let TierCounts { mut hq, mut basic } = counts;
    let mut charge = 0u32;
    if hq > 0 {
        charge = pricing.hq.upton;
        if hq < pricing.hq.n {
            let room = pricing.hq.n - hq;
            hq = 0;
            basic = basic.saturating_sub(room);
        } else {
            hq -= pricing.hq.n;
        }
    } else if basic > 0 {
        charge = pricing.basic.upton;
        basic = basic.saturating_sub(pricing.basic.n);
    }
    charge
        .saturating_add(hq.saturating_mul(pricing.hq.plus))
        .saturating_add(basic.saturating_mul(pricing.basic.plus))
}

/// In-process accounting: tiered pricing, costs kept in memory, persistence
/// calls logged.
#[derive(Debug)]
pub struct LocalAccounting {
    pricing: Pricing,
    costs: Mutex<HashMap<u32, u32>>,
}

impl LocalAccounting {
    pub fn new(pricing: Pricing) -> Self {
        Self {
            pricing,
            costs: Mutex::new(HashMap::new()),
        }
    }

    pub fn cost(&self, rid: u32) -> u32 {
        self.costs
            .lock()
            .map(|costs| costs.get(&rid).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl Accounting for LocalAccounting {
    async fn compute_charge_rate(&self, counts: TierCounts) -> Result<u32, AccountingError> {
        Ok(tiered_rate(&self.pricing, counts))
    }

    async fn apply_charge(&self, rid: u32, rate: u32) -> Result<u32, AccountingError> {
        let mut costs = self
            .costs
            .lock()
            .map_err(|_| AccountingError::Unavailable("cost table poisoned".into()))?;
        let cost = costs.entry(rid).or_insert(0);
        *cost = cost.saturating_add(rate);
        Ok(*cost)
    }

    async fn persist_status(&self, rid: u32, mode: Mode) -> Result<(), AccountingError> {
        info!(rid, %mode, "recording status");
        Ok(())
    }

    async fn persist_track_high_water_mark(
        &self,
        rid: u32,
        count: u32,
    ) -> Result<(), AccountingError> {
        info!(rid, tracks = count, "recording track count");
        Ok(())
    }

    async fn discard_recording(&self, rid: u32) -> Result<(), AccountingError> {
        let mut costs = self
            .costs
            .lock()
            .map_err(|_| AccountingError::Unavailable("cost table poisoned".into()))?;
        costs.remove(&rid);
        info!(rid, "recording discarded");
        Ok(())
    }
}

// ============================================================================
// src/io/smbus/stats.rs - Transaction Statistics
// ============================================================================

use core::sync::atomic::{AtomicU64, Ordering};

/// コントローラの統計カウンタ
///
/// 割り込みハンドラからも更新されるためアトミック。
#[derive(Debug, Default)]
pub struct SmbusStats {
    transactions: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    errors: AtomicU64,
    host_notify_events: AtomicU64,
    spurious_interrupts: AtomicU64,
}

/// 統計のスナップショット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// 成功した論理転送
    pub transactions: u64,
    /// 調停負けによる再試行
    pub retries: u64,
    pub timeouts: u64,
    /// タイムアウト以外で失敗した論理転送
    pub errors: u64,
    pub host_notify_events: u64,
    pub spurious_interrupts: u64,
}

impl SmbusStats {
    pub const fn new() -> Self {
        Self {
            transactions: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            host_notify_events: AtomicU64::new(0),
            spurious_interrupts: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_transaction(&self) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_host_notify(&self) {
        self.host_notify_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_spurious(&self) {
        self.spurious_interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transactions: self.transactions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            host_notify_events: self.host_notify_events.load(Ordering::Relaxed),
            spurious_interrupts: self.spurious_interrupts.load(Ordering::Relaxed),
        }
    }
}

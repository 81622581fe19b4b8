use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::kernel::reasons::RejectReason;
use crate::kernel::validate::Verdict;

/// Run-scoped, thread-safe validation counters.
///
/// One instance per run, shared behind an `Arc`; parallel scenario workers
/// update it lock-free. There is deliberately no process-wide instance.
#[derive(Debug, Default)]
pub struct KernelStats {
    total_validated: AtomicU64,
    total_rejected: AtomicU64,
    by_reason: [AtomicU64; RejectReason::ALL.len()],
}

impl KernelStats {
    /// Record one verdict.
    pub fn record(&self, verdict: &Verdict) {
        self.total_validated.fetch_add(1, Ordering::Relaxed);
        if let Verdict::Reject(reasons) = verdict {
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
            for reason in reasons {
                self.by_reason[reason.ordinal()].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn total_validated(&self) -> u64 {
        self.total_validated.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected.load(Ordering::Relaxed)
    }

    /// Rejected / validated; zero when nothing has been validated.
    pub fn rejection_rate(&self) -> f64 {
        let validated = self.total_validated();
        if validated == 0 {
            return 0.0;
        }
        self.total_rejected() as f64 / validated as f64
    }

    /// Consistent point-in-time copy for diagnostics.
    pub fn snapshot(&self) -> KernelStatsSnapshot {
        let mut reasons: Vec<(String, u64)> = RejectReason::ALL
            .iter()
            .map(|r| {
                (
                    r.code().to_string(),
                    self.by_reason[r.ordinal()].load(Ordering::Relaxed),
                )
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        KernelStatsSnapshot {
            total_validated: self.total_validated(),
            total_rejected: self.total_rejected(),
            rejection_rate: self.rejection_rate(),
            reasons,
        }
    }
}

/// Serializable snapshot of [`KernelStats`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelStatsSnapshot {
    pub total_validated: u64,
    pub total_rejected: u64,
    pub rejection_rate: f64,
    /// Reason codes with non-zero counts, most frequent first.
    pub reasons: Vec<(String, u64)>,
}

impl KernelStatsSnapshot {
    /// The `k` most frequent rejection reasons.
    pub fn top_reasons(&self, k: usize) -> Vec<(String, u64)> {
        self.reasons.iter().take(k).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn records_and_ranks_reasons() {
        let stats = KernelStats::default();
        stats.record(&Verdict::Accept);
        stats.record(&Verdict::Reject(vec![RejectReason::SalaryCap]));
        stats.record(&Verdict::Reject(vec![
            RejectReason::SalaryCap,
            RejectReason::TeamCap,
        ]));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_validated, 3);
        assert_eq!(snapshot.total_rejected, 2);
        assert!((snapshot.rejection_rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(snapshot.reasons[0], ("SALARY_CAP".to_string(), 2));
        assert_eq!(snapshot.top_reasons(1).len(), 1);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stats = Arc::new(KernelStats::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record(&Verdict::Reject(vec![RejectReason::PositionPermutation]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.total_validated(), 8000);
        assert_eq!(stats.total_rejected(), 8000);
    }
}

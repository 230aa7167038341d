//! What the driver knows about the resource between segments and attempts.

use crate::negotiate::{ResourceIdentity, SegmentPlan};

#[derive(Debug, Clone, Default)]
pub(super) struct TransferState {
    /// Authoritative size, once any response declared it.
    pub total: Option<u64>,
    /// Validators from the first accepted response of the current run.
    pub identity: Option<ResourceIdentity>,
    /// The end of the resource was reached without a declared total.
    pub ended: bool,
    /// The server confirmed the local file already holds every byte.
    pub confirmed_complete: bool,
    /// Body bytes received in this run (not counting bytes resumed from disk).
    pub received: u64,
    pub segments: u32,
}

impl TransferState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the total declared by an accepted segment.
    pub fn observe(&mut self, plan: &SegmentPlan) {
        if self.total.is_none() {
            self.total = plan.total;
        }
    }

    pub fn is_complete(&self, offset: u64) -> bool {
        self.confirmed_complete || self.ended || self.total.is_some_and(|t| offset >= t)
    }

    /// Forget everything learned about the remote resource (after a restart
    /// from byte zero). Counters for the report survive.
    pub fn reset_resource(&mut self) {
        self.total = None;
        self.identity = None;
        self.ended = false;
        self.confirmed_complete = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(total: Option<u64>) -> SegmentPlan {
        SegmentPlan {
            start: 0,
            expected_len: total,
            total,
            whole_resource: true,
        }
    }

    #[test]
    fn first_declared_total_wins() {
        let mut s = TransferState::new();
        s.observe(&plan(None));
        assert_eq!(s.total, None);
        s.observe(&plan(Some(100)));
        s.observe(&plan(Some(200)));
        assert_eq!(s.total, Some(100));
        assert!(!s.is_complete(99));
        assert!(s.is_complete(100));
    }

    #[test]
    fn reset_keeps_counters() {
        let mut s = TransferState::new();
        s.observe(&plan(Some(10)));
        s.ended = true;
        s.segments = 3;
        s.received = 7;
        s.reset_resource();
        assert_eq!(s.total, None);
        assert!(!s.is_complete(0));
        assert_eq!(s.segments, 3);
        assert_eq!(s.received, 7);
    }
}

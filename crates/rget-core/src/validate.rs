//! Byte accounting for segments and for the whole transfer.

use crate::transfer::TransferError;

/// Counts the body bytes of one segment against its declared length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentValidator {
    expected: Option<u64>,
    received: u64,
    excess: u64,
}

impl SegmentValidator {
    pub fn new(expected: Option<u64>) -> Self {
        Self {
            expected,
            received: 0,
            excess: 0,
        }
    }

    /// Accept up to `incoming` bytes. Returns how many fit inside the declared
    /// length; anything beyond is counted as excess and must not be written.
    pub fn admit(&mut self, incoming: usize) -> usize {
        let allowed = match self.expected {
            Some(expected) => expected.saturating_sub(self.received).min(incoming as u64) as usize,
            None => incoming,
        };
        self.received += allowed as u64;
        self.excess += (incoming - allowed) as u64;
        allowed
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn overflowed(&self) -> bool {
        self.excess > 0
    }

    /// Verdict at end of stream. Unknown length: any EOF is success.
    pub fn finish(&self) -> Result<u64, TransferError> {
        match self.expected {
            Some(expected) if self.excess > 0 => Err(TransferError::Overflow {
                expected,
                received: self.received + self.excess,
            }),
            Some(expected) if self.received < expected => Err(TransferError::PrematureEnd {
                expected,
                received: self.received,
            }),
            _ => Ok(self.received),
        }
    }
}

/// Final check after all segments: bookkeeping must match the file on disk,
/// and both must match the known total.
pub fn verify_total(written: u64, on_disk: u64, total: Option<u64>) -> Result<(), TransferError> {
    if on_disk != written {
        return Err(TransferError::SizeMismatch {
            expected: written,
            actual: on_disk,
        });
    }
    if let Some(total) = total {
        if written != total {
            return Err(TransferError::SizeMismatch {
                expected: total,
                actual: written,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_length_succeeds() {
        let mut v = SegmentValidator::new(Some(10));
        assert_eq!(v.admit(4), 4);
        assert!(v.finish().is_err());
        assert_eq!(v.admit(6), 6);
        assert_eq!(v.finish().unwrap(), 10);
    }

    #[test]
    fn short_read_is_premature_end() {
        let mut v = SegmentValidator::new(Some(10240));
        v.admit(1024);
        assert!(matches!(
            v.finish(),
            Err(TransferError::PrematureEnd {
                expected: 10240,
                received: 1024
            })
        ));
    }

    #[test]
    fn excess_is_cut_and_reported() {
        let mut v = SegmentValidator::new(Some(10));
        assert_eq!(v.admit(8), 8);
        assert_eq!(v.admit(8), 2, "only the declared remainder is admitted");
        assert!(v.overflowed());
        assert_eq!(v.received(), 10);
        assert!(matches!(
            v.finish(),
            Err(TransferError::Overflow {
                expected: 10,
                received: 16
            })
        ));
    }

    #[test]
    fn unknown_length_accepts_any_eof() {
        let mut v = SegmentValidator::new(None);
        assert_eq!(v.admit(12345), 12345);
        assert!(!v.overflowed());
        assert_eq!(v.finish().unwrap(), 12345);
        assert_eq!(SegmentValidator::new(None).finish().unwrap(), 0);
    }

    #[test]
    fn verify_total_cases() {
        assert!(verify_total(100, 100, Some(100)).is_ok());
        assert!(verify_total(100, 100, None).is_ok());
        assert!(matches!(
            verify_total(100, 90, Some(100)),
            Err(TransferError::SizeMismatch {
                expected: 100,
                actual: 90
            })
        ));
        assert!(matches!(
            verify_total(90, 90, Some(100)),
            Err(TransferError::SizeMismatch {
                expected: 100,
                actual: 90
            })
        ));
    }
}

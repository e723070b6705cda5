use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{MatVecError, Result};

const ELEMENT_BYTES: usize = std::mem::size_of::<i64>();

/// Tracks bytes held by live buffers against an optional capacity.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    limit: Option<usize>,
    in_use: AtomicUsize,
}

impl MemoryLedger {
    pub fn new(limit: Option<usize>) -> Self {
        MemoryLedger {
            limit,
            in_use: AtomicUsize::new(0),
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn reserve(&self, label: &'static str, bytes: usize) -> Result<()> {
        let limit = self.limit.unwrap_or(usize::MAX);
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= limit)
            })
            .map(|_| ())
            .map_err(|used| MatVecError::AllocationFailure {
                buffer: label,
                bytes,
                reason: format!(
                    "device capacity exceeded ({} of {} bytes in use)",
                    used, limit
                ),
            })
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// A buffer in CPU "device" memory: a fixed array of atomic cells.
#[derive(Debug)]
pub struct CpuBuffer {
    label: &'static str,
    cells: Box<[AtomicI64]>,
    ledger: Arc<MemoryLedger>,
}

impl CpuBuffer {
    pub(crate) fn allocate(
        ledger: &Arc<MemoryLedger>,
        label: &'static str,
        len: usize,
    ) -> Result<Self> {
        let bytes = len
            .checked_mul(ELEMENT_BYTES)
            .ok_or_else(|| MatVecError::AllocationFailure {
                buffer: label,
                bytes: usize::MAX,
                reason: format!("{} elements overflow the address space", len),
            })?;
        ledger.reserve(label, bytes)?;

        let mut cells: Vec<AtomicI64> = Vec::new();
        if let Err(e) = cells.try_reserve_exact(len) {
            ledger.release(bytes);
            return Err(MatVecError::AllocationFailure {
                buffer: label,
                bytes,
                reason: e.to_string(),
            });
        }
        cells.extend((0..len).map(|_| AtomicI64::new(0)));

        Ok(CpuBuffer {
            label,
            cells: cells.into_boxed_slice(),
            ledger: Arc::clone(ledger),
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.cells.len() * ELEMENT_BYTES
    }

    pub fn cells(&self) -> &[AtomicI64] {
        &self.cells
    }

    /// Exclusive access; no launch can be reading this buffer.
    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut i64> + '_ {
        self.cells.iter_mut().map(AtomicI64::get_mut)
    }
}

impl Drop for CpuBuffer {
    fn drop(&mut self) {
        self.ledger.release(self.bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let ledger = Arc::new(MemoryLedger::new(Some(64)));
        let buf = CpuBuffer::allocate(&ledger, "A", 4).unwrap();
        assert_eq!(buf.len(), 4);
        assert_eq!(ledger.in_use(), 32);
        drop(buf);
        assert_eq!(ledger.in_use(), 0);
    }

    #[test]
    fn test_capacity_exceeded() {
        let ledger = Arc::new(MemoryLedger::new(Some(64)));
        let _a = CpuBuffer::allocate(&ledger, "A", 6).unwrap();
        let err = CpuBuffer::allocate(&ledger, "B", 3).unwrap_err();
        match err {
            MatVecError::AllocationFailure { buffer, bytes, .. } => {
                assert_eq!(buffer, "B");
                assert_eq!(bytes, 24);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.in_use(), 48);
    }

    #[test]
    fn test_overflowing_length() {
        let ledger = Arc::new(MemoryLedger::new(None));
        assert!(CpuBuffer::allocate(&ledger, "A", usize::MAX).is_err());
        assert_eq!(ledger.in_use(), 0);
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

const IDLE: u8 = 0;

/// 会占用进度条的长时间操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Upload = 1,
    Scan = 2,
}

impl Operation {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Operation::Upload),
            2 => Some(Operation::Scan),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => f.write_str("Upload"),
            Operation::Scan => f.write_str("Scan"),
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("{0} already in progress")]
    Busy(Operation),
}

/// 单槽位互斥：同一时间只允许一个上传或扫描在运行
#[derive(Debug, Clone, Default)]
pub struct OperationGuard {
    slot: Arc<AtomicU8>,
}

impl OperationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 槽位空闲时占用并返回许可，许可被 drop 时释放槽位
    pub fn try_begin(&self, operation: Operation) -> Result<OperationPermit, GuardError> {
        match self.slot.compare_exchange(
            IDLE,
            operation as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(OperationPermit {
                slot: Arc::clone(&self.slot),
                operation,
            }),
            Err(current) => Err(GuardError::Busy(
                Operation::from_u8(current).unwrap_or(operation),
            )),
        }
    }

    pub fn current(&self) -> Option<Operation> {
        Operation::from_u8(self.slot.load(Ordering::SeqCst))
    }
}

#[derive(Debug)]
pub struct OperationPermit {
    slot: Arc<AtomicU8>,
    operation: Operation,
}

impl OperationPermit {
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        self.slot.store(IDLE, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_operation_is_rejected_until_permit_drops() {
        let guard = OperationGuard::new();
        assert_eq!(guard.current(), None);

        let permit = guard.try_begin(Operation::Scan).unwrap();
        assert_eq!(permit.operation(), Operation::Scan);
        assert_eq!(guard.current(), Some(Operation::Scan));

        let err = guard.try_begin(Operation::Upload).unwrap_err();
        assert_eq!(err, GuardError::Busy(Operation::Scan));
        assert_eq!(err.to_string(), "Scan already in progress");
        assert_eq!(
            guard.try_begin(Operation::Scan).unwrap_err(),
            GuardError::Busy(Operation::Scan)
        );

        drop(permit);
        assert_eq!(guard.current(), None);
        assert!(guard.try_begin(Operation::Upload).is_ok());
    }

    #[test]
    fn clones_share_the_slot() {
        let guard = OperationGuard::new();
        let other = guard.clone();
        let _permit = guard.try_begin(Operation::Upload).unwrap();
        assert_eq!(
            other.try_begin(Operation::Scan).unwrap_err(),
            GuardError::Busy(Operation::Upload)
        );
    }
}

//! Scoped wake-lock ownership for one countdown

use std::sync::Arc;

use tracing::{debug, warn};

use super::ports::WakeLockPort;

/// Holds at most one acquisition of a shared wake-lock port
///
/// Acquiring twice is a no-op, releasing when nothing is held is a no-op, and
/// dropping releases whatever is still held.
pub struct WakeLock {
    port: Arc<dyn WakeLockPort>,
    held: bool,
}

impl std::fmt::Debug for WakeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeLock").field("held", &self.held).finish()
    }
}

impl WakeLock {
    pub fn new(port: Arc<dyn WakeLockPort>) -> Self {
        Self { port, held: false }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn acquire(&mut self) {
        if self.held {
            return;
        }
        match self.port.acquire() {
            Ok(()) => {
                self.held = true;
                debug!("Wake lock acquired");
            }
            Err(e) => warn!("Wake lock unavailable: {}", e),
        }
    }

    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match self.port.release() {
            Ok(()) => debug!("Wake lock released"),
            Err(e) => warn!("Failed to release wake lock: {}", e),
        }
    }
}

impl Drop for WakeLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::notify::{ports::Unsupported, testing::FakeDevice};

    #[test]
    fn test_acquire_is_idempotent() {
        let device = Arc::new(FakeDevice::default());
        let mut lock = WakeLock::new(device.clone());

        lock.acquire();
        lock.acquire();
        assert!(lock.is_held());
        assert_eq!(device.lock_acquires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_without_acquire_is_safe() {
        let device = Arc::new(FakeDevice::default());
        let mut lock = WakeLock::new(device.clone());

        lock.release();
        lock.release();
        assert_eq!(device.lock_releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_releases() {
        let device = Arc::new(FakeDevice::default());
        {
            let mut lock = WakeLock::new(device.clone());
            lock.acquire();
        }
        assert!(!device.lock_held());
        assert_eq!(device.lock_releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_port_is_never_held() {
        let mut lock = WakeLock::new(Arc::new(Unsupported));
        lock.acquire();
        assert!(!lock.is_held());
        lock.release();
    }
}

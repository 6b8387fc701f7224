use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared on/off flag for a detector.
///
/// Clones share the same flag, so a controller (signal handler, UI, scheduler)
/// can hold one handle while the detector reads another.
#[derive(Debug, Clone)]
pub struct DetectionSwitch {
    enabled: Arc<AtomicBool>,
}

impl DetectionSwitch {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    #[allow(dead_code)]
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Default for DetectionSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

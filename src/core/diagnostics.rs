//! Diagnostics sink for unsatisfiable allocations

use tracing::warn;

/// Receives a report when the controller gives up on a request
///
/// Called at most once per allocation call, after every extent of the ring
/// has been found empty without yielding enough space.
pub trait Diagnostics: Send + Sync {
    fn complain(&self, ns: &str, len: u32);
}

/// Default sink: one warning through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn complain(&self, ns: &str, len: u32) {
        warn!(
            "couldn't make room for new record (len: {}) in capped ns {}",
            len, ns
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Diagnostics;
    use parking_lot::Mutex;

    /// Records every complaint for later inspection
    #[derive(Debug, Default)]
    pub struct RecordingDiagnostics {
        complaints: Mutex<Vec<(String, u32)>>,
    }

    impl RecordingDiagnostics {
        pub fn complaints(&self) -> Vec<(String, u32)> {
            self.complaints.lock().clone()
        }
    }

    impl Diagnostics for RecordingDiagnostics {
        fn complain(&self, ns: &str, len: u32) {
            self.complaints.lock().push((ns.to_string(), len));
        }
    }
}

//! Admission control for concurrent calls
//!
//! An [`AdmissionGate`] is a fixed-capacity pool of permits. Acquisition
//! never waits: when the pool is full the call is refused on the spot so a
//! saturated server sheds load instead of queueing it. The server runs two
//! independent gates, one shared by uploads and downloads and one for
//! listings.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::context::CallContext;

/// Why a permit could not be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Every permit is held
    #[error("admission denied: pool is full")]
    Denied,
    /// The call was cancelled or expired before admission
    #[error("call cancelled before admission")]
    Cancelled,
}

/// Non-blocking counting semaphore
#[derive(Debug)]
pub struct AdmissionGate {
    /// Pool name used in logs
    name: &'static str,
    /// Permits currently held
    active: Arc<Mutex<usize>>,
    /// Maximum permits held at once
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate holding at most `capacity` permits
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            active: Arc::new(Mutex::new(0)),
            capacity,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held
    #[must_use]
    pub fn active(&self) -> usize {
        *self.active.lock().expect("admission gate lock")
    }

    /// Try to take a permit for the call described by `ctx`
    ///
    /// Cancellation is checked before capacity, so a call that is already
    /// cancelled never holds a permit and is never reported as denied.
    ///
    /// The returned permit is released when dropped.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::Cancelled`] if `ctx` is cancelled or expired
    /// - [`AdmissionError::Denied`] if `capacity` permits are already held
    pub fn try_acquire(&self, ctx: &CallContext) -> Result<Permit, AdmissionError> {
        if ctx.is_done() {
            return Err(AdmissionError::Cancelled);
        }

        let mut active = self.active.lock().expect("admission gate lock");
        if *active >= self.capacity {
            return Err(AdmissionError::Denied);
        }

        *active += 1;
        Ok(Permit {
            active: self.active.clone(),
        })
    }
}

/// RAII permit that returns its slot to the gate when dropped
///
/// A permit can only be obtained from [`AdmissionGate::try_acquire`], so a
/// release always matches an acquisition.
#[derive(Debug)]
pub struct Permit {
    active: Arc<Mutex<usize>>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut active = self.active.lock().expect("admission gate lock");
        *active = active.saturating_sub(1);
    }
}

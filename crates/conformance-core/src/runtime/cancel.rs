// crates/conformance-core/src/runtime/cancel.rs
// ============================================================================
// Module: Run Cancellation
// Description: Cooperative cancellation flag shared across run threads.
// Purpose: Stop new steps from starting without aborting in-flight I/O.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`CancellationToken`] is checked by the run coordinator before every
//! step. Raising it never interrupts a step that already started; network
//! calls finish or time out on their own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Token
// ============================================================================

/// Cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    /// Shared flag; clones observe the same value.
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the cancellation signal.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once the signal was raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

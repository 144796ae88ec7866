//! Rewind Clock
//!
//! A drift-corrected fixed-rate scheduler that drives a callback from its own
//! thread at a signed, variable speed.
//!
//! # Features
//!
//! - **Signed speed**: positive speeds advance, negative speeds rewind, zero pauses
//! - **Drift correction**: late wakes are carried into the next deadline so the
//!   average rate converges on the target
//! - **Prompt control**: speed changes and stop requests wake the loop at once
//!
//! # Example
//!
//! ```rust
//! use rewind_clock::{ClockCallback, FrameClock};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Counter(AtomicU64);
//!
//! impl ClockCallback for Counter {
//!     fn on_advance(&self) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!     fn on_rewind(&self) {}
//! }
//!
//! let counter = Arc::new(Counter::default());
//! let clock = FrameClock::new(counter.clone(), 60.0);
//! clock.start()?;
//! clock.set_speed(1.0);
//! // ...
//! clock.stop();
//! # Ok::<(), rewind_clock::ClockError>(())
//! ```

mod clock;
pub mod error;
mod pacer;

pub use clock::{normalize_rate, ClockCallback, FrameClock, DEFAULT_RATE, MAX_WAIT};
pub use error::{ClockError, Result};

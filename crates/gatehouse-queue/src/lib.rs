//! Gatehouse Queue - Per-target admission and dispatch.
//!
//! One bounded FIFO queue per target, created lazily on first use. At
//! most one upstream call runs per target at a time; everything else
//! waits its turn or is refused at admission. A single deadline, armed
//! at admission, covers both the wait and the upstream call.
//!
//! Guarantees:
//! - Admission: a full waiting list refuses immediately with
//!   [`QueueError::Full`].
//! - Order: executors enter in the order their enqueues were admitted.
//! - Isolation: back-pressure on one target never touches another.
//! - Accounting: every admitted item completes exactly once — resolved,
//!   timed out, rejected by its executor, or rejected by shutdown.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod engine;
mod error;

pub use engine::{Completion, QueueEngine, QueueLimits};
pub use error::{QueueError, QueueResult};

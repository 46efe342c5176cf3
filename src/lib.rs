//! clockin library
//!
//! Drives the student health-status declaration workflow through a headless
//! Chromium session: classify the current page, resume the stage sequence
//! from there, retry on transient timeouts, and push the final outcome.

pub mod config;
pub mod driver;
pub mod error;
pub mod locator;
pub mod notify;
pub mod session;
pub mod stage;
pub mod waiting;

// Re-export the types callers actually wire together.
pub use config::{Credentials, Settings};
pub use driver::{Outcome, WorkflowDriver};
pub use error::WorkflowError;
pub use notify::Notifier;
pub use session::{PageOps, Session};
pub use stage::Stage;

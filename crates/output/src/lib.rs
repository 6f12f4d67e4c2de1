//! Step output handling.
//!
//! Everything a step prints goes through a [`StepOutputWriter`], which hides
//! secrets, remembers red error blocks for the failure summary and hands the
//! text to a leveled logger.

pub mod error;
pub mod error_finder;
pub mod step_output;

pub use error::{OutputError, Result};
pub use error_finder::{ErrorFinder, ErrorMessages, MAX_TAIL_LEN};
pub use step_output::StepOutputWriter;

//! Core domain entities
//!
//! All ledger entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod ledger;
mod record;
mod user;
pub mod result;

pub use ledger::{Ledger, RecordFilter};
pub use record::{EntryKind, Record, YearMonth};
pub use user::User;

//! Domain models for the charge-capture system.

mod catalog;
mod patient;
mod report;
mod user;

pub use catalog::*;
pub use patient::*;
pub use report::*;
pub use user::*;

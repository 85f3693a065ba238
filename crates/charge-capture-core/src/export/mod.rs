//! History CSV and full JSON backup exports.

mod backup;
mod csv;

pub use backup::*;
pub use csv::*;

//! Purpose: Define the stable public Rust API boundary for the table engine.
//! Exports: Value, column, frame and codec types plus the error model.
//! Role: Public, additive-only surface for report and tooling layers.
//! Invariants: Crate-internal helpers (permutations, codec tables) stay unexported.

pub use crate::core::column::{Column, SortOption, SortType};
pub use crate::core::csv::{CsvOptions, Terminator};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::frame::{Frame, Rows};
pub use crate::core::value::{format_duration, parse_duration, Value};

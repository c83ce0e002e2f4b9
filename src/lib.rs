//! Purpose: In-memory column-oriented tables with typed scalar views and a CSV codec.
//! Exports: `api` (stable surface), `core` (values, columns, frames, codec, errors).
//! Role: Library consumed by report and tooling layers; owns no process or CLI state.
//! Invariants: Every cell is text until a caller asks for a typed view.
//! Invariants: Each column and frame serializes its own operations; nothing is atomic across objects.
pub mod api;
pub mod core;

// Engine modules: cell values, columns, frames, the CSV codec and error modeling.
pub mod column;
pub mod csv;
pub mod error;
pub mod frame;
pub mod value;

//! Value and type-affinity model shared by the compiler and the reference
//! machine.

pub mod affinity;
pub mod value;

pub use affinity::Affinity;
pub use value::{format_real, parse_numeric_prefix, StorageClass, Value};

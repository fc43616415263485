//! Queue selection, long-wait detection and turn numbering.

mod alerts;
mod number;
mod policy;

pub use alerts::*;
pub use number::*;
pub use policy::*;

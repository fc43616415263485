//! Domain models for the turn system.

mod intake;
mod service;
mod staff;
mod turn;

pub use intake::*;
pub use service::*;
pub use staff::*;
pub use turn::*;

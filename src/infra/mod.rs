//! Infrastructure layer
//!
//! Side-effecting operations: filesystem handling and build subprocess
//! execution.

pub mod filesystem;
pub mod process;

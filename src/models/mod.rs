//! Typed records produced by each stage of a run

pub mod deployment;
pub mod load;
pub mod report;

pub use deployment::*;
pub use load::*;
pub use report::*;

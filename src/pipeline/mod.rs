//! Deployment pipeline
//!
//! Composes the schema deployer and the data loader into one run:
//!
//! 1. **Schema**: catalogued scripts, phase by phase
//! 2. **Verify**: read-only check of the expected tables and functions
//! 3. **Data**: seed CSV load, then reconciliation and merge

pub mod orchestrator;

pub use orchestrator::Orchestrator;

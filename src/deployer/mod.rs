//! Schema deployment: catalogued script execution and verification

pub mod catalog;
mod sql_deployer;
mod verify;

pub use sql_deployer::SqlDeployer;

//! robomigrate library crate
//!
//! Migrates Cucumber/Selenium Java test suites to Robot Framework. The
//! binary is a thin CLI over [`workflow::Workflow`]; benchmarks and
//! embedding tools use the modules directly.

pub mod ai;
pub mod commit;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod model;
pub mod paths;
pub mod reader;
pub mod repo;
pub mod skeleton;
pub mod transform;
pub mod validate;
pub mod workflow;

pub mod catalog;
pub mod cli;
pub mod config;
pub mod housekeeping;
pub mod parallel;
pub mod policy;
pub mod probe;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod summary;

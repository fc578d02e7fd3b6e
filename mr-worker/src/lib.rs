//! MapReduce worker.
//!
//! A worker polls the coordinator for tasks, runs the application's map or
//! reduce function over files in a shared directory, and reports back.

pub mod args;
pub mod core;
pub mod map;
pub mod reduce;

pub use crate::core::MRWorker;

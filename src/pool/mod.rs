//! # Pool de Workers
//! src/pool/mod.rs
//!
//! Cola FIFO compartida + conjunto fijo de workers de larga vida.

pub mod queue;
pub mod worker;

pub use queue::TaskQueue;
pub use worker::{Job, WorkerPool};

// src/pipeline/mod.rs
pub mod consumer;
pub mod producer;

pub use consumer::{run_consumer, ConsumeSummary};
pub use producer::{run_producer, ProduceSummary};

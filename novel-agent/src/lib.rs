//! Simulated novel-generation workflow: mock agents emit ordered
//! status/progress/result messages over an explicit channel, and an
//! aggregator folds the stream into a per-stage workflow snapshot.

pub mod aggregator;
pub mod agents;
pub mod mock_data;
pub mod runtime;

//! Stateful evaluation machinery.
//!
//! Everything a run needs beyond the pure data layer: the hyperparameter
//! configuration merged from the checkpoint, the serialized model wrapper,
//! batch assembly, rotational augmentation, prediction accumulation, and the
//! progress-reporting seam the CLI plugs into.

pub mod aggregate;
pub mod augment;
pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod progress;

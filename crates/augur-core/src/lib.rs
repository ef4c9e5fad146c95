//! # Augur Core Library
//!
//! An evaluation harness for pretrained graph-neural-network interatomic
//! potentials. Augur loads a serialized model together with the artifacts of
//! its training run, rebuilds fixed-size neighbor graphs for a held-out set
//! of structures, and reports energy/force error metrics averaged over
//! test-time rotational augmentations.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models
//!   (`Structure`, `SpeciesTable`), structure and array file I/O, neighbor
//!   graph construction, and error metrics.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer owns the evaluation
//!   machinery: the hyperparameter configuration merged from the checkpoint,
//!   the TorchScript model wrapper, batch assembly, rotational augmentation,
//!   and prediction accumulation.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level,
//!   user-facing layer. It ties the `engine` and `core` together to execute
//!   a complete evaluation run and is the single entry point the CLI calls.

pub mod core;
pub mod engine;
pub mod workflows;

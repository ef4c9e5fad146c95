//! High-level procedures tying the engine and core layers together.
//!
//! One workflow exists: [`evaluate`], the complete evaluation run the CLI
//! drives. It owns the phase structure and progress protocol; callers
//! provide parsed structures and a resolved configuration.

pub mod evaluate;

//! Input/output for the file formats an evaluation run touches.
//!
//! Structures arrive as multi-frame extended-XYZ files; the checkpoint
//! folder stores the species list and self-contribution coefficients as
//! NumPy `.npy` arrays. Each format has its own parser with a typed error
//! enum; a trait-based interface keeps structure formats interchangeable.

pub mod npy;
pub mod traits;
pub mod xyz;

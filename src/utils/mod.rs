//! Utility helpers shared across modules.

pub mod fs;

pub use fs::{atomic_copy, atomic_write, calculate_checksum, ensure_dir, ensure_parent_dir};

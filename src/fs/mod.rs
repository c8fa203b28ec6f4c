//! Filesystem utilities.
//!
//! Atomic writes and relocation primitives that keep review state intact
//! across crashes and interruptions.

pub mod atomic;
pub mod relocate;

pub use atomic::atomic_write;
pub use atomic::atomic_write_str;
pub use relocate::{move_file, relocate_rewritten, timestamped_file_name};

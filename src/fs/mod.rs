//! Filesystem helpers.
//!
//! Every full-snapshot artifact goes through [`write_atomic`]: the target
//! path holds either its previous content or the new content, never a
//! partial write.

mod atomic;

pub use atomic::{stage, write_atomic, StagedWrite, TEMP_PREFIX};

//! Cross-worker shared buffers with access auditing
//!
//! A [`SharedBufferRegistry`] owns named raw memory regions visible to
//! every worker registered with it. Registration is metadata only: all
//! holders see the same underlying bytes, and the registry provides no
//! mutual exclusion over the data plane. What it does serialize is the
//! per-buffer access log, an append-only trail of
//! `{worker, operation, timestamp}` records for contention analysis.

pub mod buffer;
pub mod registry;
pub mod view;

pub use buffer::{AccessKind, AccessRecord, SharedBuffer};
pub use registry::{RegistryStats, SharedBufferRegistry};
pub use view::{Element, ElementKind, TypedView};

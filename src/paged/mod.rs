//! Paged bounded allocator simulating sandbox linear memory
//!
//! A [`PagedPool`] owns one fixed-size anonymous mapping divided into
//! fixed-size pages and tracked by an occupancy bitmap. Allocation is a
//! first-fit scan for a contiguous run of free pages, which keeps the
//! allocator deterministic and bounded-time; a request fails when no
//! contiguous run is large enough even if the aggregate free page count
//! would cover it.

pub mod pool;
pub mod view;

pub use pool::{PageRegion, PagedPool};
pub use view::PageView;

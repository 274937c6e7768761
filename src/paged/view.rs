//! Byte views over allocated page runs

use std::{slice, sync::Arc};

use memmap2::MmapMut;

/// A view over one allocated byte range of a [`super::PagedPool`]
///
/// The view keeps the pool's backing mapping alive, so reads and writes
/// stay valid even if the pool is dropped first. Live regions never
/// overlap, which is what makes the mutable accessor sound.
#[derive(Debug)]
pub struct PageView {
    backing: Arc<MmapMut>,
    offset: usize,
    size_bytes: usize,
    page_span: usize,
}

impl PageView {
    pub(super) fn new(
        backing: Arc<MmapMut>,
        offset: usize,
        size_bytes: usize,
        page_span: usize,
    ) -> Self {
        Self {
            backing,
            offset,
            size_bytes,
            page_span,
        }
    }

    pub(super) fn backing(&self) -> &Arc<MmapMut> {
        &self.backing
    }

    /// Byte offset of the view within the pool
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the view in bytes (the requested allocation size)
    pub fn len(&self) -> usize {
        self.size_bytes
    }

    /// True when the view has zero length (never the case for views
    /// produced by `allocate`)
    pub fn is_empty(&self) -> bool {
        self.size_bytes == 0
    }

    /// Number of pages the view's region occupies
    pub fn page_span(&self) -> usize {
        self.page_span
    }

    /// Read access to the viewed bytes
    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.backing.as_ptr().add(self.offset), self.size_bytes) }
    }

    /// Write access to the viewed bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe {
            slice::from_raw_parts_mut(
                self.backing.as_ptr().add(self.offset) as *mut u8,
                self.size_bytes,
            )
        }
    }
}

// Views cover disjoint page runs; the backing map is plain anonymous
// memory with no thread affinity.
unsafe impl Send for PageView {}

//! Page-granular first-fit allocator over a fixed anonymous mapping

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use memmap2::MmapMut;

use crate::error::{PoolError, Result};

use super::view::PageView;

/// A contiguous run of allocated pages
#[derive(Debug, Clone)]
pub struct PageRegion {
    /// Byte offset of the region start within the pool
    pub offset: usize,
    /// Requested size in bytes (may be less than the page span covers)
    pub size_bytes: usize,
    /// Number of pages the region occupies
    pub page_span: usize,
    /// Timestamp when the region was allocated
    pub allocated_at: SystemTime,
}

#[derive(Debug)]
struct PoolInner {
    /// Occupancy bitmap, one entry per page
    bitmap: Vec<bool>,
    /// Live regions keyed by starting page index
    regions: HashMap<usize, PageRegion>,
    used_pages: usize,
}

/// Fixed-capacity paged allocator
///
/// Capacity is rounded up to a whole number of pages at construction so
/// that `used_memory() + free_memory() == total_bytes()` holds at page
/// granularity.
#[derive(Debug)]
pub struct PagedPool {
    backing: Arc<MmapMut>,
    page_size: usize,
    page_count: usize,
    inner: Mutex<PoolInner>,
}

impl PagedPool {
    /// Create a pool with `total_bytes` of capacity split into
    /// `page_size`-byte pages
    pub fn new(total_bytes: usize, page_size: usize) -> Result<Self> {
        if total_bytes == 0 {
            return Err(PoolError::invalid_parameter(
                "total_bytes",
                "Pool capacity cannot be zero",
            ));
        }
        if page_size == 0 {
            return Err(PoolError::invalid_parameter(
                "page_size",
                "Page size cannot be zero",
            ));
        }

        let page_count = (total_bytes + page_size - 1) / page_size;
        let capacity = page_count * page_size;
        let backing = MmapMut::map_anon(capacity)
            .map_err(|e| PoolError::from_io(e, "Failed to map sandbox memory"))?;

        Ok(Self {
            backing: Arc::new(backing),
            page_size,
            page_count,
            inner: Mutex::new(PoolInner {
                bitmap: vec![false; page_count],
                regions: HashMap::new(),
                used_pages: 0,
            }),
        })
    }

    /// Allocate a view over the first contiguous run of pages large enough
    /// for `bytes`
    ///
    /// Fails with [`PoolError::InsufficientSpace`] when no contiguous run
    /// exists, even if the aggregate free page count is sufficient but
    /// fragmented.
    pub fn allocate(&self, bytes: usize) -> Result<PageView> {
        if bytes == 0 {
            return Err(PoolError::invalid_parameter(
                "bytes",
                "Allocation size cannot be zero",
            ));
        }

        let pages_needed = (bytes + self.page_size - 1) / self.page_size;
        let mut inner = self.inner.lock().unwrap();

        let start = Self::find_first_fit(&inner.bitmap, pages_needed).ok_or_else(|| {
            PoolError::insufficient_space(
                bytes,
                (self.page_count - inner.used_pages) * self.page_size,
            )
        })?;

        for page in &mut inner.bitmap[start..start + pages_needed] {
            *page = true;
        }
        inner.used_pages += pages_needed;

        let offset = start * self.page_size;
        inner.regions.insert(
            start,
            PageRegion {
                offset,
                size_bytes: bytes,
                page_span: pages_needed,
                allocated_at: SystemTime::now(),
            },
        );

        Ok(PageView::new(self.backing.clone(), offset, bytes, pages_needed))
    }

    /// Release the pages backing a view
    ///
    /// Returns false when the view does not belong to this pool or its
    /// region was already freed.
    pub fn deallocate(&self, view: &PageView) -> bool {
        if !Arc::ptr_eq(view.backing(), &self.backing) {
            return false;
        }

        let start = view.offset() / self.page_size;
        let mut inner = self.inner.lock().unwrap();
        match inner.regions.remove(&start) {
            Some(region) => {
                for page in &mut inner.bitmap[start..start + region.page_span] {
                    *page = false;
                }
                inner.used_pages -= region.page_span;
                true
            }
            None => false,
        }
    }

    /// Bytes currently allocated, page-granular
    pub fn used_memory(&self) -> usize {
        self.inner.lock().unwrap().used_pages * self.page_size
    }

    /// Bytes currently free, page-granular
    pub fn free_memory(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        (self.page_count - inner.used_pages) * self.page_size
    }

    /// Total capacity in bytes (rounded up to a whole number of pages)
    pub fn total_bytes(&self) -> usize {
        self.page_count * self.page_size
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the pool
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Count of allocated-to-free transitions across the bitmap
    ///
    /// A coarse external-fragmentation proxy: 0 for an empty or
    /// fully-packed pool, and compaction never increases it.
    pub fn fragmentation(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .bitmap
            .windows(2)
            .filter(|pair| pair[0] && !pair[1])
            .count()
    }

    /// Snapshot of the live regions, ordered by offset
    pub fn active_regions(&self) -> Vec<PageRegion> {
        let inner = self.inner.lock().unwrap();
        let mut regions: Vec<PageRegion> = inner.regions.values().cloned().collect();
        regions.sort_by_key(|r| r.offset);
        regions
    }

    /// Number of live regions
    pub fn active_region_count(&self) -> usize {
        self.inner.lock().unwrap().regions.len()
    }

    /// Free every page and drop all region records
    ///
    /// Outstanding views become dangling in the accounting sense; their
    /// bytes remain mapped but their regions are gone.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.bitmap.fill(false);
        inner.regions.clear();
        inner.used_pages = 0;
    }

    /// First-fit scan for `pages_needed` contiguous free pages
    fn find_first_fit(bitmap: &[bool], pages_needed: usize) -> Option<usize> {
        let mut run_start = 0;
        let mut run_len = 0;

        for (index, &occupied) in bitmap.iter().enumerate() {
            if occupied {
                run_len = 0;
                run_start = index + 1;
            } else {
                run_len += 1;
                if run_len == pages_needed {
                    return Some(run_start);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_and_free_sum_to_total() {
        let pool = PagedPool::new(1024, 256).unwrap();
        assert_eq!(pool.used_memory() + pool.free_memory(), pool.total_bytes());

        let view = pool.allocate(300).unwrap();
        assert_eq!(pool.used_memory(), 512); // 2 pages
        assert_eq!(pool.used_memory() + pool.free_memory(), pool.total_bytes());

        assert!(pool.deallocate(&view));
        assert_eq!(pool.used_memory(), 0);
    }

    #[test]
    fn capacity_rounds_up_to_whole_pages() {
        let pool = PagedPool::new(1_000_000, 64_000).unwrap();
        assert_eq!(pool.page_count(), 16);
        assert_eq!(pool.total_bytes(), 1_024_000);
    }

    #[test]
    fn first_fit_prefers_lowest_offset() {
        let pool = PagedPool::new(4096, 1024).unwrap();
        let a = pool.allocate(1024).unwrap();
        let b = pool.allocate(1024).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 1024);

        pool.deallocate(&a);
        let c = pool.allocate(1024).unwrap();
        assert_eq!(c.offset(), 0);
    }

    #[test]
    fn zero_sized_requests_are_rejected() {
        let pool = PagedPool::new(4096, 1024).unwrap();
        assert!(matches!(
            pool.allocate(0),
            Err(PoolError::InvalidParameter { .. })
        ));
        assert!(PagedPool::new(0, 1024).is_err());
        assert!(PagedPool::new(4096, 0).is_err());
    }

    #[test]
    fn foreign_view_is_not_deallocated() {
        let pool_a = PagedPool::new(4096, 1024).unwrap();
        let pool_b = PagedPool::new(4096, 1024).unwrap();
        let view = pool_a.allocate(512).unwrap();
        assert!(!pool_b.deallocate(&view));
        assert!(pool_a.deallocate(&view));
        assert!(!pool_a.deallocate(&view));
    }
}

//! Typed aliasing windows over shared buffers

use std::{marker::PhantomData, sync::Arc};

use crate::error::{PoolError, Result};

use super::buffer::SharedBuffer;

/// Element kinds supported by typed views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Byte,
    Int32,
    Float64,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Byte => write!(f, "u8"),
            ElementKind::Int32 => write!(f, "i32"),
            ElementKind::Float64 => write!(f, "f64"),
        }
    }
}

/// A fixed-width element type a view can be taken over
///
/// Reads and writes are unaligned, so views may start at arbitrary byte
/// offsets.
pub trait Element: Copy + Send + Sync + 'static {
    const KIND: ElementKind;
    const SIZE: usize;

    /// # Safety
    /// `ptr` must be valid for reads of `Self::SIZE` bytes.
    unsafe fn read_from(ptr: *const u8) -> Self;

    /// # Safety
    /// `ptr` must be valid for writes of `Self::SIZE` bytes.
    unsafe fn write_to(ptr: *mut u8, value: Self);
}

impl Element for u8 {
    const KIND: ElementKind = ElementKind::Byte;
    const SIZE: usize = 1;

    unsafe fn read_from(ptr: *const u8) -> Self {
        *ptr
    }

    unsafe fn write_to(ptr: *mut u8, value: Self) {
        *ptr = value;
    }
}

impl Element for i32 {
    const KIND: ElementKind = ElementKind::Int32;
    const SIZE: usize = 4;

    unsafe fn read_from(ptr: *const u8) -> Self {
        std::ptr::read_unaligned(ptr as *const i32)
    }

    unsafe fn write_to(ptr: *mut u8, value: Self) {
        std::ptr::write_unaligned(ptr as *mut i32, value);
    }
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::Float64;
    const SIZE: usize = 8;

    unsafe fn read_from(ptr: *const u8) -> Self {
        std::ptr::read_unaligned(ptr as *const f64)
    }

    unsafe fn write_to(ptr: *mut u8, value: Self) {
        std::ptr::write_unaligned(ptr as *mut f64, value);
    }
}

/// A typed window over part of a shared buffer
///
/// Multiple simultaneous aliasing views over the same region are
/// permitted; like the buffer itself, views carry unsynchronized
/// shared-memory semantics.
#[derive(Debug)]
pub struct TypedView<T: Element> {
    buffer: Arc<SharedBuffer>,
    offset_bytes: usize,
    len: usize,
    _element: PhantomData<T>,
}

impl<T: Element> TypedView<T> {
    /// Construct a view of `len` elements starting at `offset_bytes`
    pub(crate) fn new(buffer: Arc<SharedBuffer>, offset_bytes: usize, len: usize) -> Result<Self> {
        let span = len
            .checked_mul(T::SIZE)
            .and_then(|bytes| bytes.checked_add(offset_bytes))
            .ok_or_else(|| PoolError::invalid_parameter("len", "View span overflows"))?;
        if span > buffer.len() {
            return Err(PoolError::insufficient_space(span, buffer.len()));
        }

        buffer.view_opened();
        Ok(Self {
            buffer,
            offset_bytes,
            len,
            _element: PhantomData,
        })
    }

    /// Element kind of this view
    pub fn kind(&self) -> ElementKind {
        T::KIND
    }

    /// Number of elements in the view
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the view covers zero elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte offset of the view within its buffer
    pub fn offset_bytes(&self) -> usize {
        self.offset_bytes
    }

    /// Name of the underlying buffer
    pub fn buffer_name(&self) -> &str {
        self.buffer.name()
    }

    /// Read the element at `index`
    pub fn get(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        let ptr = unsafe { self.buffer.as_ptr().add(self.offset_bytes + index * T::SIZE) };
        Ok(unsafe { T::read_from(ptr) })
    }

    /// Write the element at `index`
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        let ptr = unsafe { self.buffer.as_mut_ptr().add(self.offset_bytes + index * T::SIZE) };
        unsafe { T::write_to(ptr, value) };
        Ok(())
    }

    /// Copy every element out of the view
    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len)
            .map(|index| {
                let ptr = unsafe { self.buffer.as_ptr().add(self.offset_bytes + index * T::SIZE) };
                unsafe { T::read_from(ptr) }
            })
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(PoolError::invalid_parameter(
                "index",
                format!("Index {} out of bounds for view of {} elements", index, self.len),
            ));
        }
        Ok(())
    }
}

impl<T: Element> Drop for TypedView<T> {
    fn drop(&mut self) {
        self.buffer.view_closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(size: usize) -> Arc<SharedBuffer> {
        Arc::new(SharedBuffer::new("view_test", size).unwrap())
    }

    #[test]
    fn typed_round_trip() {
        let buf = buffer(64);
        let ints: TypedView<i32> = TypedView::new(buf.clone(), 0, 4).unwrap();
        ints.set(0, -5).unwrap();
        ints.set(3, 1_000_000).unwrap();
        assert_eq!(ints.get(0).unwrap(), -5);
        assert_eq!(ints.get(3).unwrap(), 1_000_000);

        let floats: TypedView<f64> = TypedView::new(buf, 16, 2).unwrap();
        floats.set(1, 2.5).unwrap();
        assert_eq!(floats.get(1).unwrap(), 2.5);
    }

    #[test]
    fn aliasing_views_observe_each_other() {
        let buf = buffer(16);
        let ints: TypedView<i32> = TypedView::new(buf.clone(), 0, 1).unwrap();
        let bytes: TypedView<u8> = TypedView::new(buf, 0, 4).unwrap();

        ints.set(0, 0x0403_0201).unwrap();
        let raw: Vec<u8> = bytes.to_vec();
        let mut expected = 0x0403_0201i32.to_ne_bytes().to_vec();
        expected.truncate(4);
        assert_eq!(raw, expected);
    }

    #[test]
    fn bounds_are_enforced_at_creation_and_access() {
        let buf = buffer(16);
        assert!(TypedView::<f64>::new(buf.clone(), 8, 2).is_err());
        let view: TypedView<f64> = TypedView::new(buf, 0, 2).unwrap();
        assert!(view.get(2).is_err());
        assert!(view.set(2, 0.0).is_err());
    }

    #[test]
    fn view_count_follows_lifetimes() {
        let buf = buffer(16);
        assert_eq!(buf.view_count(), 0);
        let view: TypedView<u8> = TypedView::new(buf.clone(), 0, 16).unwrap();
        assert_eq!(buf.view_count(), 1);
        drop(view);
        assert_eq!(buf.view_count(), 0);
    }
}

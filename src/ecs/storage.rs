use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr;

use crate::ecs::types::Row;

/// Starting capacity of a column's first allocation.
const FIRST_CAPACITY: u32 = 64;

/// One component type's contiguous data array within an archetype.
///
/// Invariant:
/// - `data` is either null (nothing allocated yet) or an allocation of
///   exactly `capacity * elem_size` bytes aligned to `elem_align`.
/// - Rows `0..count` hold live element bytes; rows `count..capacity` are
///   unspecified.
/// - Writes never straddle element boundaries; rows outside `0..count` are a
///   contract violation.
///
/// The column is byte-oriented: it knows element size and alignment but not
/// the element type. Elements are plain data, so relocation is a `memcpy`
/// and removal runs no destructors.
pub struct ColumnStore {
    data: *mut u8,
    elem_size: usize,
    elem_align: usize,
    count: u32,
    capacity: u32,
}

// The column owns its allocation outright and hands out raw pointers only
// under the borrow rules documented on `ptr_at`.
unsafe impl Send for ColumnStore {}
unsafe impl Sync for ColumnStore {}

impl ColumnStore {
    /// Creates an empty column for elements of the given layout.
    ///
    /// No memory is allocated until the first push.
    pub fn new(elem_size: usize, elem_align: usize) -> Self {
        debug_assert!(elem_size > 0);
        debug_assert!(elem_align.is_power_of_two());
        Self {
            data: ptr::null_mut(),
            elem_size,
            elem_align,
            count: 0,
            capacity: 0,
        }
    }

    /// Number of live elements.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Allocated capacity in elements.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Size of one element in bytes.
    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Base pointer of the column, or null before the first allocation.
    ///
    /// Borrowed until the next grow or swap-remove of this column.
    #[inline]
    pub fn raw(&self) -> *const u8 {
        self.data
    }

    /// Mutable base pointer of the column, or null before the first
    /// allocation. Same borrow rules as [`raw`](Self::raw).
    #[inline]
    pub fn raw_mut(&mut self) -> *mut u8 {
        self.data
    }

    /// Appends a zero-initialized element and returns its row.
    ///
    /// Grows the allocation geometrically (2x, starting at 64 elements) when
    /// full. Growth preserves alignment and copies the live prefix.
    pub fn push_zeroed(&mut self) -> Row {
        if self.count == self.capacity {
            let next = if self.capacity == 0 { FIRST_CAPACITY } else { self.capacity * 2 };
            self.grow(next);
        }
        let row = self.count;
        unsafe {
            ptr::write_bytes(self.data.add(row as usize * self.elem_size), 0, self.elem_size);
        }
        self.count += 1;
        row
    }

    /// Copies `elem_size` bytes into `row`.
    ///
    /// ## Panics
    /// Panics if `row` is out of range or `bytes` is not exactly one element.
    pub fn write(&mut self, row: Row, bytes: &[u8]) {
        assert!(row < self.count, "column write out of range: row {row} of {}", self.count);
        assert_eq!(
            bytes.len(),
            self.elem_size,
            "column write size mismatch: {} bytes into {}-byte elements",
            bytes.len(),
            self.elem_size
        );
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.data.add(row as usize * self.elem_size),
                self.elem_size,
            );
        }
    }

    /// Pointer to the element at `row`, offset from [`raw`](Self::raw).
    ///
    /// Valid until the next grow or swap-remove of this column.
    ///
    /// ## Panics
    /// Panics if `row >= count`.
    #[inline]
    pub fn ptr_at(&self, row: Row) -> *const u8 {
        assert!(row < self.count, "column read out of range: row {row} of {}", self.count);
        unsafe { self.raw().add(row as usize * self.elem_size) }
    }

    /// Mutable pointer to the element at `row`, offset from
    /// [`raw_mut`](Self::raw_mut). Same rules as [`ptr_at`](Self::ptr_at).
    #[inline]
    pub fn ptr_at_mut(&mut self, row: Row) -> *mut u8 {
        assert!(row < self.count, "column read out of range: row {row} of {}", self.count);
        unsafe { self.raw_mut().add(row as usize * self.elem_size) }
    }

    /// Byte view of the element at `row`.
    #[inline]
    pub fn bytes_at(&self, row: Row) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr_at(row), self.elem_size) }
    }

    /// Removes `row` by overwriting it with the last element. O(1).
    ///
    /// The caller is responsible for fixing up whatever bookkeeping pointed
    /// at the relocated last element.
    pub fn swap_remove(&mut self, row: Row) {
        assert!(row < self.count, "swap_remove out of range: row {row} of {}", self.count);
        let last = self.count - 1;
        if row < last {
            unsafe {
                ptr::copy_nonoverlapping(
                    self.data.add(last as usize * self.elem_size),
                    self.data.add(row as usize * self.elem_size),
                    self.elem_size,
                );
            }
        }
        self.count = last;
    }

    /// Reallocates the column down to exactly `count` elements.
    ///
    /// Columns never shrink on their own; this is the explicit opt-in.
    /// Invalidates every pointer previously handed out for this column.
    pub fn compact(&mut self) {
        if self.capacity == self.count {
            return;
        }
        if self.count == 0 {
            self.release();
            return;
        }
        self.grow(self.count);
    }

    fn layout_for(&self, elements: u32) -> Layout {
        let bytes = self
            .elem_size
            .checked_mul(elements as usize)
            .expect("column byte size overflow");
        Layout::from_size_align(bytes, self.elem_align).expect("invalid column layout")
    }

    /// Reallocates to `new_cap` elements (which may be below the old
    /// capacity during `compact`), copying the live prefix.
    fn grow(&mut self, new_cap: u32) {
        debug_assert!(new_cap >= self.count && new_cap > 0);
        let new_layout = self.layout_for(new_cap);
        let new_data = unsafe { alloc(new_layout) };
        if new_data.is_null() {
            handle_alloc_error(new_layout);
        }
        if !self.data.is_null() {
            if self.count > 0 {
                unsafe {
                    ptr::copy_nonoverlapping(
                        self.data,
                        new_data,
                        self.count as usize * self.elem_size,
                    );
                }
            }
            let old_layout = self.layout_for(self.capacity);
            unsafe { dealloc(self.data, old_layout) };
        }
        self.data = new_data;
        self.capacity = new_cap;
    }

    fn release(&mut self) {
        if !self.data.is_null() {
            let layout = self.layout_for(self.capacity);
            unsafe { dealloc(self.data, layout) };
            self.data = ptr::null_mut();
            self.capacity = 0;
        }
    }
}

impl Drop for ColumnStore {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_zeroes_and_grows_geometrically() {
        let mut col = ColumnStore::new(8, 8);
        assert_eq!(col.capacity(), 0);
        for i in 0..65u64 {
            let row = col.push_zeroed();
            assert_eq!(row as u64, i);
            assert_eq!(col.bytes_at(row), &[0u8; 8]);
        }
        assert_eq!(col.count(), 65);
        assert_eq!(col.capacity(), 128);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut col = ColumnStore::new(4, 4);
        let row = col.push_zeroed();
        col.write(row, &7u32.to_ne_bytes());
        assert_eq!(col.bytes_at(row), &7u32.to_ne_bytes());
    }

    #[test]
    fn swap_remove_moves_last_into_hole() {
        let mut col = ColumnStore::new(4, 4);
        for value in [10u32, 20, 30] {
            let row = col.push_zeroed();
            col.write(row, &value.to_ne_bytes());
        }
        col.swap_remove(0);
        assert_eq!(col.count(), 2);
        assert_eq!(col.bytes_at(0), &30u32.to_ne_bytes());
        assert_eq!(col.bytes_at(1), &20u32.to_ne_bytes());
    }

    #[test]
    fn alignment_survives_growth() {
        let mut col = ColumnStore::new(32, 16);
        for _ in 0..200 {
            col.push_zeroed();
        }
        assert_eq!(col.raw() as usize % 16, 0);
    }

    #[test]
    fn compact_shrinks_to_count() {
        let mut col = ColumnStore::new(4, 4);
        for value in 0..100u32 {
            let row = col.push_zeroed();
            col.write(row, &value.to_ne_bytes());
        }
        assert!(col.capacity() > 100);
        col.compact();
        assert_eq!(col.capacity(), 100);
        assert_eq!(col.bytes_at(99), &99u32.to_ne_bytes());
    }

    #[test]
    #[should_panic]
    fn out_of_range_read_panics() {
        let col = ColumnStore::new(4, 4);
        let _ = col.ptr_at(0);
    }
}

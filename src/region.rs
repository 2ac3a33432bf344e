//! Sources of raw memory for the heap.

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};

use crate::align::{ALIGNMENT, checked_align};

/// The "grow the managed region by N bytes" primitive.
///
/// # Safety
///
/// Implementors must hand out memory contiguously upward: a successful call
/// returns the address right after the end of the previous grant, and the
/// `bytes` returned stay valid and untouched by anyone else for as long as
/// the implementor lives. Existing memory is never moved.
pub unsafe trait RegionGrower {
  /// Extends the region by exactly `bytes`, returning the start of the new
  /// bytes, or `None` when the region cannot grow.
  fn grow_region(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

/// Grows the program break with `sbrk(2)`.
///
/// Contiguity only holds as long as nothing else in the process moves the
/// break; the heap detects the violation and reports it instead of using
/// the foreign memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

unsafe impl RegionGrower for Sbrk {
  fn grow_region(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(bytes).ok()?;

    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(address.cast())
  }
}

/// A fixed-capacity region carved out of one word-aligned buffer, handed out
/// front to back like a private program break.
#[derive(Debug)]
pub struct FixedRegion {
  base: NonNull<u8>,
  len: usize,
  capacity: usize,
  grow_calls: usize,
}

pub const DEFAULT_FIXED_CAPACITY: usize = 1 << 20;

impl FixedRegion {
  /// Reserves `capacity` bytes (rounded up to the alignment unit). Aborts
  /// through [`alloc::handle_alloc_error`] if the system allocator fails.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` exceeds `isize::MAX` bytes.
  pub fn with_capacity(capacity: usize) -> Self {
    let Some(capacity) = checked_align(capacity.max(1)) else {
      panic!("capacity overflow")
    };
    let Ok(layout) = Layout::from_size_align(capacity, ALIGNMENT) else {
      panic!("capacity overflow")
    };

    let base = unsafe { alloc::alloc_zeroed(layout) };
    let Some(base) = NonNull::new(base) else {
      alloc::handle_alloc_error(layout)
    };

    Self {
      base,
      len: 0,
      capacity,
      grow_calls: 0,
    }
  }

  /// Bytes handed out so far.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of successful growth calls.
  pub fn grow_calls(&self) -> usize {
    self.grow_calls
  }
}

impl Default for FixedRegion {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_FIXED_CAPACITY)
  }
}

unsafe impl RegionGrower for FixedRegion {
  fn grow_region(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.len.checked_add(bytes)?;
    if end > self.capacity {
      return None;
    }

    let start = unsafe { self.base.add(self.len) };
    self.len = end;
    self.grow_calls += 1;
    Some(start)
  }
}

impl Drop for FixedRegion {
  fn drop(&mut self) {
    // `capacity` was accepted by `Layout::from_size_align` in the constructor.
    let layout = unsafe { Layout::from_size_align_unchecked(self.capacity, ALIGNMENT) };
    unsafe { alloc::dealloc(self.base.as_ptr(), layout) };
  }
}

// The buffer is exclusively owned.
unsafe impl Send for FixedRegion {}

/// Leaves `gap` unused bytes in front of the grant made on call number
/// `gap_on_call`, as if someone else had moved the break in between.
#[cfg(test)]
pub(crate) struct GappedRegion {
  inner: FixedRegion,
  gap_on_call: usize,
  gap: usize,
  calls: usize,
}

#[cfg(test)]
impl GappedRegion {
  pub fn new(
    capacity: usize,
    gap_on_call: usize,
    gap: usize,
  ) -> Self {
    Self {
      inner: FixedRegion::with_capacity(capacity),
      gap_on_call,
      gap,
      calls: 0,
    }
  }
}

#[cfg(test)]
unsafe impl RegionGrower for GappedRegion {
  fn grow_region(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    self.calls += 1;
    if self.calls == self.gap_on_call {
      self.inner.grow_region(self.gap)?;
    }
    self.inner.grow_region(bytes)
  }
}

/// Starts `skew` bytes past an aligned address, then grows contiguously.
#[cfg(test)]
pub(crate) struct SkewedRegion {
  inner: FixedRegion,
  skew: Option<usize>,
}

#[cfg(test)]
impl SkewedRegion {
  pub fn new(
    capacity: usize,
    skew: usize,
  ) -> Self {
    Self {
      inner: FixedRegion::with_capacity(capacity),
      skew: Some(skew),
    }
  }
}

#[cfg(test)]
unsafe impl RegionGrower for SkewedRegion {
  fn grow_region(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if let Some(skew) = self.skew.take() {
      self.inner.grow_region(skew)?;
    }
    self.inner.grow_region(bytes)
  }
}

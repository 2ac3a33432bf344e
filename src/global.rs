use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
  sync::{Mutex, PoisonError},
};

use log::warn;

use crate::{
  align::ALIGNMENT,
  config::HeapConfig,
  heap::Heap,
  region::{RegionGrower, Sbrk},
};

/// [`GlobalAlloc`] adapter around a lazily initialized [`Heap`].
///
/// Every entry point takes the same mutex, which is what makes the
/// single-threaded heap safe to share. Layouts aligned beyond one word are
/// refused with a null pointer.
///
/// ```rust,ignore
/// #[global_allocator]
/// static ALLOCATOR: segalloc::SegAlloc = segalloc::SegAlloc::new();
/// ```
///
/// Installed globally, the heap must not log through a logger that itself
/// allocates, or the allocation re-enters the locked heap.
pub struct SegAlloc<R: RegionGrower = Sbrk> {
  config: HeapConfig,
  heap: Mutex<Option<Heap<R>>>,
}

impl SegAlloc<Sbrk> {
  pub const fn new() -> Self {
    Self::with_config(HeapConfig::DEFAULT)
  }
}

impl Default for SegAlloc<Sbrk> {
  fn default() -> Self {
    Self::new()
  }
}

impl<R: RegionGrower + Default> SegAlloc<R> {
  pub const fn with_config(config: HeapConfig) -> Self {
    Self {
      config,
      heap: Mutex::new(None),
    }
  }

  /// Runs `f` on the heap, building it first if needed. Returns `None` when
  /// the heap cannot be built.
  fn with_heap<T>(
    &self,
    f: impl FnOnce(&mut Heap<R>) -> T,
  ) -> Option<T> {
    let mut guard = self.heap.lock().unwrap_or_else(PoisonError::into_inner);

    if guard.is_none() {
      match Heap::new(R::default(), self.config) {
        Ok(heap) => *guard = Some(heap),
        Err(err) => {
          warn!("heap initialization failed: {err}");
          return None;
        }
      }
    }

    guard.as_mut().map(f)
  }
}

fn into_raw(result: Option<Option<NonNull<u8>>>) -> *mut u8 {
  result.flatten().map_or(ptr::null_mut(), NonNull::as_ptr)
}

unsafe impl<R: RegionGrower + Default + Send> GlobalAlloc for SegAlloc<R> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }
    into_raw(self.with_heap(|heap| heap.allocate(layout.size()).ok().flatten()))
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    if let Some(ptr) = NonNull::new(ptr) {
      self.with_heap(|heap| unsafe { heap.release(ptr) });
    }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    let Some(ptr) = NonNull::new(ptr) else {
      return unsafe { self.alloc(Layout::from_size_align_unchecked(new_size, layout.align())) };
    };
    into_raw(self.with_heap(|heap| unsafe { heap.resize(ptr, new_size) }.ok().flatten()))
  }
}

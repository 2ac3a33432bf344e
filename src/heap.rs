use std::ptr::{self, NonNull};

use log::{debug, error, trace, warn};

use crate::{
  align::{ALIGNMENT, checked_align},
  block::{BlockPtr, DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  config::HeapConfig,
  directory::Directory,
  error::AllocError,
  region::RegionGrower,
};

/// A segregated-fits heap over one contiguous, growing region.
///
/// ```text
///   start                                                          end
///   | prologue hdr | prologue ftr | block | block | ... | epilogue hdr |
/// ```
///
/// The heap owns its region and hands out word-aligned payloads. It is not
/// thread-safe; wrap it in a lock (see [`SegAlloc`](crate::SegAlloc)) to
/// share it.
pub struct Heap<R: RegionGrower> {
  region: R,
  config: HeapConfig,
  directory: Directory,
  start: NonNull<u8>,
  prologue: BlockPtr,
  epilogue: BlockPtr,
}

// The region memory is exclusively owned by the heap.
unsafe impl<R: RegionGrower + Send> Send for Heap<R> {}

/// Block size needed to hold `payload` bytes: header plus payload, rounded to
/// the alignment unit, never below the minimum block size.
pub fn block_size_for(payload: usize) -> Result<usize, AllocError> {
  payload
    .checked_add(WSIZE)
    .and_then(checked_align)
    .filter(|size| *size <= isize::MAX as usize)
    .map(|size| size.max(MIN_BLOCK_SIZE))
    .ok_or(AllocError::TooLarge { requested: payload })
}

impl<R: RegionGrower> Heap<R> {
  /// Lays down the sentinels and performs the initial growth.
  pub fn new(
    mut region: R,
    config: HeapConfig,
  ) -> Result<Self, AllocError> {
    config.validate()?;

    let sentinels = 3 * WSIZE;
    let granted = region
      .grow_region(sentinels)
      .ok_or(AllocError::OutOfMemory { requested: sentinels })?;

    let padding = (ALIGNMENT - granted.as_ptr() as usize % ALIGNMENT) % ALIGNMENT;
    let start = if padding == 0 {
      granted
    } else {
      let expected = granted.as_ptr() as usize + sentinels;
      let extra = region
        .grow_region(padding)
        .ok_or(AllocError::OutOfMemory { requested: padding })?;
      if extra.as_ptr() as usize != expected {
        return Err(AllocError::Discontiguous {
          expected,
          actual: extra.as_ptr() as usize,
        });
      }
      unsafe { granted.add(padding) }
    };

    let (prologue, epilogue) = unsafe {
      let prologue = BlockPtr::from_header(start);
      let tag = Tag::encode(DSIZE, true).with_prev_allocated(true);
      prologue.set_header(tag);
      prologue.set_footer(tag);

      let epilogue = prologue.next_block();
      epilogue.set_header(Tag::encode(0, true).with_prev_allocated(true));
      (prologue, epilogue)
    };

    let mut heap = Self {
      region,
      config,
      directory: Directory::new(config.size_classes),
      start,
      prologue,
      epilogue,
    };

    unsafe { heap.grow(config.initial_size)? };

    debug!(
      "heap initialized at {:?}: {} bytes, {} size classes",
      start,
      heap.heap_size(),
      config.size_classes
    );
    heap.after_op("init");

    Ok(heap)
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn region(&self) -> &R {
    &self.region
  }

  /// Size class a free block of `size` bytes is filed under.
  pub fn class_of(
    &self,
    size: usize,
  ) -> usize {
    self.directory.class_of(size)
  }

  /// Bytes between the start of the region and the end of the epilogue.
  pub fn heap_size(&self) -> usize {
    self.epilogue.addr() - self.start.as_ptr() as usize
  }

  /// Allocates `size` payload bytes. A zero-byte request allocates nothing
  /// and returns `Ok(None)`.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    if size == 0 {
      return Ok(None);
    }

    let need = block_size_for(size)?;
    let block = unsafe { self.allocate_block(need)? };

    trace!("allocate({size}) -> {:?} ({} byte block)", block.payload(), unsafe { block.size() });
    self.after_op("allocate");

    Ok(Some(block.payload()))
  }

  /// Returns a block to the heap and merges it with its free neighbours.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this heap and not released since. The
  /// payload must not be used afterwards.
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    unsafe {
      let block = BlockPtr::from_payload(ptr);
      let size = block.size();

      block.write_free(size, block.is_prev_allocated());
      block.next_block().set_prev_allocated(false);
      self.directory.insert(block);
      let merged = self.coalesce(block);

      trace!("release({ptr:?}) -> free block {:?} of {} bytes", merged.payload(), merged.size());
    }
    self.after_op("release");
  }

  /// Resizes an allocation, in place when possible.
  ///
  /// A zero `size` releases the block and returns `Ok(None)`. On error the
  /// original block is left untouched and still owned by the caller.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this heap and not released since.
  pub unsafe fn resize(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    if size == 0 {
      unsafe { self.release(ptr) };
      return Ok(None);
    }

    let need = block_size_for(size)?;
    let block = unsafe { BlockPtr::from_payload(ptr) };
    let current = unsafe { block.size() };

    if current >= need {
      trace!("resize({ptr:?}, {size}) fits the current {current} byte block");
      return Ok(Some(ptr));
    }

    if unsafe { self.extend_in_place(block, need)? } {
      trace!("resize({ptr:?}, {size}) extended in place to {} bytes", unsafe { block.size() });
      self.after_op("resize");
      return Ok(Some(ptr));
    }

    let fresh = unsafe { self.allocate_block(need)? };
    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), fresh.payload().as_ptr(), (current - WSIZE).min(size));
      self.release(ptr);
    }

    trace!("resize({ptr:?}, {size}) moved to {:?}", fresh.payload());
    self.after_op("resize");

    Ok(Some(fresh.payload()))
  }

  /// Usable payload bytes of a live allocation, at least the size it was
  /// requested with.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this heap and not released since.
  pub unsafe fn payload_capacity(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { BlockPtr::from_payload(ptr).size() - WSIZE }
  }

  pub(crate) fn directory(&self) -> &Directory {
    &self.directory
  }

  #[cfg(test)]
  pub(crate) fn directory_mut(&mut self) -> &mut Directory {
    &mut self.directory
  }

  pub(crate) fn start(&self) -> NonNull<u8> {
    self.start
  }

  pub(crate) fn prologue(&self) -> BlockPtr {
    self.prologue
  }

  pub(crate) fn epilogue(&self) -> BlockPtr {
    self.epilogue
  }

  unsafe fn allocate_block(
    &mut self,
    need: usize,
  ) -> Result<BlockPtr, AllocError> {
    let block = match unsafe { self.directory.find_fit(need) } {
      Some(block) => block,
      None => unsafe { self.grow(need.max(self.config.chunk_size))? },
    };

    unsafe {
      self.directory.remove(block);
      let available = block.size();
      self.carve(block, available, need);
    }

    Ok(block)
  }

  /// Marks `block` allocated with `need` bytes out of `available`, returning
  /// a usable tail to the free lists. `block` must not be listed.
  unsafe fn carve(
    &mut self,
    block: BlockPtr,
    available: usize,
    need: usize,
  ) {
    unsafe {
      let prev_allocated = block.is_prev_allocated();

      if available - need >= MIN_BLOCK_SIZE {
        block.write_allocated(need, prev_allocated);
        let rest = block.next_block();
        rest.write_free(available - need, true);
        self.directory.insert(rest);
      } else {
        block.write_allocated(available, prev_allocated);
        block.next_block().set_prev_allocated(true);
      }
    }
  }

  /// Grows `block` over its right neighbour when that neighbour is free or
  /// the epilogue, extending the region first when the neighbour is the last
  /// block and still too small. Returns `false` when the block cannot grow
  /// in place.
  unsafe fn extend_in_place(
    &mut self,
    block: BlockPtr,
    need: usize,
  ) -> Result<bool, AllocError> {
    unsafe {
      let mut next = block.next_block();
      let next_is_epilogue = next.size() == 0;
      if next.is_allocated() && !next_is_epilogue {
        return Ok(false);
      }

      let mut available = block.size() + next.size();
      if available < need {
        let at_end = next_is_epilogue || next.next_block().size() == 0;
        if !at_end {
          return Ok(false);
        }
        self.grow((need - available).max(self.config.chunk_size))?;
        next = block.next_block();
        available = block.size() + next.size();
      }

      self.directory.remove(next);
      self.carve(block, available, need);
    }

    Ok(true)
  }

  /// Extends the region by at least `bytes` and returns the resulting free
  /// block, already merged with a free block that ended at the old epilogue.
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<BlockPtr, AllocError> {
    let size = checked_align(bytes)
      .ok_or(AllocError::TooLarge { requested: bytes })?
      .max(MIN_BLOCK_SIZE);

    let expected = self.epilogue.payload();
    let Some(granted) = self.region.grow_region(size) else {
      warn!("region refused to grow by {size} bytes");
      return Err(AllocError::OutOfMemory { requested: size });
    };
    if granted != expected {
      warn!("region grew at {granted:?} instead of {expected:?}");
      return Err(AllocError::Discontiguous {
        expected: expected.as_ptr() as usize,
        actual: granted.as_ptr() as usize,
      });
    }

    unsafe {
      let block = self.epilogue;
      block.write_free(size, block.is_prev_allocated());

      let epilogue = block.next_block();
      epilogue.set_header(Tag::encode(0, true));
      self.epilogue = epilogue;

      debug!("grew region by {size} bytes, heap is now {} bytes", self.heap_size());

      self.directory.insert(block);
      Ok(self.coalesce(block))
    }
  }

  /// Merges a listed free block with its free neighbours and returns the
  /// resulting block, which is listed under its new size.
  unsafe fn coalesce(
    &mut self,
    block: BlockPtr,
  ) -> BlockPtr {
    unsafe {
      let mut merged = block;
      let mut size = block.size();

      let next = block.next_block();
      if !next.is_allocated() {
        self.directory.remove(next);
        size += next.size();
      }

      if !block.is_prev_allocated() {
        let prev = block.prev_block();
        self.directory.remove(prev);
        size += prev.size();
        merged = prev;
      }

      if size == block.size() {
        return block;
      }

      self.directory.remove(block);
      merged.write_free(size, merged.is_prev_allocated());
      self.directory.insert(merged);
      merged
    }
  }

  fn after_op(
    &self,
    op: &str,
  ) {
    if !self.config.check_heap {
      return;
    }
    if let Err(err) = self.check() {
      error!("heap check failed after {op}: {err}");
      if cfg!(debug_assertions) {
        panic!("heap check failed after {op}: {err}");
      }
    }
  }
}

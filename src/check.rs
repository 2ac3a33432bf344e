//! Heap inspection: block and free-list iterators plus the consistency
//! checker. None of this is on the allocation path.

use std::{marker::PhantomData, ptr::NonNull};

use crate::{
  align::is_aligned,
  block::{BlockPtr, DSIZE, MIN_BLOCK_SIZE, WSIZE},
  error::HeapCheckError,
  heap::Heap,
  region::RegionGrower,
};

/// A block as seen from outside the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub payload: NonNull<u8>,
  /// Whole block size, header included.
  pub size: usize,
  pub allocated: bool,
}

impl BlockInfo {
  fn of(block: BlockPtr) -> Self {
    let (size, allocated) = unsafe { block.header() }.decode();
    Self {
      payload: block.payload(),
      size,
      allocated,
    }
  }
}

/// Summary returned by a successful [`Heap::check`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
}

/// Every block between the sentinels, in address order.
pub struct Blocks<'a> {
  next: BlockPtr,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let block = self.next;
    if unsafe { block.size() } == 0 {
      return None;
    }
    self.next = unsafe { block.next_block() };
    Some(BlockInfo::of(block))
  }
}

/// The blocks of one size class, smallest first.
pub struct FreeList<'a> {
  next: Option<BlockPtr>,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for FreeList<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let block = self.next?;
    self.next = unsafe { block.succ() };
    Some(BlockInfo::of(block))
  }
}

impl<R: RegionGrower> Heap<R> {
  /// Walks the region as an implicit list. Assumes a consistent heap; use
  /// [`Heap::check`] first when in doubt.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      next: unsafe { self.prologue().next_block() },
      _heap: PhantomData,
    }
  }

  /// # Panics
  ///
  /// Panics if `class` is not below the configured number of size classes.
  pub fn free_list(
    &self,
    class: usize,
  ) -> FreeList<'_> {
    assert!(class < self.directory().classes(), "size class {class} out of range");
    FreeList {
      next: self.directory().head(class),
      _heap: PhantomData,
    }
  }

  /// Validates the whole heap: the implicit block list first, then every
  /// free list against it. Stops at the first violation.
  ///
  /// Bounds are checked before any word is read, so a corrupted heap is
  /// reported rather than followed outside the region.
  pub fn check(&self) -> Result<HeapStats, HeapCheckError> {
    let start = self.start().as_ptr() as usize;
    let end = self.epilogue().addr();
    let mut stats = HeapStats {
      heap_size: end - start,
      ..HeapStats::default()
    };

    unsafe {
      let prologue = self.prologue();
      let tag = prologue.header();
      if tag.size() != DSIZE || !tag.is_allocated() || prologue.footer() != tag {
        return Err(HeapCheckError::BadPrologue { addr: prologue.addr() });
      }

      // Free block addresses in address order, for the list pass.
      let mut free_starts = Vec::new();
      let mut prev_allocated = true;
      let mut left = prologue.addr();
      let mut block = prologue.next_block();
      loop {
        let addr = block.addr();
        if !is_aligned(addr) {
          return Err(HeapCheckError::Misaligned { addr });
        }
        if addr > end {
          return Err(HeapCheckError::OutOfBounds { addr });
        }

        let tag = block.header();
        if tag.is_prev_allocated() != prev_allocated {
          return Err(HeapCheckError::PrevAllocatedMismatch { addr });
        }

        let size = tag.size();
        if size == 0 {
          if addr != end || !tag.is_allocated() {
            return Err(HeapCheckError::BadEpilogue { addr });
          }
          break;
        }
        if size < MIN_BLOCK_SIZE || !is_aligned(size) {
          return Err(HeapCheckError::BadSize { addr, size });
        }
        if addr + size > end {
          return Err(HeapCheckError::OutOfBounds { addr });
        }

        if tag.is_allocated() {
          stats.allocated_blocks += 1;
          stats.allocated_bytes += size;
        } else {
          if block.footer() != tag {
            return Err(HeapCheckError::FooterMismatch { addr });
          }
          if !prev_allocated {
            return Err(HeapCheckError::AdjacentFree { addr: left });
          }
          stats.free_blocks += 1;
          stats.free_bytes += size;
          free_starts.push(addr);
        }

        prev_allocated = tag.is_allocated();
        left = addr;
        block = block.next_block();
      }

      let first = prologue.addr() + DSIZE;
      let mut listed = 0;
      for class in 0..self.directory().classes() {
        let mut pred: Option<BlockPtr> = None;
        let mut last_size = 0;
        let mut cursor = self.directory().head(class);

        while let Some(block) = cursor {
          let addr = block.addr();
          if addr < first || addr + DSIZE + WSIZE > end || !is_aligned(addr) {
            return Err(HeapCheckError::ListedOutOfBounds { class, addr });
          }
          if block.pred() != pred {
            return Err(HeapCheckError::BrokenLink { class, addr });
          }

          let tag = block.header();
          if tag.is_allocated() {
            return Err(HeapCheckError::ListedAllocated { class, addr });
          }
          if self.directory().class_of(tag.size()) != class {
            return Err(HeapCheckError::WrongClass { class, addr });
          }
          if free_starts.binary_search(&addr).is_err() {
            return Err(HeapCheckError::ListedNotABlock { class, addr });
          }
          if tag.size() < last_size {
            return Err(HeapCheckError::Unordered { class, addr });
          }

          listed += 1;
          if listed > stats.free_blocks {
            return Err(HeapCheckError::FreeCountMismatch {
              listed,
              free: stats.free_blocks,
            });
          }

          last_size = tag.size();
          pred = Some(block);
          cursor = block.succ();
        }
      }

      if listed != stats.free_blocks {
        return Err(HeapCheckError::FreeCountMismatch {
          listed,
          free: stats.free_blocks,
        });
      }
    }

    Ok(stats)
  }
}

//! Segregated free lists.
//!
//! Class `i` holds free blocks of size `[MIN_BLOCK_SIZE << i, MIN_BLOCK_SIZE << (i + 1))`,
//! except the last class, which is unbounded. Each list is doubly linked
//! through the blocks' own payload and kept in ascending size order, so the
//! head of a list is its smallest block.

use crate::block::{BlockPtr, MIN_BLOCK_SIZE};

/// Upper bound on the number of size classes a directory can hold.
pub const MAX_SIZE_CLASSES: usize = 16;

pub struct Directory {
  heads: [Option<BlockPtr>; MAX_SIZE_CLASSES],
  classes: usize,
}

impl Directory {
  /// `classes` must be in `1..=MAX_SIZE_CLASSES`; the config validates it.
  pub fn new(classes: usize) -> Self {
    debug_assert!((1..=MAX_SIZE_CLASSES).contains(&classes));
    Self {
      heads: [None; MAX_SIZE_CLASSES],
      classes,
    }
  }

  pub fn classes(&self) -> usize {
    self.classes
  }

  pub fn class_of(
    &self,
    size: usize,
  ) -> usize {
    let steps = (size / MIN_BLOCK_SIZE).max(1);
    let log2 = (usize::BITS - 1 - steps.leading_zeros()) as usize;
    log2.min(self.classes - 1)
  }

  pub fn head(
    &self,
    class: usize,
  ) -> Option<BlockPtr> {
    self.heads[class]
  }

  /// Links a free block into its class before the first entry that is at
  /// least as large.
  ///
  /// # Safety
  ///
  /// `block` must be a free block that is in no list.
  pub unsafe fn insert(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      let size = block.size();
      let class = self.class_of(size);

      let mut pred = None;
      let mut cursor = self.heads[class];
      while let Some(current) = cursor {
        if current.size() >= size {
          break;
        }
        pred = Some(current);
        cursor = current.succ();
      }

      block.set_pred(pred);
      block.set_succ(cursor);
      match pred {
        Some(pred) => pred.set_succ(Some(block)),
        None => self.heads[class] = Some(block),
      }
      if let Some(succ) = cursor {
        succ.set_pred(Some(block));
      }
    }
  }

  /// Unlinks a free block from its class.
  ///
  /// # Safety
  ///
  /// `block` must currently be linked, and its header must still hold the
  /// size it was inserted with.
  pub unsafe fn remove(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      let pred = block.pred();
      let succ = block.succ();

      match pred {
        Some(pred) => pred.set_succ(succ),
        None => {
          let class = self.class_of(block.size());
          self.heads[class] = succ;
        }
      }
      if let Some(succ) = succ {
        succ.set_pred(pred);
      }
    }
  }

  /// Smallest block of at least `need` bytes, scanning classes in ascending
  /// order. Only the first class can contain blocks that are too small, so
  /// it is the only one walked past its head.
  ///
  /// # Safety
  ///
  /// Every list must be consistent.
  pub unsafe fn find_fit(
    &self,
    need: usize,
  ) -> Option<BlockPtr> {
    let first = self.class_of(need);

    let mut cursor = self.heads[first];
    while let Some(current) = cursor {
      if unsafe { current.size() } >= need {
        return Some(current);
      }
      cursor = unsafe { current.succ() };
    }

    self.heads[first + 1..self.classes].iter().find_map(|head| *head)
  }
}

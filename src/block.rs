//! Boundary-tag codec.
//!
//! A block pointer always points at the payload, one word past the header:
//!
//! ```text
//!   allocated:  | hdr | payload ..................... |
//!   free:       | hdr | pred | succ | ...unused... | ftr |
//!                     ^
//!                     BlockPtr
//! ```
//!
//! The low bits of a tag are free because sizes are word multiples. Bit 0 is
//! the block's own allocation state, bit 1 the allocation state of the block
//! to its left. Footers are only written for free blocks, so the left
//! neighbour's footer may be read only after bit 1 said it is free.

use core::{mem, ptr::NonNull};

use crate::align::ALIGNMENT;

/// Width of a header, footer or list link.
pub const WSIZE: usize = mem::size_of::<usize>();
/// Header plus footer; also the size of the prologue.
pub const DSIZE: usize = 2 * WSIZE;
/// Header, predecessor link, successor link and footer.
pub const MIN_BLOCK_SIZE: usize = 4 * WSIZE;

const ALLOC_BIT: usize = 0b01;
const PREV_ALLOC_BIT: usize = 0b10;
const SIZE_MASK: usize = !(ALIGNMENT - 1);

/// Packed size and allocation bits, as stored in headers and footers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag(usize);

impl Tag {
  pub const fn encode(
    size: usize,
    allocated: bool,
  ) -> Self {
    debug_assert!(size & !SIZE_MASK == 0);
    Self(size | allocated as usize)
  }

  pub const fn with_prev_allocated(
    self,
    prev_allocated: bool,
  ) -> Self {
    if prev_allocated {
      Self(self.0 | PREV_ALLOC_BIT)
    } else {
      Self(self.0 & !PREV_ALLOC_BIT)
    }
  }

  pub const fn decode(self) -> (usize, bool) {
    (self.size(), self.is_allocated())
  }

  pub const fn size(self) -> usize {
    self.0 & SIZE_MASK
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOC_BIT != 0
  }

  pub const fn is_prev_allocated(self) -> bool {
    self.0 & PREV_ALLOC_BIT != 0
  }
}

/// Payload address of a block inside the managed region.
///
/// Every accessor is `unsafe`: the codec trusts the heap to be consistent
/// and performs no validation of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockPtr(NonNull<u8>);

impl BlockPtr {
  /// # Safety
  ///
  /// `payload` must be the payload address of a block of this heap.
  pub const unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self(payload)
  }

  /// # Safety
  ///
  /// `header` must point at a block header inside the managed region.
  pub unsafe fn from_header(header: NonNull<u8>) -> Self {
    Self(unsafe { header.add(WSIZE) })
  }

  pub const fn payload(self) -> NonNull<u8> {
    self.0
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  pub unsafe fn header_of(self) -> *mut usize {
    unsafe { self.0.as_ptr().sub(WSIZE).cast() }
  }

  /// Footer address computed from the size currently in the header.
  pub unsafe fn footer_of(self) -> *mut usize {
    unsafe { self.0.as_ptr().add(self.size() - DSIZE).cast() }
  }

  pub unsafe fn header(self) -> Tag {
    Tag(unsafe { self.header_of().read() })
  }

  pub unsafe fn set_header(
    self,
    tag: Tag,
  ) {
    unsafe { self.header_of().write(tag.0) }
  }

  pub unsafe fn footer(self) -> Tag {
    Tag(unsafe { self.footer_of().read() })
  }

  pub unsafe fn set_footer(
    self,
    tag: Tag,
  ) {
    unsafe { self.footer_of().write(tag.0) }
  }

  pub unsafe fn size(self) -> usize {
    unsafe { self.header().size() }
  }

  pub unsafe fn is_allocated(self) -> bool {
    unsafe { self.header().is_allocated() }
  }

  pub unsafe fn is_prev_allocated(self) -> bool {
    unsafe { self.header().is_prev_allocated() }
  }

  /// Writes a header (and no footer) for an allocated block.
  pub unsafe fn write_allocated(
    self,
    size: usize,
    prev_allocated: bool,
  ) {
    unsafe { self.set_header(Tag::encode(size, true).with_prev_allocated(prev_allocated)) }
  }

  /// Writes matching header and footer for a free block.
  pub unsafe fn write_free(
    self,
    size: usize,
    prev_allocated: bool,
  ) {
    let tag = Tag::encode(size, false).with_prev_allocated(prev_allocated);
    unsafe {
      self.set_header(tag);
      self.set_footer(tag);
    }
  }

  /// Updates the left-neighbour bit, keeping a free block's footer in sync.
  pub unsafe fn set_prev_allocated(
    self,
    prev_allocated: bool,
  ) {
    unsafe {
      let tag = self.header().with_prev_allocated(prev_allocated);
      self.set_header(tag);
      if !tag.is_allocated() {
        self.set_footer(tag);
      }
    }
  }

  pub unsafe fn next_block(self) -> BlockPtr {
    unsafe { Self(self.0.add(self.size())) }
  }

  /// Only legal when the left neighbour is free.
  pub unsafe fn prev_block(self) -> BlockPtr {
    unsafe {
      let prev_footer = Tag(self.0.as_ptr().sub(DSIZE).cast::<usize>().read());
      Self(self.0.sub(prev_footer.size()))
    }
  }

  pub unsafe fn pred(self) -> Option<BlockPtr> {
    unsafe { read_link(self.0.as_ptr()) }
  }

  pub unsafe fn set_pred(
    self,
    pred: Option<BlockPtr>,
  ) {
    unsafe { write_link(self.0.as_ptr(), pred) }
  }

  pub unsafe fn succ(self) -> Option<BlockPtr> {
    unsafe { read_link(self.0.as_ptr().add(WSIZE)) }
  }

  pub unsafe fn set_succ(
    self,
    succ: Option<BlockPtr>,
  ) {
    unsafe { write_link(self.0.as_ptr().add(WSIZE), succ) }
  }
}

unsafe fn read_link(slot: *mut u8) -> Option<BlockPtr> {
  NonNull::new(unsafe { slot.cast::<*mut u8>().read() }).map(BlockPtr)
}

unsafe fn write_link(
  slot: *mut u8,
  link: Option<BlockPtr>,
) {
  let raw = link.map_or(core::ptr::null_mut(), |block| block.0.as_ptr());
  unsafe { slot.cast::<*mut u8>().write(raw) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn block_at(
    words: &mut [usize],
    word: usize,
  ) -> BlockPtr {
    let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
    unsafe { BlockPtr::from_payload(base.add(word * WSIZE)) }
  }

  #[test]
  fn test_tag_round_trip_keeps_flags_apart() {
    let tag = Tag::encode(MIN_BLOCK_SIZE * 3, true);
    assert_eq!(tag.decode(), (MIN_BLOCK_SIZE * 3, true));
    assert!(!tag.is_prev_allocated());

    let tag = tag.with_prev_allocated(true);
    assert_eq!(tag.decode(), (MIN_BLOCK_SIZE * 3, true));
    assert!(tag.is_prev_allocated());

    let tag = Tag::encode(DSIZE, false).with_prev_allocated(true).with_prev_allocated(false);
    assert_eq!(tag.decode(), (DSIZE, false));
    assert!(!tag.is_prev_allocated());
  }

  #[test]
  fn test_traversal_over_hand_built_blocks() {
    // | hdr | 3 words free .. ftr | hdr | 7 words allocated | epilogue |
    let mut words = vec![0usize; 16];
    let first = block_at(&mut words, 1);

    unsafe {
      first.write_free(MIN_BLOCK_SIZE, true);
      let second = first.next_block();
      assert_eq!(second.addr(), first.addr() + MIN_BLOCK_SIZE);

      second.write_allocated(8 * WSIZE, false);
      assert_eq!(second.prev_block(), first);
      assert!(!second.is_prev_allocated());

      let epilogue = second.next_block();
      epilogue.set_header(Tag::encode(0, true));
      assert_eq!(epilogue.size(), 0);
      assert_eq!(epilogue.addr(), first.addr() + MIN_BLOCK_SIZE + 8 * WSIZE);

      assert_eq!(first.header(), first.footer());
      assert_eq!(first.footer_of() as usize, first.addr() + MIN_BLOCK_SIZE - DSIZE);
    }
  }

  #[test]
  fn test_prev_allocated_updates_free_footer() {
    let mut words = vec![0usize; 8];
    let block = block_at(&mut words, 1);

    unsafe {
      block.write_free(MIN_BLOCK_SIZE, false);
      block.set_prev_allocated(true);
      assert!(block.is_prev_allocated());
      assert_eq!(block.header(), block.footer());
    }
  }

  #[test]
  fn test_links() {
    let mut words = vec![0usize; 12];
    let a = block_at(&mut words, 1);
    let b = block_at(&mut words, 6);

    unsafe {
      a.set_pred(None);
      a.set_succ(Some(b));
      b.set_pred(Some(a));
      b.set_succ(None);

      assert_eq!(a.pred(), None);
      assert_eq!(a.succ(), Some(b));
      assert_eq!(b.pred(), Some(a));
      assert_eq!(b.succ(), None);
    }
  }
}

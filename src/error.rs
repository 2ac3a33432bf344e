use thiserror::Error;

/// Failures surfaced by the public heap operations.
///
/// None of them leave the heap in a modified state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("out of memory: region refused to grow by {requested} bytes")]
  OutOfMemory { requested: usize },

  #[error("request of {requested} bytes overflows the block size")]
  TooLarge { requested: usize },

  #[error("region grew at {actual:#x}, expected contiguous growth at {expected:#x}")]
  Discontiguous { expected: usize, actual: usize },

  #[error("invalid heap configuration: {0}")]
  InvalidConfig(&'static str),
}

/// First invariant violation found by [`Heap::check`](crate::Heap::check).
///
/// Addresses are payload addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapCheckError {
  #[error("bad prologue at {addr:#x}")]
  BadPrologue { addr: usize },

  #[error("block at {addr:#x} is misaligned")]
  Misaligned { addr: usize },

  #[error("block at {addr:#x} has invalid size {size}")]
  BadSize { addr: usize, size: usize },

  #[error("block at {addr:#x} runs past the end of the region")]
  OutOfBounds { addr: usize },

  #[error("epilogue at {addr:#x} is not at the end of the region")]
  BadEpilogue { addr: usize },

  #[error("free block at {addr:#x} has a footer that disagrees with its header")]
  FooterMismatch { addr: usize },

  #[error("block at {addr:#x} records the wrong allocation state for its left neighbour")]
  PrevAllocatedMismatch { addr: usize },

  #[error("free blocks at {addr:#x} and its right neighbour were not coalesced")]
  AdjacentFree { addr: usize },

  #[error("class {class} lists block {addr:#x}, which is allocated")]
  ListedAllocated { class: usize, addr: usize },

  #[error("class {class} lists block {addr:#x}, which belongs to another class")]
  WrongClass { class: usize, addr: usize },

  #[error("class {class} lists block {addr:#x} outside the region")]
  ListedOutOfBounds { class: usize, addr: usize },

  #[error("class {class} lists {addr:#x}, which is not the start of a free block")]
  ListedNotABlock { class: usize, addr: usize },

  #[error("class {class} has a broken predecessor link at {addr:#x}")]
  BrokenLink { class: usize, addr: usize },

  #[error("class {class} is out of order at {addr:#x}")]
  Unordered { class: usize, addr: usize },

  #[error("{listed} blocks are listed but the region holds {free} free blocks")]
  FreeCountMismatch { listed: usize, free: usize },
}

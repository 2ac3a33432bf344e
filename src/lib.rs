//! # segalloc - A Segregated-Fits Memory Allocator
//!
//! This crate provides an explicit free-list allocator with **segregated
//! size classes** and **boundary-tag coalescing**, managing one contiguous
//! region that only ever grows (by default through `sbrk(2)`).
//!
//! ## Overview
//!
//! ```text
//!   Managed Region:
//!
//!   ┌──────┬──────┬──────────┬────────┬────────────┬───────┬──────┐
//!   │ pro  │ pro  │  alloc   │  free  │   alloc    │ free  │ epi  │
//!   │ hdr  │ ftr  │  block   │ block  │   block    │ block │ hdr  │
//!   └──────┴──────┴──────────┴────────┴────────────┴───────┴──────┘
//!                                 ▲                    ▲
//!                                 │                    │
//!   Free-List Directory:          │                    │
//!   ┌─────────┐                   │                    │
//!   │ class 0 │ ──► ...           │                    │
//!   │ class 1 │ ──────────────────┘                    │
//!   │ class 2 │ ───────────────────────────────────────┘
//!   │   ...   │
//!   │ class K │ ──► (empty)
//!   └─────────┘
//! ```
//!
//! Every free block sits in exactly one size class; inside a class the list
//! is kept in ascending size order, so the first block that fits is also
//! the smallest one of that class.
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - Alignment helpers (align!, checked_align)
//!   ├── block      - Boundary-tag codec and block traversal
//!   ├── directory  - Size classes and ascending free lists
//!   ├── region     - Region growth primitives (Sbrk, FixedRegion)
//!   ├── heap       - Placement, release/coalescing, resize, growth
//!   ├── check      - Block iterators and the consistency checker
//!   ├── config     - HeapConfig
//!   ├── error      - AllocError, HeapCheckError
//!   └── global     - SegAlloc, the GlobalAlloc adapter
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::{FixedRegion, Heap, HeapConfig};
//!
//! let mut heap = Heap::new(FixedRegion::with_capacity(1 << 16), HeapConfig::default()).unwrap();
//!
//! let ptr = heap.allocate(24).unwrap().unwrap();
//! unsafe {
//!     ptr.as_ptr().write_bytes(0xAB, 24);
//!
//!     let ptr = heap.resize(ptr, 200).unwrap().unwrap();
//!     assert_eq!(*ptr.as_ptr().add(23), 0xAB);
//!
//!     heap.release(ptr);
//! }
//!
//! heap.check().unwrap();
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   Allocated block:
//!   ┌────────────┬─────────────────────────────────────────┐
//!   │   header   │               payload                   │
//!   │ size|p|a   │                                         │
//!   └────────────┴─────────────────────────────────────────┘
//!                ▲
//!                └── pointer returned to the caller
//!
//!   Free block:
//!   ┌────────────┬────────┬────────┬──────────────┬────────────┐
//!   │   header   │  pred  │  succ  │   (unused)   │   footer   │
//!   │ size|p|0   │        │        │              │ size|p|0   │
//!   └────────────┴────────┴────────┴──────────────┴────────────┘
//!
//!   a = this block is allocated
//!   p = the block to the left is allocated
//! ```
//!
//! Only free blocks carry a footer. The `p` bit tells a block whether its
//! left neighbour is free, and only then is the footer right before the
//! header read to step backwards.
//!
//! ## Limitations
//!
//! - **Single-threaded heap**: [`Heap`] has no locking; [`SegAlloc`] wraps it
//!   in a mutex
//! - **Word alignment only**: layouts aligned beyond `usize` are refused
//! - **Never shrinks**: memory is not returned to the operating system
//! - **Unix-only `Sbrk`**: other platforms can supply their own [`RegionGrower`]
//!
//! ## Safety
//!
//! Releasing or resizing a pointer the heap did not hand out, or releasing
//! it twice, corrupts the heap. [`Heap::check`] can detect most of the
//! damage after the fact but is never run on the hot path unless
//! [`HeapConfig::check_heap`] is set.

pub mod align;
mod block;
mod check;
mod config;
mod directory;
mod error;
mod global;
mod heap;
mod region;

pub use block::{MIN_BLOCK_SIZE, WSIZE};
pub use check::{BlockInfo, Blocks, FreeList, HeapStats};
pub use config::{DEFAULT_CHUNK_SIZE, DEFAULT_INITIAL_SIZE, DEFAULT_SIZE_CLASSES, HeapConfig};
pub use directory::MAX_SIZE_CLASSES;
pub use error::{AllocError, HeapCheckError};
pub use global::SegAlloc;
pub use heap::{Heap, block_size_for};
pub use region::{DEFAULT_FIXED_CAPACITY, FixedRegion, RegionGrower, Sbrk};

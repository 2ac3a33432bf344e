use crate::{
  block::{DSIZE, MIN_BLOCK_SIZE},
  directory::MAX_SIZE_CLASSES,
  error::AllocError,
};

pub const DEFAULT_CHUNK_SIZE: usize = (1 << 12) + DSIZE;
pub const DEFAULT_INITIAL_SIZE: usize = (1 << 7) + DSIZE;
pub const DEFAULT_SIZE_CLASSES: usize = MAX_SIZE_CLASSES;

/// Tuning knobs of a [`Heap`](crate::Heap).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum number of bytes requested from the region whenever the heap
  /// has to grow.
  pub chunk_size: usize,
  /// Bytes requested during initialization, so the first allocations do not
  /// pay for a growth call.
  pub initial_size: usize,
  /// Number of segregated free lists.
  pub size_classes: usize,
  /// Run the consistency checker after every public operation. A violation
  /// is logged at error level, and debug builds then panic; release builds
  /// carry on. Walks the whole heap, so keep it for debugging.
  pub check_heap: bool,
}

impl HeapConfig {
  pub const DEFAULT: Self = Self {
    chunk_size: DEFAULT_CHUNK_SIZE,
    initial_size: DEFAULT_INITIAL_SIZE,
    size_classes: DEFAULT_SIZE_CLASSES,
    check_heap: false,
  };

  pub const fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub const fn with_initial_size(
    mut self,
    initial_size: usize,
  ) -> Self {
    self.initial_size = initial_size;
    self
  }

  pub const fn with_size_classes(
    mut self,
    size_classes: usize,
  ) -> Self {
    self.size_classes = size_classes;
    self
  }

  pub const fn with_check_heap(
    mut self,
    check_heap: bool,
  ) -> Self {
    self.check_heap = check_heap;
    self
  }

  pub fn validate(&self) -> Result<(), AllocError> {
    if self.chunk_size < MIN_BLOCK_SIZE {
      return Err(AllocError::InvalidConfig("chunk size is below the minimum block size"));
    }
    if self.initial_size < MIN_BLOCK_SIZE {
      return Err(AllocError::InvalidConfig("initial size is below the minimum block size"));
    }
    if !(1..=MAX_SIZE_CLASSES).contains(&self.size_classes) {
      return Err(AllocError::InvalidConfig("size class count is out of range"));
    }
    Ok(())
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_valid() {
    assert_eq!(HeapConfig::default().validate(), Ok(()));
  }

  #[test]
  fn test_validate_rejects_out_of_range_values() {
    let config = HeapConfig::DEFAULT;

    assert!(config.with_chunk_size(MIN_BLOCK_SIZE - 1).validate().is_err());
    assert!(config.with_initial_size(0).validate().is_err());
    assert!(config.with_size_classes(0).validate().is_err());
    assert!(config.with_size_classes(MAX_SIZE_CLASSES + 1).validate().is_err());
    assert_eq!(
      config.with_size_classes(1).with_chunk_size(MIN_BLOCK_SIZE).validate(),
      Ok(())
    );
  }
}

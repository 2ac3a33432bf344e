use core::mem;

/// Alignment unit of every block and payload: one machine word.
pub const ALIGNMENT: usize = mem::size_of::<usize>();

/// Rounds `$value` up to the next multiple of [`ALIGNMENT`].
///
/// The caller is responsible for making sure the addition cannot overflow,
/// see [`checked_align`] for sizes coming from outside the allocator.
///
/// # Examples
///
/// ```rust
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(segalloc::align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(segalloc::align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Same as [`align!`], but returns `None` instead of wrapping around.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(padded) => Some(padded & !(ALIGNMENT - 1)),
    None => None,
  }
}

/// Returns `true` when `value` is a multiple of [`ALIGNMENT`].
pub const fn is_aligned(value: usize) -> bool {
  value & (ALIGNMENT - 1) == 0
}

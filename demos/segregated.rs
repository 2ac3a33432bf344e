use std::ptr::NonNull;

use segalloc::{FixedRegion, Heap, HeapConfig};

/// Prints every block of the heap in address order, followed by the
/// checker's summary. Free blocks are annotated with their size class.
fn print_heap(
  label: &str,
  heap: &Heap<FixedRegion>,
) {
  println!("\n[{label}] heap = {} bytes, region grown {} times", heap.heap_size(), heap.region().grow_calls());

  for block in heap.blocks() {
    if block.allocated {
      println!("    {:?}  {:>6} bytes  allocated", block.payload, block.size);
    } else {
      println!("    {:?}  {:>6} bytes  free (class {})", block.payload, block.size, heap.class_of(block.size));
    }
  }

  match heap.check() {
    Ok(stats) => println!("    check ok: {stats:?}"),
    Err(err) => println!("    check FAILED: {err}"),
  }
}

fn allocate(
  heap: &mut Heap<FixedRegion>,
  size: usize,
) -> NonNull<u8> {
  match heap.allocate(size) {
    Ok(Some(ptr)) => ptr,
    Ok(None) => panic!("zero-sized request"),
    Err(err) => panic!("allocation of {size} bytes failed: {err}"),
  }
}

fn main() {
  // RUST_LOG=trace shows every placement, release and growth decision.
  env_logger::init();

  let mut heap = match Heap::new(FixedRegion::with_capacity(1 << 20), HeapConfig::default()) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("could not initialize the heap: {err}");
      return;
    }
  };
  print_heap("start", &heap);

  // --------------------------------------------------------------------
  // 1) Ten small allocations carve up the initial free block and force
  //    one growth.
  // --------------------------------------------------------------------
  let ptrs: Vec<_> = (0..10).map(|_| allocate(&mut heap, 32)).collect();
  print_heap("1: ten 32 byte allocations", &heap);

  // --------------------------------------------------------------------
  // 2) Release every other block: three isolated free blocks, nothing to
  //    merge with.
  // --------------------------------------------------------------------
  unsafe {
    heap.release(ptrs[1]);
    heap.release(ptrs[3]);
    heap.release(ptrs[5]);
  }
  print_heap("2: released 2nd, 4th and 6th", &heap);

  // --------------------------------------------------------------------
  // 3) Release the blocks in between: everything from the 2nd to the 6th
  //    coalesces into one block of a larger class.
  // --------------------------------------------------------------------
  unsafe {
    heap.release(ptrs[2]);
    heap.release(ptrs[4]);
  }
  print_heap("3: released 3rd and 5th", &heap);

  // --------------------------------------------------------------------
  // 4) A small request reuses the front of the merged block.
  // --------------------------------------------------------------------
  let reused = allocate(&mut heap, 24);
  println!(
    "\n[4] allocated 24 bytes at {:?}: {}",
    reused,
    if reused == ptrs[1] { "reused the merged block" } else { "placed elsewhere" }
  );

  // --------------------------------------------------------------------
  // 5) Grow the last allocation past the end of the region: the heap
  //    extends the region and resizes in place, keeping the payload.
  // --------------------------------------------------------------------
  let last = ptrs[9];
  unsafe { last.as_ptr().write_bytes(0xAB, 32) };
  let grown = match unsafe { heap.resize(last, 16 * 1024) } {
    Ok(Some(ptr)) => ptr,
    Ok(None) => unreachable!("non-zero resize"),
    Err(err) => panic!("resize failed: {err}"),
  };
  println!(
    "\n[5] resized {:?} to 16 KiB -> {:?}, first byte = 0x{:X}",
    last,
    grown,
    unsafe { grown.as_ptr().read() }
  );
  print_heap("5: after resize", &heap);

  println!("\n[6] End of example. The region is freed when the heap is dropped.");
}

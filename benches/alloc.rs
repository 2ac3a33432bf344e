use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use segalloc::{FixedRegion, Heap, HeapConfig};

fn fresh_heap() -> Heap<FixedRegion> {
  Heap::new(FixedRegion::with_capacity(1 << 26), HeapConfig::default()).unwrap()
}

fn alloc_release(c: &mut Criterion) {
  let mut heap = fresh_heap();

  c.bench_function("allocate + release 64 bytes", |b| {
    b.iter(|| {
      let ptr = heap.allocate(black_box(64)).unwrap().unwrap();
      unsafe { heap.release(ptr) };
    });
  });

  c.bench_function("churn mixed sizes", |b| {
    let sizes = [16, 48, 200, 1024, 24, 4000, 96, 512];
    b.iter(|| {
      let ptrs: Vec<_> = sizes.iter().map(|&size| heap.allocate(size).unwrap().unwrap()).collect();
      // Odd slots first, so the even releases coalesce on both sides.
      for ptr in ptrs.iter().skip(1).step_by(2).chain(ptrs.iter().step_by(2)) {
        unsafe { heap.release(*ptr) };
      }
    });
  });
}

fn resize_growth(c: &mut Criterion) {
  c.bench_function("resize doubling to 64 KiB", |b| {
    b.iter_batched(
      fresh_heap,
      |mut heap| {
        let mut ptr = heap.allocate(16).unwrap().unwrap();
        let mut size = 16;
        while size < 1 << 16 {
          size *= 2;
          ptr = unsafe { heap.resize(ptr, size) }.unwrap().unwrap();
        }
        black_box(ptr);
      },
      BatchSize::LargeInput,
    );
  });
}

criterion_group!(benches, alloc_release, resize_growth);
criterion_main!(benches);

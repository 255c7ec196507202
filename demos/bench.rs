use std::time::Instant;
use std::hint;
use oxlist::Chain;
use oxlist::Global;

const COUNT: usize = 1_000_000;

fn warmup() {
  let mut s = 1u64;
  for i in 0 .. 100_000_000 { s = s.wrapping_mul(i); }
  let _: u64 = hint::black_box(s);
}

fn timeit<A, F>(f: F) -> f64 where F: FnOnce() -> A {
  let start = Instant::now();
  let _: A = hint::black_box(f());
  let stop = Instant::now();
  stop.saturating_duration_since(start).as_nanos() as f64
}

fn run_bench<F, A, B>(name: &str, t: A, f: F) where F: Fn(A, usize) -> B {
  let elapsed = timeit(|| f(t, hint::black_box(COUNT)));
  print!("{:25} {:.3} ns\n", name, elapsed / (COUNT as f64));
}

#[inline(never)]
fn bench_global(_: Global, count: usize) -> i64 {
  let mut r = Chain::new();
  for i in 0 .. count {
    r.push_front(i as i64);
  }
  r.iter().sum()
}

#[inline(never)]
fn bench_bumpalo(bump: &bumpalo::Bump, count: usize) -> i64 {
  let mut r = Chain::new_in(bump);
  for i in 0 .. count {
    r.push_front(i as i64);
  }
  r.iter().sum()
}

fn main() {
  warmup();

  let bump = &bumpalo::Bump::new();

  run_bench("global", Global, bench_global);
  run_bench("bumpalo", bump, bench_bumpalo);
}

//! An allocator which keeps a record of every live allocation.
//!
//! A [`Ledger`] forwards to a parent allocator and tracks which blocks are
//! currently live, keyed by address. It is meant for checking the ownership
//! discipline of a program: releasing a block that is not live (a double
//! release, or a pointer that never came from the ledger) panics immediately
//! instead of corrupting the parent allocator.
//!
//! A ledger can also be given an allocation budget. Once the budget is spent,
//! every further allocation fails with [`AllocError`], which makes the
//! failure paths of a program easy to reach.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::cell::Cell;
use core::cell::RefCell;
use core::fmt;
use core::ptr::NonNull;
use allocator_api2::alloc::AllocError;
use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;
use tracing::debug;
use crate::ptr;

/// An allocator wrapper which records live allocations.
///
/// The allocator interface takes `&self`, so a ledger is usually shared as
/// `&Ledger` between the nodes it backs.

pub struct Ledger<A: Allocator = Global> {
  allocator: A,
  live: RefCell<BTreeMap<usize, Layout>>,
  budget: Cell<Option<usize>>,
  allocations: Cell<usize>,
  releases: Cell<usize>,
}

impl Ledger<Global> {
  /// Creates a ledger backed by the global allocator, without a budget.

  pub fn new() -> Self {
    Self::new_in(Global)
  }

  /// Creates a ledger backed by the global allocator which will allow
  /// `budget` more allocations before failing.

  pub fn with_budget(budget: usize) -> Self {
    Self::with_budget_in(budget, Global)
  }
}

impl Default for Ledger<Global> {
  fn default() -> Self {
    Self::new()
  }
}

impl<A: Allocator> Ledger<A> {
  /// Creates a ledger backed by the given allocator, without a budget.

  pub fn new_in(allocator: A) -> Self {
    Self {
      allocator,
      live: RefCell::new(BTreeMap::new()),
      budget: Cell::new(None),
      allocations: Cell::new(0),
      releases: Cell::new(0),
    }
  }

  /// Creates a ledger backed by the given allocator which will allow
  /// `budget` more allocations before failing.

  pub fn with_budget_in(budget: usize, allocator: A) -> Self {
    let x = Self::new_in(allocator);
    x.budget.set(Some(budget));
    x
  }

  /// The number of allocations still allowed, or `None` if unlimited.

  pub fn budget(&self) -> Option<usize> {
    self.budget.get()
  }

  /// Replaces the allocation budget. `None` lifts the limit.

  pub fn set_budget(&self, budget: Option<usize>) {
    self.budget.set(budget)
  }

  /// The number of blocks currently live.

  pub fn live(&self) -> usize {
    self.live.borrow().len()
  }

  /// The number of successful allocations so far.

  pub fn allocations(&self) -> usize {
    self.allocations.get()
  }

  /// The number of releases so far.

  pub fn releases(&self) -> usize {
    self.releases.get()
  }

  /// Whether a block starting at the given address is currently live.

  pub fn is_live(&self, addr: usize) -> bool {
    self.live.borrow().contains_key(&addr)
  }

  /// The address and size of every live block, ordered by address.

  pub fn snapshot(&self) -> Vec<(usize, usize)> {
    self.live.borrow().iter().map(|(&a, l)| (a, l.size())).collect()
  }

  /// The parent allocator.

  pub fn allocator(&self) -> &A {
    &self.allocator
  }
}

unsafe impl<A: Allocator> Allocator for Ledger<A> {
  fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
    let budget = self.budget.get();

    if budget == Some(0) {
      debug!(size = layout.size(), align = layout.align(), "allocation refused, budget spent");
      return Err(AllocError);
    }

    let p = self.allocator.allocate(layout)?;

    // The budget is only spent by allocations that succeed.

    if let Some(n) = budget {
      self.budget.set(Some(n - 1));
    }

    self.allocations.set(self.allocations.get() + 1);

    // Zero-sized blocks may share a dangling address, so they are counted
    // but not kept in the live map.

    if layout.size() == 0 {
      return Ok(p);
    }

    let a = ptr::addr(p);

    if self.live.borrow_mut().insert(a, layout).is_some() {
      panic!("oxlist: parent allocator returned live block {:#x}", a);
    }

    Ok(p)
  }

  unsafe fn deallocate(&self, p: NonNull<u8>, layout: Layout) {
    if layout.size() != 0 {
      let a = ptr::addr(p);

      match self.live.borrow_mut().remove(&a) {
        Some(l) if l == layout => {}
        Some(l) =>
          panic!(
            "oxlist: block {:#x} released with size {} but allocated with size {}",
            a,
            layout.size(),
            l.size(),
          ),
        None =>
          panic!("oxlist: released block {:#x} which is not live", a),
      }
    }

    self.releases.set(self.releases.get() + 1);

    self.allocator.deallocate(p, layout)
  }
}

impl<A: Allocator> fmt::Debug for Ledger<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Ledger")
      .field("live", &self.live())
      .field("allocations", &self.allocations())
      .field("releases", &self.releases())
      .field("budget", &self.budget())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_budget_refuses_after_limit() {
    let ledger = Ledger::with_budget(1);
    let l = Layout::new::<u64>();
    let p = ledger.allocate(l);
    assert!(p.is_ok());
    assert!(ledger.allocate(l).is_err());
    assert_eq!(ledger.budget(), Some(0));
    assert_eq!(ledger.live(), 1);
    if let Ok(p) = p {
      unsafe { ledger.deallocate(p.cast(), l) };
    }
    assert_eq!(ledger.live(), 0);
    assert_eq!(ledger.releases(), 1);
  }

  #[test]
  fn test_zero_sized_blocks_share_an_address() {
    let ledger = Ledger::new();
    let l = Layout::new::<()>();
    let Ok(a) = ledger.allocate(l) else { panic!("allocation failed") };
    let Ok(b) = ledger.allocate(l) else { panic!("allocation failed") };
    assert_eq!(ledger.allocations(), 2);
    assert_eq!(ledger.live(), 0);
    unsafe { ledger.deallocate(a.cast(), l) };
    unsafe { ledger.deallocate(b.cast(), l) };
    assert_eq!(ledger.releases(), 2);
  }

  #[test]
  fn test_zero_sized_boxes() {
    let ledger = Ledger::new();
    let a = allocator_api2::boxed::Box::new_in((), &ledger);
    let b = allocator_api2::boxed::Box::new_in((), &ledger);
    drop(a);
    drop(b);
    assert_eq!(ledger.live(), 0);
  }

  struct Failing;

  unsafe impl Allocator for Failing {
    fn allocate(&self, _: Layout) -> Result<NonNull<[u8]>, AllocError> {
      Err(AllocError)
    }

    unsafe fn deallocate(&self, _: NonNull<u8>, _: Layout) {
      unreachable!()
    }
  }

  #[test]
  fn test_parent_failure_keeps_budget() {
    let ledger = Ledger::with_budget_in(1, Failing);
    assert!(ledger.allocate(Layout::new::<u64>()).is_err());
    assert_eq!(ledger.budget(), Some(1));
    assert_eq!(ledger.allocations(), 0);
    assert_eq!(ledger.live(), 0);
  }

  #[test]
  #[should_panic(expected = "not live")]
  fn test_double_release_panics() {
    let ledger = Ledger::new();
    let l = Layout::new::<u64>();
    let Ok(p) = ledger.allocate(l) else { panic!("allocation failed") };
    unsafe { ledger.deallocate(p.cast(), l) };
    unsafe { ledger.deallocate(p.cast(), l) };
  }

  #[test]
  #[should_panic(expected = "released with size")]
  fn test_layout_mismatch_panics() {
    let ledger = Ledger::new();
    let Ok(p) = ledger.allocate(Layout::new::<u64>()) else { panic!("allocation failed") };
    unsafe { ledger.deallocate(p.cast(), Layout::new::<u32>()) };
  }
}

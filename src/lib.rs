#![doc = include_str!("../README.md")]
#![no_std]
#![cfg_attr(feature = "allocator_api", feature(allocator_api))]

extern crate alloc;

use core::alloc::Layout;
use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::mem::replace;
use core::ptr::NonNull;
use tracing::trace;
use tracing::warn;

pub use allocator_api2::alloc::AllocError;
pub use allocator_api2::alloc::Allocator;
pub use allocator_api2::alloc::Global;
pub use ledger::Ledger;

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// SUBMODULES                                                                 //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

pub mod ledger;

mod ptr;

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PUBLIC TYPE AND TRAIT DEFINITIONS                                          //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

/// An owning handle to one heap-allocated list element.
///
/// A node holds an integer value and owns its successor, if any. Every node
/// is released exactly once: either explicitly with [`release`](Self::release)
/// or implicitly when it is dropped, in which case its whole tail is released
/// along with it.

pub struct Node<A: Allocator = Global>(NonNull<Record<A>>, PhantomData<Record<A>>);

unsafe impl<A: Allocator> Send for Node<A> where A: Send { }

unsafe impl<A: Allocator> Sync for Node<A> where A: Sync { }

/// A shared reference into a chain which can be moved towards its end.
///
/// A cursor always denotes some node, so there is no way to advance a cursor
/// that has already run off the end of a chain.

pub struct Cursor<'a, A: Allocator = Global>(&'a Node<A>);

/// A unique reference to the slot that owns a node.
///
/// The slot is either the head of a [`Chain`] or the `next` link of the
/// predecessor. Holding the owner rather than the node itself is what lets
/// [`release`](Self::release) give the node's storage back while keeping the
/// rest of the chain linked.

pub struct CursorMut<'a, A: Allocator = Global>(&'a mut Option<Node<A>>);

/// A possibly empty singly linked list which owns all of its nodes.

pub struct Chain<A: Allocator + Clone = Global> {
  head: Option<Node<A>>,
  allocator: A,
}

/// An iterator over the values of a chain, from the head to the terminal
/// node.

pub struct Iter<'a, A: Allocator = Global>(Option<&'a Node<A>>);

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PRIVATE TYPE AND TRAIT DEFINITIONS                                         //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

struct Record<A: Allocator> {
  value: i64,
  next: Option<Node<A>>,
  allocator: A,
}

enum Panicked { }

trait Fail: Sized {
  fn fail<T>(_: Layout) -> Result<T, Self>;
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// UTILITY FUNCTIONS                                                          //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

#[inline(always)]
fn unwrap<T>(x: Result<T, Panicked>) -> T {
  match x { Ok(x) => x, Err(e) => match e { } }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Fail                                                                       //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl Fail for Panicked {
  #[inline(never)]
  #[cold]
  fn fail<T>(layout: Layout) -> Result<T, Self> {
    alloc::alloc::handle_alloc_error(layout)
  }
}

impl Fail for AllocError {
  #[inline(always)]
  fn fail<T>(_: Layout) -> Result<T, Self> {
    Err(AllocError)
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Node                                                                       //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

fn node<A, E>(value: i64, allocator: A) -> Result<Node<A>, E>
where
  A: Allocator,
  E: Fail,
{
  let l = Layout::new::<Record<A>>();

  let Ok(p) = allocator.allocate(l) else {
    return E::fail(l);
  };

  let p = ptr::cast::<[u8], Record<A>>(p);

  let record = Record {
    value,
    next: None,
    allocator,
  };

  unsafe { ptr::write(p, record) };

  trace!(value, addr = ptr::addr(p), "node allocated");

  Ok(Node(p, PhantomData))
}

unsafe fn free<A: Allocator>(p: NonNull<Record<A>>) -> (i64, Option<Node<A>>) {
  // SAFETY:
  //
  // - `p` must point to a live record produced by `node`.
  // - No `Node` pointing at `p` may be used or dropped afterwards.

  let Record { value, next, allocator } = ptr::read(p);

  trace!(value, addr = ptr::addr(p), "node released");

  allocator.deallocate(ptr::cast(p), Layout::new::<Record<A>>());

  // NB: The allocator was moved out of the record before its storage was
  // returned, and is dropped here exactly once.

  drop::<A>(allocator);

  (value, next)
}

impl Node<Global> {
  /// Allocates a terminal node with the given value using the global
  /// allocator.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn new(value: i64) -> Self {
    unwrap(node(value, Global))
  }

  /// Allocates a terminal node with the given value using the global
  /// allocator.
  ///
  /// # Errors
  ///
  /// An error is returned on failure to allocate memory.

  pub fn try_new(value: i64) -> Result<Self, AllocError> {
    node(value, Global)
  }
}

impl<A: Allocator> Node<A> {
  /// Allocates a terminal node with the given value using the given
  /// allocator.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn new_in(value: i64, allocator: A) -> Self {
    unwrap(node(value, allocator))
  }

  /// Allocates a terminal node with the given value using the given
  /// allocator.
  ///
  /// # Errors
  ///
  /// An error is returned on failure to allocate memory.

  pub fn try_new_in(value: i64, allocator: A) -> Result<Self, AllocError> {
    node(value, allocator)
  }

  #[inline(always)]
  fn record(&self) -> &Record<A> {
    unsafe { ptr::as_ref(self.0) }
  }

  #[inline(always)]
  fn record_mut(&mut self) -> &mut Record<A> {
    unsafe { ptr::as_mut_ref(self.0) }
  }

  #[inline(always)]
  fn next_slot(&mut self) -> &mut Option<Node<A>> {
    &mut self.record_mut().next
  }

  /// The value held by this node.

  #[inline(always)]
  pub fn value(&self) -> i64 {
    self.record().value
  }

  /// The successor of this node, or `None` if this is the terminal node.

  #[inline(always)]
  pub fn next(&self) -> Option<&Node<A>> {
    self.record().next.as_ref()
  }

  /// The successor of this node, or `None` if this is the terminal node.

  #[inline(always)]
  pub fn next_mut(&mut self) -> Option<&mut Node<A>> {
    self.record_mut().next.as_mut()
  }

  /// Makes `successor` the next node, taking ownership of it. Passing `None`
  /// marks this node as the end of its chain.
  ///
  /// The previous successor, if there was one, is handed back to the caller.

  pub fn link(&mut self, successor: Option<Node<A>>) -> Option<Node<A>> {
    replace(self.next_slot(), successor)
  }

  /// Detaches the successor, leaving this node as the end of its chain.

  pub fn unlink(&mut self) -> Option<Node<A>> {
    self.next_slot().take()
  }

  /// Returns this node's storage to its allocator.
  ///
  /// Ownership of the successor is handed back to the caller, so releasing
  /// one node never releases or leaks the rest of the chain.

  pub fn release(self) -> Option<Node<A>> {
    let node = ManuallyDrop::new(self);
    let (_, next) = unsafe { free(node.0) };
    next
  }

  /// The allocator which owns this node's storage.

  pub fn allocator(&self) -> &A {
    &self.record().allocator
  }

  /// The address of this node's storage.

  pub fn addr(&self) -> usize {
    ptr::addr(self.0)
  }

  /// A cursor denoting this node.

  pub fn cursor(&self) -> Cursor<'_, A> {
    Cursor(self)
  }

  /// An iterator over the values of the chain starting at this node.

  pub fn iter(&self) -> Iter<'_, A> {
    Iter(Some(self))
  }
}

impl<A: Allocator> Drop for Node<A> {
  fn drop(&mut self) {
    // STACK SPACE:
    //
    // The tail is released in a loop rather than by nested drops, so stack
    // usage does not depend on the length of the chain.

    let (_, mut next) = unsafe { free(self.0) };

    while let Some(node) = next {
      let node = ManuallyDrop::new(node);
      let (_, tail) = unsafe { free(node.0) };
      next = tail;
    }
  }
}

impl<A: Allocator> fmt::Debug for Node<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Node").field(&self.value()).finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Cursor                                                                     //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<'a, A: Allocator> Cursor<'a, A> {
  /// Binds a cursor to the given node.

  #[inline(always)]
  pub fn new(node: &'a Node<A>) -> Self {
    Self(node)
  }

  /// The node denoted by this cursor.

  #[inline(always)]
  pub fn node(self) -> &'a Node<A> {
    self.0
  }

  /// The value of the node denoted by this cursor.

  #[inline(always)]
  pub fn value(self) -> i64 {
    self.0.value()
  }

  /// Whether the denoted node is the last node of its chain.

  #[inline(always)]
  pub fn is_terminal(self) -> bool {
    self.0.next().is_none()
  }

  /// Moves the cursor to the successor of the denoted node. Yields `None` at
  /// the terminal node. The chain itself is not modified.

  #[inline(always)]
  pub fn advance(self) -> Option<Self> {
    self.0.next().map(Cursor)
  }
}

impl<'a, A: Allocator> Clone for Cursor<'a, A> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<'a, A: Allocator> Copy for Cursor<'a, A> { }

impl<'a, A: Allocator> fmt::Debug for Cursor<'a, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Cursor").field(&self.value()).finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// CursorMut                                                                  //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<'a, A: Allocator> CursorMut<'a, A> {
  /// Binds a cursor to the node owned by the given slot, or returns `None` if
  /// the slot is empty.

  pub fn new(slot: &'a mut Option<Node<A>>) -> Option<Self> {
    if slot.is_none() {
      return None;
    }

    Some(Self(slot))
  }

  /// The node denoted by this cursor.

  pub fn node(&self) -> &Node<A> {
    // The slot stays occupied for as long as the cursor exists.

    match &*self.0 { Some(x) => x, None => unreachable!() }
  }

  /// The node denoted by this cursor.

  pub fn node_mut(&mut self) -> &mut Node<A> {
    match &mut *self.0 { Some(x) => x, None => unreachable!() }
  }

  /// The value of the node denoted by this cursor.

  pub fn value(&self) -> i64 {
    self.node().value()
  }

  /// Whether the denoted node is the last node of its chain.

  pub fn is_terminal(&self) -> bool {
    self.node().next().is_none()
  }

  /// Moves the cursor to the successor of the denoted node. Yields `None` at
  /// the terminal node.

  pub fn advance(self) -> Option<Self> {
    let CursorMut(slot) = self;

    let next = match slot { Some(x) => x.next_slot(), None => unreachable!() };

    if next.is_none() {
      return None;
    }

    Some(CursorMut(next))
  }

  /// Detaches everything after the denoted node, which becomes the end of
  /// its chain.

  pub fn split_off(&mut self) -> Option<Node<A>> {
    self.node_mut().unlink()
  }

  /// Releases the denoted node through its current owner and returns its
  /// value.
  ///
  /// The node's successor takes its place in the owning slot, so the rest of
  /// the chain stays owned and reachable.

  pub fn release(self) -> i64 {
    let CursorMut(slot) = self;

    let Some(node) = slot.take() else { unreachable!() };

    let node = ManuallyDrop::new(node);
    let (value, next) = unsafe { free(node.0) };

    *slot = next;

    value
  }
}

impl<'a, A: Allocator> fmt::Debug for CursorMut<'a, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("CursorMut").field(&self.value()).finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Chain                                                                      //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

fn push_front<A, E>(chain: &mut Chain<A>, value: i64) -> Result<(), E>
where
  A: Allocator + Clone,
  E: Fail,
{
  let mut x = node::<A, E>(value, chain.allocator.clone())?;
  let _: Option<_> = x.link(chain.head.take());
  chain.head = Some(x);
  Ok(())
}

fn chain<A, E>(values: &[i64], allocator: A) -> Result<Chain<A>, E>
where
  A: Allocator + Clone,
  E: Fail,
{
  let mut chain = Chain { head: None, allocator };

  for (i, &value) in values.iter().rev().enumerate() {
    if let Err(e) = push_front::<A, E>(&mut chain, value) {
      warn!(built = i, total = values.len(), "chain construction aborted");

      // NB: Returning drops `chain`, which releases every node built so far.

      return Err(e);
    }
  }

  Ok(chain)
}

impl Chain<Global> {
  /// Creates an empty chain backed by the global allocator.

  pub fn new() -> Self {
    Self { head: None, allocator: Global }
  }

  /// Builds a chain holding the given values in order, backed by the global
  /// allocator.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn from_values(values: &[i64]) -> Self {
    unwrap(chain(values, Global))
  }

  /// Builds a chain holding the given values in order, backed by the global
  /// allocator.
  ///
  /// # Errors
  ///
  /// An error is returned on failure to allocate memory. Nodes that were
  /// already built are released.

  pub fn try_from_values(values: &[i64]) -> Result<Self, AllocError> {
    chain(values, Global)
  }
}

impl Default for Chain<Global> {
  fn default() -> Self {
    Self::new()
  }
}

impl<A: Allocator + Clone> Chain<A> {
  /// Creates an empty chain whose nodes will be allocated with the given
  /// allocator.

  pub fn new_in(allocator: A) -> Self {
    Self { head: None, allocator }
  }

  /// Builds a chain holding the given values in order.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn from_values_in(values: &[i64], allocator: A) -> Self {
    unwrap(chain(values, allocator))
  }

  /// Builds a chain holding the given values in order.
  ///
  /// # Errors
  ///
  /// An error is returned on failure to allocate memory. Nodes that were
  /// already built are released.

  pub fn try_from_values_in(values: &[i64], allocator: A) -> Result<Self, AllocError> {
    chain(values, allocator)
  }

  /// Prepends a new node holding the given value.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn push_front(&mut self, value: i64) {
    unwrap(push_front(self, value))
  }

  /// Prepends a new node holding the given value.
  ///
  /// # Errors
  ///
  /// An error is returned on failure to allocate memory, in which case the
  /// chain is unchanged.

  pub fn try_push_front(&mut self, value: i64) -> Result<(), AllocError> {
    push_front(self, value)
  }

  /// Releases the head node and returns its value.

  pub fn pop_front(&mut self) -> Option<i64> {
    let cursor = CursorMut::new(&mut self.head)?;
    Some(cursor.release())
  }

  /// The first node, if any.

  pub fn head(&self) -> Option<&Node<A>> {
    self.head.as_ref()
  }

  /// The first node, if any.

  pub fn head_mut(&mut self) -> Option<&mut Node<A>> {
    self.head.as_mut()
  }

  /// Hands ownership of the head node, and with it the whole chain, to the
  /// caller.

  pub fn into_head(self) -> Option<Node<A>> {
    self.head
  }

  /// The number of nodes. This walks the whole chain.

  pub fn len(&self) -> usize {
    self.iter().count()
  }

  /// Whether the chain has no nodes.

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  /// An iterator over the values of the chain.

  pub fn iter(&self) -> Iter<'_, A> {
    Iter(self.head.as_ref())
  }

  /// A cursor bound to the head, or `None` if the chain is empty.

  pub fn cursor(&self) -> Option<Cursor<'_, A>> {
    self.head.as_ref().map(Cursor)
  }

  /// A cursor bound to the head, or `None` if the chain is empty.

  pub fn cursor_mut(&mut self) -> Option<CursorMut<'_, A>> {
    CursorMut::new(&mut self.head)
  }

  /// The allocator used for new nodes.

  pub fn allocator(&self) -> &A {
    &self.allocator
  }
}

impl<'a, A: Allocator + Clone> IntoIterator for &'a Chain<A> {
  type Item = i64;
  type IntoIter = Iter<'a, A>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

impl<A: Allocator + Clone> fmt::Debug for Chain<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Chain ")?;
    f.debug_list().entries(self.iter()).finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Iter                                                                       //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<'a, A: Allocator> Iterator for Iter<'a, A> {
  type Item = i64;

  #[inline(always)]
  fn next(&mut self) -> Option<i64> {
    let x = self.0?;
    self.0 = x.next();
    Some(x.value())
  }
}

impl<'a, A: Allocator> FusedIterator for Iter<'a, A> { }

use std::mem::size_of;
use oxlist::Chain;
use oxlist::Ledger;

#[test]
fn test_snapshot_tracks_live_nodes() {
  let ledger = Ledger::new();
  let chain = Chain::from_values_in(&[1, 2, 3], &ledger);

  let mut addrs = Vec::new();
  let mut x = chain.head();
  while let Some(y) = x {
    addrs.push(y.addr());
    x = y.next();
  }
  addrs.sort();

  let snapshot = ledger.snapshot();
  assert_eq!(snapshot.iter().map(|&(a, _)| a).collect::<Vec<_>>(), addrs);
  assert!(snapshot.iter().all(|&(_, n)| n == snapshot[0].1));
  assert!(snapshot[0].1 >= size_of::<i64>());

  drop(chain);

  assert!(ledger.snapshot().is_empty());
}

#[test]
fn test_release_removes_only_that_node() {
  let ledger = Ledger::new();
  let mut chain = Chain::from_values_in(&[1, 2, 3], &ledger);

  let a1 = chain.head().unwrap().addr();
  let cursor = chain.cursor_mut().unwrap().advance().unwrap().advance().unwrap();
  let a3 = cursor.node().addr();
  assert_eq!(cursor.release(), 3);

  assert!(ledger.is_live(a1));
  assert!(! ledger.is_live(a3));
  assert_eq!(ledger.snapshot().len(), 2);
  assert!(chain.cursor().unwrap().advance().unwrap().is_terminal());
}

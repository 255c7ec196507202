mod snapshot;

use expect_test::expect;
use oxlist::Chain;
use oxlist::Cursor;
use oxlist::Ledger;
use oxlist::Node;

fn build<'a>(ledger: &'a Ledger, values: &[i64]) -> Option<Node<&'a Ledger>> {
  let mut head = None;
  for &value in values.iter().rev() {
    let mut x = Node::new_in(value, ledger);
    assert!(x.link(head).is_none());
    head = Some(x);
  }
  head
}

#[test]
fn test_build_by_hand() {
  let ledger = Ledger::new();
  let head = build(&ledger, &[1, 2, 3]).unwrap();
  let mut y = 0;
  let mut x = Some(head.cursor());
  while let Some(z) = x {
    y = y + z.value();
    x = z.advance();
  }
  expect!["6"].assert_eq(&format!("{:?}", y));
  expect!["3"].assert_eq(&format!("{:?}", ledger.live()));
}

#[test]
fn test_cursor_does_not_mutate() {
  let ledger = Ledger::new();
  let head = build(&ledger, &[1, 2]).unwrap();
  let c = Cursor::new(&head);
  let d = c.advance().unwrap();
  assert!(d.advance().is_none());
  assert_eq!(c.value(), 1);
  assert!(std::ptr::eq(c.node().next().unwrap(), d.node()));
  assert_eq!(head.iter().collect::<Vec<_>>(), [1, 2]);
  assert_eq!(ledger.releases(), 0);
}

#[test]
fn test_node_mut() {
  let ledger = Ledger::new();
  let mut chain = Chain::from_values_in(&[1, 2, 3], &ledger);
  let mut cursor = chain.cursor_mut().unwrap();
  let two = cursor.node_mut().next_mut().unwrap();
  assert_eq!(two.value(), 2);
  let three = two.unlink().unwrap();
  drop(three);
  expect!["Chain [1, 2]"].assert_eq(&format!("{:?}", chain));
  expect!["Ledger { live: 2, allocations: 3, releases: 1, budget: None }"].assert_eq(&format!("{:?}", ledger));
}

#[test]
fn test_node_allocator() {
  let ledger = Ledger::with_budget(5);
  let head = build(&ledger, &[1, 2]).unwrap();
  assert!(std::ptr::eq(*head.allocator(), &ledger));
  assert_eq!(head.allocator().budget(), Some(3));
}

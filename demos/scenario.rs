use oxlist::AllocError;
use oxlist::CursorMut;
use oxlist::Ledger;
use oxlist::Node;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn run(ledger: &Ledger) -> Result<(), AllocError> {
  let mut one = Node::try_new_in(1, ledger)?;
  let mut two = Node::try_new_in(2, ledger)?;
  let mut three = Node::try_new_in(3, ledger)?;

  let _ = three.link(None);
  let _ = two.link(Some(three));
  let _ = one.link(Some(two));

  let mut head = Some(one);

  let Some(cursor) = CursorMut::new(&mut head) else { return Ok(()) };
  info!(value = cursor.value(), "cursor bound to head");

  let Some(cursor) = cursor.advance() else { return Ok(()) };
  info!(value = cursor.value(), "cursor advanced");

  let Some(cursor) = cursor.advance() else { return Ok(()) };
  info!(value = cursor.value(), terminal = cursor.is_terminal(), "cursor advanced");

  let value = cursor.release();
  info!(value, live = ledger.live(), "node released");

  if let Some(x) = head.as_ref() {
    info!(values = ?x.iter().collect::<Vec<_>>(), "remaining chain");
  }

  drop(head);
  info!(live = ledger.live(), releases = ledger.releases(), "chain released");

  Ok(())
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let ledger = Ledger::new();

  if let Err(e) = run(&ledger) {
    error!("allocation failed: {}", e);
    std::process::exit(1);
  }

  assert_eq!(ledger.live(), 0);
}

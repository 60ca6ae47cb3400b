use crate::history::History;

/// Per-shell mutable state. A forked stage works on its own copy.
pub struct State {
	pub history: History,
}

impl State {
	pub fn new() -> State {
		State { history: History::new() }
	}
}

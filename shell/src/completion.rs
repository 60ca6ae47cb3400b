use std::collections::BTreeSet;

use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::builtin;
use crate::parser;
use crate::search;

/// Command names starting with `prefix`, sorted and without duplicates.
pub fn candidates(prefix: &str) -> impl Iterator<Item = String> {
	let mut names: BTreeSet<String> = builtin::NAMES.iter()
		.filter(|name| name.starts_with(prefix))
		.map(|name| name.to_string())
		.collect();
	names.extend(search::executables(prefix));
	names.into_iter()
}

/// Start of the word before the cursor, if it is the command word of its
/// pipeline stage.
fn command_word_start(head: &str) -> Option<usize> {
	let stage = parser::last_stage_start(head);
	let rest = &head[stage ..];
	let start = stage + rest.len() - rest.trim_start().len();
	if head[start ..].contains(char::is_whitespace) {
		None
	} else {
		Some(start)
	}
}

/// Line-editor hook: the first word of each stage completes to a command,
/// later words to file names.
pub struct ShellHelper {
	files: FilenameCompleter,
}

impl ShellHelper {
	pub fn new() -> ShellHelper {
		ShellHelper { files: FilenameCompleter::new() }
	}
}

impl Completer for ShellHelper {
	type Candidate = Pair;

	fn complete(&self, line: &str, pos: usize, ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
		let start = match command_word_start(&line[.. pos]) {
			Some(start) => start,
			None => { return self.files.complete(line, pos, ctx); },
		};
		let pairs = candidates(&line[start .. pos])
			.map(|name| Pair { display: name.clone(), replacement: format!("{} ", name) })
			.collect();
		Ok((start, pairs))
	}
}

impl Hinter for ShellHelper {
	type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

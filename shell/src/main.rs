mod builtin;
mod completion;
mod eval;
mod global;
mod history;
mod job;
mod parser;
mod pipe;
mod redirect;
mod registry;
mod search;
mod types;

use std::env;
use std::path::PathBuf;
use std::process;

use log::debug;
use rustyline::error::ReadlineError;
use rustyline::Editor;

use types::Flow;

const PROMPT: &'static str = "$ ";
const HISTFILE_KEY: &'static str = "HISTFILE";

fn histfile() -> Option<PathBuf> {
	env::var_os(HISTFILE_KEY).filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn shutdown(state: &mut global::State, code: i32) -> ! {
	if let Some(path) = histfile() {
		if let Err(e) = state.history.dump(&path) {
			debug!("writing {}: {}", path.display(), e);
		}
	}
	process::exit(code)
}

fn main() {
	env_logger::init();

	let mut state = global::State::new();
	if let Some(path) = histfile() {
		match state.history.load(&path) {
			Ok(_) => debug!("{} history entries after reading {}", state.history.len(), path.display()),
			Err(e) => debug!("reading {}: {}", path.display(), e),
		}
	}

	let mut rl = match Editor::<completion::ShellHelper>::new() {
		Ok(rl) => rl,
		Err(e) => {
			eprintln!("pipesh: {}", e);
			process::exit(1);
		},
	};
	rl.set_helper(Some(completion::ShellHelper::new()));

	loop {
		let line = match rl.readline(PROMPT) {
			Ok(line) => line,
			Err(ReadlineError::Interrupted) => { continue; },
			Err(ReadlineError::Eof) => { break; },
			Err(e) => {
				eprintln!("pipesh: {}", e);
				shutdown(&mut state, 1);
			},
		};
		if line.trim().is_empty() {
			continue;
		}
		rl.add_history_entry(line.as_str());
		state.history.push(&line);
		match eval::eval_line(&mut state, &line) {
			Flow::Continue(status) => debug!("status {}", status),
			Flow::Exit(code) => shutdown(&mut state, code),
		}
	}
	shutdown(&mut state, 0)
}

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::env;

use log::debug;
use nix::unistd::{self, AccessFlags};

use crate::global;
use crate::redirect::os_message;
use crate::registry::{self, Resolution};
use crate::types::Flow;

const HOME_KEY: &'static str = "HOME";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Builtin { Exit, Echo, Type, Pwd, Cd, History }

pub const NAMES: [&'static str; 6] = ["exit", "echo", "type", "pwd", "cd", "history"];

impl Builtin {
	pub fn lookup(name: &str) -> Option<Builtin> {
		match name {
			"exit" => Some(Builtin::Exit),
			"echo" => Some(Builtin::Echo),
			"type" => Some(Builtin::Type),
			"pwd" => Some(Builtin::Pwd),
			"cd" => Some(Builtin::Cd),
			"history" => Some(Builtin::History),
			_ => None,
		}
	}

	/// Runs the builtin against the given sinks. Write failures (a closed
	/// pipe, a full disk) turn into status 1.
	pub fn run(self, state: &mut global::State, argv: &[String], out: &mut dyn Write, err: &mut dyn Write) -> Flow {
		debug!("builtin {:?} {:?}", self, &argv[1 ..]);
		let r = match self {
			Builtin::Exit => { return builtin_exit(argv, err); },
			Builtin::Echo => builtin_echo(argv, out),
			Builtin::Type => builtin_type(argv, out, err),
			Builtin::Pwd => builtin_pwd(out, err),
			Builtin::Cd => builtin_cd(argv, err),
			Builtin::History => builtin_history(state, argv, out, err),
		};
		let status = r.and_then(|s| out.flush().map(|_| s)).unwrap_or_else(|e| {
			let _ = writeln!(err, "{}: write error: {}", argv[0], os_message(&e));
			1
		});
		Flow::Continue(status)
	}
}

fn builtin_exit(argv: &[String], err: &mut dyn Write) -> Flow {
	match argv.get(1) {
		None => Flow::Exit(0),
		Some(code) => match code.parse::<i32>() {
			Ok(code) => Flow::Exit(code),
			Err(_) => {
				let _ = writeln!(err, "exit: {}: numeric argument required", code);
				Flow::Exit(2)
			},
		},
	}
}

fn builtin_echo(argv: &[String], out: &mut dyn Write) -> io::Result<u8> {
	writeln!(out, "{}", argv[1 ..].join(" "))?;
	Ok(0)
}

fn builtin_type(argv: &[String], out: &mut dyn Write, err: &mut dyn Write) -> io::Result<u8> {
	if argv.len() < 2 {
		writeln!(err, "type: missing argument")?;
		return Ok(1);
	}
	let mut status = 0;
	for name in &argv[1 ..] {
		match registry::resolve(name) {
			Resolution::Builtin(_) => writeln!(out, "{} is a shell builtin", name)?,
			Resolution::External(path) => writeln!(out, "{} is {}", name, path.display())?,
			Resolution::NotFound => {
				writeln!(out, "{}: not found", name)?;
				status = 1;
			},
		}
	}
	Ok(status)
}

fn builtin_pwd(out: &mut dyn Write, err: &mut dyn Write) -> io::Result<u8> {
	match env::current_dir() {
		Ok(cwd) => {
			writeln!(out, "{}", cwd.display())?;
			Ok(0)
		},
		Err(e) => {
			writeln!(err, "pwd: error retrieving current directory: {}", os_message(&e))?;
			Ok(1)
		},
	}
}

/// Replaces a leading `~` with `$HOME`.
fn expand_tilde(arg: &str) -> PathBuf {
	match (arg.strip_prefix('~'), env::var_os(HOME_KEY)) {
		(Some(rest), Some(home)) => {
			let mut expanded: OsString = home;
			expanded.push(rest);
			PathBuf::from(expanded)
		},
		_ => PathBuf::from(arg),
	}
}

fn builtin_cd(argv: &[String], err: &mut dyn Write) -> io::Result<u8> {
	let (shown, dir) = match argv.get(1) {
		Some(arg) => (arg.clone(), expand_tilde(arg)),
		None => match env::var_os(HOME_KEY) {
			Some(home) => (home.to_string_lossy().into_owned(), PathBuf::from(home)),
			None => {
				writeln!(err, "cd: HOME not set")?;
				return Ok(1);
			},
		},
	};
	if unistd::access(dir.as_path(), AccessFlags::F_OK).is_err() {
		writeln!(err, "cd: {}: No such file or directory", shown)?;
		return Ok(1);
	}
	if unistd::access(dir.as_path(), AccessFlags::X_OK).is_err() {
		writeln!(err, "cd: {}: Permission denied", shown)?;
		return Ok(1);
	}
	if let Err(e) = env::set_current_dir(&dir) {
		writeln!(err, "cd: {}: {}", shown, os_message(&e))?;
		return Ok(1);
	}
	Ok(0)
}

fn builtin_history(state: &mut global::State, argv: &[String], out: &mut dyn Write, err: &mut dyn Write) -> io::Result<u8> {
	let limit = match argv.get(1).map(|s| s.as_str()) {
		Some(flag @ "-r") | Some(flag @ "-w") | Some(flag @ "-a") => {
			let path = match argv.get(2) {
				Some(path) => Path::new(path),
				None => {
					writeln!(err, "history: option requires an argument")?;
					return Ok(1);
				},
			};
			let r = match flag {
				"-r" => state.history.load(path).map(|n| debug!("loaded {} history entries", n)),
				"-w" => state.history.dump(path),
				_ => state.history.append_new(path),
			};
			if r.is_err() {
				writeln!(err, "history: {}: cannot open history file", path.display())?;
				return Ok(1);
			}
			return Ok(0);
		},
		Some(n) => match n.parse::<usize>() {
			Ok(n) => Some(n),
			Err(_) => {
				writeln!(err, "history: {}: numeric argument required", n)?;
				return Ok(1);
			},
		},
		None => None,
	};
	for (i, line) in state.history.tail(limit) {
		writeln!(out, "{:>5}  {}", i, line)?;
	}
	Ok(0)
}

use std::convert::Infallible;
use std::ffi::{self, CString};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use log::{debug, warn};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult};
use thiserror::Error;

use crate::builtin::Builtin;
use crate::global;
use crate::job::{ProcessSet, WaitStatusExt};
use crate::parser;
use crate::pipe::{PipeChain, StageEnds};
use crate::redirect::{self, RedirectGuard};
use crate::registry::{self, Resolution};
use crate::types::*;

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{}", .0.desc())]
	NixError(#[from] nix::Error),
	#[error("{}", redirect::os_message(.0))]
	IoError(#[from] io::Error),
	#[error("{0}")]
	NulError(#[from] ffi::NulError),
}

fn report(args: std::fmt::Arguments) {
	let mut stderr = io::stderr();
	let _ = stderr.write_fmt(args);
	let _ = stderr.write_all(b"\n");
}

/// Leaves a forked child without running any destructor of the parent's data.
fn exit_child(status: i32) -> ! {
	let _ = io::stdout().flush();
	let _ = io::stderr().flush();
	unsafe { libc::_exit(status) }
}

fn reset_child_signals() {
	// the shell ignores SIGPIPE and an ignored disposition survives exec
	let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
}

fn do_exec(path: &Path, argv: &[String]) -> Result<Infallible, ExecError> {
	let path = CString::new(path.as_os_str().as_bytes())?;
	let argv: Result<Vec<CString>, ffi::NulError> = argv.iter().map(|s| CString::new(s.as_bytes())).collect();
	let argv: Vec<CString> = argv?;
	Ok(unistd::execv(&path, &argv)?)
}

/// Replaces the process image. Only comes back with the reason it failed.
fn exec_external(path: &Path, argv: &[String]) -> ExecError {
	match do_exec(path, argv) {
		Ok(never) => match never {},
		Err(e) => e,
	}
}

fn apply_redirect(redirect: Option<&Redirect>) -> Option<Result<RedirectGuard, redirect::RedirectError>> {
	redirect.map(RedirectGuard::apply)
}

fn run_builtin(state: &mut global::State, builtin: Builtin, argv: &[String]) -> Flow {
	let stdout = io::stdout();
	let stderr = io::stderr();
	let flow = builtin.run(state, argv, &mut stdout.lock(), &mut stderr.lock());
	flow
}

fn external_child(command: &Command, path: &Path) -> ! {
	reset_child_signals();
	let _guard = match apply_redirect(command.redirect.as_ref()) {
		Some(Ok(guard)) => Some(guard),
		Some(Err(e)) => {
			report(format_args!("{}", e));
			exit_child(1)
		},
		None => None,
	};
	let e = exec_external(path, &command.argv);
	report(format_args!("{}: {}", command.name(), e));
	exit_child(126)
}

fn spawn_external(command: &Command, path: &Path) -> Result<u8, ExecError> {
	let mut job = ProcessSet::new(1);
	match job.push_fork()? {
		ForkResult::Parent { .. } => {
			job.wait_all();
			Ok(job.processes()[0].status.code())
		},
		ForkResult::Child => external_child(command, path),
	}
}

/// Runs a lone command. Builtins run in this process so that `cd` and `exit`
/// act on the shell itself.
fn run_single(state: &mut global::State, command: &Command) -> Flow {
	match registry::resolve(command.name()) {
		Resolution::Builtin(builtin) => {
			let _guard = match apply_redirect(command.redirect.as_ref()) {
				Some(Ok(guard)) => Some(guard),
				Some(Err(e)) => {
					report(format_args!("{}", e));
					return Flow::Continue(1);
				},
				None => None,
			};
			run_builtin(state, builtin, &command.argv)
		},
		Resolution::External(path) => {
			debug!("{} -> {}", command.name(), path.display());
			match spawn_external(command, &path) {
				Ok(status) => Flow::Continue(status),
				Err(e) => {
					report(format_args!("{}: {}", command.name(), e));
					Flow::Continue(1)
				},
			}
		},
		Resolution::NotFound => {
			report(format_args!("{}: command not found", command.name()));
			Flow::Continue(127)
		},
	}
}

fn wire_stage(ends: StageEnds) -> nix::Result<()> {
	if let Some(input) = ends.input {
		unistd::dup2(input.as_raw_fd(), libc::STDIN_FILENO)?;
	}
	if let Some(output) = ends.output {
		unistd::dup2(output.as_raw_fd(), libc::STDOUT_FILENO)?;
	}
	Ok(())
}

fn run_stage(state: &mut global::State, command: &Command, is_last: bool) -> i32 {
	let redirect = if is_last { command.redirect.as_ref() } else { None };
	let _guard = match apply_redirect(redirect) {
		Some(Ok(guard)) => Some(guard),
		Some(Err(e)) => {
			report(format_args!("{}", e));
			return 1;
		},
		None => None,
	};
	match registry::resolve(command.name()) {
		Resolution::Builtin(builtin) => match run_builtin(state, builtin, &command.argv) {
			Flow::Continue(0) => 0,
			Flow::Continue(_) => 1,
			Flow::Exit(code) => code,
		},
		Resolution::External(path) => {
			let e = exec_external(&path, &command.argv);
			report(format_args!("{}: {}", command.name(), e));
			126
		},
		Resolution::NotFound => {
			report(format_args!("{}: command not found", command.name()));
			127
		},
	}
}

/// Body of the child forked for stage `i`. It only keeps its own two pipe
/// ends and always terminates the process.
fn stage_child(state: &mut global::State, command: &Command, ends: StageEnds, is_last: bool) -> ! {
	reset_child_signals();
	let status = match wire_stage(ends) {
		Ok(()) => run_stage(state, command, is_last),
		Err(e) => {
			report(format_args!("{}: {}", command.name(), e.desc()));
			1
		},
	};
	exit_child(status)
}

fn spawn_stages(state: &mut global::State, commands: &[Command], job: &mut ProcessSet) -> Result<(), ExecError> {
	let last = commands.len() - 1;
	let chain = PipeChain::new(last)?;
	debug!("{} pipes for {} stages", chain.len(), commands.len());
	for (i, command) in commands.iter().enumerate() {
		if i != last && command.redirect.is_some() {
			warn!("stage {} writes to the next pipe, ignoring its redirection", i);
		}
		match job.push_fork()? {
			ForkResult::Parent { .. } => {},
			ForkResult::Child => stage_child(state, command, chain.into_stage_ends(i), i == last),
		}
	}
	Ok(())
}

/// Forks one child per stage and waits for all of them. If spawning fails
/// half way, the pipes are closed before the started children are reaped.
fn run_pipeline(state: &mut global::State, pipeline: &Pipeline) -> Flow {
	let n = pipeline.commands.len();
	let mut job = ProcessSet::new(n);
	if let Err(e) = spawn_stages(state, &pipeline.commands, &mut job) {
		report(format_args!("pipesh: {}", e));
	}
	job.wait_all();
	for pr in job.processes() {
		debug!("{} {:?}", pr.pid, pr.status);
	}
	match job.processes().last() {
		Some(pr) if job.len() == n => Flow::Continue(pr.status.code()),
		_ => Flow::Continue(1),
	}
}

pub fn eval(state: &mut global::State, pipeline: &Pipeline) -> Flow {
	assert!(pipeline.commands.len() > 0);
	debug!("{:?}", pipeline);
	if pipeline.commands.len() == 1 {
		run_single(state, &pipeline.commands[0])
	} else {
		run_pipeline(state, pipeline)
	}
}

/// Parses and runs one input line. A malformed line runs nothing.
pub fn eval_line(state: &mut global::State, line: &str) -> Flow {
	match parser::parse(line) {
		Ok(Some(pipeline)) => eval(state, &pipeline),
		Ok(None) => Flow::Continue(0),
		Err(e) => {
			report(format_args!("pipesh: {}", e));
			Flow::Continue(2)
		},
	}
}

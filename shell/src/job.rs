use std::io::{self, Write};

use log::debug;
use nix::errno::Errno;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, Pid};

pub trait WaitStatusExt {
	fn is_terminated(self) -> bool;
	fn code(self) -> u8;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(self) -> bool {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
			_ => false,
		}
	}
	fn code(self) -> u8 {
		match self {
			WaitStatus::Exited(_, code) => code as u8,
			WaitStatus::Signaled(_, sig, _) => 128u8.wrapping_add(sig as i32 as u8),
			_ => 0,
		}
	}
}

/// Blocks until `pid` has terminated, riding out stops and interrupted waits.
pub fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status) if status.is_terminated() => { return Ok(status); },
			Ok(_) | Err(Errno::EINTR) => {},
			Err(e) => { return Err(e); },
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

/// Children forked for one pipeline. Every member is reaped before the set
/// goes away, including when spawning stopped half way.
#[derive(Debug)]
pub struct ProcessSet {
	processes: Vec<Process>,
	reaped: usize,
}

impl ProcessSet {
	pub fn new(size_hint: usize) -> ProcessSet {
		ProcessSet { processes: Vec::with_capacity(size_hint), reaped: 0 }
	}

	pub fn len(&self) -> usize {
		self.processes.len()
	}

	/// Forks and records the child on the parent side. The child side must
	/// never return into the caller's loop.
	pub fn push_fork(&mut self) -> nix::Result<unistd::ForkResult> {
		// buffered output would otherwise be written twice
		let _ = io::stdout().flush();
		let _ = io::stderr().flush();
		let r = unsafe { unistd::fork()? };
		if let unistd::ForkResult::Parent { child } = r {
			debug!("forked stage {} as {}", self.processes.len(), child);
			self.processes.push(Process { pid: child, status: WaitStatus::StillAlive });
		}
		Ok(r)
	}

	/// Waits for every child not yet reaped, in fork order. Returns how many
	/// children this set has reaped in total.
	pub fn wait_all(&mut self) -> usize {
		for pr in self.processes.iter_mut().filter(|pr| !pr.status.is_terminated()) {
			match wait_for(pr.pid) {
				Ok(status) => {
					pr.status = status;
					self.reaped += 1;
				},
				Err(e) => debug!("waitpid({}) failed: {}", pr.pid, e),
			}
		}
		debug!("reaped {} of {} stage processes", self.reaped, self.processes.len());
		self.reaped
	}

	pub fn processes(&self) -> &[Process] {
		&self.processes
	}
}

impl Drop for ProcessSet {
	fn drop(&mut self) {
		if self.processes.iter().any(|pr| !pr.status.is_terminated()) {
			self.wait_all();
		}
	}
}

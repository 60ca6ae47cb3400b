use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};

use log::debug;
use nix::fcntl::OFlag;
use nix::unistd;

struct Pipe {
	read: OwnedFd,
	write: OwnedFd,
}

/// The `n - 1` pipes joining `n` stages. Pipe `i` carries stage `i`'s output
/// to stage `i + 1`. Every descriptor is closed when its owner drops it.
pub struct PipeChain {
	pipes: Vec<Pipe>,
}

/// The only pipe descriptors stage `i` keeps.
#[derive(Debug)]
pub struct StageEnds {
	pub input: Option<OwnedFd>,
	pub output: Option<OwnedFd>,
}

impl PipeChain {
	/// On failure the pipes created so far are closed again.
	pub fn new(count: usize) -> nix::Result<PipeChain> {
		let mut pipes: Vec<Pipe> = Vec::with_capacity(count);
		for _ in 0 .. count {
			let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
			let pipe = unsafe { Pipe { read: OwnedFd::from_raw_fd(read), write: OwnedFd::from_raw_fd(write) } };
			debug!("pipe {}: read {} write {}", pipes.len(), pipe.read.as_raw_fd(), pipe.write.as_raw_fd());
			pipes.push(pipe);
		}
		Ok(PipeChain { pipes: pipes })
	}

	pub fn len(&self) -> usize {
		self.pipes.len()
	}

	/// Keeps the read end of pipe `i - 1` and the write end of pipe `i`,
	/// closing every other descriptor of the chain.
	pub fn into_stage_ends(self, i: usize) -> StageEnds {
		let mut ends = StageEnds { input: None, output: None };
		for (j, pipe) in self.pipes.into_iter().enumerate() {
			if j + 1 == i {
				ends.input = Some(pipe.read);
			} else if j == i {
				ends.output = Some(pipe.write);
			}
		}
		ends
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nix::fcntl::{self, FcntlArg};
	use std::os::unix::io::RawFd;

	fn is_open(fd: RawFd) -> bool {
		fcntl::fcntl(fd, FcntlArg::F_GETFD).is_ok()
	}

	fn all_fds(chain: &PipeChain) -> Vec<(RawFd, RawFd)> {
		chain.pipes.iter().map(|p| (p.read.as_raw_fd(), p.write.as_raw_fd())).collect()
	}

	#[test]
	fn middle_stage_keeps_two_ends() {
		let chain = PipeChain::new(3).unwrap();
		assert_eq!(chain.len(), 3);
		let fds = all_fds(&chain);
		let ends = chain.into_stage_ends(1);
		assert_eq!(ends.input.as_ref().map(|fd| fd.as_raw_fd()), Some(fds[0].0));
		assert_eq!(ends.output.as_ref().map(|fd| fd.as_raw_fd()), Some(fds[1].1));
		// fds may be reused by other tests once closed, so only check the kept ones
		assert!(is_open(fds[0].0));
		assert!(is_open(fds[1].1));
	}

	#[test]
	fn edge_stages() {
		let chain = PipeChain::new(2).unwrap();
		let fds = all_fds(&chain);
		let first = chain.into_stage_ends(0);
		assert!(first.input.is_none());
		assert_eq!(first.output.map(|fd| fd.as_raw_fd()), Some(fds[0].1));

		let chain = PipeChain::new(2).unwrap();
		let fds = all_fds(&chain);
		let last = chain.into_stage_ends(2);
		assert_eq!(last.input.map(|fd| fd.as_raw_fd()), Some(fds[1].0));
		assert!(last.output.is_none());
	}

	#[test]
	fn pipes_are_close_on_exec() {
		let chain = PipeChain::new(1).unwrap();
		for (r, w) in all_fds(&chain) {
			for fd in [r, w].iter() {
				let flags = fcntl::fcntl(*fd, FcntlArg::F_GETFD).unwrap();
				assert!(flags & libc::FD_CLOEXEC != 0);
			}
		}
	}
}

use std::fs;
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use log::debug;
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg};
use nix::unistd;
use thiserror::Error;

use crate::types::{Redirect, RedirectMode, Stream};

/// Lowest descriptor number a saved duplicate may take.
const SAVE_FD_MIN: RawFd = 10;

#[derive(Debug, Error)]
pub enum RedirectError {
	#[error("{path}: {}", os_message(.source))]
	Open { path: String, source: io::Error },
	#[error("cannot save descriptor {fd}: {}", .errno.desc())]
	Save { fd: RawFd, errno: Errno },
	#[error("cannot redirect descriptor {fd}: {}", .errno.desc())]
	Swap { fd: RawFd, errno: Errno },
}

/// OS error text without the `(os error N)` suffix.
pub fn os_message(e: &io::Error) -> String {
	match e.raw_os_error() {
		Some(code) => Errno::from_i32(code).desc().to_string(),
		None => e.to_string(),
	}
}

fn flush(stream: Stream) {
	let _ = match stream {
		Stream::Stdout => io::stdout().flush(),
		Stream::Stderr => io::stderr().flush(),
	};
}

fn open_target(redirect: &Redirect) -> Result<fs::File, RedirectError> {
	let mut oopt = fs::OpenOptions::new();
	let _ = match redirect.mode {
		RedirectMode::Truncate => oopt.write(true).create(true).truncate(true),
		RedirectMode::Append => oopt.append(true).create(true),
	};
	oopt.open(&redirect.filename).map_err(|e| RedirectError::Open { path: redirect.filename.clone(), source: e })
}

/// A descriptor pointed at a file for as long as the guard lives. Dropping it
/// points the descriptor back at whatever it referred to before.
#[derive(Debug)]
pub struct RedirectGuard {
	stream: Stream,
	saved: OwnedFd,
}

impl RedirectGuard {
	/// On error the target descriptor is untouched and there is nothing to
	/// restore.
	pub fn apply(redirect: &Redirect) -> Result<RedirectGuard, RedirectError> {
		let fd = redirect.stream.fileno();
		let file = open_target(redirect)?;
		flush(redirect.stream);
		let saved = fcntl::fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(SAVE_FD_MIN))
			.map_err(|errno| RedirectError::Save { fd: fd, errno: errno })?;
		let saved = unsafe { OwnedFd::from_raw_fd(saved) };
		unistd::dup2(file.as_raw_fd(), fd).map_err(|errno| RedirectError::Swap { fd: fd, errno: errno })?;
		debug!("fd {} -> {} (saved as {})", fd, redirect.filename, saved.as_raw_fd());
		Ok(RedirectGuard { stream: redirect.stream, saved: saved })
	}
}

impl Drop for RedirectGuard {
	fn drop(&mut self) {
		let fd = self.stream.fileno();
		flush(self.stream);
		if let Err(errno) = unistd::dup2(self.saved.as_raw_fd(), fd) {
			debug!("restoring fd {} failed: {}", fd, errno);
		}
	}
}

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use log::trace;
use nix::unistd::{self, AccessFlags};

const PATH_KEY: &'static str = "PATH";

fn is_executable(path: &Path) -> bool {
	match fs::metadata(path) {
		Ok(meta) => meta.is_file() && unistd::access(path, AccessFlags::X_OK).is_ok(),
		Err(_) => false,
	}
}

/// First `dir/name` along `PATH` that is an executable file. Names containing
/// a slash are checked as given.
pub fn lookup(name: &str) -> Option<PathBuf> {
	if name.is_empty() {
		return None;
	}
	if name.contains('/') {
		let path = PathBuf::from(name);
		return if is_executable(&path) { Some(path) } else { None };
	}
	let paths = env::var_os(PATH_KEY)?;
	for dir in env::split_paths(&paths) {
		if dir.as_os_str().is_empty() {
			continue;
		}
		let candidate = dir.join(name);
		if is_executable(&candidate) {
			trace!("{} resolved to {}", name, candidate.display());
			return Some(candidate);
		}
	}
	None
}

fn add_entry(names: &mut BTreeSet<String>, prefix: &str, entry: io::Result<fs::DirEntry>) -> io::Result<()> {
	let e = entry?;
	let file_name = e.file_name().into_string().map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
	if file_name.starts_with(prefix) && is_executable(&e.path()) {
		names.insert(file_name);
	}
	Ok(())
}

/// Names of executables on `PATH` starting with `prefix`. Unreadable
/// directories are skipped.
pub fn executables(prefix: &str) -> BTreeSet<String> {
	let mut names = BTreeSet::new();
	let paths = match env::var_os(PATH_KEY) {
		Some(paths) => paths,
		None => { return names; },
	};
	for path in env::split_paths(&paths) {
		if let Ok(entries) = fs::read_dir(path) {
			for entry in entries {
				let _ = add_entry(&mut names, prefix, entry);
			}
		}
	}
	names
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::os::unix::fs::PermissionsExt;

	fn touch(dir: &Path, name: &str, mode: u32) -> PathBuf {
		let path = dir.join(name);
		fs::write(&path, b"#!/bin/sh\n").unwrap();
		fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
		path
	}

	#[test]
	fn direct_path() {
		let dir = tempfile::tempdir().unwrap();
		let exe = touch(dir.path(), "tool", 0o755);
		assert_eq!(lookup(exe.to_str().unwrap()), Some(exe.clone()));
		assert_eq!(lookup(dir.path().join("missing").to_str().unwrap()), None);
		// directories are never commands
		assert_eq!(lookup(dir.path().to_str().unwrap()), None);
	}

	#[test]
	fn path_scan_finds_sh() {
		let found = lookup("sh").expect("sh on PATH");
		assert!(found.is_absolute());
		assert!(found.ends_with("sh"));
		assert_eq!(lookup("surely-not-a-command-4e1c"), None);
		assert_eq!(lookup(""), None);
	}

	#[test]
	fn listing_filters_by_prefix() {
		let names = executables("s");
		assert!(names.contains("sh"));
		assert!(names.iter().all(|n| n.starts_with('s')));
	}
}

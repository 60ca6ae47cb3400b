use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// In-memory command history. Entries are numbered from 1.
#[derive(Debug, Default)]
pub struct History {
	entries: Vec<String>,
	appended: usize,
}

impl History {
	pub fn new() -> History {
		History::default()
	}

	pub fn push(&mut self, line: &str) {
		self.entries.push(line.to_string());
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// The last `limit` entries (all of them for `None` or zero) with their numbers.
	pub fn tail(&self, limit: Option<usize>) -> impl Iterator<Item = (usize, &str)> {
		let start = match limit {
			Some(n) if n > 0 && n < self.entries.len() => self.entries.len() - n,
			_ => 0,
		};
		self.entries[start ..].iter().enumerate().map(move |(i, e)| (start + i + 1, e.as_str()))
	}

	pub fn load(&mut self, path: &Path) -> io::Result<usize> {
		let file = io::BufReader::new(fs::File::open(path)?);
		let mut n = 0;
		for line in file.lines() {
			let line = line?;
			if !line.is_empty() {
				self.entries.push(line);
				n += 1;
			}
		}
		Ok(n)
	}

	pub fn dump(&mut self, path: &Path) -> io::Result<()> {
		let mut file = io::BufWriter::new(fs::File::create(path)?);
		for entry in &self.entries {
			writeln!(file, "{}", entry)?;
		}
		file.flush()?;
		self.appended = self.entries.len();
		Ok(())
	}

	/// Appends the entries recorded since the last dump or append.
	pub fn append_new(&mut self, path: &Path) -> io::Result<()> {
		let file = fs::OpenOptions::new().append(true).create(true).open(path)?;
		let mut file = io::BufWriter::new(file);
		for entry in &self.entries[self.appended ..] {
			writeln!(file, "{}", entry)?;
		}
		file.flush()?;
		self.appended = self.entries.len();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn numbered(history: &History, limit: Option<usize>) -> Vec<(usize, String)> {
		history.tail(limit).map(|(i, e)| (i, e.to_string())).collect()
	}

	#[test]
	fn tail_keeps_numbering() {
		let mut history = History::new();
		for line in ["echo a", "pwd", "history 2"].iter() {
			history.push(line);
		}
		assert_eq!(numbered(&history, Some(2)), vec![(2, "pwd".to_string()), (3, "history 2".to_string())]);
		assert_eq!(numbered(&history, None).len(), 3);
		assert_eq!(numbered(&history, Some(10)).len(), 3);
		assert_eq!(numbered(&history, Some(0)).len(), 3);
	}

	#[test]
	fn dump_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("hist");
		let mut history = History::new();
		history.push("ls");
		history.push("cd /tmp");
		history.dump(&path).unwrap();
		assert_eq!(fs::read_to_string(&path).unwrap(), "ls\ncd /tmp\n");

		let mut other = History::new();
		fs::write(&path, "one\n\ntwo\n").unwrap();
		assert_eq!(other.load(&path).unwrap(), 2);
		assert_eq!(numbered(&other, None), vec![(1, "one".to_string()), (2, "two".to_string())]);
	}

	#[test]
	fn append_writes_only_new_entries() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("hist");
		let mut history = History::new();
		history.push("a");
		history.append_new(&path).unwrap();
		history.push("b");
		history.push("c");
		history.append_new(&path).unwrap();
		history.append_new(&path).unwrap();
		assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
	}

	#[test]
	fn load_missing_file_fails() {
		let dir = tempfile::tempdir().unwrap();
		let mut history = History::new();
		assert!(history.load(&dir.path().join("nope")).is_err());
		assert_eq!(history.len(), 0);
	}
}

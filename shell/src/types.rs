#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stream { Stdout, Stderr }

impl Stream {
	pub fn fileno(self) -> i32 {
		match self {
			Stream::Stdout => libc::STDOUT_FILENO,
			Stream::Stderr => libc::STDERR_FILENO,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectMode { Truncate, Append }

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub stream: Stream,
	pub filename: String,
	pub mode: RedirectMode,
}

/// One pipeline stage: argv-shaped tokens, `argv[0]` being the command name.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Command {
	pub argv: Vec<String>,
	pub redirect: Option<Redirect>,
}

impl Command {
	pub fn name(&self) -> &str {
		&self.argv[0]
	}
}

#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline {
	pub commands: Vec<Command>,
}

/// What the interactive loop does after a line has run.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow {
	Continue(u8),
	Exit(i32),
}

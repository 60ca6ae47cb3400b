use std::path::PathBuf;

use crate::builtin::Builtin;
use crate::search;

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
	Builtin(Builtin),
	External(PathBuf),
	NotFound,
}

/// Builtins shadow anything of the same name on `PATH`.
pub fn resolve(name: &str) -> Resolution {
	if let Some(builtin) = Builtin::lookup(name) {
		return Resolution::Builtin(builtin);
	}
	match search::lookup(name) {
		Some(path) => Resolution::External(path),
		None => Resolution::NotFound,
	}
}

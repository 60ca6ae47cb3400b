use std::mem;

use thiserror::Error;

use crate::types::*;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("syntax error: empty command in pipeline stage {}", .0 + 1)]
	EmptyStage(usize),
}

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Quote { Unquoted, Single, Double }

enum Lexeme {
	Byte(u8),
	Space,
	Pipe,
	Nothing,
}

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
	quote: Quote,
}

impl<'a> Parser<'a> {
	fn new(line: &'a [u8]) -> Parser<'a> {
		Parser { line: line, i: 0, quote: Quote::Unquoted }
	}

	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => true,
			_ => false,
		}
	}

	/// Consumes one input character (two for an escape) and reports what it
	/// contributes to the current word. Quote characters only toggle state.
	fn next_lexeme(&mut self) -> Option<Lexeme> {
		let c = *self.line.get(self.i)?;
		self.i += 1;
		let next = self.line.get(self.i).cloned();
		let lexeme = match (self.quote, c) {
			(Quote::Single, b'\'') => {
				self.quote = Quote::Unquoted;
				Lexeme::Nothing
			},
			(Quote::Single, _) => Lexeme::Byte(c),
			(Quote::Double, b'"') => {
				self.quote = Quote::Unquoted;
				Lexeme::Nothing
			},
			(Quote::Double, b'\\') => match next {
				Some(n @ b'"') | Some(n @ b'$') | Some(n @ b'`') | Some(n @ b'\\') => {
					self.i += 1;
					Lexeme::Byte(n)
				},
				Some(_) => Lexeme::Byte(b'\\'),
				None => Lexeme::Nothing,
			},
			(Quote::Double, _) => Lexeme::Byte(c),
			(Quote::Unquoted, b'\\') => match next {
				Some(n) => {
					self.i += 1;
					Lexeme::Byte(n)
				},
				None => Lexeme::Nothing,
			},
			(Quote::Unquoted, b'\'') => {
				self.quote = Quote::Single;
				Lexeme::Nothing
			},
			(Quote::Unquoted, b'"') => {
				self.quote = Quote::Double;
				Lexeme::Nothing
			},
			(Quote::Unquoted, b'|') => Lexeme::Pipe,
			(Quote::Unquoted, c) if Parser::is_whitespace(c) => Lexeme::Space,
			(Quote::Unquoted, _) => Lexeme::Byte(c),
		};
		Some(lexeme)
	}
}

fn take_word(word: &mut Vec<u8>) -> String {
	String::from_utf8_lossy(&mem::take(word)).into_owned()
}

/// Splits a line into words. An unterminated quote runs to the end of the line.
pub fn tokenize(line: &str) -> Vec<String> {
	let mut parser = Parser::new(line.as_bytes());
	let mut tokens: Vec<String> = vec![];
	let mut word: Vec<u8> = vec![];
	while let Some(lexeme) = parser.next_lexeme() {
		match lexeme {
			Lexeme::Byte(c) => word.push(c),
			Lexeme::Pipe => word.push(b'|'),
			Lexeme::Space => if !word.is_empty() {
				tokens.push(take_word(&mut word));
			},
			Lexeme::Nothing => {},
		}
	}
	if !word.is_empty() {
		tokens.push(take_word(&mut word));
	}
	tokens
}

fn redirect_operator(token: &str) -> Option<(Stream, RedirectMode)> {
	match token {
		">" | "1>" => Some((Stream::Stdout, RedirectMode::Truncate)),
		">>" | "1>>" => Some((Stream::Stdout, RedirectMode::Append)),
		"2>" => Some((Stream::Stderr, RedirectMode::Truncate)),
		"2>>" => Some((Stream::Stderr, RedirectMode::Append)),
		_ => None,
	}
}

/// Removes the first redirection operator and its filename from `tokens`.
/// An operator with nothing after it stays behind as an ordinary argument.
pub fn extract_redirect(tokens: &mut Vec<String>) -> Option<Redirect> {
	let pos = tokens.iter().position(|t| redirect_operator(t).is_some())?;
	let (stream, mode) = redirect_operator(&tokens[pos])?;
	if pos + 1 >= tokens.len() {
		return None;
	}
	let filename = tokens.remove(pos + 1);
	tokens.remove(pos);
	Some(Redirect { stream: stream, filename: filename, mode: mode })
}

/// Parses one stage. `None` when no command name is left.
pub fn parse_command(stage: &str) -> Option<Command> {
	let mut argv = tokenize(stage);
	let redirect = extract_redirect(&mut argv);
	if argv.is_empty() {
		None
	} else {
		Some(Command { argv: argv, redirect: redirect })
	}
}

/// Cuts a line at every unquoted, unescaped `|`.
pub fn split_stages(line: &str) -> Vec<&str> {
	let mut parser = Parser::new(line.as_bytes());
	let mut stages: Vec<&str> = vec![];
	let mut start = 0;
	while let Some(lexeme) = parser.next_lexeme() {
		if let Lexeme::Pipe = lexeme {
			stages.push(line[start .. parser.i - 1].trim());
			start = parser.i;
		}
	}
	stages.push(line[start ..].trim());
	stages
}

/// Byte offset where the last stage of `line` begins.
pub fn last_stage_start(line: &str) -> usize {
	let mut parser = Parser::new(line.as_bytes());
	let mut start = 0;
	while let Some(lexeme) = parser.next_lexeme() {
		if let Lexeme::Pipe = lexeme {
			start = parser.i;
		}
	}
	start
}

/// `Ok(None)` for a blank line. A pipeline is rejected as a whole if any of
/// its stages has no command.
pub fn parse(line: &str) -> ParseResult<Option<Pipeline>> {
	let stages = split_stages(line);
	if stages.len() == 1 {
		return Ok(parse_command(stages[0]).map(|command| Pipeline { commands: vec![command] }));
	}
	let mut commands: Vec<Command> = Vec::with_capacity(stages.len());
	for (i, stage) in stages.iter().enumerate() {
		match parse_command(stage) {
			Some(command) => commands.push(command),
			None => { return Err(ParseError::EmptyStage(i)); },
		}
	}
	Ok(Some(Pipeline { commands: commands }))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn words(line: &str) -> Vec<String> {
		tokenize(line)
	}

	#[test]
	fn quoted_words() {
		assert_eq!(words("echo 'a b' \"c d\" e"), vec!["echo", "a b", "c d", "e"]);
	}

	#[test]
	fn whitespace_collapses() {
		assert_eq!(words("  ls \t -l   /tmp  "), vec!["ls", "-l", "/tmp"]);
		assert!(words("   \t ").is_empty());
		assert!(words("").is_empty());
	}

	#[test]
	fn plain_words_survive_rejoin() {
		let line = "cat foo.txt bar-baz 42";
		assert_eq!(words(line).join(" "), line);
	}

	#[test]
	fn single_quotes_are_literal() {
		assert_eq!(words(r#"echo 'a\b"c'"#), vec!["echo", r#"a\b"c"#]);
		assert_eq!(words("echo 'x  y'"), vec!["echo", "x  y"]);
	}

	#[test]
	fn double_quote_escapes() {
		assert_eq!(words(r#"echo "a\"b\$c\\d\ne\`""#), vec!["echo", r#"a"b$c\d\ne`"#]);
		assert_eq!(words(r#"echo "it's""#), vec!["echo", "it's"]);
	}

	#[test]
	fn unquoted_backslash_takes_next_char() {
		assert_eq!(words(r"echo a\ b \\ \' \n"), vec!["echo", "a b", "\\", "'", "n"]);
		assert_eq!(words(r"echo trailing\"), vec!["echo", "trailing"]);
	}

	#[test]
	fn adjacent_quotes_join() {
		assert_eq!(words(r#"echo 'a'"b"c"#), vec!["echo", "abc"]);
	}

	#[test]
	fn unterminated_quote_runs_to_end() {
		assert_eq!(words("echo 'abc  def"), vec!["echo", "abc  def"]);
		assert_eq!(words("echo \"x | y"), vec!["echo", "x | y"]);
	}

	#[test]
	fn redirect_operators() {
		let cases = [
			("echo a > f", Stream::Stdout, RedirectMode::Truncate),
			("echo a 1> f", Stream::Stdout, RedirectMode::Truncate),
			("echo a >> f", Stream::Stdout, RedirectMode::Append),
			("echo a 1>> f", Stream::Stdout, RedirectMode::Append),
			("echo a 2> f", Stream::Stderr, RedirectMode::Truncate),
			("echo a 2>> f", Stream::Stderr, RedirectMode::Append),
		];
		for &(line, stream, mode) in cases.iter() {
			let command = parse_command(line).unwrap();
			assert_eq!(command.argv, vec!["echo", "a"], "{}", line);
			assert_eq!(command.redirect, Some(Redirect { stream: stream, filename: "f".to_string(), mode: mode }));
		}
	}

	#[test]
	fn only_first_redirect_is_taken() {
		let command = parse_command("echo a > x > y").unwrap();
		assert_eq!(command.argv, vec!["echo", "a", ">", "y"]);
		assert_eq!(command.redirect.unwrap().filename, "x");
	}

	#[test]
	fn redirect_in_front_of_command() {
		let command = parse_command("> out ls -a").unwrap();
		assert_eq!(command.argv, vec!["ls", "-a"]);
		assert_eq!(command.redirect.unwrap().filename, "out");
	}

	#[test]
	fn dangling_operator_stays_an_argument() {
		let command = parse_command("echo a >").unwrap();
		assert_eq!(command.argv, vec!["echo", "a", ">"]);
		assert_eq!(command.redirect, None);
	}

	#[test]
	fn redirect_without_command() {
		assert_eq!(parse_command("> out"), None);
	}

	#[test]
	fn split_respects_quotes() {
		assert_eq!(split_stages("echo 'a|b' | tr a-z A-Z |wc"), vec!["echo 'a|b'", "tr a-z A-Z", "wc"]);
		assert_eq!(split_stages(r#"echo "x|y" a\|b"#), vec![r#"echo "x|y" a\|b"#]);
	}

	#[test]
	fn last_stage_offset() {
		assert_eq!(last_stage_start("echo a"), 0);
		assert_eq!(last_stage_start("echo a | ca"), 8);
		assert_eq!(last_stage_start("a|b|c"), 4);
		assert_eq!(last_stage_start("echo 'x | y"), 0);
	}

	#[test]
	fn parse_pipeline() {
		let pipeline = parse("cat f | grep x > out").unwrap().unwrap();
		assert_eq!(pipeline.commands.len(), 2);
		assert_eq!(pipeline.commands[0].argv, vec!["cat", "f"]);
		assert_eq!(pipeline.commands[1].argv, vec!["grep", "x"]);
		assert_eq!(pipeline.commands[1].redirect.as_ref().unwrap().filename, "out");
	}

	#[test]
	fn blank_line_is_no_command() {
		assert_eq!(parse("   "), Ok(None));
	}

	#[test]
	fn empty_stage_rejects_pipeline() {
		assert_eq!(parse("echo a | | cat"), Err(ParseError::EmptyStage(1)));
		assert_eq!(parse("| cat"), Err(ParseError::EmptyStage(0)));
		assert_eq!(parse("echo a |"), Err(ParseError::EmptyStage(1)));
		assert_eq!(parse("echo a | > f"), Err(ParseError::EmptyStage(1)));
	}
}

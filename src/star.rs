
// STAR files, the CIF dialect RELION writes its metadata tables in
// https://en.wikipedia.org/wiki/Self-defining_Text_Archive_and_Retrieval

// Only the subset RELION uses is supported: data blocks, loops, key-value pairs,
// comments, quoted values and semicolon text fields. No save frames, no nested loops.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarFile {
	blocks: Vec<DataBlock>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
	name: String,
	pairs: Vec<(String,String)>,
	loops: Vec<Loop>
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Loop {
	tags: Vec<String>,
	rows: Vec<Vec<String>>
}

/// Columns selected out of one loop, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
	tags: Vec<String>,
	rows: Vec<Vec<String>>
}


impl StarFile {

	pub fn read(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = fs::read_to_string(path)
			.context(format!("Failed to read STAR file: {}", path.to_string_lossy()))?;
		Self::parse(&text)
			.context(format!("Failed to parse STAR file: {}", path.to_string_lossy()))
	}

	pub fn parse(text: &str) -> Result<Self> {
		let tokens = tokenize(text)?;
		parse_tokens(tokens)
	}

	pub fn block(&self, name: &str) -> Option<&DataBlock> {
		self.blocks.iter()
			.find(|block| block.name == name)
	}

	pub fn require_block(&self, name: &str) -> Result<&DataBlock> {
		self.block(name)
			.context(format!("No data block named: {}", name))
	}
}


impl DataBlock {

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns the requested columns of the first loop that has all of the tags,
	/// or None if no loop has them all.
	pub fn find(&self, tags: &[&str]) -> Option<Table> {
		self.loops.iter()
			.find_map(|l| l.select(tags))
	}

	/// Returns the requested columns only from the loop that has the `anchor` tag,
	/// so row i of the table is row i of the anchor's column
	pub fn find_alongside(&self, anchor: &str, tags: &[&str]) -> Option<Table> {
		self.loops.iter()
			.find(|l| l.col(anchor).is_some())
			.and_then(|l| l.select(tags))
	}

	pub fn has_tag(&self, tag: &str) -> bool {
		self.loops.iter().any(|l| l.col(tag).is_some())
			|| self.pairs.iter().any(|(t, _)| t.eq_ignore_ascii_case(tag))
	}

	/// Looks up a single value, written either as a key-value pair or as a one-row loop
	pub fn find_pair(&self, tag: &str) -> Option<&str> {
		let pair = self.pairs.iter()
			.find(|(t, _)| t.eq_ignore_ascii_case(tag))
			.map(|(_, value)| value.as_str());
		if pair.is_some() {
			return pair;
		}
		self.loops.iter()
			.filter(|l| l.rows.len() == 1)
			.find_map(|l| l.col(tag).map(|c| l.rows[0][c].as_str()))
	}
}


impl Loop {

	fn col(&self, tag: &str) -> Option<usize> {
		self.tags.iter()
			.position(|t| t.eq_ignore_ascii_case(tag))
	}

	fn select(&self, tags: &[&str]) -> Option<Table> {
		let cols = tags.iter()
			.map(|tag| self.col(tag))
			.collect::<Option<Vec<_>>>()?;
		Some(Table {
			tags: tags.iter()
				.map(|tag| tag.to_string())
				.collect(),
			rows: self.rows.iter()
				.map(|row| cols.iter()
					.map(|&c| row[c].clone())
					.collect()
				)
				.collect()
		})
	}
}


impl Table {

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn rows(&self) -> impl Iterator<Item=&[String]> {
		self.rows.iter()
			.map(|row| row.as_slice())
	}

	pub fn get_str(&self, row: usize, col: usize) -> Result<&str> {
		let values = self.rows.get(row)
			.context(format!("Row {} out of range, table has {} rows", row, self.rows.len()))?;
		let value = values.get(col)
			.context(format!("Column {} out of range, table has {} columns", col, self.tags.len()))?;
		Ok(value.as_str())
	}

	/// `nan` and `inf` parse as floats, but no STAR column means them
	pub fn get_f64(&self, row: usize, col: usize) -> Result<f64> {
		let value = self.get_parsed::<f64>(row, col)?;
		if !value.is_finite() {
			bail!("{} was not a finite number in row {}: {}", self.tags[col], row, value);
		}
		Ok(value)
	}

	pub fn get_u32(&self, row: usize, col: usize) -> Result<u32> {
		self.get_parsed(row, col)
	}

	fn get_parsed<T:FromStr>(&self, row: usize, col: usize) -> Result<T> {
		let value = self.get_str(row, col)?;
		value.parse::<T>()
			.ok()
			.context(format!("{} was not a number in row {}: {}", self.tags[col], row, value))
	}
}


#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	/// an unquoted word, could be a keyword, a tag, or a value
	Word(String),
	/// a quoted string or text field, always a value
	Quoted(String)
}

impl Token {

	fn into_value(self) -> String {
		match self {
			Token::Word(s) => s,
			Token::Quoted(s) => s
		}
	}
}


fn tokenize(text: &str) -> Result<Vec<Token>> {

	let mut tokens = Vec::<Token>::new();
	let mut lines = text.lines()
		.enumerate();

	while let Some((line_i, line)) = lines.next() {

		// text fields start with a semicolon in the first column, and end at the next one
		if let Some(first) = line.strip_prefix(';') {
			let mut field = vec![first.to_string()];
			loop {
				let Some((_, line)) = lines.next()
					else { bail!("Unterminated text field starting at line {}", line_i + 1); };
				if line.starts_with(';') {
					break;
				}
				field.push(line.to_string());
			}
			tokens.push(Token::Quoted(field.join("\n").trim().to_string()));
			continue;
		}

		let chars = line.char_indices()
			.collect::<Vec<_>>();
		let mut i = 0;
		while i < chars.len() {
			let (start, c) = chars[i];
			if c.is_whitespace() {
				i += 1;
			} else if c == '#' {
				break;
			} else if c == '\'' || c == '"' {
				// a closing quote only counts when followed by whitespace or the end of the line
				let mut j = i + 1;
				loop {
					if j >= chars.len() {
						bail!("Unterminated quoted value at line {}", line_i + 1);
					}
					if chars[j].1 == c && chars.get(j + 1).map_or(true, |(_, n)| n.is_whitespace()) {
						break;
					}
					j += 1;
				}
				tokens.push(Token::Quoted(line[start + 1 .. chars[j].0].to_string()));
				i = j + 1;
			} else {
				let mut j = i;
				while j < chars.len() && !chars[j].1.is_whitespace() {
					j += 1;
				}
				let end = chars.get(j)
					.map_or(line.len(), |(pos, _)| *pos);
				tokens.push(Token::Word(line[start .. end].to_string()));
				i = j;
			}
		}
	}

	Ok(tokens)
}


fn is_tag(token: &Token) -> bool {
	matches!(token, Token::Word(w) if w.starts_with('_'))
}

fn is_keyword(token: &Token) -> bool {
	match token {
		Token::Word(w) => {
			let w = w.to_ascii_lowercase();
			w.starts_with("data_") || w == "loop_" || w.starts_with("save_") || w == "global_" || w == "stop_"
		}
		Token::Quoted(_) => false
	}
}


fn parse_tokens(tokens: Vec<Token>) -> Result<StarFile> {

	let mut blocks = Vec::<DataBlock>::new();
	let mut tokens = tokens.into_iter()
		.peekable();

	while let Some(token) = tokens.next() {

		let Token::Word(word) = &token
			else { bail!("Unexpected value outside of a tag: {:?}", token); };
		let lower = word.to_ascii_lowercase();

		if lower.starts_with("data_") {
			blocks.push(DataBlock {
				name: word["data_".len()..].to_string(),
				pairs: Vec::new(),
				loops: Vec::new()
			});
			continue;
		}

		let block = blocks.last_mut()
			.context(format!("{} appears before any data block", word))?;

		if lower == "loop_" {

			// read the tags, then the values
			let mut tags = Vec::<String>::new();
			while let Some(tag) = tokens.next_if(is_tag) {
				tags.push(tag.into_value());
			}
			if tags.is_empty() {
				bail!("loop_ in data block {} has no tags", block.name);
			}
			let mut values = Vec::<String>::new();
			while let Some(value) = tokens.next_if(|t| !is_tag(t) && !is_keyword(t)) {
				values.push(value.into_value());
			}
			if values.len() % tags.len() != 0 {
				bail!("loop_ in data block {} has {} values, not a multiple of its {} tags",
					block.name, values.len(), tags.len());
			}
			let rows = values.chunks(tags.len())
				.map(|row| row.to_vec())
				.collect();
			block.loops.push(Loop {
				tags,
				rows
			});

		} else if word.starts_with('_') {
			let value = tokens.next_if(|t| !is_tag(t) && !is_keyword(t))
				.context(format!("Tag {} has no value", word))?;
			block.pairs.push((word.clone(), value.into_value()));

		} else {
			bail!("Unsupported STAR construct: {}", word);
		}
	}

	Ok(StarFile {
		blocks
	})
}

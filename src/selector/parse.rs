use super::{AttributeCondition, AttributeOperator, Combinator, Complex, Compound, Part, PseudoClass, Relative, Selector};
use crate::error::SelectorError;

/// Splits `selector` on top-level occurrences of `separator`.
///
/// Separators inside parentheses, brackets or quotes don't split, so `a:is(.b, .c), [d="e, f"]`
/// has two top-level items. Items are trimmed; empty items are kept so callers can reject them.
///
/// # Errors
///
/// Iff brackets, parentheses or quotes are unbalanced.
pub fn split_top_level(selector: &str, separator: char) -> Result<Vec<&str>, SelectorError> {
	let mut items = Vec::new();
	let mut start = 0;
	scan(selector, |index, c, depth| {
		if depth == 0 && c == separator {
			items.push(selector[start..index].trim());
			start = index + c.len_utf8();
		}
	})?;
	items.push(selector[start..].trim());
	Ok(items)
}

/// Finds the byte offset of the first top-level occurrence of `needle`.
///
/// # Errors
///
/// Iff brackets, parentheses or quotes are unbalanced.
pub fn find_top_level(selector: &str, needle: char) -> Result<Option<usize>, SelectorError> {
	let mut found = None;
	scan(selector, |index, c, depth| {
		if found.is_none() && depth == 0 && c == needle {
			found = Some(index)
		}
	})?;
	Ok(found)
}

/// Calls `visit` with each character outside of quotes, along with the bracket/parenthesis depth
/// *outside* of it (so an opening parenthesis is reported at the depth it opens from).
fn scan(selector: &str, mut visit: impl FnMut(usize, char, usize)) -> Result<(), SelectorError> {
	let unbalanced = || SelectorError::Unbalanced(selector.to_owned());
	let mut closers: Vec<char> = Vec::new();
	let mut quote: Option<char> = None;
	let mut escaped = false;

	for (index, c) in selector.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		if c == '\\' {
			escaped = true;
			continue;
		}
		if let Some(q) = quote {
			if c == q {
				quote = None;
			}
			continue;
		}
		match c {
			'"' | '\'' => quote = Some(c),
			'(' | '[' => {
				visit(index, c, closers.len());
				closers.push(if c == '(' { ')' } else { ']' });
			}
			')' | ']' => {
				if closers.pop() != Some(c) {
					return Err(unbalanced());
				}
				visit(index, c, closers.len());
			}
			_ => visit(index, c, closers.len()),
		}
	}

	if quote.is_some() || !closers.is_empty() {
		return Err(unbalanced());
	}
	Ok(())
}

pub(super) fn parse_selector_list(selector: &str) -> Result<Selector, SelectorError> {
	if selector.trim().is_empty() {
		return Err(SelectorError::Empty);
	}
	let alternatives = split_top_level(selector, ',')?
		.into_iter()
		.map(|item| if item.is_empty() { Err(SelectorError::Unsupported(selector.to_owned())) } else { parse_complex(item) })
		.collect::<Result<_, _>>()?;
	Ok(Selector { alternatives })
}

enum Token<'a> {
	Compound(&'a str),
	Combinator(Combinator),
	Whitespace,
}

fn tokenize(selector: &str) -> Result<Vec<Token<'_>>, SelectorError> {
	let mut tokens = Vec::new();
	let mut boundaries = Vec::new();

	scan(selector, |index, c, depth| {
		if depth == 0 && (c.is_whitespace() || matches!(c, '>' | '+' | '~')) {
			boundaries.push((index, c));
		}
	})?;

	let mut cursor = 0;
	for (index, c) in boundaries {
		if cursor < index {
			tokens.push(Token::Compound(&selector[cursor..index]));
		}
		tokens.push(match c {
			'>' => Token::Combinator(Combinator::Child),
			'+' => Token::Combinator(Combinator::NextSibling),
			'~' => Token::Combinator(Combinator::SubsequentSibling),
			_ => Token::Whitespace,
		});
		cursor = index + c.len_utf8();
	}
	if cursor < selector.len() {
		tokens.push(Token::Compound(&selector[cursor..]));
	}
	Ok(tokens)
}

/// Parses one complex selector, optionally with a leading combinator (for `:has()` arguments).
fn parse_complex_with_leading(selector: &str, allow_leading: bool) -> Result<(Option<Combinator>, Complex), SelectorError> {
	let unsupported = || SelectorError::Unsupported(selector.to_owned());
	let mut parts: Vec<Part> = Vec::new();
	let mut leading = None;
	let mut pending: Option<Combinator> = None;

	for token in tokenize(selector.trim())? {
		match token {
			Token::Whitespace => {}
			Token::Combinator(combinator) => {
				if pending.is_some() {
					return Err(unsupported());
				}
				if parts.is_empty() {
					if !allow_leading || leading.is_some() {
						return Err(unsupported());
					}
					leading = Some(combinator);
				} else {
					pending = Some(combinator);
				}
			}
			Token::Compound(text) => {
				let combinator = if parts.is_empty() {
					None
				} else {
					Some(pending.take().unwrap_or(Combinator::Descendant))
				};
				parts.push(Part { compound: parse_compound(text)?, combinator });
			}
		}
	}

	if parts.is_empty() || pending.is_some() {
		return Err(unsupported());
	}
	Ok((leading, Complex { parts }))
}

fn parse_complex(selector: &str) -> Result<Complex, SelectorError> {
	parse_complex_with_leading(selector, false).map(|(_, complex)| complex)
}

fn parse_compound(text: &str) -> Result<Compound, SelectorError> {
	let unsupported = || SelectorError::Unsupported(text.to_owned());
	let chars: Vec<(usize, char)> = text.char_indices().collect();
	let mut compound = Compound::default();
	let mut i = 0;

	while i < chars.len() {
		let (offset, c) = chars[i];
		match c {
			'*' => {
				if compound.universal || compound.tag.is_some() || i != 0 {
					return Err(unsupported());
				}
				compound.universal = true;
				i += 1;
			}
			'#' => {
				let (id, next) = identifier(&chars, i + 1).ok_or_else(unsupported)?;
				if compound.id.replace(id).is_some() {
					return Err(unsupported());
				}
				i = next;
			}
			'.' => {
				let (class, next) = identifier(&chars, i + 1).ok_or_else(unsupported)?;
				compound.classes.push(class);
				i = next;
			}
			'[' => {
				let close = matching_close(text, offset, '[', ']').ok_or_else(unsupported)?;
				compound.attributes.push(parse_attribute(&text[offset + 1..close]).ok_or_else(unsupported)?);
				i = chars.iter().position(|&(o, _)| o > close).unwrap_or(chars.len());
			}
			':' => {
				if chars.get(i + 1).map(|&(_, c)| c) == Some(':') {
					// Pseudo-elements never match elements.
					return Err(unsupported());
				}
				let (name, mut next) = identifier(&chars, i + 1).ok_or_else(unsupported)?;
				let argument = match chars.get(next) {
					Some(&(open, '(')) => {
						let close = matching_close(text, open, '(', ')').ok_or_else(unsupported)?;
						next = chars.iter().position(|&(o, _)| o > close).unwrap_or(chars.len());
						Some(&text[open + 1..close])
					}
					_ => None,
				};
				compound.pseudo_classes.push(parse_pseudo_class(&name.to_ascii_lowercase(), argument).ok_or_else(unsupported)?);
				i = next;
			}
			_ => {
				if i != 0 {
					return Err(unsupported());
				}
				let (tag, next) = identifier(&chars, i).ok_or_else(unsupported)?;
				compound.tag = Some(tag.to_ascii_lowercase());
				i = next;
			}
		}
	}
	Ok(compound)
}

fn is_identifier_char(c: char) -> bool {
	c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// Reads an identifier (with backslash escapes) starting at `start`.
fn identifier(chars: &[(usize, char)], start: usize) -> Option<(String, usize)> {
	let mut identifier = String::new();
	let mut i = start;
	while let Some(&(_, c)) = chars.get(i) {
		if c == '\\' {
			let &(_, escaped) = chars.get(i + 1)?;
			identifier.push(escaped);
			i += 2;
		} else if is_identifier_char(c) {
			identifier.push(c);
			i += 1;
		} else {
			break;
		}
	}
	if identifier.is_empty() {
		None
	} else {
		Some((identifier, i))
	}
}

/// Finds the `close` matching the `open` at byte `offset`, respecting quotes and nesting.
fn matching_close(text: &str, offset: usize, open: char, close: char) -> Option<usize> {
	let mut depth = 0usize;
	let mut quote = None;
	let mut escaped = false;
	for (index, c) in text[offset..].char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		match (quote, c) {
			(_, '\\') => escaped = true,
			(Some(q), c) if c == q => quote = None,
			(Some(_), _) => {}
			(None, '"' | '\'') => quote = Some(c),
			(None, c) if c == open => depth += 1,
			(None, c) if c == close => {
				depth -= 1;
				if depth == 0 {
					return Some(offset + index);
				}
			}
			_ => {}
		}
	}
	None
}

fn parse_attribute(inner: &str) -> Option<AttributeCondition> {
	let inner = inner.trim();
	let name_end = inner.find(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))).unwrap_or(inner.len());
	let name = inner[..name_end].to_ascii_lowercase();
	if name.is_empty() {
		return None;
	}
	let rest = inner[name_end..].trim_start();
	if rest.is_empty() {
		return Some(AttributeCondition { name, operator: None, ignore_case: false });
	}

	let (operator, rest) = [
		("~=", AttributeOperator::Includes),
		("|=", AttributeOperator::DashMatch),
		("^=", AttributeOperator::Prefix),
		("$=", AttributeOperator::Suffix),
		("*=", AttributeOperator::Substring),
		("=", AttributeOperator::Equals),
	]
	.iter()
	.find_map(|&(token, operator)| rest.strip_prefix(token).map(|rest| (operator, rest.trim_start())))?;

	let (value, rest) = match rest.chars().next()? {
		quote @ ('"' | '\'') => {
			let mut value = String::new();
			let mut escaped = false;
			let mut end = None;
			for (index, c) in rest.char_indices().skip(1) {
				if escaped {
					value.push(c);
					escaped = false;
				} else if c == '\\' {
					escaped = true;
				} else if c == quote {
					end = Some(index);
					break;
				} else {
					value.push(c);
				}
			}
			(value, &rest[end? + 1..])
		}
		_ => {
			let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
			(rest[..end].replace('\\', ""), &rest[end..])
		}
	};

	let ignore_case = match rest.trim() {
		"" | "s" | "S" => false,
		"i" | "I" => true,
		_ => return None,
	};
	Some(AttributeCondition { name, operator: Some((operator, value)), ignore_case })
}

fn parse_pseudo_class(name: &str, argument: Option<&str>) -> Option<PseudoClass> {
	Some(match (name, argument) {
		("first-child", None) => PseudoClass::FirstChild,
		("last-child", None) => PseudoClass::LastChild,
		("only-child", None) => PseudoClass::OnlyChild,
		("empty", None) => PseudoClass::Empty,
		("checked", None) => PseudoClass::Checked,
		("disabled", None) => PseudoClass::Disabled,
		("nth-child", Some(argument)) => {
			let (a, b) = parse_nth(argument)?;
			PseudoClass::NthChild { a, b }
		}
		("not", Some(argument)) => PseudoClass::Not(parse_selector_list(argument).ok()?),
		("is" | "where", Some(argument)) => PseudoClass::Is(parse_selector_list(argument).ok()?),
		("has", Some(argument)) => PseudoClass::Has(
			split_top_level(argument, ',')
				.ok()?
				.into_iter()
				.map(|item| {
					let (leading, complex) = parse_complex_with_leading(item, true).ok()?;
					Some(Relative { combinator: leading.unwrap_or(Combinator::Descendant), complex })
				})
				.collect::<Option<_>>()?,
		),
		_ => return None,
	})
}

/// Parses `An+B`, `odd`, `even` or an integer.
fn parse_nth(argument: &str) -> Option<(i64, i64)> {
	let argument: String = argument.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase();
	match argument.as_str() {
		"odd" => return Some((2, 1)),
		"even" => return Some((2, 0)),
		_ => {}
	}
	match argument.find('n') {
		None => Some((0, argument.parse().ok()?)),
		Some(n) => {
			let a = match &argument[..n] {
				"" | "+" => 1,
				"-" => -1,
				a => a.parse().ok()?,
			};
			let b = match &argument[n + 1..] {
				"" => 0,
				b => b.strip_prefix('+').unwrap_or(b).parse().ok()?,
			};
			Some((a, b))
		}
	}
}

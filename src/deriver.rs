use crate::{
	dom::{Dom, NodeId},
	error::CannotDeriveTarget,
};

/// Derives a selector that identifies an element, e.g. to resolve `:origin` or to target an element
/// a caller passed directly.
pub trait TargetDeriver {
	/// # Errors
	///
	/// Iff no identifying selector can be produced for `element`.
	fn derive(&self, dom: &Dom, element: NodeId) -> Result<String, CannotDeriveTarget>;
}

/// Tries, in order: `[up-id]`, `#id`, `tag[name]`, the non-`up-` classes, and a few tags that are
/// usually unique on a page.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDeriver;

const UNIQUE_TAGS: &[&str] = &["html", "body", "main", "header", "footer", "nav"];

impl TargetDeriver for DefaultDeriver {
	fn derive(&self, dom: &Dom, element: NodeId) -> Result<String, CannotDeriveTarget> {
		let Some(data) = dom.element(element) else {
			return Err(CannotDeriveTarget(element));
		};

		if let Some(up_id) = data.attribute("up-id") {
			return Ok(format!("[up-id=\"{}\"]", escape_quoted(up_id)));
		}
		if let Some(id) = data.attribute("id").filter(|id| !id.is_empty()) {
			return Ok(if id.chars().all(is_plain) && !id.starts_with(|c: char| c.is_ascii_digit()) {
				format!("#{}", id)
			} else {
				format!("[id=\"{}\"]", escape_quoted(id))
			});
		}
		if let Some(name) = data.attribute("name").filter(|name| !name.is_empty()) {
			return Ok(format!("{}[name=\"{}\"]", data.name(), escape_quoted(name)));
		}
		let classes: Vec<&str> = data.classes().filter(|c| !c.starts_with("up-") && c.chars().all(is_plain)).collect();
		if !classes.is_empty() {
			return Ok(classes.iter().map(|c| format!(".{}", c)).collect());
		}
		if UNIQUE_TAGS.contains(&data.name()) {
			return Ok(data.name().to_owned());
		}
		Err(CannotDeriveTarget(element))
	}
}

fn is_plain(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn escape_quoted(value: &str) -> String {
	value.replace('\\', "\\\\").replace('"', "\\\"")
}

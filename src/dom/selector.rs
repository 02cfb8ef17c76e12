//! Minimal CSS selector support for element lookup.
//!
//! Supports what preview renderers are located by: type selectors (`div`),
//! class selectors (`.preview-embed`), the universal selector (`*`), compound
//! forms (`div.page.first`) and the descendant (whitespace) and child (`>`)
//! combinators.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Relationship between a compound and the one to its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `a b`: any ancestor
    Descendant,
    /// `a > b`: direct parent
    Child,
}

/// A tag and/or class constraint on a single element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    /// Required tag, `None` for `*` or class-only compounds
    pub tag: Option<String>,
    /// Required classes
    pub classes: Vec<String>,
}

impl Compound {
    /// Check this compound against an element's tag and class list.
    pub fn matches(&self, tag: &str, classes: &[String]) -> bool {
        if let Some(required) = &self.tag {
            if required != tag {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|class| classes.iter().any(|c| c == class))
    }
}

/// A parsed selector.
///
/// Stored right-to-left: `steps[0]` is the subject compound, each following
/// step carries the combinator linking it to the previous (more specific) one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    subject: Compound,
    steps: Vec<(Combinator, Compound)>,
}

impl Selector {
    /// Parse a selector string.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |message: &str| Error::Selector {
            selector: input.to_string(),
            message: message.to_string(),
        };

        let mut compounds: Vec<Compound> = Vec::new();
        let mut combinators: Vec<Combinator> = Vec::new();
        let mut pending: Option<Combinator> = None;

        for token in tokenize(input) {
            match token {
                Token::Child => {
                    if compounds.is_empty() || pending == Some(Combinator::Child) {
                        return Err(invalid("unexpected '>'"));
                    }
                    pending = Some(Combinator::Child);
                }
                Token::Space => {
                    if !compounds.is_empty() && pending.is_none() {
                        pending = Some(Combinator::Descendant);
                    }
                }
                Token::Compound(text) => {
                    let compound = parse_compound(&text).map_err(|msg| invalid(msg))?;
                    if !compounds.is_empty() {
                        combinators.push(pending.take().unwrap_or(Combinator::Descendant));
                    }
                    compounds.push(compound);
                }
            }
        }

        if pending == Some(Combinator::Child) {
            return Err(invalid("dangling combinator"));
        }

        let mut compounds = compounds.into_iter().rev();
        let subject = compounds.next().ok_or_else(|| invalid("empty selector"))?;
        let steps = combinators.into_iter().rev().zip(compounds).collect();

        Ok(Self {
            source: input.trim().to_string(),
            subject,
            steps,
        })
    }

    /// The compound the matched element itself must satisfy.
    pub fn subject(&self) -> &Compound {
        &self.subject
    }

    /// Ancestor constraints, nearest first.
    pub fn steps(&self) -> &[(Combinator, Compound)] {
        &self.steps
    }

    /// The selector text as written (trimmed).
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

enum Token {
    Space,
    Child,
    Compound(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in input.trim().chars() {
        match ch {
            '>' => {
                if !current.is_empty() {
                    tokens.push(Token::Compound(std::mem::take(&mut current)));
                }
                tokens.push(Token::Child);
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(Token::Compound(std::mem::take(&mut current)));
                }
                tokens.push(Token::Space);
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(Token::Compound(current));
    }
    tokens
}

fn parse_compound(text: &str) -> std::result::Result<Compound, &'static str> {
    let mut parts = text.split('.');
    let head = parts.next().unwrap_or_default();

    let tag = match head {
        "" | "*" => None,
        name if is_identifier(name) => Some(name.to_ascii_lowercase()),
        _ => return Err("unsupported type selector"),
    };

    let mut classes = Vec::new();
    for class in parts {
        if !is_identifier(class) {
            return Err("invalid class name");
        }
        classes.push(class.to_string());
    }

    if head.is_empty() && classes.is_empty() {
        return Err("empty compound");
    }

    Ok(Compound { tag, classes })
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_single_class() {
        let selector = Selector::parse(".preview-viewer").unwrap();
        assert_eq!(selector.subject().tag, None);
        assert_eq!(selector.subject().classes, classes(&["preview-viewer"]));
        assert!(selector.steps().is_empty());
    }

    #[test]
    fn test_parse_child_combinator() {
        let selector = Selector::parse(".preview-embed > div").unwrap();
        assert_eq!(selector.subject().tag.as_deref(), Some("div"));
        assert_eq!(selector.steps().len(), 1);
        let (combinator, parent) = &selector.steps()[0];
        assert_eq!(*combinator, Combinator::Child);
        assert_eq!(parent.classes, classes(&["preview-embed"]));
    }

    #[test]
    fn test_parse_child_combinator_without_spaces() {
        let spaced = Selector::parse(".a > div").unwrap();
        let tight = Selector::parse(".a>div").unwrap();
        assert_eq!(spaced.subject(), tight.subject());
        assert_eq!(spaced.steps(), tight.steps());
    }

    #[test]
    fn test_parse_descendant_chain_order() {
        let selector = Selector::parse("section .outer div.page").unwrap();
        assert_eq!(selector.subject().tag.as_deref(), Some("div"));
        assert_eq!(selector.subject().classes, classes(&["page"]));
        assert_eq!(selector.steps()[0].0, Combinator::Descendant);
        assert_eq!(selector.steps()[0].1.classes, classes(&["outer"]));
        assert_eq!(selector.steps()[1].1.tag.as_deref(), Some("section"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("   ").is_err());
        assert!(Selector::parse("> div").is_err());
        assert!(Selector::parse(".a >").is_err());
        assert!(Selector::parse(".a > > div").is_err());
        assert!(Selector::parse("#main").is_err());
        assert!(Selector::parse(".a..b").is_err());
    }

    #[test]
    fn test_compound_matches() {
        let compound = parse_compound("div.page.first").unwrap();
        assert!(compound.matches("div", &classes(&["first", "page", "x"])));
        assert!(!compound.matches("div", &classes(&["page"])));
        assert!(!compound.matches("span", &classes(&["page", "first"])));

        let universal = parse_compound("*").unwrap();
        assert!(universal.matches("anything", &[]));
    }

    #[test]
    fn test_from_str_and_display() {
        let selector: Selector = "  .document-preview ".parse().unwrap();
        assert_eq!(selector.to_string(), ".document-preview");
    }
}

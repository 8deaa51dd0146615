//! Purpose: Parse and match the selector subset understood by the in-memory document.
//! Exports: `Selector`, `Compound`.
//! Role: Query facility backing `Document::select`; also used by the CLI to validate input.
//! Invariants: Supported grammar is compound selectors (`tag`, `*`, `#id`, `.class`) joined by whitespace.
//! Invariants: Tag comparison is ASCII case-insensitive; ids and classes are case-sensitive.
use crate::core::error::{Error, ErrorKind};
use std::fmt;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    pub fn matches(&self, tag: &str, id: Option<&str>, classes: &[String]) -> bool {
        if let Some(want) = &self.tag {
            if !want.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if id != Some(want.as_str()) {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|want| classes.iter().any(|have| have == want))
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{tag}")?,
            None if self.id.is_none() && self.classes.is_empty() => write!(f, "*")?,
            None => {}
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

/// Descendant chain of compounds, outermost first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selector {
    compounds: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let compounds = input
            .split_whitespace()
            .map(parse_compound)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid selector `{input}`: {message}"))
                    .with_hint("Use tag, #id, .class, or combinations such as `ul.menu li`.")
            })?;
        if compounds.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("selector is empty"));
        }
        Ok(Self { compounds })
    }

    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    /// The compound the matched node itself must satisfy.
    pub fn subject(&self) -> &Compound {
        &self.compounds[self.compounds.len() - 1]
    }

    /// Compounds that must match ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Compound> {
        self.compounds[..self.compounds.len() - 1].iter().rev()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, compound) in self.compounds.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{compound}")?;
        }
        Ok(())
    }
}

fn parse_compound(part: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut rest = part;

    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else {
        let (ident, after) = take_ident(rest);
        if !ident.is_empty() {
            compound.tag = Some(ident.to_ascii_lowercase());
        }
        rest = after;
    }

    while let Some(marker) = rest.chars().next() {
        let (ident, after) = take_ident(&rest[marker.len_utf8()..]);
        match marker {
            '#' if ident.is_empty() => return Err("`#` must be followed by an id".to_string()),
            '#' if compound.id.is_some() => {
                return Err("a compound may name at most one id".to_string());
            }
            '#' => compound.id = Some(ident.to_string()),
            '.' if ident.is_empty() => {
                return Err("`.` must be followed by a class name".to_string());
            }
            '.' => compound.classes.push(ident.to_string()),
            other => return Err(format!("unexpected character `{other}`")),
        }
        rest = after;
    }

    Ok(compound)
}

fn take_ident(input: &str) -> (&str, &str) {
    let end = input
        .char_indices()
        .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '-' || *ch == '_'))
        .map(|(index, _)| index)
        .unwrap_or(input.len());
    input.split_at(end)
}

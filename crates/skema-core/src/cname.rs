//! # Canonical Names
//!
//! A canonical name addresses a node of an instance tree by the chain of
//! names leading to it: `a.b[0][1].c`. Each segment is an identifier
//! optionally followed by bracketed non-negative indices.
//!
//! Leading dots anchor the path:
//!
//! | Prefix | Anchor |
//! |--------|--------|
//! | none   | the current node |
//! | `.`    | the tree root |
//! | `..`   | the parent of the current node |
//! | `...`  | the grandparent, and so on |
//!
//! `..` alone therefore names the parent, and `..sibling` a sibling.

use std::fmt;
use std::str::FromStr;

use crate::error::KeyError;

/// Where a canonical name starts resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Relative to the current node.
    Current,
    /// From the root of the tree.
    Root,
    /// Ascend this many parents (at least one) first.
    Ancestor(usize),
}

/// One `name[i][j]` segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Property key or declared name.
    pub name: String,
    /// Array indices applied after the name, outermost first.
    pub indices: Vec<usize>,
}

impl Segment {
    /// A segment without indices.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: Vec::new(),
        }
    }

    /// A segment with indices.
    pub fn indexed(name: impl Into<String>, indices: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            indices,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for i in &self.indices {
            write!(f, "[{i}]")?;
        }
        Ok(())
    }
}

/// A parsed canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalName {
    anchor: Anchor,
    segments: Vec<Segment>,
}

impl CanonicalName {
    /// Build from parts.
    pub fn new(anchor: Anchor, segments: Vec<Segment>) -> Self {
        Self { anchor, segments }
    }

    /// Parse `a.b[0].c`, `.root.a`, `..sibling`.
    pub fn parse(input: &str) -> Result<Self, KeyError> {
        let malformed = |reason: &str| KeyError::MalformedCanonicalName {
            cname: input.to_string(),
            reason: reason.to_string(),
        };
        let dots = input.chars().take_while(|c| *c == '.').count();
        let anchor = match dots {
            0 => Anchor::Current,
            1 => Anchor::Root,
            n => Anchor::Ancestor(n - 1),
        };
        let rest = &input[dots..];
        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('.') {
                segments.push(parse_segment(part).map_err(|reason| malformed(&reason))?);
            }
        }
        Ok(Self { anchor, segments })
    }

    /// The anchor.
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// The segments after the anchor.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Append a segment.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Whether the name has no segments (it designates its anchor).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn parse_segment(part: &str) -> Result<Segment, String> {
    let (name, mut rest) = match part.find('[') {
        Some(i) => (&part[..i], &part[i..]),
        None => (part, ""),
    };
    if name.is_empty() {
        return Err("empty segment name".to_string());
    }
    if name.contains(']') {
        return Err(format!("unexpected ']' in '{part}'"));
    }
    let mut indices = Vec::new();
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .ok_or_else(|| format!("expected '[' in '{part}'"))?;
        let close = inner
            .find(']')
            .ok_or_else(|| format!("unclosed '[' in '{part}'"))?;
        let index: usize = inner[..close]
            .trim()
            .parse()
            .map_err(|_| format!("index '{}' is not a non-negative integer", &inner[..close]))?;
        indices.push(index);
        rest = &inner[close + 1..];
    }
    Ok(Segment {
        name: name.to_string(),
        indices,
    })
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            Anchor::Current => {}
            Anchor::Root => f.write_str(".")?,
            Anchor::Ancestor(n) => {
                for _ in 0..=n {
                    f.write_str(".")?;
                }
            }
        }
        for (i, s) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

impl FromStr for CanonicalName {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_relative_with_indices() {
        let cn = CanonicalName::parse("a.b[0][1].c").unwrap();
        assert_eq!(cn.anchor(), Anchor::Current);
        assert_eq!(
            cn.segments(),
            &[
                Segment::named("a"),
                Segment::indexed("b", vec![0, 1]),
                Segment::named("c"),
            ]
        );
    }

    #[test]
    fn test_parse_anchors() {
        assert_eq!(CanonicalName::parse(".a").unwrap().anchor(), Anchor::Root);
        assert_eq!(CanonicalName::parse("..").unwrap().anchor(), Anchor::Ancestor(1));
        assert!(CanonicalName::parse("..").unwrap().is_empty());
        let cn = CanonicalName::parse("...x").unwrap();
        assert_eq!(cn.anchor(), Anchor::Ancestor(2));
        assert_eq!(cn.segments(), &[Segment::named("x")]);
    }

    #[test]
    fn test_empty_string_is_current_node() {
        let cn = CanonicalName::parse("").unwrap();
        assert_eq!(cn.anchor(), Anchor::Current);
        assert!(cn.is_empty());
    }

    #[test]
    fn test_malformed_names_rejected() {
        assert!(CanonicalName::parse("a..b").is_err());
        assert!(CanonicalName::parse("a[x]").is_err());
        assert!(CanonicalName::parse("a[1").is_err());
        assert!(CanonicalName::parse("a[-1]").is_err());
        assert!(CanonicalName::parse("a.").is_err());
    }

    fn segment_strategy() -> impl Strategy<Value = Segment> {
        ("[a-zA-Z_][a-zA-Z0-9_]{0,8}", prop::collection::vec(0usize..50, 0..3))
            .prop_map(|(name, indices)| Segment { name, indices })
    }

    fn anchor_strategy() -> impl Strategy<Value = Anchor> {
        prop_oneof![
            Just(Anchor::Current),
            Just(Anchor::Root),
            (1usize..4).prop_map(Anchor::Ancestor),
        ]
    }

    proptest! {
        /// Formatting then parsing reproduces the same name.
        #[test]
        fn display_parse_round_trip(
            anchor in anchor_strategy(),
            segments in prop::collection::vec(segment_strategy(), 0..5),
        ) {
            let cn = CanonicalName::new(anchor, segments);
            let parsed = CanonicalName::parse(&cn.to_string()).unwrap();
            prop_assert_eq!(parsed, cn);
        }
    }
}

//! dotted paths (`globalVars.inst.minMax`, `Metadata.SiteID`)
use std::fmt;

/// Root segment of the global variable section
pub const GLOBAL_VARS: &str = "globalVars";
/// Root segment under which top-level metadata is addressable
pub const METADATA: &str = "Metadata";

/// At most this many segments below the root are addressable
pub const MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Split on `.`, trimming whitespace around each segment
    pub fn parse(s: &str) -> Self {
        Self {
            segments: s.split('.').map(|seg| seg.trim().to_string()).collect(),
        }
    }

    pub fn metadata(key: &str) -> Self {
        Self::new(vec![METADATA.to_string(), key.to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn root(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Number of segments below the root namespace
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// True when the path starts at one of the addressable roots
    pub fn is_addressable(&self) -> bool {
        matches!(self.root(), Some(GLOBAL_VARS) | Some(METADATA))
            && self.segments.len() > 1
            && self.segments.iter().all(|seg| is_identifier(seg))
    }

    /// Anchor name used when a shared value is emitted
    pub fn anchor(&self) -> String {
        self.segments.join("_")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Path::parse(value)
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_and_display() {
        let path = Path::parse("globalVars. inst .a");
        assert_eq!(path.segments(), &["globalVars", "inst", "a"]);
        assert_eq!(path.to_string(), "globalVars.inst.a");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.anchor(), "globalVars_inst_a");
    }

    #[test]
    fn addressable_roots() {
        assert!(Path::parse("globalVars.a").is_addressable());
        assert!(Path::parse("Metadata.SiteID").is_addressable());
        assert!(!Path::parse("globalVars").is_addressable());
        assert!(!Path::parse("other.a").is_addressable());
        assert!(!Path::parse("globalVars.1a").is_addressable());
    }
}

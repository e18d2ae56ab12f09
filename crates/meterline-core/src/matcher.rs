//! Case-insensitive wildcard matching on metric names.
//!
//! `*` matches any run of characters (including none). Patterns are
//! anchored at both ends: `web.*` matches `web.foo` but not `xweb.foo`.
//! A blank pattern matches everything.

/// Name predicate used to restrict collection.
pub trait NameFilter {
    fn accepts(&self, name: &str) -> bool;
}

/// Compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct LikeMatcher {
    /// Literal pieces between `*`, lowercased. Empty means match-all.
    parts: Vec<String>,
    anchored_start: bool,
    anchored_end: bool,
}

impl LikeMatcher {
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.trim().to_lowercase();
        if pattern.is_empty() {
            return Self {
                parts: Vec::new(),
                anchored_start: false,
                anchored_end: false,
            };
        }
        Self {
            anchored_start: !pattern.starts_with('*'),
            anchored_end: !pattern.ends_with('*'),
            parts: pattern
                .split('*')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_match(&self, name: &str) -> bool {
        if self.parts.is_empty() {
            // "" or only wildcards
            return true;
        }
        let name = name.to_lowercase();
        let mut rest = name.as_str();
        let last = self.parts.len() - 1;

        for (i, part) in self.parts.iter().enumerate() {
            if i == 0 && self.anchored_start {
                match rest.strip_prefix(part.as_str()) {
                    Some(r) => rest = r,
                    None => return false,
                }
                if i == last && self.anchored_end {
                    return rest.is_empty();
                }
                continue;
            }
            if i == last && self.anchored_end {
                return rest.ends_with(part.as_str());
            }
            match rest.find(part.as_str()) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
        true
    }
}

/// Matches if any matcher in the set matches. An empty set matches everything.
#[derive(Debug, Clone, Default)]
pub struct LikeMatcherSet {
    matchers: Vec<LikeMatcher>,
}

impl LikeMatcherSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            matchers: patterns.iter().map(|p| LikeMatcher::new(p.as_ref())).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.matchers.is_empty() || self.matchers.iter().any(|m| m.is_match(name))
    }
}

impl NameFilter for LikeMatcher {
    fn accepts(&self, name: &str) -> bool {
        self.is_match(name)
    }
}

impl NameFilter for LikeMatcherSet {
    fn accepts(&self, name: &str) -> bool {
        self.is_match(name)
    }
}

//! Metric identity: a name plus an ordered list of tags.
//!
//! `MetricId` is a shared handle, so cloning is a reference-count bump and
//! registry keys stay cheap. Derivations that change nothing hand back the
//! same allocation, which callers can detect with [`MetricId::ptr_eq`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One `key=value` tag.
pub type Tag = (Box<str>, Box<str>);

#[derive(Debug, PartialEq, Eq, Hash)]
struct IdInner {
    name: Box<str>,
    tags: Box<[Tag]>,
}

/// Immutable metric identity. Equality is exact: name and tag order both count.
#[derive(Clone)]
pub struct MetricId {
    inner: Arc<IdInner>,
}

impl MetricId {
    /// Identity with no tags.
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self::from_parts(name.into(), Box::new([]))
    }

    /// Identity with tags, kept in the given order.
    pub fn with_tag_pairs(name: impl Into<Box<str>>, tags: &[(&str, &str)]) -> Self {
        Self::from_parts(name.into(), to_tags(tags))
    }

    fn from_parts(name: Box<str>, tags: Box<[Tag]>) -> Self {
        Self {
            inner: Arc::new(IdInner { name, tags }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.inner.tags
    }

    pub fn has_tags(&self) -> bool {
        !self.inner.tags.is_empty()
    }

    /// Same tags, different name. Returns this instance if the name is unchanged.
    pub fn with_name(&self, name: &str) -> Self {
        if self.name() == name {
            return self.clone();
        }
        Self::from_parts(name.into(), self.inner.tags.clone())
    }

    /// Same tags, name extended by `suffix` (e.g. `".error"`).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        if suffix.is_empty() {
            return self.clone();
        }
        let mut name = String::with_capacity(self.name().len() + suffix.len());
        name.push_str(self.name());
        name.push_str(suffix);
        Self::from_parts(name.into(), self.inner.tags.clone())
    }

    /// Same name, replaced tags. Returns this instance if the tags are unchanged.
    pub fn with_tags(&self, tags: &[(&str, &str)]) -> Self {
        let same = self.tags().len() == tags.len()
            && self
                .tags()
                .iter()
                .zip(tags)
                .all(|((k, v), (k2, v2))| &**k == *k2 && &**v == *v2);
        if same {
            return self.clone();
        }
        Self::from_parts(self.inner.name.clone(), to_tags(tags))
    }

    /// Whether both handles share one allocation.
    pub fn ptr_eq(a: &MetricId, b: &MetricId) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

fn to_tags(tags: &[(&str, &str)]) -> Box<[Tag]> {
    tags.iter()
        .map(|(k, v)| (Box::<str>::from(*k), Box::<str>::from(*v)))
        .collect()
}

impl PartialEq for MetricId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for MetricId {}

impl Hash for MetricId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl PartialOrd for MetricId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetricId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name()
            .cmp(other.name())
            .then_with(|| self.tags().cmp(other.tags()))
    }
}

impl fmt::Debug for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// `name` or `name{k=v,k2=v2}`.
impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if self.has_tags() {
            f.write_str("{")?;
            for (i, (k, v)) in self.tags().iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{k}={v}")?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

impl From<&str> for MetricId {
    fn from(name: &str) -> Self {
        MetricId::new(name)
    }
}

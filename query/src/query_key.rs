use std::fmt;
use std::rc::Rc;

/// Identifies a cache entry, or a family of entries when used as a prefix.
///
/// The first segment is the [`ActionKey`](crate::ActionKey) of an action, followed by
/// one segment per call argument.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<Rc<str>>);

impl QueryKey {
    /// A key made of a single segment.
    pub fn new(root: impl AsRef<str>) -> Self {
        QueryKey(vec![Rc::from(root.as_ref())])
    }

    /// Returns a new key with `segments` appended.
    pub fn concat<S>(&self, segments: impl IntoIterator<Item = S>) -> Self
    where
        S: AsRef<str>,
    {
        let mut parts = self.0.clone();
        parts.extend(segments.into_iter().map(|s| Rc::from(s.as_ref())));
        QueryKey(parts)
    }

    /// Whether every segment of `prefix` matches the start of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The key segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_ref())
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for keys built through [`QueryKey::new`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.segments()).finish()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

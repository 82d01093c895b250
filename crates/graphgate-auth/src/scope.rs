//! Typed scopes and namespace normalization
//!
//! Identity providers issue the scope claim (`scp`) in short form
//! (`access_as_user`) while resource configuration usually names the
//! qualified form (`api://<client-id>/access_as_user`). Comparison must happen
//! in one form, so both sides are normalized against a [`ScopeNamespace`].
//!
//! Normalization is idempotent: a scope that already contains the `/`
//! separator is never prefixed again.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator between a resource namespace and a scope name
pub const SCOPE_SEPARATOR: char = '/';

/// Resource namespace used to qualify short-form scopes
///
/// Stored without a trailing separator. An empty namespace qualifies nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScopeNamespace(String);

impl ScopeNamespace {
    /// Create a namespace, dropping any trailing separators
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self(namespace.trim_end_matches(SCOPE_SEPARATOR).to_string())
    }

    /// Namespace text without trailing separator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this namespace qualifies nothing
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ScopeNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ScopeNamespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ScopeNamespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// A single scope, short or qualified
///
/// Parsed by splitting at the last separator, so
/// `api://abc/access_as_user` has namespace `api://abc` and name
/// `access_as_user`. [`Display`](fmt::Display) reproduces the parsed text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope {
    namespace: Option<String>,
    name: String,
}

impl Scope {
    /// Parse a scope value as issued or configured
    pub fn new(value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        match value.rsplit_once(SCOPE_SEPARATOR) {
            Some((namespace, name)) => Self {
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            },
            None => Self {
                namespace: None,
                name: value.to_string(),
            },
        }
    }

    /// Whether the scope already carries a namespace
    pub fn is_qualified(&self) -> bool {
        self.namespace.is_some()
    }

    /// Namespace part of a qualified scope
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Scope name without namespace
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualify against a namespace; already-qualified scopes are returned unchanged
    pub fn qualify(&self, namespace: &ScopeNamespace) -> Self {
        if self.is_qualified() || namespace.is_empty() {
            return self.clone();
        }
        Self {
            namespace: Some(namespace.as_str().to_string()),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}{}{}", namespace, SCOPE_SEPARATOR, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Qualify a short-form scope with a namespace
///
/// ```
/// use graphgate_auth::{ScopeNamespace, normalize};
///
/// let ns = ScopeNamespace::new("api://abc");
/// assert_eq!(normalize("access_as_user", &ns), "api://abc/access_as_user");
/// assert_eq!(normalize("api://abc/access_as_user", &ns), "api://abc/access_as_user");
/// ```
pub fn normalize(scope: &str, namespace: &ScopeNamespace) -> String {
    Scope::new(scope).qualify(namespace).to_string()
}

/// A set of scopes with a stable iteration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space-delimited scope string (the `scp` claim format)
    pub fn parse(value: &str) -> Self {
        value.split_whitespace().map(Scope::new).collect()
    }

    /// Copy of this set with every short-form scope qualified
    pub fn normalized(&self, namespace: &ScopeNamespace) -> Self {
        self.0.iter().map(|scope| scope.qualify(namespace)).collect()
    }

    /// Whether every scope in `required` is present (AND semantics)
    pub fn is_superset_of(&self, required: &ScopeSet) -> bool {
        self.0.is_superset(&required.0)
    }

    /// Required scopes absent from this set
    pub fn missing_from(&self, required: &ScopeSet) -> ScopeSet {
        Self(required.0.difference(&self.0).cloned().collect())
    }

    /// Whether the set holds this scope
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(&Scope::new(scope))
    }

    /// Add a scope
    pub fn insert(&mut self, scope: impl Into<Scope>) -> bool {
        self.0.insert(scope.into())
    }

    /// Iterate in a stable order (short-form scopes first)
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.0.iter()
    }

    /// Number of scopes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Scopes as owned strings
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{scope}")?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<Scope>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a Scope;
    type IntoIter = std::collections::btree_set::Iter<'a, Scope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(ToString::to_string))
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(|scopes| scopes.into_iter().collect())
    }
}

use std::collections::HashSet;
use std::hash::Hash;

/// Include/exclude rules over scopes or environments.
///
/// With no rules every value is supported. Once includes are present they
/// alone decide; otherwise a value is supported unless it is excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeExclude<T: Eq + Hash> {
    includes: HashSet<T>,
    excludes: HashSet<T>,
}

impl<T: Eq + Hash> Default for IncludeExclude<T> {
    fn default() -> Self {
        Self {
            includes: HashSet::new(),
            excludes: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> IncludeExclude<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit lists. Includes win over a conflicting exclude.
    pub fn from_rules(
        includes: impl IntoIterator<Item = T>,
        excludes: impl IntoIterator<Item = T>,
    ) -> Self {
        let includes: HashSet<T> = includes.into_iter().collect();
        let excludes = excludes
            .into_iter()
            .filter(|value| !includes.contains(value))
            .collect();
        Self { includes, excludes }
    }

    pub fn add_include(&mut self, value: T) {
        self.excludes.remove(&value);
        self.includes.insert(value);
    }

    pub fn add_exclude(&mut self, value: T) {
        self.includes.remove(&value);
        self.excludes.insert(value);
    }

    pub fn supports(&self, value: &T) -> bool {
        if !self.includes.is_empty() {
            return self.includes.contains(value);
        }
        !self.excludes.contains(value)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    pub fn includes(&self) -> &HashSet<T> {
        &self.includes
    }

    pub fn excludes(&self) -> &HashSet<T> {
        &self.excludes
    }
}

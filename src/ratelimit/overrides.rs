//! Whitelist/blacklist overrides applied before counting.

use std::collections::HashSet;

/// Outcome of an override lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override {
    /// Key is whitelisted: admit without counting
    Allow,
    /// Key is blacklisted: deny without counting
    Deny,
}

/// Sets of keys that bypass the counting algorithm.
///
/// A key on both lists is treated as whitelisted.
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
}

impl AccessList {
    /// Build an access list from whitelist and blacklist entries.
    pub fn new<W, B>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator,
        W::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self {
            whitelist: whitelist.into_iter().map(Into::into).collect(),
            blacklist: blacklist.into_iter().map(Into::into).collect(),
        }
    }

    /// Find the override for `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<Override> {
        if self.whitelist.contains(key) {
            Some(Override::Allow)
        } else if self.blacklist.contains(key) {
            Some(Override::Deny)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.whitelist.is_empty() && self.blacklist.is_empty()
    }
}

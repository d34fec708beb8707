// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command naming conventions: reserved prefix, suffix and marker tokens.

use crate::config::NamingConfig;

/// Reserved affixes used to recognise and alias command types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    prefix: String,
    suffix: String,
    markers: Vec<String>,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self::from_config(&NamingConfig::default())
    }
}

impl NamingConvention {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, markers: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            markers,
        }
    }

    pub fn from_config(config: &NamingConfig) -> Self {
        Self::new(config.prefix.clone(), config.suffix.clone(), config.markers.clone())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// `CmdFoo` has the prefix, the bare `Cmd` does not.
    pub fn has_prefix(&self, name: &str) -> bool {
        !self.prefix.is_empty() && name.len() > self.prefix.len() && name.starts_with(&self.prefix)
    }

    /// `FooCommand` has the suffix, the bare `Command` does not.
    pub fn has_suffix(&self, name: &str) -> bool {
        !self.suffix.is_empty() && name.len() > self.suffix.len() && name.ends_with(&self.suffix)
    }

    pub fn strip_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.has_prefix(name) {
            name.strip_prefix(self.prefix.as_str())
        } else {
            None
        }
    }

    pub fn strip_suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.has_suffix(name) {
            name.strip_suffix(self.suffix.as_str())
        } else {
            None
        }
    }

    /// Qualification by name alone.
    pub fn qualifies_by_name(&self, name: &str) -> bool {
        self.has_prefix(name) || self.has_suffix(name)
    }

    /// Whether a (base) type name contains one of the marker tokens.
    pub fn matches_marker(&self, name: &str) -> bool {
        self.markers
            .iter()
            .any(|m| !m.is_empty() && name.contains(m.as_str()))
    }

    /// Lookup aliases for a bare type name, original first, no duplicates.
    pub fn aliases(&self, bare: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(3);
        let candidates = [Some(bare), self.strip_prefix(bare), self.strip_suffix(bare)];
        for alias in candidates.into_iter().flatten() {
            if !alias.is_empty() && !out.iter().any(|a| a == alias) {
                out.push(alias.to_string());
            }
        }
        out
    }

    /// Conventional spellings tried when a query has no exact match.
    pub fn candidates(&self, query: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(4);
        if !self.prefix.is_empty() {
            out.push(format!("{}{}", self.prefix, query));
        }
        if !self.suffix.is_empty() {
            out.push(format!("{}{}", query, self.suffix));
        }
        if let Some(stripped) = self.strip_prefix(query) {
            out.push(stripped.to_string());
        }
        if let Some(stripped) = self.strip_suffix(query) {
            out.push(stripped.to_string());
        }
        out
    }
}

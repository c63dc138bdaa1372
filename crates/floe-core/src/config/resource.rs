//! Resource conflict detection.
//!
//! Resources are things two components in the same process must not share,
//! such as an output file. Conflicts are reported at validation time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Resource {
    /// A file written by exactly one component.
    File(String),
}

impl Resource {
    /// Create a file resource. Leading `./` segments are dropped so that
    /// `./out.ndjson` and `out.ndjson` collide.
    pub fn file(path: &str) -> Self {
        let mut normalized = path;
        while let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest;
        }
        Self::File(normalized.to_string())
    }

    /// Map each resource claimed by more than one component to the claimants.
    pub fn conflicts<K>(
        components: impl IntoIterator<Item = (K, Vec<Resource>)>,
    ) -> HashMap<Resource, HashSet<K>>
    where
        K: Eq + Hash + Clone,
    {
        let mut claims: HashMap<Resource, HashSet<K>> = HashMap::new();
        for (key, resources) in components {
            for resource in resources {
                claims.entry(resource).or_default().insert(key.clone());
            }
        }
        claims.retain(|_, keys| keys.len() > 1);
        claims
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{path}"),
        }
    }
}

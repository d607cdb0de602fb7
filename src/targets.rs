//! The operator's configured monitor list.

use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

use crate::db::Target;

/// Targets used when nothing valid has been persisted.
pub const DEFAULT_TARGETS: [&str; 4] = [
    "https://httpbin.org/status/200",
    "https://httpbin.org/status/404",
    "https://httpbin.org/delay/2",
    "https://jsonplaceholder.typicode.com/posts/1",
];

/// Rejections at the configuration boundary.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid URL {0:?}: must start with http:// or https://")]
    InvalidUrl(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("{0} is not a configured target")]
    NotFound(String),
}

/// Ordered, duplicate-free list of targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetList {
    targets: Vec<Target>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in demonstration list.
    pub fn defaults() -> Self {
        Self::from_vec(DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect())
    }

    /// Build a list from persisted entries, keeping the first occurrence of
    /// each target. Entries are not re-validated.
    pub fn from_vec(targets: Vec<Target>) -> Self {
        let mut list = Self::new();
        for target in targets {
            if list.contains(&target) {
                tracing::warn!("Dropping duplicate target {}", target);
                continue;
            }
            list.targets.push(target);
        }
        list
    }

    /// Append a new target after validating it.
    pub fn add(&mut self, url: &str) -> Result<(), TargetError> {
        validate_url(url)?;
        if self.contains(url) {
            return Err(TargetError::Duplicate(url.to_string()));
        }
        self.targets.push(url.to_string());
        Ok(())
    }

    pub fn remove(&mut self, url: &str) -> Result<(), TargetError> {
        let pos = self
            .targets
            .iter()
            .position(|t| t == url)
            .ok_or_else(|| TargetError::NotFound(url.to_string()))?;
        self.targets.remove(pos);
        Ok(())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.targets.iter().any(|t| t == url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn as_slice(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<'a> IntoIterator for &'a TargetList {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

/// Check that `url` is an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<(), TargetError> {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    let scheme = SCHEME.get_or_init(|| Regex::new(r"^https?://\S+$").unwrap());

    if !scheme.is_match(url) {
        return Err(TargetError::InvalidUrl(url.to_string()));
    }

    match Url::parse(url) {
        Ok(parsed) if parsed.host_str().is_some() => Ok(()),
        _ => Err(TargetError::InvalidUrl(url.to_string())),
    }
}

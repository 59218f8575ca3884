//! Cache key construction for fixture results
//!
//! A key has three slash-separated parts:
//!
//! ```text
//! {slugified environment address}/{worker id}/{fixture name[.param]}
//! ```
//!
//! The environment part keeps results from different deployments apart, the
//! worker part keeps parallel workers from writing over each other.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Transliterate `text` to ASCII, lowercase it and collapse every run of
/// non-alphanumeric characters into a single `-`.
pub fn slugify(text: &str) -> String {
    let text = deunicode::deunicode(text);
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Identity of a fixture function: the module it lives in plus its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureId {
    pub module: &'static str,
    pub name: &'static str,
}

impl FixtureId {
    pub const fn new(module: &'static str, name: &'static str) -> Self {
        Self { module, name }
    }

    /// Fully-qualified `module.name` form
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Declare a [`FixtureId`] for a fixture defined in the current module.
#[macro_export]
macro_rules! fixture_id {
    ($name:expr) => {
        $crate::key::FixtureId::new(module_path!(), $name)
    };
}

/// Location of a cached value in the persistent store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Slugified environment base address
    pub environment: String,
    /// Test worker identifier (`master` for non-parallel runs)
    pub worker_id: String,
    /// Fixture qualified name, optionally suffixed with `.{param}`
    pub name: String,
}

impl CacheKey {
    /// Key for an arbitrary named value (e.g. the auth token)
    pub fn named(api_url: &str, worker_id: &str, name: &str) -> Self {
        Self {
            environment: slugify(api_url),
            worker_id: worker_id.to_string(),
            name: name.to_string(),
        }
    }

    /// Key for a fixture result. Parameterized fixtures get their parameter
    /// appended so every parameter value is cached separately.
    pub fn for_fixture(
        api_url: &str,
        worker_id: &str,
        fixture: &FixtureId,
        param: Option<&str>,
    ) -> Self {
        let mut name = fixture.qualified();
        if let Some(param) = param {
            name.push('.');
            name.push_str(param);
        }
        Self::named(api_url, worker_id, &name)
    }

    /// Parse a stored key string back into its components
    pub fn parse(key: &str) -> Result<Self> {
        let mut parts = key.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(environment), Some(worker_id), Some(name))
                if !worker_id.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    environment: environment.to_string(),
                    worker_id: worker_id.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(Error::InvalidKey(key.to_string())),
        }
    }

    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.environment, self.worker_id, self.name)
    }
}

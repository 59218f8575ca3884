//! Blog API models and the registry used to rebuild them from the cache
//!
//! Every model converts to and from a plain JSON mapping. Optional fields are
//! left out of the mapping when absent, mirroring the generated API client
//! where unset attributes never reach the wire.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::{CacheError, Error, Result};

/// JSON object representation of a model
pub type Mapping = Map<String, Value>;

/// A model of the blog REST API that can round-trip through a mapping
pub trait ApiModel: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Name recorded in cache entries; must be unique within a registry
    const TYPE_NAME: &'static str;

    fn to_mapping(&self) -> Result<Mapping> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(CacheError::ShapeMismatch {
                expected: "object".to_string(),
                found: json_kind(&other).to_string(),
            }
            .into()),
        }
    }

    fn from_mapping(mapping: Mapping) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(mapping))?)
    }
}

/// Object-safe view of a model rebuilt through the registry
pub trait DynModel: Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn to_mapping(&self) -> Result<Mapping>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: ApiModel> DynModel for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn to_mapping(&self) -> Result<Mapping> {
        ApiModel::to_mapping(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Decoder = fn(Mapping) -> Result<Box<dyn DynModel>>;

fn decode_model<T: ApiModel>(mapping: Mapping) -> Result<Box<dyn DynModel>> {
    Ok(Box::new(T::from_mapping(mapping)?))
}

/// Lookup of model types by their recorded name
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    decoders: BTreeMap<&'static str, Decoder>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every model of the blog API
    pub fn blog() -> Self {
        let mut registry = Self::new();
        registry
            .register::<Post>()
            .register::<PaginatedPostList>()
            .register::<Token>()
            .register::<AuthTokenRequest>()
            .register::<User>();
        registry
    }

    pub fn register<T: ApiModel>(&mut self) -> &mut Self {
        self.decoders.insert(T::TYPE_NAME, decode_model::<T>);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Rebuild a model of type `name` from its mapping
    pub fn decode(&self, name: &str, mapping: Mapping) -> Result<Box<dyn DynModel>> {
        let decoder = self
            .decoders
            .get(name)
            .ok_or_else(|| Error::from(CacheError::UnknownModel(name.to_string())))?;
        decoder(mapping)
    }
}

/// Name of a JSON value's kind, as used in decode errors
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A value that may be left unset by the caller.
///
/// Distinguishes "not specified" from an explicit value, including an
/// explicit `None` when `T` is itself an `Option`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Unset,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Field::Unset)
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Field::Set(value) => value,
            Field::Unset => default,
        }
    }

    pub fn unwrap_or_else(self, default: impl FnOnce() -> T) -> T {
        match self {
            Field::Set(value) => value,
            Field::Unset => default(),
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Set(value)
    }
}

/// Blog post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Post {
    pub fn new(title: impl Into<String>, description: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

impl ApiModel for Post {
    const TYPE_NAME: &'static str = "Post";
}

/// One page of the post listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginatedPostList {
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Post>,
}

impl ApiModel for PaginatedPostList {
    const TYPE_NAME: &'static str = "PaginatedPostList";
}

/// Auth token returned by the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
}

impl ApiModel for Token {
    const TYPE_NAME: &'static str = "Token";
}

/// Login request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokenRequest {
    pub email: String,
    pub password: String,
}

impl ApiModel for AuthTokenRequest {
    const TYPE_NAME: &'static str = "AuthTokenRequest";
}

/// Blog user profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ApiModel for User {
    const TYPE_NAME: &'static str = "User";
}

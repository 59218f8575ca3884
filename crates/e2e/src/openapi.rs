//! Cache codec for blog API models
//!
//! A cached API result is stored as a tagged entry:
//!
//! ```json
//! {"response_type": "list[Post]", "data": [{"id": 1}, {"id": 2}]}
//! ```
//!
//! The tag names the model type and the shape of the payload: a bare type
//! name for a single object, `list[T]` for a sequence, `tuple[T, ...]` for a
//! fixed-arity sequence. Reading an entry back parses the tag, looks the type
//! up in a [`ModelRegistry`] and rebuilds every element from its mapping.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use blogsuite_common::models::{json_kind, AuthTokenRequest, PaginatedPostList, Post, Token, User};
use blogsuite_common::{ApiModel, CacheError, DynModel, Mapping, ModelRegistry, Result};

use crate::fixture::CacheCodec;

static LIST_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^list\[(.*)\]$").expect("list tag pattern"));
static TUPLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tuple\[(.*), \.\.\.\]$").expect("tuple tag pattern"));

/// Stored form of a cached API result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response_type: String,
    pub data: Value,
}

/// Parsed `response_type` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseType {
    Single(String),
    List(String),
    Tuple(String),
}

impl ResponseType {
    /// Parse a tag. Anything starting with `list[` or `tuple[` must match the
    /// bracket pattern exactly; other strings are single-object type names.
    pub fn parse(tag: &str) -> std::result::Result<Self, CacheError> {
        let unknown = || CacheError::UnknownResponseType(tag.to_string());

        if tag.starts_with("list[") {
            let captures = LIST_TAG.captures(tag).ok_or_else(unknown)?;
            return Ok(ResponseType::List(captures[1].to_string()));
        }
        if tag.starts_with("tuple[") {
            let captures = TUPLE_TAG.captures(tag).ok_or_else(unknown)?;
            return Ok(ResponseType::Tuple(captures[1].to_string()));
        }
        Ok(ResponseType::Single(tag.to_string()))
    }

    pub fn model_name(&self) -> &str {
        match self {
            ResponseType::Single(name) | ResponseType::List(name) | ResponseType::Tuple(name) => name,
        }
    }

    pub fn tag(&self) -> String {
        match self {
            ResponseType::Single(name) => name.clone(),
            ResponseType::List(name) => format!("list[{}]", name),
            ResponseType::Tuple(name) => format!("tuple[{}, ...]", name),
        }
    }
}

/// A value that can be stored as a tagged cache entry
pub trait ApiPayload: Sized {
    fn to_entry(&self) -> Result<CacheEntry>;

    fn from_entry(entry: CacheEntry, registry: &ModelRegistry) -> Result<Self>;
}

fn shape_mismatch(expected: &str, found: &str) -> CacheError {
    CacheError::ShapeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn kind_of(tag: &ResponseType) -> &'static str {
    match tag {
        ResponseType::Single(_) => "single",
        ResponseType::List(_) => "list",
        ResponseType::Tuple(_) => "tuple",
    }
}

/// Check that `name` is registered and is the model `T`
fn resolve<T: ApiModel>(registry: &ModelRegistry, name: &str) -> Result<()> {
    if !registry.contains(name) {
        return Err(CacheError::UnknownModel(name.to_string()).into());
    }
    if name != T::TYPE_NAME {
        return Err(CacheError::TypeMismatch {
            expected: T::TYPE_NAME.to_string(),
            found: name.to_string(),
        }
        .into());
    }
    Ok(())
}

fn into_mapping(value: Value) -> Result<Mapping> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(shape_mismatch("object", json_kind(&other)).into()),
    }
}

fn into_mappings(value: Value) -> Result<Vec<Mapping>> {
    match value {
        Value::Array(items) => items.into_iter().map(into_mapping).collect(),
        other => Err(shape_mismatch("array", json_kind(&other)).into()),
    }
}

fn encode_single<T: ApiModel>(value: &T) -> Result<CacheEntry> {
    Ok(CacheEntry {
        response_type: T::TYPE_NAME.to_string(),
        data: Value::Object(ApiModel::to_mapping(value)?),
    })
}

fn decode_single<T: ApiModel>(entry: CacheEntry, registry: &ModelRegistry) -> Result<T> {
    let tag = ResponseType::parse(&entry.response_type)?;
    let ResponseType::Single(name) = &tag else {
        return Err(shape_mismatch("single", kind_of(&tag)).into());
    };
    resolve::<T>(registry, name)?;
    T::from_mapping(into_mapping(entry.data)?)
}

/// Encode a non-empty sequence of `T` under the given tag
fn encode_sequence<T: ApiModel>(items: &[T], tag: fn(String) -> ResponseType) -> Result<CacheEntry> {
    // The element type comes from the first element, so an empty sequence
    // has nothing to name.
    if items.is_empty() {
        return Err(CacheError::EmptySequence.into());
    }
    let data = items
        .iter()
        .map(|item| ApiModel::to_mapping(item).map(Value::Object))
        .collect::<Result<Vec<_>>>()?;
    Ok(CacheEntry {
        response_type: tag(T::TYPE_NAME.to_string()).tag(),
        data: Value::Array(data),
    })
}

fn decode_sequence<T: ApiModel>(
    entry: CacheEntry,
    registry: &ModelRegistry,
    expected: &'static str,
) -> Result<Vec<T>> {
    let tag = ResponseType::parse(&entry.response_type)?;
    let name = match (&tag, expected) {
        (ResponseType::List(name), "list") | (ResponseType::Tuple(name), "tuple") => name,
        _ => return Err(shape_mismatch(expected, kind_of(&tag)).into()),
    };
    resolve::<T>(registry, name)?;
    into_mappings(entry.data)?
        .into_iter()
        .map(T::from_mapping)
        .collect()
}

impl<T: ApiModel> ApiPayload for Vec<T> {
    fn to_entry(&self) -> Result<CacheEntry> {
        encode_sequence(self, ResponseType::List)
    }

    fn from_entry(entry: CacheEntry, registry: &ModelRegistry) -> Result<Self> {
        decode_sequence(entry, registry, "list")
    }
}

impl<T: ApiModel, const N: usize> ApiPayload for [T; N] {
    fn to_entry(&self) -> Result<CacheEntry> {
        encode_sequence(self.as_slice(), ResponseType::Tuple)
    }

    fn from_entry(entry: CacheEntry, registry: &ModelRegistry) -> Result<Self> {
        let items: Vec<T> = decode_sequence(entry, registry, "tuple")?;
        let found = items.len();
        items
            .try_into()
            .map_err(|_| CacheError::ArityMismatch { expected: N, found }.into())
    }
}

macro_rules! single_payload {
    ($($model:ty),+ $(,)?) => {
        $(
            impl ApiPayload for $model {
                fn to_entry(&self) -> Result<CacheEntry> {
                    encode_single(self)
                }

                fn from_entry(entry: CacheEntry, registry: &ModelRegistry) -> Result<Self> {
                    decode_single(entry, registry)
                }
            }
        )+
    };
}

single_payload!(Post, PaginatedPostList, Token, AuthTokenRequest, User);

/// Entry rebuilt without knowing the Rust type up front
#[derive(Debug)]
pub enum DecodedPayload {
    Single(Box<dyn DynModel>),
    List(Vec<Box<dyn DynModel>>),
    Tuple(Vec<Box<dyn DynModel>>),
}

impl DecodedPayload {
    /// Number of model objects in the payload
    pub fn len(&self) -> usize {
        match self {
            DecodedPayload::Single(_) => 1,
            DecodedPayload::List(items) | DecodedPayload::Tuple(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serializer/deserializer pair for API results, backed by a model registry
#[derive(Debug, Clone)]
pub struct OpenApiCodec {
    registry: Arc<ModelRegistry>,
}

impl OpenApiCodec {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Codec over every model of the blog API
    pub fn blog() -> Self {
        Self::new(ModelRegistry::blog())
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn serialize<T: ApiPayload>(&self, value: &T) -> Result<CacheEntry> {
        value.to_entry()
    }

    pub fn deserialize<T: ApiPayload>(&self, entry: CacheEntry) -> Result<T> {
        T::from_entry(entry, &self.registry)
    }

    /// Rebuild any registered model, whatever its type
    pub fn decode_dynamic(&self, entry: CacheEntry) -> Result<DecodedPayload> {
        let tag = ResponseType::parse(&entry.response_type)?;
        let name = tag.model_name();

        if let ResponseType::Single(_) = tag {
            let model = self.registry.decode(name, into_mapping(entry.data)?)?;
            return Ok(DecodedPayload::Single(model));
        }

        if !self.registry.contains(name) {
            return Err(CacheError::UnknownModel(name.to_string()).into());
        }
        let items = into_mappings(entry.data)?
            .into_iter()
            .map(|mapping| self.registry.decode(name, mapping))
            .collect::<Result<Vec<_>>>()?;

        match tag {
            ResponseType::List(_) => Ok(DecodedPayload::List(items)),
            _ => Ok(DecodedPayload::Tuple(items)),
        }
    }
}

impl<T: ApiPayload> CacheCodec<T> for OpenApiCodec {
    fn serialize(&self, value: &T) -> Result<Value> {
        Ok(serde_json::to_value(value.to_entry()?)?)
    }

    fn deserialize(&self, data: Value) -> Result<T> {
        let entry: CacheEntry = serde_json::from_value(data)?;
        T::from_entry(entry, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsuite_common::Error;
    use serde_json::json;

    fn post(id: i64, title: Option<&str>) -> Post {
        Post {
            id: Some(id),
            title: title.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_entry_layout() {
        let codec = OpenApiCodec::blog();
        let original = post(1, Some("A"));

        let stored = CacheCodec::<Post>::serialize(&codec, &original).unwrap();
        assert_eq!(stored, json!({"response_type": "Post", "data": {"id": 1, "title": "A"}}));

        let restored: Post = CacheCodec::deserialize(&codec, stored).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_list_entry_layout() {
        let codec = OpenApiCodec::blog();
        let posts = vec![post(1, None), post(2, None)];

        let entry = codec.serialize(&posts).unwrap();
        assert_eq!(entry.response_type, "list[Post]");
        assert_eq!(entry.data, json!([{"id": 1}, {"id": 2}]));

        let restored: Vec<Post> = codec.deserialize(entry).unwrap();
        assert_eq!(restored, posts);
    }

    #[test]
    fn test_tuple_entry_layout() {
        let codec = OpenApiCodec::blog();
        let pair = [post(1, Some("first")), post(2, Some("second"))];

        let entry = codec.serialize(&pair).unwrap();
        assert_eq!(entry.response_type, "tuple[Post, ...]");

        let restored: [Post; 2] = codec.deserialize(entry).unwrap();
        assert_eq!(restored, pair);
    }

    #[test]
    fn test_list_tag_keeps_given_elements() {
        let codec = OpenApiCodec::blog();
        let entry = CacheEntry {
            response_type: "list[Post]".to_string(),
            data: json!([{"id": 3, "title": "c"}, {"id": 1}, {"id": 2}]),
        };
        let restored: Vec<Post> = codec.deserialize(entry).unwrap();
        assert_eq!(
            restored.iter().map(|p| p.id.unwrap()).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );
        assert_eq!(restored[0].title(), "c");
    }

    #[test]
    fn test_malformed_tags_are_fatal() {
        assert_eq!(
            ResponseType::parse("list[Post"),
            Err(CacheError::UnknownResponseType("list[Post".to_string()))
        );
        assert!(ResponseType::parse("tuple[Post]").is_err());
        assert!(ResponseType::parse("tuple[Post, ...").is_err());

        let codec = OpenApiCodec::blog();
        let entry = CacheEntry {
            response_type: "list[Post".to_string(),
            data: json!([{"id": 1}]),
        };
        let err = codec.deserialize::<Vec<Post>>(entry).unwrap_err();
        assert!(matches!(err, Error::Cache(CacheError::UnknownResponseType(_))));
    }

    #[test]
    fn test_tag_parsing() {
        assert_eq!(ResponseType::parse("Post").unwrap(), ResponseType::Single("Post".into()));
        assert_eq!(ResponseType::parse("list[Post]").unwrap(), ResponseType::List("Post".into()));
        assert_eq!(
            ResponseType::parse("tuple[User, ...]").unwrap(),
            ResponseType::Tuple("User".into())
        );
        for tag in ["Post", "list[Post]", "tuple[Post, ...]"] {
            assert_eq!(ResponseType::parse(tag).unwrap().tag(), tag);
        }
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let codec = OpenApiCodec::blog();
        let err = codec.serialize(&Vec::<Post>::new()).unwrap_err();
        assert!(matches!(err, Error::Cache(CacheError::EmptySequence)));

        let err = codec.serialize::<[Post; 0]>(&[]).unwrap_err();
        assert!(matches!(err, Error::Cache(CacheError::EmptySequence)));
    }

    #[test]
    fn test_unknown_and_mismatched_models() {
        let codec = OpenApiCodec::blog();

        let unknown = CacheEntry {
            response_type: "Comment".to_string(),
            data: json!({"id": 1}),
        };
        let err = codec.deserialize::<Post>(unknown).unwrap_err();
        assert!(matches!(err, Error::Cache(CacheError::UnknownModel(_))));

        let other = CacheEntry {
            response_type: "Token".to_string(),
            data: json!({"token": "abc"}),
        };
        let err = codec.deserialize::<Post>(other).unwrap_err();
        assert!(matches!(err, Error::Cache(CacheError::TypeMismatch { .. })));
    }

    #[test]
    fn test_shape_and_arity_mismatch() {
        let codec = OpenApiCodec::blog();

        let list_as_single = CacheEntry {
            response_type: "list[Post]".to_string(),
            data: json!([{"id": 1}]),
        };
        assert!(codec.deserialize::<Post>(list_as_single).is_err());

        let wrong_data = CacheEntry {
            response_type: "list[Post]".to_string(),
            data: json!({"id": 1}),
        };
        let err = codec.deserialize::<Vec<Post>>(wrong_data).unwrap_err();
        assert!(matches!(
            err,
            Error::Cache(CacheError::ShapeMismatch { expected, found })
                if expected == "array" && found == "object"
        ));

        let triple = CacheEntry {
            response_type: "tuple[Post, ...]".to_string(),
            data: json!([{"id": 1}, {"id": 2}, {"id": 3}]),
        };
        let err = codec.deserialize::<[Post; 2]>(triple).unwrap_err();
        assert!(matches!(
            err,
            Error::Cache(CacheError::ArityMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_decode_dynamic() {
        let codec = OpenApiCodec::blog();
        let entry = codec.serialize(&vec![post(1, None), post(2, None)]).unwrap();

        let decoded = codec.decode_dynamic(entry).unwrap();
        assert!(matches!(decoded, DecodedPayload::List(_)));
        assert_eq!(decoded.len(), 2);

        let single = codec
            .decode_dynamic(CacheEntry {
                response_type: "Token".to_string(),
                data: json!({"token": "abc"}),
            })
            .unwrap();
        let DecodedPayload::Single(model) = single else {
            panic!("expected single payload");
        };
        assert_eq!(model.type_name(), "Token");
    }
}

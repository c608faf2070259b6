//! Document model, principals and access scopes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use semdoc_embeddings::EncodedEmbedding;

use crate::error::{Result, StoreError};

/// Identifier assigned by the repository.
pub type DocumentId = u64;

/// Bucket shared by every anonymous caller.
pub const ANONYMOUS_BUCKET: &str = "anonymous";

/// Maximum number of top-level metadata keys.
pub const MAX_METADATA_KEYS: usize = 32;

/// Maximum length of a metadata key, in characters.
pub const MAX_METADATA_KEY_CHARS: usize = 64;

/// Maximum serialized metadata size, in bytes.
pub const MAX_METADATA_BYTES: usize = 4096;

/// Maximum nesting depth of metadata values.
pub const MAX_METADATA_DEPTH: usize = 4;

/// The identity a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// An authenticated user.
    User(String),
    /// No credentials supplied.
    Anonymous,
}

impl Principal {
    /// Build a principal from an optional user id.
    pub fn from_user_id(user_id: Option<&str>) -> Self {
        match user_id {
            Some(id) if !id.is_empty() => Self::User(id.to_string()),
            _ => Self::Anonymous,
        }
    }

    /// The user id, if authenticated.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id.as_str()),
            Self::Anonymous => None,
        }
    }

    /// Key used for rate limiting.
    pub fn bucket(&self) -> &str {
        self.user_id().unwrap_or(ANONYMOUS_BUCKET)
    }

    /// Whether this principal is the given author.
    pub fn owns(&self, author_id: Option<&str>) -> bool {
        matches!((self.user_id(), author_id), (Some(me), Some(author)) if me == author)
    }
}

/// Uploader-supplied metadata: a bounded, string-keyed JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentMetadata(BTreeMap<String, serde_json::Value>);

impl DocumentMetadata {
    /// Validate an arbitrary JSON value as metadata.
    ///
    /// `null` means no metadata. Anything other than an object is rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let map = match value {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(StoreError::Validation(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        };

        if map.len() > MAX_METADATA_KEYS {
            return Err(StoreError::Validation(format!(
                "metadata has {} keys, max {MAX_METADATA_KEYS}",
                map.len()
            )));
        }

        for (key, value) in &map {
            let key_chars = key.chars().count();
            if key_chars == 0 || key_chars > MAX_METADATA_KEY_CHARS {
                return Err(StoreError::Validation(format!(
                    "metadata keys must be 1..={MAX_METADATA_KEY_CHARS} characters"
                )));
            }
            if depth(value) > MAX_METADATA_DEPTH {
                return Err(StoreError::Validation(format!(
                    "metadata value for `{key}` is nested deeper than {MAX_METADATA_DEPTH}"
                )));
            }
        }

        let size = serde_json::to_vec(&map)
            .map_err(|e| StoreError::Validation(format!("metadata is not serializable: {e}")))?
            .len();
        if size > MAX_METADATA_BYTES {
            return Err(StoreError::Validation(format!(
                "metadata is {size} bytes, max {MAX_METADATA_BYTES}"
            )));
        }

        Ok(Self(map.into_iter().collect()))
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrite every value, keeping the keys.
    pub fn map_values(self, f: impl Fn(serde_json::Value) -> serde_json::Value) -> Self {
        Self(self.0.into_iter().map(|(key, value)| (key, f(value))).collect())
    }

    /// Metadata as a JSON object.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone().into_iter().collect())
    }
}

fn depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        serde_json::Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// A validated document waiting for an id.
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Sanitized content.
    pub content: String,

    /// Validated embedding in persisted form.
    pub embedding: EncodedEmbedding,

    /// Uploader metadata.
    pub metadata: DocumentMetadata,

    /// Visibility flag.
    pub is_private: bool,

    /// Owner, if the uploader was authenticated.
    pub author_id: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl NewDocument {
    /// Attach the repository-assigned id.
    pub fn into_stored(self, id: DocumentId) -> StoredDocument {
        StoredDocument {
            id,
            content: self.content,
            embedding: self.embedding,
            metadata: self.metadata,
            is_private: self.is_private,
            author_id: self.author_id,
            created_at: self.created_at,
        }
    }
}

/// A persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Unique, monotonically assigned id.
    pub id: DocumentId,

    /// Sanitized content.
    pub content: String,

    /// Embedding in packed binary form.
    pub embedding: EncodedEmbedding,

    /// Uploader metadata.
    #[serde(default)]
    pub metadata: DocumentMetadata,

    /// Visibility flag.
    pub is_private: bool,

    /// Owner; `None` for anonymous uploads.
    pub author_id: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl StoredDocument {
    /// Whether the principal may read this document.
    pub fn is_visible_to(&self, principal: &Principal) -> bool {
        !self.is_private || principal.owns(self.author_id.as_deref())
    }

    /// Display label for the author.
    pub fn author_label(&self) -> &str {
        self.author_id.as_deref().unwrap_or("Anonymous")
    }
}

/// Which documents a listing covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    /// Only documents owned by this user.
    pub owner: Option<String>,

    /// Apply visibility rules for this principal.
    pub requester: Option<Principal>,

    /// Whether the requester's own private documents are included.
    pub include_private: bool,
}

impl DocumentFilter {
    /// Everything, unscoped. Only for administrative paths.
    pub fn all() -> Self {
        Self::default()
    }

    /// Documents the principal may see: public ones, plus its own private
    /// ones when `include_private` is set.
    pub fn visible_to(principal: &Principal, include_private: bool) -> Self {
        Self {
            owner: None,
            requester: Some(principal.clone()),
            include_private,
        }
    }

    /// The principal's own documents.
    pub fn owned_by(principal: &Principal, include_private: bool) -> Self {
        Self {
            owner: Some(principal.user_id().unwrap_or_default().to_string()),
            requester: Some(principal.clone()),
            include_private,
        }
    }

    /// Whether a document passes the filter.
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        if let Some(owner) = &self.owner
            && doc.author_id.as_deref() != Some(owner.as_str())
        {
            return false;
        }

        match &self.requester {
            None => true,
            Some(requester) => {
                !doc.is_private
                    || (self.include_private && requester.owns(doc.author_id.as_deref()))
            }
        }
    }
}

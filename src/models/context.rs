//! Retrieved supporting passages attached to an answer.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a field, treating `null` or a value of the wrong shape as
/// `T::default()`. One odd field must not discard the whole context batch.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize an optional identifier sent either as a string or a number.
/// Anything else reads as absent.
fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(id) => Some(id),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

/// Metadata describing where a retrieved passage came from.
///
/// `relevance_score` is reported by the retriever separately from the
/// top-level [`ContextItem::score`]; both are stored and neither overrides the
/// other. Keys the client does not model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub document_name: Option<String>,
    #[serde(default, alias = "page", deserialize_with = "lenient")]
    pub document_page_no: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub division: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub document_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub source_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub chunk_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub document_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub processed_by: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub extraction_method: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub relevance_score: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One retrieved passage supporting an answer.
///
/// Has no identity beyond its position inside the batch it arrived in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    #[serde(default, deserialize_with = "lenient")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: ContextMetadata,
}

impl ContextItem {
    /// Create a passage with empty metadata.
    pub fn new(content: impl Into<String>, score: f64) -> Self {
        Self {
            content: content.into(),
            score,
            metadata: ContextMetadata::default(),
        }
    }

    /// Set the document name and page.
    pub fn with_document(mut self, name: impl Into<String>, page: u32) -> Self {
        self.metadata.document_name = Some(name.into());
        self.metadata.document_page_no = Some(page);
        self
    }

    /// Document name for display, falling back to a placeholder.
    pub fn document_label(&self) -> String {
        let name = self
            .metadata
            .document_name
            .as_deref()
            .unwrap_or("Unknown document");
        match self.metadata.document_page_no {
            Some(page) => format!("{} (p. {})", name, page),
            None => name.to_string(),
        }
    }
}

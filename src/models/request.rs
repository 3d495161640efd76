use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Optional filters narrowing the retrieval. Empty lists are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub division: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub department: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_name: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_id: Vec<String>,
}

impl GenerationFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_division(mut self, division: impl Into<String>) -> Self {
        self.division.push(division.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department.push(department.into());
        self
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name.push(name.into());
        self
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id.push(id.into());
        self
    }

    /// True when no filter is active.
    pub fn is_empty(&self) -> bool {
        self.division.is_empty()
            && self.department.is_empty()
            && self.document_name.is_empty()
            && self.document_id.is_empty()
    }
}

/// Body POSTed to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's question
    pub query: String,
    /// Minimum retrieval score, 0..=1
    pub min_score: f64,
    /// Number of passages to retrieve, 1..=20
    pub num_chunks: u32,
    /// Sampling temperature, 0..=1
    pub temperature: f64,
    /// Retrieval type, `"all"` unless a caller narrows it
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub filters: GenerationFilters,
}

impl GenerationRequest {
    pub const DEFAULT_MIN_SCORE: f64 = 0.3;
    pub const DEFAULT_NUM_CHUNKS: u32 = 5;
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    pub const DEFAULT_KIND: &'static str = "all";
    pub const MAX_NUM_CHUNKS: u32 = 20;

    /// Create a request with default generation parameters and no filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            min_score: Self::DEFAULT_MIN_SCORE,
            num_chunks: Self::DEFAULT_NUM_CHUNKS,
            temperature: Self::DEFAULT_TEMPERATURE,
            kind: Self::DEFAULT_KIND.to_string(),
            filters: GenerationFilters::default(),
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_num_chunks(mut self, num_chunks: u32) -> Self {
        self.num_chunks = num_chunks;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_filters(mut self, filters: GenerationFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Check the ranges the backend accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.trim().is_empty() {
            return Err(ConfigError::InvalidRequest("query must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::InvalidRequest(format!(
                "min_score must be within 0..=1, got {}",
                self.min_score
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidRequest(format!(
                "temperature must be within 0..=1, got {}",
                self.temperature
            )));
        }
        if !(1..=Self::MAX_NUM_CHUNKS).contains(&self.num_chunks) {
            return Err(ConfigError::InvalidRequest(format!(
                "num_chunks must be within 1..={}, got {}",
                Self::MAX_NUM_CHUNKS,
                self.num_chunks
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_wire_schema() {
        let request = GenerationRequest::new("pipeline safety")
            .with_filters(GenerationFilters::new().with_division("Upstream"));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["query"], "pipeline safety");
        assert_eq!(json["min_score"], 0.3);
        assert_eq!(json["num_chunks"], 5);
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["type"], "all");
        assert_eq!(json["filters"], serde_json::json!({"division": ["Upstream"]}));
    }

    #[test]
    fn test_empty_filters_serialize_as_empty_object() {
        let json = serde_json::to_value(GenerationRequest::new("q")).unwrap();
        assert_eq!(json["filters"], serde_json::json!({}));
        assert!(GenerationFilters::new().is_empty());
        assert!(!GenerationFilters::new().with_document_id("7").is_empty());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(GenerationRequest::new("q").validate().is_ok());
        assert!(GenerationRequest::new("   ").validate().is_err());
        assert!(GenerationRequest::new("q").with_min_score(1.5).validate().is_err());
        assert!(GenerationRequest::new("q")
            .with_temperature(-0.1)
            .validate()
            .is_err());
        assert!(GenerationRequest::new("q").with_num_chunks(0).validate().is_err());
        assert!(GenerationRequest::new("q").with_num_chunks(21).validate().is_err());
        assert!(GenerationRequest::new("q").with_num_chunks(20).validate().is_ok());
    }
}

//! Search request representation and normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One query in a batch: either a legacy bare string or an id-carrying
/// object. `query_id` is opaque to this crate; callers send numbers or
/// strings and get the same value echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryDescriptor {
    /// Legacy format: the query text alone.
    Text(String),
    /// Structured format with an optional opaque identifier.
    Tagged {
        query: String,
        #[serde(default)]
        query_id: Option<Value>,
    },
}

impl QueryDescriptor {
    /// Returns the query text.
    pub fn query(&self) -> &str {
        match self {
            Self::Text(q) => q,
            Self::Tagged { query, .. } => query,
        }
    }

    /// Returns the opaque query identifier, if one was given.
    pub fn query_id(&self) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Tagged { query_id, .. } => query_id.as_ref(),
        }
    }
}

/// Search type selector. Unrecognized or missing selectors fall back to
/// `Image`, which keeps the default behavior statically visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Image,
    Web,
    News,
}

impl SearchType {
    /// Parses a selector string, case-insensitive, accepting the synonyms
    /// the callers use. Anything unrecognized maps to `Image`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("image") | Some("img") | Some("images") => Self::Image,
            Some("web") | Some("website") => Self::Web,
            Some("news") | Some("article") | Some("articles") => Self::News,
            _ => Self::Image,
        }
    }

    /// Canonical name, used in envelope titles.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Web => "web",
            Self::News => "news",
        }
    }

    /// The envelope key the result array is placed under.
    pub fn result_key(&self) -> &'static str {
        match self {
            Self::Image => "image_results",
            Self::Web => "web_results",
            Self::News => "news_results",
        }
    }

    /// The extraction payload file for this search type.
    pub fn script_name(&self) -> &'static str {
        match self {
            Self::Image => "img_scripts.js",
            Self::Web => "web_scripts.js",
            Self::News => "news_scripts.js",
        }
    }
}

/// A batch search request as received over HTTP or a serverless event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Ordered query descriptors.
    #[serde(default)]
    pub queries: Vec<QueryDescriptor>,
    /// Country code.
    #[serde(default = "default_cc")]
    pub cc: String,
    /// Opaque batch identifier, echoed back in every envelope.
    #[serde(default)]
    pub batch_id: Option<Value>,
    /// Search type selector (see [`SearchType::parse`]).
    #[serde(default)]
    pub search_type: Option<String>,
    /// Freshness filter, only meaningful for news searches.
    #[serde(default)]
    pub qft: Option<String>,
}

fn default_cc() -> String {
    "US".to_string()
}

impl SearchRequest {
    /// Creates a request for a single bare query with defaults.
    pub fn single(query: impl Into<String>) -> Self {
        Self {
            queries: vec![QueryDescriptor::Text(query.into())],
            cc: default_cc(),
            batch_id: None,
            search_type: None,
            qft: None,
        }
    }

    /// Resolves the search type selector.
    pub fn search_type(&self) -> SearchType {
        SearchType::parse(self.search_type.as_deref())
    }
}

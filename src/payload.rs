//! Extraction payload loading and invocation.
//!
//! The in-page extraction logic lives in three standalone JavaScript files
//! selected by filename convention (`img_scripts.js`, `web_scripts.js`,
//! `news_scripts.js`). Each exposes an async `fetchSearches` function that
//! resolves to an array of per-query results; the appended invocation bridge
//! stores the first element in the `window.fetchResults` slot the controller
//! polls from outside the page context.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::request::SearchType;
use crate::{Result, SerpError};

/// Name of the page-global result slot. Part of the payload contract.
pub const RESULT_SLOT: &str = "window.fetchResults";

/// JavaScript that clears the result slot before a query runs.
pub fn clear_slot_script() -> String {
    format!("{} = null;", RESULT_SLOT)
}

/// JavaScript that reads the result slot.
pub fn read_slot_script() -> String {
    RESULT_SLOT.to_string()
}

/// A loaded extraction payload.
#[derive(Debug, Clone)]
pub struct ExtractionPayload {
    kind: SearchType,
    source: String,
}

impl ExtractionPayload {
    /// Loads the payload for `kind` from `dir`, falling back to the image
    /// payload when the mapped file is missing. A missing fallback is a
    /// configuration error.
    pub fn load(dir: &Path, kind: SearchType) -> Result<Self> {
        let path = dir.join(kind.script_name());
        match std::fs::read_to_string(&path) {
            Ok(source) => {
                debug!("Loaded extraction payload: {}", path.display());
                Ok(Self { kind, source })
            }
            Err(e) => {
                warn!("Payload {} unavailable ({}), falling back", path.display(), e);
                let fallback = dir.join(SearchType::Image.script_name());
                let source = std::fs::read_to_string(&fallback).map_err(|e| {
                    SerpError::Payload(format!(
                        "fallback payload {} unavailable: {}",
                        fallback.display(),
                        e
                    ))
                })?;
                debug!("Loaded fallback payload: {}", fallback.display());
                Ok(Self { kind, source })
            }
        }
    }

    /// Builds a payload from in-memory source. Used by tests and embedders
    /// that manage script files themselves.
    pub fn from_source(kind: SearchType, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    /// The search type this payload was selected for.
    pub fn kind(&self) -> SearchType {
        self.kind
    }

    /// The payload source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The payload source plus the invocation bridge for one query. News
    /// searches pass the freshness filter as a third argument (empty string
    /// when unset); other types pass query and country code only.
    pub fn invocation(&self, query: &str, cc: &str, qft: Option<&str>) -> String {
        // JSON string literals are valid JS string literals, which keeps
        // quoting and escaping out of hand-built code.
        let query_lit = serde_json::Value::String(query.to_string()).to_string();
        let cc_lit = serde_json::Value::String(cc.to_string()).to_string();

        let call = match self.kind {
            SearchType::News => {
                let qft_lit =
                    serde_json::Value::String(qft.unwrap_or_default().to_string()).to_string();
                format!("fetchSearches([{query_lit}], {cc_lit}, {qft_lit})")
            }
            _ => format!("fetchSearches([{query_lit}], {cc_lit})"),
        };

        // `void` keeps the script's completion value off the promise, so the
        // evaluation returns immediately and the slot is observed by polling.
        format!(
            "{}\nvoid {call}.then(results => {{\n    {RESULT_SLOT} = results[0];\n}});",
            self.source
        )
    }
}

/// Resolves the payload file path for a search type without loading it.
pub fn script_path(dir: &Path, kind: SearchType) -> PathBuf {
    dir.join(kind.script_name())
}

//! Agent-facing search tool.
//!
//! Wraps [`DocumentStore::search`] behind a name, a description and a JSON
//! Schema so an agent loop can call it with model-produced arguments. The
//! tool always answers with text; failures become an error line rather than
//! a Rust error.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::document::Principal;
use crate::search::{MAX_TOP_K, MIN_TOP_K};
use crate::service::{DocumentStore, SearchHit, SearchRequest};

const INVALID_ARGUMENTS: &str = "Error in document search: invalid arguments";

/// Name the tool is registered under.
pub const TOOL_NAME: &str = "document_search";

const TOOL_DESCRIPTION: &str = "Search for relevant documents using secure vector embeddings \
     with access control and content filtering.";

const DEFAULT_TOP_K: i64 = 5;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    include_private: bool,
    #[serde(default = "default_top_k")]
    top_k: i64,
}

fn default_top_k() -> i64 {
    DEFAULT_TOP_K
}

/// The `document_search` tool.
#[derive(Clone)]
pub struct DocumentSearchTool {
    store: Arc<DocumentStore>,
}

impl DocumentSearchTool {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    pub fn name(&self) -> &'static str {
        TOOL_NAME
    }

    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    /// JSON Schema of the accepted arguments.
    pub fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The query to search for relevant documents"
                },
                "include_private": {
                    "type": "boolean",
                    "description": "Include private documents in search (only user's own)",
                    "default": false
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of top results to return (max 20)",
                    "default": DEFAULT_TOP_K,
                    "minimum": MIN_TOP_K,
                    "maximum": MAX_TOP_K
                }
            },
            "required": ["query"]
        })
    }

    /// Run a search on behalf of `principal` and format the results.
    pub async fn run(&self, args: serde_json::Value, principal: &Principal) -> String {
        let args: SearchArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(e) => {
                warn!("Rejected {TOOL_NAME} arguments from {}: {e}", principal.bucket());
                return INVALID_ARGUMENTS.to_string();
            }
        };

        let top_k = usize::try_from(args.top_k.clamp(MIN_TOP_K as i64, MAX_TOP_K as i64))
            .unwrap_or(MIN_TOP_K);
        let request = SearchRequest::new(args.query)
            .with_top_k(top_k)
            .including_private(args.include_private);

        match self.store.search(request, principal).await {
            Ok(hits) => {
                debug!("{TOOL_NAME} returned {} hits", hits.len());
                format_hits(&hits)
            }
            Err(e) => format!("Error in document search: {e}"),
        }
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No documents found matching the query.".to_string();
    }

    let mut out = format!("Found {} relevant documents:\n\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. **{}** ({})",
            i + 1,
            hit.author,
            hit.created_at.to_rfc3339()
        );
        let _ = writeln!(out, "   Similarity: {:.3}", hit.similarity);
        let _ = writeln!(out, "   Preview: {}", hit.preview);
        if hit.is_private {
            out.push_str("   [Private Document]\n");
        }
        out.push('\n');
    }
    out
}

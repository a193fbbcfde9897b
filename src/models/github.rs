use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub struct TreeResponse {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub url: String,
}

/// Per-blob content response. `content` arrives in the declared transport
/// encoding (base64 with embedded newlines for this endpoint).
#[derive(Debug, Deserialize)]
pub struct BlobContent {
    pub content: String,
    pub encoding: String,
}

/// Decoded source file selected by the materializer.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

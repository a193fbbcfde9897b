use crate::errors::ScanError;
use crate::models::github::{BlobContent, Repository, SourceFile, TreeEntry, TreeResponse};
use crate::utils::patterns::{classify_priority, has_supported_extension, is_excluded_path, Priority};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const MAX_HIGH_PRIORITY_FILES: usize = 12;
pub const MAX_MEDIUM_PRIORITY_FILES: usize = 6;
pub const MAX_REGULAR_PRIORITY_FILES: usize = 2;
pub const MAX_SELECTED_FILES: usize = 20;

/// Oversized files are dropped rather than truncated so partial code never
/// distorts the severity signal.
pub const MAX_FILE_CHARS: usize = 100_000;

/// Bounds total request latency together with the 20-file cap; an
/// unresponsive hosting API must not stall the scan indefinitely.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    static ref GITHUB_URL_REGEX: Regex = Regex::new(r"github\.com/([\w.-]+)/([\w.-]+)").unwrap();
}

pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::build("https://api.github.com", token)
    }

    #[cfg(test)]
    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self> {
        Self::build(base_url, token)
    }

    fn build(base_url: &str, token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("vuln-triage"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(t) = token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", t))?);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn parse_repo_url(url: &str) -> Result<(String, String)> {
        let caps = GITHUB_URL_REGEX
            .captures(url)
            .ok_or_else(|| anyhow!("Invalid GitHub URL format"))?;

        let owner = caps
            .get(1)
            .ok_or_else(|| anyhow!("Could not extract owner"))?
            .as_str()
            .to_string();

        let repo = caps
            .get(2)
            .ok_or_else(|| anyhow!("Could not extract repo"))?
            .as_str()
            .trim_end_matches(".git")
            .to_string();

        Ok((owner, repo))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, stage: &str) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("GitHub {} request failed: {}", stage, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("GitHub API error {} during {} fetch: {}", status, stage, error_text);
            return Err(anyhow!("GitHub API error during {} fetch: {}", stage, status));
        }

        Ok(response.json::<T>().await?)
    }

    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, repo);
        self.get_json(&url, "metadata").await
    }

    pub async fn get_tree(&self, owner: &str, repo: &str, branch: &str) -> Result<TreeResponse> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.base_url, owner, repo, branch
        );
        self.get_json(&url, "tree").await
    }

    async fn get_blob(&self, url: &str) -> Result<BlobContent> {
        self.get_json(url, "file").await
    }

    /// The materializer: resolve the default branch, list the tree, select a
    /// bounded prioritized subset and fetch its contents sequentially.
    pub async fn collect_source_files(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<SourceFile>, ScanError> {
        info!("Materializing {}/{}", owner, repo);

        let repository = self.get_repository(owner, repo).await.map_err(|e| {
            ScanError::materialization("failed to fetch repository metadata", e.to_string())
        })?;

        let tree = self
            .get_tree(owner, repo, &repository.default_branch)
            .await
            .map_err(|e| {
                ScanError::materialization("failed to fetch repository tree", e.to_string())
            })?;

        if tree.truncated {
            warn!(
                "File tree for {} is truncated; selection covers the returned entries only",
                repository.full_name
            );
        }

        let selected = select_candidates(&tree.tree);
        info!(
            "Selected {} of {} tree entries for {}",
            selected.len(),
            tree.tree.len(),
            repository.full_name
        );

        let mut files = Vec::new();
        for entry in selected {
            let blob = match self.get_blob(&entry.url).await {
                Ok(blob) => blob,
                Err(e) => {
                    warn!("Skipping {}: fetch failed: {}", entry.path, e);
                    continue;
                }
            };

            let content = match decode_blob(&blob) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path, e);
                    continue;
                }
            };

            if content.chars().count() > MAX_FILE_CHARS {
                warn!(
                    "Skipping {}: decoded content exceeds {} characters",
                    entry.path, MAX_FILE_CHARS
                );
                continue;
            }

            files.push(SourceFile {
                path: entry.path,
                content,
            });
        }

        if files.is_empty() {
            return Err(ScanError::materialization(
                "no supported code files found",
                format!("{} yielded no analyzable source files", repository.full_name),
            ));
        }

        Ok(files)
    }
}

/// Exclusion filter, extension gate, tier partition and the 12/6/2 caps.
/// Tree order is preserved within each tier.
pub fn select_candidates(entries: &[TreeEntry]) -> Vec<TreeEntry> {
    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut regular = Vec::new();

    for entry in entries {
        if entry.entry_type != "blob" {
            continue;
        }
        if is_excluded_path(&entry.path) {
            continue;
        }
        if !has_supported_extension(&entry.path) {
            continue;
        }

        match classify_priority(&entry.path) {
            Priority::High => high.push(entry.clone()),
            Priority::Medium => medium.push(entry.clone()),
            Priority::Regular => regular.push(entry.clone()),
        }
    }

    let mut selected: Vec<TreeEntry> = Vec::new();
    selected.extend(high.into_iter().take(MAX_HIGH_PRIORITY_FILES));
    selected.extend(medium.into_iter().take(MAX_MEDIUM_PRIORITY_FILES));
    selected.extend(regular.into_iter().take(MAX_REGULAR_PRIORITY_FILES));
    selected.truncate(MAX_SELECTED_FILES);
    selected
}

fn decode_blob(blob: &BlobContent) -> Result<String> {
    if blob.encoding != "base64" {
        // The contents API only documents base64, but use anything else
        // verbatim rather than dropping the file.
        return Ok(blob.content.clone());
    }

    let cleaned = blob.content.replace('\n', "").replace('\r', "");
    let decoded = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| anyhow!("base64 decode failed: {}", e))?;

    Ok(String::from_utf8_lossy(&decoded).into_owned())
}

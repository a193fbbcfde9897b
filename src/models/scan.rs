use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw submission payload. Deserialized leniently (missing fields become
/// empty strings) so the validator owns every rejection message instead of
/// serde.
#[derive(Debug, Deserialize, Clone)]
pub struct ScanRequest {
    #[serde(rename = "type", default)]
    pub scan_type: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Severity {
    Critical,
    High,
    Low,
}

/// One candidate vulnerability. Only ever constructed by the normalizer or
/// the synthetic constructor below, so every instance respects the field
/// bounds (line >= 1, issue <= 250 chars, fix_suggestion <= 400 chars).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Finding {
    pub file: String,
    pub line: usize,
    pub severity: Severity,
    pub issue: String,
    pub fix_suggestion: String,
}

impl Finding {
    /// Locally generated placeholder reporting a pipeline degradation
    /// in-band instead of failing the request.
    pub fn synthetic(issue: &str, fix_suggestion: &str) -> Self {
        Finding {
            file: "scanner".to_string(),
            line: 1,
            severity: Severity::Low,
            issue: issue.to_string(),
            fix_suggestion: fix_suggestion.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub low: usize,
}

impl ScanSummary {
    /// Pure aggregate over the findings list. The severity enum is closed,
    /// so critical + high + low always equals total.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = ScanSummary {
            total: findings.len(),
            ..Default::default()
        };
        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }
}

/// Response envelope for a completed scan.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub success: bool,
    pub report_id: String,
    pub findings: Vec<Finding>,
    pub summary: ScanSummary,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    Completed,
    Failed,
}

/// Persisted row in the scan history. `Failed` marks a scan whose analysis
/// degraded to a synthetic finding; the HTTP response is 200 either way.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScanRecord {
    pub id: String,
    pub repo_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: ScanStatus,
    pub summary: ScanSummary,
    pub findings: Vec<Finding>,
}

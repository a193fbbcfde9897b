use crate::errors::ScanError;
use crate::models::github::SourceFile;
use crate::models::scan::{
    Finding, ScanRecord, ScanReport, ScanRequest, ScanStatus, ScanSummary,
};
use crate::services::analyzer::AnalysisClient;
use crate::services::github::GitHubClient;
use crate::services::history::HistoryStore;
use crate::utils::validate::validate_scan_request;
use actix_web::{web, HttpResponse, Result as ActixResult};
use chrono::Utc;
use log::{error, info};
use std::sync::Arc;
use uuid::Uuid;

/// Sentinel repository identifier for snippet scans in the history store.
pub const SNIPPET_REPO_NAME: &str = "snippet";

pub struct AppState {
    pub github_client: GitHubClient,
    pub analyzer: AnalysisClient,
    pub history: Arc<HistoryStore>,
}

pub async fn handle_scan(body: web::Bytes, data: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let request: ScanRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to parse scan request: {}", e);
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid request body"
            })));
        }
    };

    match process_scan(&request, &data).await {
        Ok(report) => Ok(HttpResponse::Ok().json(report)),
        Err(ScanError::Validation(message)) => {
            Ok(HttpResponse::BadRequest().json(serde_json::json!({ "error": message })))
        }
        Err(ScanError::Materialization { message, details }) => {
            Ok(HttpResponse::UnprocessableEntity().json(serde_json::json!({
                "error": message,
                "details": details
            })))
        }
        Err(ScanError::Internal(e)) => {
            error!("Unhandled scan failure: {:#}", e);
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error",
                "message": e.to_string()
            })))
        }
    }
}

async fn process_scan(
    request: &ScanRequest,
    data: &web::Data<AppState>,
) -> Result<ScanReport, ScanError> {
    validate_scan_request(request)?;

    let (repo_name, source_text) = if request.scan_type == "repo" {
        let (owner, repo) = GitHubClient::parse_repo_url(&request.content)?;
        let files = data.github_client.collect_source_files(&owner, &repo).await?;
        (format!("{}/{}", owner, repo), assemble_source(&files))
    } else {
        (SNIPPET_REPO_NAME.to_string(), request.content.clone())
    };

    info!("Analyzing {} ({} chars)", repo_name, source_text.len());

    // Detection failure degrades the report, never the response.
    let (findings, status) = match data.analyzer.analyze(&source_text).await {
        Ok(findings) => (findings, ScanStatus::Completed),
        Err(e) => {
            error!("Analysis failed for {}: {:#}", repo_name, e);
            let fallback = Finding::synthetic(
                "Analysis failed: the completion service was unavailable",
                "Retry the scan once the completion service is reachable",
            );
            (vec![fallback], ScanStatus::Failed)
        }
    };

    let summary = ScanSummary::from_findings(&findings);
    let report_id = Uuid::new_v4().to_string();

    let record = ScanRecord {
        id: report_id.clone(),
        repo_name,
        timestamp: Utc::now(),
        status,
        summary: summary.clone(),
        findings: findings.clone(),
    };

    // Fire-and-forget: the report is already final, a persistence failure is
    // logged and swallowed.
    let history = data.history.clone();
    tokio::spawn(async move {
        if let Err(e) = history.append(record).await {
            error!("Failed to persist scan record: {:#}", e);
        }
    });

    Ok(ScanReport {
        success: true,
        report_id,
        findings,
        summary,
    })
}

pub async fn list_scan_history(data: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let scans = data.history.list().await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "scans": scans })))
}

fn assemble_source(files: &[SourceFile]) -> String {
    files
        .iter()
        .map(|file| format!("--- FILE: {} ---\n{}", file.path, file.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use base64::{engine::general_purpose, Engine as _};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn temp_history_path() -> String {
        std::env::temp_dir()
            .join(format!("scan-history-{}.json", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    fn build_state(
        github_url: &str,
        completion_url: &str,
        api_key: Option<&str>,
    ) -> web::Data<AppState> {
        web::Data::new(AppState {
            github_client: GitHubClient::with_base_url(github_url, None).unwrap(),
            analyzer: AnalysisClient::with_base_url(
                completion_url,
                api_key.map(str::to_string),
                "gemini-2.0-flash".to_string(),
            ),
            history: Arc::new(HistoryStore::new(&temp_history_path()).unwrap()),
        })
    }

    async fn request(
        state: &web::Data<AppState>,
        body: Value,
    ) -> (u16, Value) {
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/api/scan", web::post().to(handle_scan))
                .route("/api/history", web::get().to(list_scan_history)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/scan")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status().as_u16();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    fn completion_body(text: &str) -> String {
        json!({
            "candidates": [
                {"content": {"parts": [{"text": text}]}}
            ]
        })
        .to_string()
    }

    #[actix_web::test]
    async fn rejects_unknown_scan_type() {
        let state = build_state("http://127.0.0.1:1", "http://127.0.0.1:1", None);
        let (status, body) = request(&state, json!({"type": "commit", "content": "x"})).await;

        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("invalid type"));
    }

    #[actix_web::test]
    async fn rejects_short_and_oversized_snippets() {
        let state = build_state("http://127.0.0.1:1", "http://127.0.0.1:1", None);

        let (status, body) = request(&state, json!({"type": "snippet", "content": "short"})).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("too short"));

        let oversized = "a".repeat(50_001);
        let (status, body) =
            request(&state, json!({"type": "snippet", "content": oversized})).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("too large"));
    }

    #[actix_web::test]
    async fn rejects_malformed_repo_reference() {
        let state = build_state("http://127.0.0.1:1", "http://127.0.0.1:1", None);
        let (status, body) =
            request(&state, json!({"type": "repo", "content": "not a github url"})).await;

        assert_eq!(status, 400);
        assert_eq!(body["error"], "invalid repository URL format");
    }

    #[actix_web::test]
    async fn snippet_scan_end_to_end() {
        let mut completion = mockito::Server::new_async().await;
        let _mock = completion
            .mock("POST", "/models/gemini-2.0-flash:generateContent")
            .with_status(200)
            .with_body(completion_body(
                "[{\"file\":\"snippet\",\"line\":1,\"severity\":\"Critical\",\"issue\":\"Code injection via eval\",\"fix_suggestion\":\"Avoid eval; use safe parsing\"}]",
            ))
            .create_async()
            .await;

        let state = build_state("http://127.0.0.1:1", &completion.url(), Some("key"));
        let (status, body) = request(
            &state,
            json!({"type": "snippet", "content": "eval(req.body.code)"}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert!(!body["report_id"].as_str().unwrap().is_empty());
        assert_eq!(body["summary"]["total"], 1);
        assert_eq!(body["summary"]["critical"], 1);
        assert_eq!(body["summary"]["high"], 0);
        assert_eq!(body["summary"]["low"], 0);
        assert_eq!(body["findings"][0]["severity"], "Critical");

        // The recorder runs off the response path; give it a beat, then the
        // history surface must show the scan under the snippet sentinel.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/api/history", web::get().to(list_scan_history)),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/history").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
        let history: Value = test::read_body_json(resp).await;
        assert_eq!(history["scans"][0]["repo_name"], SNIPPET_REPO_NAME);
        assert_eq!(history["scans"][0]["status"], "Completed");
    }

    #[actix_web::test]
    async fn completion_failure_still_returns_a_report() {
        let mut completion = mockito::Server::new_async().await;
        let _mock = completion
            .mock("POST", "/models/gemini-2.0-flash:generateContent")
            .with_status(503)
            .with_body("{\"error\": \"overloaded\"}")
            .create_async()
            .await;

        let state = build_state("http://127.0.0.1:1", &completion.url(), Some("key"));
        let (status, body) = request(
            &state,
            json!({"type": "snippet", "content": "eval(req.body.code)"}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["summary"]["total"], 1);
        assert_eq!(body["summary"]["low"], 1);
        assert_eq!(body["findings"][0]["severity"], "Low");
        assert!(body["findings"][0]["issue"]
            .as_str()
            .unwrap()
            .contains("Analysis failed"));
    }

    #[actix_web::test]
    async fn repo_without_code_files_returns_422() {
        let mut github = mockito::Server::new_async().await;
        let _meta = github
            .mock("GET", "/repos/acme/art")
            .with_status(200)
            .with_body(json!({"full_name": "acme/art", "default_branch": "main"}).to_string())
            .create_async()
            .await;
        let _tree = github
            .mock("GET", "/repos/acme/art/git/trees/main?recursive=1")
            .with_status(200)
            .with_body(
                json!({
                    "tree": [
                        {"path": "logo.png", "type": "blob", "url": ""},
                        {"path": "README.md", "type": "blob", "url": ""}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let state = build_state(&github.url(), "http://127.0.0.1:1", Some("key"));
        let (status, body) = request(
            &state,
            json!({"type": "repo", "content": "https://github.com/acme/art"}),
        )
        .await;

        assert_eq!(status, 422);
        assert_eq!(body["error"], "no supported code files found");
        assert!(body["details"].as_str().is_some());
    }

    #[actix_web::test]
    async fn repo_scan_assembles_files_for_analysis() {
        let mut github = mockito::Server::new_async().await;
        let blob_url = format!("{}/blobs/auth", github.url());
        let source = "function login(user, pass) { return db.query(`SELECT * FROM users WHERE name='${user}'`); }";

        let _meta = github
            .mock("GET", "/repos/acme/shop")
            .with_status(200)
            .with_body(json!({"full_name": "acme/shop", "default_branch": "main"}).to_string())
            .create_async()
            .await;
        let _tree = github
            .mock("GET", "/repos/acme/shop/git/trees/main?recursive=1")
            .with_status(200)
            .with_body(
                json!({
                    "tree": [
                        {"path": "src/auth/login.js", "type": "blob", "url": blob_url}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _blob = github
            .mock("GET", "/blobs/auth")
            .with_status(200)
            .with_body(
                json!({
                    "content": general_purpose::STANDARD.encode(source.as_bytes()),
                    "encoding": "base64"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut completion = mockito::Server::new_async().await;
        let _mock = completion
            .mock("POST", "/models/gemini-2.0-flash:generateContent")
            .with_status(200)
            .with_body(completion_body(
                "[{\"file\":\"src/auth/login.js\",\"line\":1,\"severity\":\"Critical\",\"issue\":\"SQL injection\",\"fix_suggestion\":\"Use parameterized queries\"}]",
            ))
            .create_async()
            .await;

        let state = build_state(&github.url(), &completion.url(), Some("key"));
        let (status, body) = request(
            &state,
            json!({"type": "repo", "content": "https://github.com/acme/shop"}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["summary"]["critical"], 1);
        assert_eq!(body["findings"][0]["file"], "src/auth/login.js");
    }

    #[::core::prelude::v1::test]
    fn assemble_source_delimits_files_by_path() {
        let files = vec![
            SourceFile {
                path: "src/a.js".to_string(),
                content: "let a = 1;".to_string(),
            },
            SourceFile {
                path: "src/b.js".to_string(),
                content: "let b = 2;".to_string(),
            },
        ];
        let assembled = assemble_source(&files);
        assert_eq!(
            assembled,
            "--- FILE: src/a.js ---\nlet a = 1;\n--- FILE: src/b.js ---\nlet b = 2;"
        );
    }
}

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use log::{info, warn};
use std::env;
use std::sync::Arc;

mod errors;
mod handlers;
mod models;
mod services;
mod utils;

use handlers::scan::{handle_scan, list_scan_history, AppState};
use services::analyzer::AnalysisClient;
use services::github::GitHubClient;
use services::history::HistoryStore;

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "vuln-triage"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let github_token = env::var("GITHUB_TOKEN").ok();
    let gemini_api_key = env::var("GEMINI_API_KEY").ok();
    let gemini_model = env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
    let history_file =
        env::var("SCAN_HISTORY_FILE").unwrap_or_else(|_| "scan_history.json".to_string());

    if gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; scans will report a configuration finding instead of analysis results");
    }

    let github_client = GitHubClient::new(github_token).expect("Failed to create GitHub client");
    let analyzer = AnalysisClient::new(gemini_api_key, gemini_model);
    let history =
        Arc::new(HistoryStore::new(&history_file).expect("Failed to open scan history store"));

    let app_state = web::Data::new(AppState {
        github_client,
        analyzer,
        history,
    });

    let bind_addr = format!("{}:{}", host, port);
    info!("Starting server on {}", bind_addr);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .route("/health", web::get().to(health_check))
            .route("/api/scan", web::post().to(handle_scan))
            .route("/api/history", web::get().to(list_scan_history))
    })
    .bind(&bind_addr)?
    .run()
    .await
}

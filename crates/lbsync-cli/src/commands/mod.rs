//! CLI commands implementation

use anyhow::{Context, Result};
use lbsync_core::{CommittedConfig, FrontendDeclaration, FrontendEntry};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// API client for communicating with the daemon
pub struct ApiClient {
    base_url: String,
    user: String,
    password: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, user: &str, password: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorized(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorized(self.client.post(self.url(path)))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.user, self.password.as_deref())
    }
}

/// Status response from API
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub polling: bool,
    pub cycles: u64,
    pub skipped: u64,
    pub commits: u64,
    pub failures: u64,
    pub fingerprint: Option<String>,
}

/// Read and validate a declaration file before it is sent
pub fn read_declarations(path: &Path) -> Result<Vec<FrontendDeclaration>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a list of frontend declarations", path.display()))
}

/// Replace the frontend declarations
pub async fn push(client: &ApiClient, file: &Path) -> Result<()> {
    let declarations = read_declarations(file)?;
    debug!(frontends = declarations.len(), "Pushing declarations");

    let response = client
        .post("/api/v1/frontends")
        .json(&declarations)
        .send()
        .await?;

    if response.status().is_success() {
        let entries: Vec<FrontendEntry> = response.json().await?;
        let resolved = entries.iter().filter(|e| e.is_resolved()).count();
        println!(
            "Configuration committed: {} frontends, {} resolved",
            entries.len(),
            resolved
        );
        print_entries(&declarations, &entries);
    } else {
        let error = response.text().await?;
        eprintln!("Failed to replace declarations: {}", error);
    }

    Ok(())
}

/// Show the committed frontends
pub async fn frontends(client: &ApiClient) -> Result<()> {
    let response = client.get("/api/v1/frontends").send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        println!("No configuration committed yet");
    } else if response.status().is_success() {
        let committed: CommittedConfig = response.json().await?;
        println!("Fingerprint: {}", committed.fingerprint());
        println!("Committed:   {}", committed.committed_at.to_rfc3339());
        println!();

        if committed.entries().is_empty() {
            println!("No frontends declared");
        }
        for (index, entry) in committed.entries().iter().enumerate() {
            match entry.as_resolved() {
                Some(frontend) => {
                    println!("[{}] {}", index, frontend.domain);
                    for server in &frontend.servers {
                        println!("      {} {}:{}", server.id, server.host, server.port);
                    }
                }
                None => println!("[{}] (unresolved)", index),
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to get frontends: {}", error);
    }

    Ok(())
}

/// Show the stored declarations
pub async fn declarations(client: &ApiClient) -> Result<()> {
    let response = client.get("/api/v1/declarations").send().await?;

    if response.status().is_success() {
        let declarations: Vec<FrontendDeclaration> = response.json().await?;

        if declarations.is_empty() {
            println!("No frontends declared");
        } else {
            println!("{:<30} {:<20} {:<8}", "DOMAIN", "SERVICE", "PORT");
            println!("{}", "-".repeat(60));
            for d in declarations {
                println!(
                    "{:<30} {:<20} {:<8}",
                    d.frontend.domain, d.service.id, d.service.port
                );
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to get declarations: {}", error);
    }

    Ok(())
}

/// Show reconciler status
pub async fn status(client: &ApiClient) -> Result<()> {
    let response = client.get("/api/v1/status").send().await?;

    if response.status().is_success() {
        let status: StatusResponse = response.json().await?;

        println!("lbsync v{}", status.version);
        println!();
        println!("Polling: {}", if status.polling { "yes" } else { "stopped" });
        println!(
            "Cycles: {} ({} skipped, {} failed)",
            status.cycles, status.skipped, status.failures
        );
        println!("Commits: {}", status.commits);
        println!(
            "Fingerprint: {}",
            status.fingerprint.as_deref().unwrap_or("-")
        );
    } else {
        let error = response.text().await?;
        eprintln!("Failed to get status: {}", error);
    }

    Ok(())
}

fn print_entries(declarations: &[FrontendDeclaration], entries: &[FrontendEntry]) {
    for (declaration, entry) in declarations.iter().zip(entries) {
        let servers = entry.as_resolved().map_or(0, |f| f.servers.len());
        println!(
            "  {:<30} {}:{} -> {} servers",
            declaration.frontend.domain, declaration.service.id, declaration.service.port, servers
        );
    }
}

//! Repository-listing providers used by discover jobs.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Credential, RemoteRepository};

/// Lists the repositories a credential can see on one hosting service.
pub trait RepositoryProvider: Send + Sync {
    /// Registry key; matches `user_identities.provider`.
    fn name(&self) -> &str;

    fn fetch_repositories(&self, credential: &Credential) -> Result<Vec<RemoteRepository>>;
}

/// Providers by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn RepositoryProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(GitHubProvider::new()));
        registry
    }

    pub fn register(&self, provider: Arc<dyn RepositoryProvider>) {
        let mut map = self.providers.write().unwrap_or_else(|e| e.into_inner());
        map.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn RepositoryProvider>> {
        let map = self.providers.read().unwrap_or_else(|e| e.into_inner());
        map.get(name)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("provider {name} not registered")))
    }
}

// ---- GitHub ----

const GITHUB_API: &str = "https://api.github.com";
const GITHUB_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    #[serde(default)]
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
}

impl From<GitHubRepo> for RemoteRepository {
    fn from(r: GitHubRepo) -> Self {
        RemoteRepository {
            url: r.html_url,
            full_name: if r.full_name.is_empty() {
                r.name.clone()
            } else {
                r.full_name
            },
            name: r.name,
            description: r.description.filter(|d| !d.is_empty()),
            default_branch: r.default_branch.unwrap_or_else(|| "main".to_string()),
            is_private: r.private,
            pushed_at: r.pushed_at.map(|t| t.timestamp()),
        }
    }
}

/// `GET /user/repos`, most recently pushed first, paged until a short page.
pub struct GitHubProvider {
    agent: ureq::Agent,
    api_base: String,
}

impl Default for GitHubProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubProvider {
    pub fn new() -> Self {
        Self::with_api_base(GITHUB_API)
    }

    /// Point at a different API root (GitHub Enterprise).
    pub fn with_api_base(api_base: &str) -> Self {
        let agent = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .new_agent();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn fetch_page(&self, token: &str, page: usize) -> Result<Vec<GitHubRepo>> {
        let url = format!(
            "{}/user/repos?per_page={}&page={}&sort=pushed&direction=desc",
            self.api_base, GITHUB_PER_PAGE, page
        );
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", env!("CARGO_PKG_NAME"))
            .call()
            .map_err(|e| Error::Provider(format!("github: {e}")))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(Error::Provider(format!("github api returned status {status}")));
        }
        response
            .body_mut()
            .read_json::<Vec<GitHubRepo>>()
            .map_err(|e| Error::Provider(format!("github: decode repositories: {e}")))
    }
}

impl RepositoryProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn fetch_repositories(&self, credential: &Credential) -> Result<Vec<RemoteRepository>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.fetch_page(&credential.access_token, page)?;
            let n = batch.len();
            all.extend(batch.into_iter().map(RemoteRepository::from));
            debug!("github: page {} returned {} repositories", page, n);
            if n < GITHUB_PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(all)
    }
}

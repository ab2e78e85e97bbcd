use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::instrument;

use crate::policy::RepoLocator;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Source of branch tip commits.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// The newest commit reachable from `branch`.
    async fn latest_commit(&self, repo: &RepoLocator, branch: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::builder().token(token).build()
    }

    pub fn builder() -> GitHubClientBuilder {
        GitHubClientBuilder::default()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn commits_url(&self, repo: &RepoLocator, branch: &str) -> Result<Url> {
        let base = format!(
            "{}/repos/{}/{}/commits",
            self.api_base.trim_end_matches('/'),
            repo.owner,
            repo.name
        );
        Url::parse_with_params(&base, &[("sha", branch), ("per_page", "1")])
            .with_context(|| format!("invalid commits URL {base}"))
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn api_get(&self, url: Url) -> Result<Value> {
        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let remaining = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok());
            if remaining == Some("0") || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                bail!("{url} returned HTTP {status}: GitHub API rate limit exceeded");
            }
        }
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to parse JSON from {url}"))
    }
}

#[async_trait]
impl CommitSource for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn latest_commit(&self, repo: &RepoLocator, branch: &str) -> Result<String> {
        let url = self.commits_url(repo, branch)?;
        let json = self.api_get(url).await?;
        extract_latest_sha(&json)
            .with_context(|| format!("no commits listed for branch '{branch}' of {repo}"))
    }
}

/// The commit list is newest-first; only the head matters.
fn extract_latest_sha(commits: &Value) -> Result<String> {
    let list = commits
        .as_array()
        .context("expected a JSON array of commits")?;
    let first = list.first().context("commit list is empty")?;
    let sha = first
        .get("sha")
        .and_then(|v| v.as_str())
        .context("missing 'sha' in commit")?;
    Ok(sha.to_string())
}

pub struct GitHubClientBuilder {
    token: Option<String>,
    api_base: String,
    timeout: Duration,
}

impl Default for GitHubClientBuilder {
    fn default() -> Self {
        Self {
            token: None,
            api_base: GITHUB_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GitHubClientBuilder {
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<GitHubClient> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("staleguard/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(GitHubClient {
            client,
            token: self.token,
            api_base: self.api_base,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepoLocator {
        "owner/repo".parse().unwrap()
    }

    fn client_for(server: &MockServer, token: Option<&str>) -> GitHubClient {
        GitHubClient::builder()
            .token(token.map(String::from))
            .api_base(server.uri())
            .build()
            .unwrap()
    }

    #[test]
    fn has_token_returns_true_when_set() {
        let client = GitHubClient::new(Some("tok".into())).unwrap();
        assert!(client.has_token());
    }

    #[test]
    fn has_token_returns_false_when_none() {
        let client = GitHubClient::new(None).unwrap();
        assert!(!client.has_token());
        assert_eq!(client.api_base(), GITHUB_API_BASE);
    }

    #[test]
    fn commits_url_encodes_branch_query() {
        let client = GitHubClient::builder()
            .api_base("https://ghe.example.com/api/v3/")
            .build()
            .unwrap();
        let url = client.commits_url(&repo(), "feature/a b").unwrap();
        assert_eq!(url.path(), "/api/v3/repos/owner/repo/commits");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("sha".to_string(), "feature/a b".to_string()),
                ("per_page".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn extract_takes_first_commit() {
        let body = json!([
            {"sha": "newest", "commit": {"message": "tip"}},
            {"sha": "older"}
        ]);
        assert_eq!(extract_latest_sha(&body).unwrap(), "newest");
    }

    #[test]
    fn extract_rejects_empty_list() {
        let err = extract_latest_sha(&json!([])).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn extract_rejects_non_array() {
        let err = extract_latest_sha(&json!({"message": "Not Found"})).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[tokio::test]
    async fn latest_commit_queries_branch_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/commits"))
            .and(query_param("sha", "main"))
            .and(query_param("per_page", "1"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sha": "abc123"}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let sha = client.latest_commit(&repo(), "main").await.unwrap();
        assert_eq!(sha, "abc123");
    }

    #[tokio::test]
    async fn latest_commit_unknown_branch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/commits"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "No commit found for SHA: nope"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.latest_commit(&repo(), "nope").await.unwrap_err();
        assert!(format!("{err:#}").contains("404"), "got: {err:#}");
    }

    #[tokio::test]
    async fn latest_commit_reports_rate_limiting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/commits"))
            .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.latest_commit(&repo(), "main").await.unwrap_err();
        assert!(format!("{err:#}").contains("rate limit"), "got: {err:#}");
    }

    #[tokio::test]
    async fn latest_commit_empty_branch_history_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.latest_commit(&repo(), "main").await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("no commits listed for branch 'main'"), "got: {msg}");
    }
}

//! GitHub REST implementation of [`RepositoryPublisher`]

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use pagesmith_config::Config;
use pagesmith_utils::redaction::redact_error_message;

use crate::{CreatedRepository, FileSet, PublishReceipt, PublisherError, RepositoryPublisher};

const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const WEB_BASE_URL: &str = "https://github.com";

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// Publisher backed by the GitHub REST API.
///
/// Repositories are created under the authenticated user and addressed as
/// `{owner}/{name}`.
#[derive(Clone)]
pub struct GitHubPublisher {
    client: Client,
    api_base_url: String,
    owner: String,
    token: String,
    private: bool,
}

impl GitHubPublisher {
    /// # Errors
    ///
    /// Returns `PublisherError::Misconfiguration` for an empty owner or token,
    /// or when the HTTP client cannot be built.
    pub fn new(
        api_base_url: &str,
        owner: impl Into<String>,
        token: impl Into<String>,
        private: bool,
    ) -> Result<Self, PublisherError> {
        let owner = owner.into();
        let token = token.into();
        if owner.trim().is_empty() {
            return Err(PublisherError::Misconfiguration(
                "GitHub owner is empty".to_string(),
            ));
        }
        if token.trim().is_empty() {
            return Err(PublisherError::Misconfiguration(
                "GitHub token is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("pagesmith/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                PublisherError::Misconfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            owner,
            token,
            private,
        })
    }

    /// Build the publisher from `[github]` configuration and resolved secrets.
    ///
    /// # Errors
    ///
    /// Returns `PublisherError::Misconfiguration` if the username or token is unset.
    pub fn from_config(config: &Config) -> Result<Self, PublisherError> {
        let owner = config
            .github
            .username
            .clone()
            .ok_or_else(|| PublisherError::Misconfiguration("github.username is not set".to_string()))?;
        let token = config.secrets.github_token.clone().ok_or_else(|| {
            PublisherError::Misconfiguration(format!(
                "GitHub token not found in environment variable '{}'",
                config.github.token_env
            ))
        })?;

        Self::new(&config.github.api_base_url, owner, token, config.github.private)
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base_url))
            .bearer_auth(&self.token)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn repo_path(&self, name: &str) -> String {
        format!("/repos/{}/{name}", self.owner)
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> Result<Response, PublisherError> {
        builder.send().await.map_err(|e| {
            PublisherError::Transport(format!(
                "{operation}: {}",
                redact_error_message(&e.to_string())
            ))
        })
    }

    /// Whether `branch` has any commits. A missing ref means an empty repository.
    async fn branch_exists(&self, name: &str, branch: &str) -> Result<bool, PublisherError> {
        let operation = format!("Look up branch '{branch}'");
        let path = format!("{}/git/ref/heads/{branch}", self.repo_path(name));
        let response = self.send(self.request(Method::GET, &path), &operation).await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            // 409 is returned for a repository with no commits at all
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Ok(false),
            _ => Err(api_error(operation, response).await),
        }
    }

    /// Version token of an existing file, or `None` when the path is new.
    async fn file_sha(
        &self,
        name: &str,
        file_path: &str,
        branch: &str,
    ) -> Result<Option<String>, PublisherError> {
        let operation = format!("Read {file_path}");
        let path = format!("{}/contents/{file_path}?ref={branch}", self.repo_path(name));
        let response = self.send(self.request(Method::GET, &path), &operation).await?;

        match response.status() {
            StatusCode::OK => {
                let body: ContentMetadata = response.json().await.map_err(|e| {
                    PublisherError::Transport(format!("{operation}: invalid response: {e}"))
                })?;
                Ok(Some(body.sha))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(api_error(operation, response).await),
        }
    }

    /// Create or update one file; returns the resulting commit sha.
    async fn put_file(
        &self,
        name: &str,
        file_path: &str,
        content: &str,
        message: &str,
        branch: &str,
        sha: Option<String>,
    ) -> Result<String, PublisherError> {
        let operation = format!("Write {file_path}");
        let body = PutContent {
            message,
            content: BASE64.encode(content.as_bytes()),
            branch,
            sha,
        };
        let path = format!("{}/contents/{file_path}", self.repo_path(name));
        let response = self
            .send(self.request(Method::PUT, &path).json(&body), &operation)
            .await?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
            return Err(api_error(operation, response).await);
        }

        let body: PutContentResponse = response
            .json()
            .await
            .map_err(|e| PublisherError::Transport(format!("{operation}: invalid response: {e}")))?;
        Ok(body.commit.sha)
    }
}

#[async_trait]
impl RepositoryPublisher for GitHubPublisher {
    async fn exists(&self, name: &str) -> Result<bool, PublisherError> {
        let operation = format!("Check repository '{name}'");
        let response = self
            .send(self.request(Method::GET, &self.repo_path(name)), &operation)
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(api_error(operation, response).await),
        }
    }

    async fn create(
        &self,
        name: &str,
        description: &str,
    ) -> Result<CreatedRepository, PublisherError> {
        info!(repo = name, owner = %self.owner, "Creating repository");
        let operation = format!("Create repository '{name}'");
        let body = json!({
            "name": name,
            "description": description,
            "private": self.private,
            "auto_init": false,
            "has_issues": true,
            "has_projects": false,
            "has_wiki": false,
        });

        let response = self
            .send(self.request(Method::POST, "/user/repos").json(&body), &operation)
            .await?;

        let status = response.status();
        if status == StatusCode::CREATED {
            let created: CreateRepoResponse = response.json().await.map_err(|e| {
                PublisherError::Transport(format!("{operation}: invalid response: {e}"))
            })?;
            info!(repo = name, url = %created.html_url, "Repository created");
            return Ok(CreatedRepository {
                repo_url: created.html_url,
                clone_url: created.clone_url,
                full_name: created.full_name,
            });
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::UNPROCESSABLE_ENTITY
            && text.to_lowercase().contains("name already exists")
        {
            return Err(PublisherError::NameTaken {
                name: name.to_string(),
            });
        }

        Err(PublisherError::Api {
            operation,
            status: status.as_u16(),
            body: trim_body(&text),
        })
    }

    async fn publish(
        &self,
        name: &str,
        files: &FileSet,
        message: &str,
        branch: &str,
    ) -> Result<PublishReceipt, PublisherError> {
        let populated = self.branch_exists(name, branch).await?;
        info!(
            repo = name,
            branch,
            files = files.len(),
            empty_repo = !populated,
            "Publishing files"
        );

        let mut commit_ref = String::new();
        let mut files_published = Vec::with_capacity(files.len());

        for (index, (path, content)) in files.iter().enumerate() {
            let (sha, file_message) = if !populated && index == 0 {
                // Initialises the branch; nothing to look up yet
                (None, message.to_string())
            } else {
                let sha = self.file_sha(name, path, branch).await?;
                (sha, format!("{message} - {path}"))
            };

            debug!(repo = name, path, update = sha.is_some(), "Writing file");
            commit_ref = self
                .put_file(name, path, content, &file_message, branch, sha)
                .await?;
            files_published.push(path.to_string());
        }

        info!(repo = name, commit = %commit_ref, "Files published");
        Ok(PublishReceipt {
            commit_ref,
            files_published,
        })
    }

    async fn enable_hosting(&self, name: &str, branch: &str) -> Result<String, PublisherError> {
        let operation = format!("Enable Pages for '{name}'");
        let body = json!({ "source": { "branch": branch, "path": "/" } });
        let path = format!("{}/pages", self.repo_path(name));
        let response = self
            .send(self.request(Method::POST, &path).json(&body), &operation)
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                info!(repo = name, "GitHub Pages enabled");
                Ok(self.hosting_url(name))
            }
            StatusCode::CONFLICT => {
                debug!(repo = name, "GitHub Pages already enabled");
                Ok(self.hosting_url(name))
            }
            status => {
                warn!(repo = name, status = status.as_u16(), "GitHub Pages activation rejected");
                Err(api_error(operation, response).await)
            }
        }
    }

    fn repo_url(&self, name: &str) -> String {
        format!("{WEB_BASE_URL}/{}/{name}", self.owner)
    }

    fn hosting_url(&self, name: &str) -> String {
        format!("https://{}.github.io/{name}/", self.owner.to_lowercase())
    }
}

async fn api_error(operation: String, response: Response) -> PublisherError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    PublisherError::Api {
        operation,
        status,
        body: trim_body(&text),
    }
}

fn trim_body(text: &str) -> String {
    let trimmed: String = text.trim().chars().take(MAX_ERROR_BODY).collect();
    redact_error_message(&trimmed)
}

#[derive(Serialize)]
struct PutContent<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct PutContentResponse {
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Deserialize)]
struct ContentMetadata {
    sha: String,
}

#[derive(Deserialize)]
struct CreateRepoResponse {
    html_url: String,
    clone_url: String,
    full_name: String,
}

//! GitHub REST adapter for [`RepositoryProvider`].
//!
//! Organization listing uses `GET /orgs/{org}/repos`; a further page exists
//! while the `Link` response header carries `rel="next"`. Archives come from
//! `GET /repos/{owner}/{repo}/zipball/{ref}`, which answers with a redirect
//! to a short-lived signed URL. The redirect is read rather than followed so
//! the token is never sent to the download host.

use async_trait::async_trait;
use org_mirror_core::config::Credential;
use org_mirror_core::contract::{BoxError, ProviderRepository, RepositoryPage, RepositoryProvider};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, LOCATION, USER_AGENT};
use reqwest::{redirect, Client, Response};
use tracing::{debug, error};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_USER_AGENT: &str = concat!("org-mirror/", env!("CARGO_PKG_VERSION"));

pub struct GitHubClient {
    api: Client,
    downloads: Client,
    base_url: String,
}

impl GitHubClient {
    /// `token` may be absent; requests are then anonymous. The orchestrators
    /// refuse to run without one, so in practice it is always set.
    pub fn new(base_url: &str, token: Option<&Credential>) -> Result<Self, BoxError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(USER_AGENT, HeaderValue::from_static(GITHUB_USER_AGENT));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let api = Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .build()?;
        let downloads = Client::builder().user_agent(GITHUB_USER_AGENT).build()?;

        Ok(Self {
            api,
            downloads,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RepositoryProvider for GitHubClient {
    async fn list_org_repositories(
        &self,
        organization: &str,
        per_page: u32,
        page: u32,
    ) -> Result<RepositoryPage, BoxError> {
        let url = format!("{}/orgs/{}/repos", self.base_url, organization);
        debug!(url = %url, per_page, page, "[GITHUB] Listing repositories");
        let response = self
            .api
            .get(&url)
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await?;
        let response = ensure_success(response, &url).await?;

        let has_next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .is_some_and(has_next_link);
        let repositories: Vec<ProviderRepository> = response.json().await?;
        Ok(RepositoryPage {
            repositories,
            has_next,
        })
    }

    async fn download_archive(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, BoxError> {
        let url = format!("{}/repos/{}/{}/zipball/{}", self.base_url, owner, repo, git_ref);
        debug!(url = %url, "[GITHUB] Resolving archive link");
        let response = self.api.get(&url).send().await?;

        let response = if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or("archive redirect carried no Location header")?
                .to_string();
            debug!(repository = %format!("{owner}/{repo}"), "[GITHUB] Downloading archive");
            let download = self.downloads.get(&location).send().await?;
            ensure_success(download, &url).await?
        } else {
            ensure_success(response, &url).await?
        };

        Ok(response.bytes().await?.to_vec())
    }
}

async fn ensure_success(response: Response, url: &str) -> Result<Response, BoxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(url, %status, body = %body, "[GITHUB] Request failed");
    Err(format!("GitHub request {url} returned {status}: {body}").into())
}

/// Whether a `Link` header advertises a next page.
pub fn has_next_link(link: &str) -> bool {
    link.split(',').any(|part| {
        part.split(';')
            .skip(1)
            .any(|param| param.trim().replace(' ', "") == r#"rel="next""#)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_link_is_detected() {
        let link = r#"<https://api.github.com/organizations/1/repos?per_page=100&page=2>; rel="next", <https://api.github.com/organizations/1/repos?per_page=100&page=4>; rel="last""#;
        assert!(has_next_link(link));
    }

    #[test]
    fn last_page_has_no_next_link() {
        let link = r#"<https://api.github.com/organizations/1/repos?page=1>; rel="first", <https://api.github.com/organizations/1/repos?page=3>; rel="prev""#;
        assert!(!has_next_link(link));
        assert!(!has_next_link(""));
    }

    #[test]
    fn client_builds_without_token() {
        assert!(GitHubClient::new("https://api.github.com/", None).is_ok());
    }
}

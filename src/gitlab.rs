//! Finding projects on a GitLab instance.

use failure::{Error, ResultExt};
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use sec::Secret;
use serde_derive::Deserialize;

use crate::config::GitLabConfig;
use crate::errors::{FailedRequest, InvalidBaseUrl};

/// How many projects to ask for in each request.
pub const PER_PAGE: u32 = 100;

/// The subset of a GitLab project we care about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Project {
    pub path_with_namespace: String,
    pub ssh_url_to_repo: String,
    pub http_url_to_repo: String,
    pub web_url: String,
    #[serde(default)]
    pub forked_from_project: Option<ForkParent>,
    #[serde(default)]
    pub archived: bool,
}

/// The project a fork was created from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForkParent {
    pub path_with_namespace: String,
}

/// A single page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub projects: Vec<Project>,
    /// The next page to request, `None` once we've reached the end.
    pub next_page: Option<u32>,
}

/// Something which can list GitLab projects one page at a time.
pub trait ProjectLister {
    /// List the projects in a group, where `group` is either its numeric ID
    /// or its full path.
    fn list_group_projects(&self, group: &str, page: u32)
        -> Result<Page, Error>;

    /// List every project the current user can see. If `archived` is set,
    /// only return projects with that archived status.
    fn list_projects(
        &self,
        page: u32,
        archived: Option<bool>,
    ) -> Result<Page, Error>;
}

/// Find every project in `groups`, or every accessible project when no
/// groups are given.
///
/// Groups are swept one after the other and their results concatenated, so a
/// project reachable through two groups will show up twice. Any failed
/// request aborts the whole thing.
pub fn discover<L: ProjectLister + ?Sized>(
    lister: &L,
    groups: &[String],
    archived: Option<bool>,
) -> Result<Vec<Project>, Error> {
    let mut projects = Vec::new();

    if groups.is_empty() {
        info!("Fetching all accessible projects");
        let found = all_pages(|page| lister.list_projects(page, archived))
            .context("Unable to list accessible projects")?;
        projects.extend(found);
    } else {
        for group in groups {
            info!("Fetching projects in the \"{}\" group", group);
            let found =
                all_pages(|page| lister.list_group_projects(group, page))
                    .with_context(|_| {
                        format!("Unable to list projects in \"{}\"", group)
                    })?;

            debug!("Found {} projects in {}", found.len(), group);
            projects.extend(found);
        }
    }

    info!("Found {} projects", projects.len());
    Ok(projects)
}

fn all_pages<F>(mut fetch: F) -> Result<Vec<Project>, Error>
where
    F: FnMut(u32) -> Result<Page, Error>,
{
    let mut projects = Vec::new();
    let mut page = Some(1);

    while let Some(current) = page {
        let Page {
            projects: found,
            next_page,
        } = fetch(current)?;

        projects.extend(found);
        page = next_page;
    }

    Ok(projects)
}

/// A `ProjectLister` which talks to the GitLab v4 REST API.
#[derive(Debug, Clone)]
pub struct GitLab {
    client: Client,
    base_url: Url,
    token: Option<Secret<String>>,
}

impl GitLab {
    pub fn new(
        base_url: &str,
        token: Option<Secret<String>>,
    ) -> Result<GitLab, Error> {
        let base_url: Url = base_url.parse().map_err(|_| InvalidBaseUrl {
            url: base_url.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(InvalidBaseUrl {
                url: base_url.to_string(),
            }
            .into());
        }

        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("Unable to create the HTTP client")?;

        Ok(GitLab {
            client,
            base_url,
            token,
        })
    }

    pub fn with_config(cfg: &GitLabConfig) -> Result<GitLab, Error> {
        GitLab::new(&cfg.api_base_url, cfg.token.clone())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();

        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InvalidBaseUrl {
                    url: self.base_url.to_string(),
                }
            })?;
            path.pop_if_empty();
            // each segment gets percent-encoded, so "a/b" becomes "a%2Fb"
            path.extend(segments);
        }

        Ok(url)
    }

    fn get_page(
        &self,
        url: Url,
        page: u32,
        archived: Option<bool>,
    ) -> Result<Page, Error> {
        let mut query = vec![
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(archived) = archived {
            query.push(("archived", archived.to_string()));
        }

        debug!("Sending request to {} (page {})", url, page);

        let mut request = self.client.get(url.clone()).query(&query);
        if let Some(ref token) = self.token {
            request = request.header("PRIVATE-TOKEN", token.reveal_str());
        }
        let request = request
            .build()
            .context("Generated invalid request. This is a bug.")?;

        if log_enabled!(log::Level::Trace) {
            let mut headers = format!("Request Headers {:#?}", request.headers());
            if let Some(ref token) = self.token {
                if !token.reveal_str().is_empty() {
                    headers = headers.replace(token.reveal_str(), "XXXXXXXXXX");
                }
            }

            for line in headers.lines() {
                trace!("{}", line);
            }
        }

        let response = self
            .client
            .execute(request)
            .context("Unable to send request")?;

        let status = response.status();
        debug!("Received response ({})", status);

        if !status.is_success() {
            warn!("Request failed with {}", status);
            return Err(FailedRequest {
                status,
                url: url.to_string(),
            }
            .into());
        }

        let next_page = next_page(&response);
        let projects: Vec<Project> =
            response.json().context("Unable to deserialize response")?;

        Ok(Page {
            projects,
            next_page,
        })
    }
}

impl ProjectLister for GitLab {
    fn list_group_projects(
        &self,
        group: &str,
        page: u32,
    ) -> Result<Page, Error> {
        let url = self.endpoint(&["groups", group, "projects"])?;
        self.get_page(url, page, None)
    }

    fn list_projects(
        &self,
        page: u32,
        archived: Option<bool>,
    ) -> Result<Page, Error> {
        let url = self.endpoint(&["projects"])?;
        self.get_page(url, page, archived)
    }
}

fn next_page(response: &Response) -> Option<u32> {
    response
        .headers()
        .get("X-Next-Page")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_next_page)
}

/// GitLab sends an empty `X-Next-Page` on the last page.
fn parse_next_page(raw: &str) -> Option<u32> {
    match raw.trim().parse() {
        Ok(0) | Err(_) => None,
        Ok(page) => Some(page),
    }
}

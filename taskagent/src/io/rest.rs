//! Blocking HTTP client for the task API.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::clock::rfc3339;
use crate::error::AgentError;
use crate::io::api::{Catalog, Collaborator, Label, Project, Section, TaskApi, Task};

/// Upper bound on pages fetched for one listing.
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Completed-task listings wrap results under `items`.
#[derive(Debug, Deserialize)]
struct CompletedPage {
    #[serde(default)]
    items: Vec<Task>,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct RestClient {
    base_url: String,
    token: String,
    http: Client,
}

impl RestClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn send(&self, label: &str, request: RequestBuilder) -> Result<reqwest::blocking::Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .map_err(|err| AgentError::Api(format!("{label}: {err}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        warn!(%status, label, "api request failed");
        let message = format!("{label}: HTTP {}: {}", status.as_u16(), body.trim());
        let err = if status == StatusCode::NOT_FOUND {
            AgentError::NotFound(message)
        } else {
            AgentError::Api(message)
        };
        Err(err.into())
    }

    fn list<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut params: Vec<(&str, String)> = query.to_vec();
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.clone()));
            }
            let label = format!("GET {path}");
            let response = self.send(&label, self.http.get(self.url(path)).query(&params))?;
            let page: Page<T> = response.json().with_context(|| format!("decode {label}"))?;
            items.extend(page.results);
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(path, count = items.len(), "listed");
        Ok(items)
    }
}

impl TaskApi for RestClient {
    #[instrument(skip_all, fields(path = %path))]
    fn post(&self, path: &str, body: &Map<String, Value>) -> Result<Value> {
        let label = format!("POST {path}");
        let response = self.send(&label, self.http.post(self.url(path)).json(body))?;
        let text = response.text().with_context(|| format!("read {label}"))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    #[instrument(skip_all, fields(path = %path))]
    fn delete(&self, path: &str) -> Result<()> {
        let label = format!("DELETE {path}");
        self.send(&label, self.http.delete(self.url(path)))?;
        Ok(())
    }
}

impl Catalog for RestClient {
    fn projects(&self) -> Result<Vec<Project>> {
        self.list("projects", &[])
    }

    fn sections(&self) -> Result<Vec<Section>> {
        self.list("sections", &[])
    }

    fn labels(&self) -> Result<Vec<Label>> {
        self.list("labels", &[])
    }

    fn active_tasks(&self) -> Result<Vec<Task>> {
        self.list("tasks", &[])
    }

    fn completed_tasks(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Task>> {
        let path = "tasks/completed/by_completion_date";
        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut params = vec![("since", rfc3339(since)), ("until", rfc3339(until))];
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.clone()));
            }
            let label = format!("GET {path}");
            let response = self.send(&label, self.http.get(self.url(path)).query(&params))?;
            let page: CompletedPage = response.json().with_context(|| format!("decode {label}"))?;
            tasks.extend(page.items);
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tasks)
    }

    fn collaborators(&self, project_id: &str) -> Result<Vec<Collaborator>> {
        self.list(&format!("projects/{project_id}/collaborators"), &[])
    }
}

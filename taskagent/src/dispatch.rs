//! Action → concrete API request, and request execution.
//!
//! [`build_request`] is the single mapping table from [`ActionKind`] to
//! `(method, path, body)`. References to projects, sections and assignees are
//! resolved through a [`Resolver`]; explicit `*_id` fields always win.

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::core::action::{Action, ActionKind, trimmed};
use crate::error::AgentError;
use crate::io::api::{ApiRequest, Method, TaskApi};
use crate::io::resolver::{Resolver, strip_id_prefix};

/// Applies one action. The apply loop depends only on this seam.
pub trait ActionDispatcher {
    fn dispatch(&self, action: &Action) -> Result<()>;
}

/// Dispatcher that talks to the task API.
pub struct ApiDispatcher<'a> {
    pub api: &'a dyn TaskApi,
    pub resolver: &'a dyn Resolver,
}

impl ActionDispatcher for ApiDispatcher<'_> {
    #[instrument(skip_all, fields(action_type = %action.action_type))]
    fn dispatch(&self, action: &Action) -> Result<()> {
        let request = build_request(action, self.resolver)?;
        debug!(method = %request.method, path = %request.path, "dispatching");
        execute_request(self.api, &request)
    }
}

/// Send a built request. Only writes and deletes are valid here.
pub fn execute_request(api: &dyn TaskApi, request: &ApiRequest) -> Result<()> {
    match request.method {
        Method::Post => api.post(&request.path, &request.body).map(|_| ()),
        Method::Delete => api.delete(&request.path),
        Method::Get => Err(AgentError::Internal(format!(
            "unsupported method {} for {}",
            request.method, request.path
        ))
        .into()),
    }
}

/// Build the request for one validated action.
pub fn build_request(action: &Action, resolver: &dyn Resolver) -> Result<ApiRequest> {
    let kind = action
        .kind()
        .map_err(|err| AgentError::Validation(err.to_string()))?;
    let request = match kind {
        ActionKind::TaskAdd => {
            let mut body = Body::default();
            body.text("content", &action.content);
            body.text("description", &action.description);
            let project_id = project_selector(action, resolver)?;
            let section_id = section_selector(action, project_id.as_deref(), resolver)?;
            body.opt("project_id", project_id.clone());
            body.opt("section_id", section_id);
            body.opt("parent_id", parent_task(action));
            task_fields(&mut body, action, project_id.as_deref(), resolver)?;
            ApiRequest::post("/tasks", body.into_map())
        }
        ActionKind::TaskUpdate => {
            let task_id = required_id(&action.task_id, kind, "task_id")?;
            let mut body = Body::default();
            body.text("content", &action.content);
            body.text("description", &action.description);
            let project_id = project_selector(action, resolver)?;
            task_fields(&mut body, action, project_id.as_deref(), resolver)?;
            ApiRequest::post(format!("/tasks/{task_id}"), body.into_map())
        }
        ActionKind::TaskMove => {
            let task_id = required_id(&action.task_id, kind, "task_id")?;
            let mut body = Body::default();
            let project_id = project_selector(action, resolver)?;
            let section_id = section_selector(action, project_id.as_deref(), resolver)?;
            body.opt("project_id", project_id);
            body.opt("section_id", section_id);
            body.opt("parent_id", parent_task(action));
            if body.is_empty() {
                return Err(AgentError::usage(
                    "task_move requires project/project_id, section/section_id, or parent",
                )
                .into());
            }
            ApiRequest::post(format!("/tasks/{task_id}/move"), body.into_map())
        }
        ActionKind::TaskComplete => {
            let task_id = required_id(&action.task_id, kind, "task_id")?;
            ApiRequest::post(format!("/tasks/{task_id}/close"), Map::new())
        }
        ActionKind::TaskReopen => {
            let task_id = required_id(&action.task_id, kind, "task_id")?;
            ApiRequest::post(format!("/tasks/{task_id}/reopen"), Map::new())
        }
        ActionKind::TaskDelete => {
            let task_id = required_id(&action.task_id, kind, "task_id")?;
            ApiRequest::delete(format!("/tasks/{task_id}"))
        }
        ActionKind::ProjectAdd => {
            let mut body = Body::default();
            body.text("name", &action.name);
            body.text("description", &action.description);
            let parent_id = match (trimmed(&action.parent_id), trimmed(&action.parent)) {
                (Some(id), _) => Some(strip_id_prefix(id).to_string()),
                (None, Some(reference)) => Some(resolver.project_id(reference)?),
                (None, None) => None,
            };
            body.opt("parent_id", parent_id);
            body.text("color", &action.color);
            body.bool("is_favorite", action.is_favorite);
            ApiRequest::post("/projects", body.into_map())
        }
        ActionKind::ProjectUpdate => {
            let project_id = required_id(&action.project_id, kind, "project_id")?;
            let mut body = Body::default();
            body.text("name", &action.name);
            body.text("description", &action.description);
            body.text("color", &action.color);
            body.bool("is_favorite", action.is_favorite);
            ApiRequest::post(format!("/projects/{project_id}"), body.into_map())
        }
        ActionKind::ProjectArchive => {
            let project_id = required_id(&action.project_id, kind, "project_id")?;
            ApiRequest::post(format!("/projects/{project_id}/archive"), Map::new())
        }
        ActionKind::ProjectUnarchive => {
            let project_id = required_id(&action.project_id, kind, "project_id")?;
            ApiRequest::post(format!("/projects/{project_id}/unarchive"), Map::new())
        }
        ActionKind::ProjectDelete => {
            let project_id = required_id(&action.project_id, kind, "project_id")?;
            ApiRequest::delete(format!("/projects/{project_id}"))
        }
        ActionKind::SectionAdd => {
            let mut body = Body::default();
            body.text("name", &action.name);
            let project_id = project_selector(action, resolver)?.ok_or_else(|| {
                AgentError::usage("section_add requires name and project/project_id")
            })?;
            body.set("project_id", Value::from(project_id));
            body.int("order", action.order);
            ApiRequest::post("/sections", body.into_map())
        }
        ActionKind::SectionUpdate => {
            let section_id = required_id(&action.section_id, kind, "section_id")?;
            let name = trimmed(&action.name)
                .ok_or_else(|| AgentError::usage("section_update requires section_id and name"))?;
            let mut body = Body::default();
            body.set("name", Value::from(name));
            ApiRequest::post(format!("/sections/{section_id}"), body.into_map())
        }
        ActionKind::SectionDelete => {
            let section_id = required_id(&action.section_id, kind, "section_id")?;
            ApiRequest::delete(format!("/sections/{section_id}"))
        }
        ActionKind::LabelAdd => ApiRequest::post("/labels", label_body(action)),
        ActionKind::LabelUpdate => {
            let label_id = required_id(&action.label_id, kind, "label_id")?;
            ApiRequest::post(format!("/labels/{label_id}"), label_body(action))
        }
        ActionKind::LabelDelete => {
            let label_id = required_id(&action.label_id, kind, "label_id")?;
            ApiRequest::delete(format!("/labels/{label_id}"))
        }
        ActionKind::CommentAdd => {
            let mut body = Body::default();
            body.text("content", &action.content);
            // Both targets are forwarded when given.
            let task_id = trimmed(&action.task_id).map(strip_id_prefix);
            let project_id = project_selector(action, resolver)?;
            if task_id.is_none() && project_id.is_none() {
                return Err(
                    AgentError::usage("comment_add requires task_id or project/project_id").into(),
                );
            }
            if let Some(task_id) = task_id {
                body.set("task_id", Value::from(task_id));
            }
            if let Some(project_id) = project_id {
                body.set("project_id", Value::from(project_id));
            }
            ApiRequest::post("/comments", body.into_map())
        }
        ActionKind::CommentUpdate => {
            let comment_id = required_id(&action.comment_id, kind, "comment_id")?;
            let content = trimmed(&action.content)
                .ok_or_else(|| AgentError::usage("comment_update requires content"))?;
            let mut body = Body::default();
            body.set("content", Value::from(content));
            ApiRequest::post(format!("/comments/{comment_id}"), body.into_map())
        }
        ActionKind::CommentDelete => {
            let comment_id = required_id(&action.comment_id, kind, "comment_id")?;
            ApiRequest::delete(format!("/comments/{comment_id}"))
        }
    };
    Ok(request)
}

/// Fields shared by task create and update.
fn task_fields(
    body: &mut Body,
    action: &Action,
    project_id: Option<&str>,
    resolver: &dyn Resolver,
) -> Result<()> {
    if let Some(labels) = &action.labels {
        let labels: Vec<Value> = labels
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(Value::from)
            .collect();
        body.set("labels", Value::Array(labels));
    }
    if let Some(priority) = action.priority {
        body.set("priority", Value::from(priority));
    }
    body.text("due_string", &action.due_string);
    body.text("due_date", &action.due_date);
    body.text("due_datetime", &action.due_datetime);
    body.text("due_lang", &action.due_lang);
    if let Some(duration) = action.duration {
        body.set("duration", Value::from(duration));
        let unit = trimmed(&action.duration_unit).unwrap_or("minute");
        body.set("duration_unit", Value::from(unit));
    }
    body.text("deadline_date", &action.deadline_date);

    match (trimmed(&action.assignee_id), trimmed(&action.assignee)) {
        (Some(id), _) => body.set("assignee_id", Value::from(strip_id_prefix(id))),
        (None, Some(reference)) => {
            let project_id = project_id.ok_or_else(|| {
                AgentError::usage(format!(
                    "{} assignee \"{reference}\" requires project/project_id",
                    action.action_type
                ))
            })?;
            let assignee_id = resolver.assignee_id(reference, project_id)?;
            body.set("assignee_id", Value::from(assignee_id));
        }
        (None, None) => {}
    }
    Ok(())
}

fn label_body(action: &Action) -> Map<String, Value> {
    let mut body = Body::default();
    body.text("name", &action.name);
    body.text("color", &action.color);
    body.int("order", action.order);
    body.bool("is_favorite", action.is_favorite);
    body.into_map()
}

/// Explicit `project_id` wins; otherwise resolve `project`.
fn project_selector(action: &Action, resolver: &dyn Resolver) -> Result<Option<String>> {
    if let Some(id) = trimmed(&action.project_id) {
        return Ok(Some(strip_id_prefix(id).to_string()));
    }
    trimmed(&action.project)
        .map(|reference| resolver.project_id(reference))
        .transpose()
}

/// Explicit `section_id` wins; otherwise resolve `section` within the project.
fn section_selector(
    action: &Action,
    project_id: Option<&str>,
    resolver: &dyn Resolver,
) -> Result<Option<String>> {
    if let Some(id) = trimmed(&action.section_id) {
        return Ok(Some(strip_id_prefix(id).to_string()));
    }
    trimmed(&action.section)
        .map(|reference| resolver.section_id(reference, project_id))
        .transpose()
}

fn parent_task(action: &Action) -> Option<String> {
    trimmed(&action.parent_id)
        .or_else(|| trimmed(&action.parent))
        .map(|id| strip_id_prefix(id).to_string())
}

fn required_id(value: &Option<String>, kind: ActionKind, field: &str) -> Result<String> {
    trimmed(value)
        .map(|id| strip_id_prefix(id).to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AgentError::usage(format!("{kind} requires {field}")).into())
}

/// JSON body that only records present values.
#[derive(Default)]
struct Body(Map<String, Value>);

impl Body {
    fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    fn text(&mut self, key: &str, value: &Option<String>) {
        if let Some(v) = trimmed(value) {
            self.set(key, Value::from(v));
        }
    }

    fn opt(&mut self, key: &str, value: Option<String>) {
        if let Some(v) = value {
            self.set(key, Value::from(v));
        }
    }

    fn int(&mut self, key: &str, value: Option<i64>) {
        if let Some(v) = value {
            self.set(key, Value::from(v));
        }
    }

    fn bool(&mut self, key: &str, value: Option<bool>) {
        if let Some(v) = value {
            self.set(key, Value::from(v));
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

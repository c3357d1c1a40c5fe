//! Planner context: a filtered, bounded snapshot of the workspace.

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::AgentError;
use crate::io::api::{Catalog, Label, Project, Section, Task};

/// Active tasks sent to the planner, at most.
pub const ACTIVE_TASK_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    /// Project names or ids (`--context-project`, repeatable).
    pub projects: Vec<String>,
    /// Label names or ids (`--context-label`, repeatable).
    pub labels: Vec<String>,
    /// Include tasks completed in the last N days; 0 skips them.
    pub completed_days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlannerContext {
    pub projects: Vec<Project>,
    pub sections: Vec<Section>,
    pub labels: Vec<Label>,
    pub active_tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed_tasks: Vec<Task>,
}

/// Parse `--context-completed`: `N` or `Nd`. Empty means no window.
pub fn parse_completed_window(value: &str) -> Result<u32, AgentError> {
    let lowered = value.trim().to_lowercase();
    if lowered.is_empty() {
        return Ok(0);
    }
    lowered
        .strip_suffix('d')
        .unwrap_or(&lowered)
        .parse::<u32>()
        .map_err(|_| AgentError::usage("context-completed must be an integer or Nd"))
}

/// Gather projects, sections, labels and tasks for the planner.
///
/// Every named filter must match exactly one entity by id or
/// case-insensitive name.
#[instrument(skip_all, fields(projects = opts.projects.len(), labels = opts.labels.len(), completed_days = opts.completed_days))]
pub fn build_planner_context(
    catalog: &dyn Catalog,
    opts: &ContextOptions,
    now: DateTime<Utc>,
) -> Result<PlannerContext> {
    let mut projects = catalog.projects()?;
    let project_ids = select_ids("project", &opts.projects, &projects, |p| (&p.id, &p.name))?;
    if let Some(ids) = &project_ids {
        projects.retain(|p| ids.contains(&p.id));
    }

    let mut sections = catalog.sections()?;
    if let Some(ids) = &project_ids {
        sections.retain(|s| ids.contains(&s.project_id));
    }

    let mut labels = catalog.labels()?;
    let label_ids = select_ids("label", &opts.labels, &labels, |l| (&l.id, &l.name))?;
    if let Some(ids) = &label_ids {
        labels.retain(|l| ids.contains(&l.id));
    }
    let label_names: Option<BTreeSet<String>> = label_ids
        .as_ref()
        .map(|_| labels.iter().map(|l| l.name.to_lowercase()).collect());

    let active_tasks: Vec<Task> = catalog
        .active_tasks()?
        .into_iter()
        .filter(|t| project_ids.as_ref().is_none_or(|ids| ids.contains(&t.project_id)))
        .filter(|t| {
            label_names.as_ref().is_none_or(|names| {
                t.labels
                    .iter()
                    .any(|label| names.contains(&label.to_lowercase()))
            })
        })
        .take(ACTIVE_TASK_LIMIT)
        .collect();

    let completed_tasks = if opts.completed_days > 0 {
        let since = now - Duration::days(i64::from(opts.completed_days));
        catalog.completed_tasks(since, now)?
    } else {
        Vec::new()
    };

    debug!(
        projects = projects.len(),
        sections = sections.len(),
        labels = labels.len(),
        active_tasks = active_tasks.len(),
        completed_tasks = completed_tasks.len(),
        "planner context built"
    );
    Ok(PlannerContext {
        projects,
        sections,
        labels,
        active_tasks,
        completed_tasks,
    })
}

/// Ids selected by `filters`, or `None` when there are no filters.
fn select_ids<T>(
    entity: &str,
    filters: &[String],
    items: &[T],
    key: impl Fn(&T) -> (&String, &String),
) -> Result<Option<BTreeSet<String>>, AgentError> {
    if filters.is_empty() {
        return Ok(None);
    }
    let mut ids = BTreeSet::new();
    for filter in filters {
        let wanted = filter.trim();
        if let Some((id, _)) = items.iter().map(&key).find(|(id, _)| id.as_str() == wanted) {
            ids.insert(id.clone());
            continue;
        }
        let wanted_lower = wanted.to_lowercase();
        let matches: Vec<&String> = items
            .iter()
            .map(&key)
            .filter(|(_, name)| name.to_lowercase() == wanted_lower)
            .map(|(id, _)| id)
            .collect();
        match matches.as_slice() {
            [id] => {
                ids.insert((*id).clone());
            }
            [] => return Err(AgentError::usage(format!("unknown {entity}: {wanted}"))),
            _ => return Err(AgentError::usage(format!("ambiguous {entity}: {wanted}"))),
        }
    }
    Ok(Some(ids))
}

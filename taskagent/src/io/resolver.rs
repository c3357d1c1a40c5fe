//! Human reference resolution (names, `id:` prefixes) against the catalog.

use std::cell::RefCell;

use anyhow::Result;
use tracing::debug;

use crate::error::AgentError;
use crate::io::api::{Catalog, Project, Section};

/// Turns project/section/assignee references into API ids.
///
/// Fails with a usage error when a reference is ambiguous and a not-found
/// error when nothing matches.
pub trait Resolver {
    fn project_id(&self, reference: &str) -> Result<String>;
    /// Section lookup, restricted to `project_id` when known.
    fn section_id(&self, reference: &str, project_id: Option<&str>) -> Result<String>;
    fn assignee_id(&self, reference: &str, project_id: &str) -> Result<String>;
}

/// Resolver backed by catalog listings, fetched once per invocation.
pub struct CatalogResolver<'a> {
    catalog: &'a dyn Catalog,
    projects: RefCell<Option<Vec<Project>>>,
    sections: RefCell<Option<Vec<Section>>>,
}

impl<'a> CatalogResolver<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            projects: RefCell::new(None),
            sections: RefCell::new(None),
        }
    }
}

impl Resolver for CatalogResolver<'_> {
    fn project_id(&self, reference: &str) -> Result<String> {
        if let Some(id) = direct_id(reference) {
            return Ok(id);
        }
        let projects = cached(&self.projects, || self.catalog.projects())?;
        let candidates: Vec<(&str, &str)> = projects
            .iter()
            .map(|p| (p.id.as_str(), p.name.as_str()))
            .collect();
        resolve_by_name("project", reference, &candidates)
    }

    fn section_id(&self, reference: &str, project_id: Option<&str>) -> Result<String> {
        if let Some(id) = direct_id(reference) {
            return Ok(id);
        }
        let sections = cached(&self.sections, || self.catalog.sections())?;
        let candidates: Vec<(&str, &str)> = sections
            .iter()
            .filter(|s| project_id.is_none_or(|pid| s.project_id == pid))
            .map(|s| (s.id.as_str(), s.name.as_str()))
            .collect();
        resolve_by_name("section", reference, &candidates)
    }

    fn assignee_id(&self, reference: &str, project_id: &str) -> Result<String> {
        if let Some(id) = direct_id(reference) {
            return Ok(id);
        }
        let collaborators = self.catalog.collaborators(project_id)?;
        let wanted = reference.trim();
        let by_email: Vec<&str> = collaborators
            .iter()
            .filter(|c| c.email.eq_ignore_ascii_case(wanted))
            .map(|c| c.id.as_str())
            .collect();
        if let [id] = by_email.as_slice() {
            return Ok((*id).to_string());
        }
        let candidates: Vec<(&str, &str)> = collaborators
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();
        resolve_by_name("assignee", reference, &candidates)
    }
}

fn cached<T: Clone>(
    cell: &RefCell<Option<Vec<T>>>,
    load: impl FnOnce() -> Result<Vec<T>>,
) -> Result<Vec<T>> {
    if let Some(items) = cell.borrow().as_ref() {
        return Ok(items.clone());
    }
    let items = load()?;
    *cell.borrow_mut() = Some(items.clone());
    Ok(items)
}

/// `id:`-prefixed or all-digit references are ids already.
pub fn direct_id(reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if let Some(id) = trimmed.strip_prefix("id:") {
        let id = id.trim();
        return (!id.is_empty()).then(|| id.to_string());
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    None
}

/// Strip an `id:` prefix from an explicit id field.
pub fn strip_id_prefix(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed.strip_prefix("id:").map_or(trimmed, str::trim)
}

/// Case-insensitive unique name match over `(id, name)` candidates.
/// An exact id match is accepted as a fallback.
pub fn resolve_by_name(entity: &str, reference: &str, candidates: &[(&str, &str)]) -> Result<String> {
    let wanted = reference.trim();
    if wanted.is_empty() {
        return Err(AgentError::usage(format!("empty {entity} reference")).into());
    }
    let wanted_lower = wanted.to_lowercase();
    let matches: Vec<&(&str, &str)> = candidates
        .iter()
        .filter(|(_, name)| name.to_lowercase() == wanted_lower)
        .collect();
    match matches.as_slice() {
        [(id, _)] => {
            debug!(entity, reference = wanted, id, "resolved reference");
            Ok((*id).to_string())
        }
        [] => candidates
            .iter()
            .find(|(id, _)| *id == wanted)
            .map(|(id, _)| (*id).to_string())
            .ok_or_else(|| AgentError::not_found(format!("{entity} not found: {wanted}")).into()),
        many => {
            let listed: Vec<String> = many
                .iter()
                .map(|(id, name)| format!("{name} (id:{id})"))
                .collect();
            Err(AgentError::usage(format!(
                "ambiguous {entity} reference \"{wanted}\"; matches: {}",
                listed.join(", ")
            ))
            .into())
        }
    }
}

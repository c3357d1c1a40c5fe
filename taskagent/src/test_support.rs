//! Test-only fakes and builders: fixed clock, scripted planner, in-memory
//! catalog/API/journal and action constructors.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::agent::Backend;
use crate::clock::Clock;
use crate::core::action::{Action, ActionKind};
use crate::core::plan::{PLAN_VERSION, Plan, summarize};
use crate::core::replay::ReplayJournal;
use crate::dispatch::ActionDispatcher;
use crate::error::AgentError;
use crate::io::api::{Catalog, Collaborator, Label, Project, Section, Task, TaskApi};
use crate::io::journal::JournalStore;
use crate::io::paths::AgentPaths;
use crate::io::planner::Planner;

/// Fresh state directory. Keep the `TempDir` alive for the test's duration.
pub fn temp_state() -> (tempfile::TempDir, AgentPaths) {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = AgentPaths::new(temp.path());
    (temp, paths)
}

/// 2026-02-07T09:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 7, 9, 0, 0)
        .single()
        .expect("valid fixed time")
}

/// Clock frozen at [`fixed_now`] unless built with another instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(fixed_now())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Cloneable in-memory writer; clones share the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().expect("buffer lock").clone();
        String::from_utf8(bytes).expect("utf8 buffer")
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Every line parsed as a JSON event.
    pub fn events(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).expect("json event"))
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn task_add(content: &str) -> Action {
    let mut action = Action::new(ActionKind::TaskAdd);
    action.content = Some(content.to_string());
    action
}

pub fn task_delete(task_id: &str) -> Action {
    let mut action = Action::new(ActionKind::TaskDelete);
    action.task_id = Some(task_id.to_string());
    action
}

/// Current-version plan with a summary matching `actions`.
pub fn plan_with(confirm_token: &str, actions: Vec<Action>) -> Plan {
    Plan {
        version: PLAN_VERSION,
        instruction: "test plan".to_string(),
        confirm_token: confirm_token.to_string(),
        summary: summarize(&actions),
        actions,
        ..Plan::default()
    }
}

/// Planner returning canned output and recording the request it saw.
#[derive(Debug, Clone)]
pub struct ScriptedPlanner {
    output: Result<String, String>,
    last_input: Rc<RefCell<Vec<u8>>>,
}

impl ScriptedPlanner {
    pub fn new(output: &str) -> Self {
        Self {
            output: Ok(output.to_string()),
            last_input: Rc::default(),
        }
    }

    /// Fails every invocation with `AgentError::Planner(message)`.
    pub fn failing(message: &str) -> Self {
        Self {
            output: Err(message.to_string()),
            last_input: Rc::default(),
        }
    }

    pub fn last_input(&self) -> Vec<u8> {
        self.last_input.borrow().clone()
    }
}

impl Planner for ScriptedPlanner {
    fn invoke(&self, input: &[u8]) -> Result<Vec<u8>> {
        *self.last_input.borrow_mut() = input.to_vec();
        match &self.output {
            Ok(output) => Ok(output.clone().into_bytes()),
            Err(message) => Err(AgentError::Planner(message.clone()).into()),
        }
    }
}

/// In-memory catalog with call counters.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    pub projects: Vec<Project>,
    pub sections: Vec<Section>,
    pub labels: Vec<Label>,
    pub tasks: Vec<Task>,
    pub completed: Vec<Task>,
    /// `(project_id, collaborator)`.
    pub collaborators: Vec<(String, Collaborator)>,
    project_calls: Cell<usize>,
    completed_calls: Cell<usize>,
}

impl FakeCatalog {
    pub fn add_project(&mut self, id: &str, name: &str) {
        self.projects.push(Project {
            id: id.to_string(),
            name: name.to_string(),
            ..Project::default()
        });
    }

    pub fn add_section(&mut self, id: &str, project_id: &str, name: &str) {
        self.sections.push(Section {
            id: id.to_string(),
            project_id: project_id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_label(&mut self, id: &str, name: &str) {
        self.labels.push(Label {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_task(&mut self, id: &str, content: &str, project_id: &str, labels: &[&str]) {
        self.tasks.push(Task {
            id: id.to_string(),
            content: content.to_string(),
            project_id: project_id.to_string(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            ..Task::default()
        });
    }

    pub fn add_completed_task(&mut self, id: &str, content: &str, project_id: &str) {
        self.completed.push(Task {
            id: id.to_string(),
            content: content.to_string(),
            project_id: project_id.to_string(),
            completed_at: Some("2026-02-05T18:00:00Z".to_string()),
            ..Task::default()
        });
    }

    pub fn add_collaborator(&mut self, project_id: &str, id: &str, name: &str, email: &str) {
        self.collaborators.push((
            project_id.to_string(),
            Collaborator {
                id: id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
            },
        ));
    }

    pub fn project_calls(&self) -> usize {
        self.project_calls.get()
    }

    pub fn completed_calls(&self) -> usize {
        self.completed_calls.get()
    }
}

impl Catalog for FakeCatalog {
    fn projects(&self) -> Result<Vec<Project>> {
        self.project_calls.set(self.project_calls.get() + 1);
        Ok(self.projects.clone())
    }

    fn sections(&self) -> Result<Vec<Section>> {
        Ok(self.sections.clone())
    }

    fn labels(&self) -> Result<Vec<Label>> {
        Ok(self.labels.clone())
    }

    fn active_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    fn completed_tasks(&self, _since: DateTime<Utc>, _until: DateTime<Utc>) -> Result<Vec<Task>> {
        self.completed_calls.set(self.completed_calls.get() + 1);
        Ok(self.completed.clone())
    }

    fn collaborators(&self, project_id: &str) -> Result<Vec<Collaborator>> {
        Ok(self
            .collaborators
            .iter()
            .filter(|(pid, _)| pid == project_id)
            .map(|(_, c)| c.clone())
            .collect())
    }
}

/// Task API that records `"METHOD path"` per call. Paths registered with
/// [`FakeApi::fail_path`] answer with an API error.
#[derive(Debug, Default)]
pub struct FakeApi {
    calls: RefCell<Vec<String>>,
    bodies: RefCell<Vec<Map<String, Value>>>,
    failing: RefCell<BTreeSet<String>>,
}

impl FakeApi {
    pub fn fail_path(&self, path: &str) {
        self.failing.borrow_mut().insert(path.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn bodies(&self) -> Vec<Map<String, Value>> {
        self.bodies.borrow().clone()
    }

    fn record(&self, method: &str, path: &str) -> Result<()> {
        let call = format!("{method} {path}");
        self.calls.borrow_mut().push(call.clone());
        if self.failing.borrow().contains(path) {
            return Err(AgentError::Api(format!("{call}: HTTP 500: boom")).into());
        }
        Ok(())
    }
}

impl TaskApi for FakeApi {
    fn post(&self, path: &str, body: &Map<String, Value>) -> Result<Value> {
        self.bodies.borrow_mut().push(body.clone());
        self.record("POST", path)?;
        Ok(Value::Object(body.clone()))
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.record("DELETE", path)
    }
}

/// Dispatcher that records each action's `content` (or type) and fails on
/// the configured ones.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    dispatched: RefCell<Vec<String>>,
    failing: RefCell<BTreeSet<String>>,
}

impl RecordingDispatcher {
    pub fn failing_on(keys: &[&str]) -> Self {
        Self {
            failing: RefCell::new(keys.iter().map(|k| (*k).to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn clear_failures(&self) {
        self.failing.borrow_mut().clear();
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.borrow().clone()
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn dispatch(&self, action: &Action) -> Result<()> {
        let key = action
            .content
            .clone()
            .unwrap_or_else(|| action.action_type.clone());
        self.dispatched.borrow_mut().push(key.clone());
        if self.failing.borrow().contains(&key) {
            return Err(AgentError::Api(format!("dispatch failed: {key}")).into());
        }
        Ok(())
    }
}

/// Journal kept in memory, counting saves.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    journal: RefCell<ReplayJournal>,
    saves: Cell<usize>,
}

impl MemoryJournal {
    pub fn snapshot(&self) -> ReplayJournal {
        self.journal.borrow().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }
}

impl JournalStore for MemoryJournal {
    fn load(&self) -> Result<ReplayJournal> {
        Ok(self.journal.borrow().clone())
    }

    fn save(&self, journal: &ReplayJournal) -> Result<()> {
        *self.journal.borrow_mut() = journal.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// Backend wired to the in-memory fakes.
pub struct FakeBackend {
    pub catalog: FakeCatalog,
    pub api: FakeApi,
    pub planner: ScriptedPlanner,
}

impl FakeBackend {
    /// `planned` is the raw output every planner invocation returns.
    pub fn new(planned: &str, catalog: FakeCatalog) -> Self {
        Self {
            catalog,
            api: FakeApi::default(),
            planner: ScriptedPlanner::new(planned),
        }
    }
}

impl Backend for FakeBackend {
    fn catalog(&self) -> Result<&dyn Catalog> {
        Ok(&self.catalog)
    }

    fn task_api(&self) -> Result<&dyn TaskApi> {
        Ok(&self.api)
    }

    fn planner(&self, _flag: Option<&str>) -> Result<Box<dyn Planner>> {
        Ok(Box::new(self.planner.clone()))
    }
}

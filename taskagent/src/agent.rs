//! Agent commands: plan, apply/run, status, policy and planner.
//!
//! Each command takes a [`Session`] (state paths, config, output sinks) and a
//! [`Backend`] that reaches the outside world: the task API and the planner
//! process. Commands return views; printing is left to the binary.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::apply::{ApplyDeps, apply_actions};
use crate::clock::{Clock, rfc3339};
use crate::context::{ContextOptions, build_planner_context, parse_completed_window};
use crate::core::outcome::{ApplyReport, OnError};
use crate::core::plan::{PLAN_VERSION, Plan};
use crate::dispatch::ApiDispatcher;
use crate::error::{AgentError, classify};
use crate::exit_codes;
use crate::invoke::{PlannerRequest, run_planner};
use crate::io::api::{Catalog, TaskApi};
use crate::io::config::{
    AgentConfig, EnvOverrides, PLANNER_ENV, TOKEN_ENV, load_config, resolve_api_token,
    resolve_planner_cmd, write_config,
};
use crate::io::journal::FileJournalStore;
use crate::io::paths::AgentPaths;
use crate::io::plan_store::{
    STDIN_PATH, load_apply_report, load_last_plan, read_plan, write_apply_report, write_plan,
};
use crate::io::planner::{Planner, ShellPlanner};
use crate::io::policy_store::{PolicyLocation, discover_policy, load_policy};
use crate::io::progress::{APPLY_SUMMARY, PLAN_LOADED, Progress, RUN_COMPLETE, RUN_ERROR, RUN_START};
use crate::io::resolver::CatalogResolver;
use crate::io::rest::RestClient;
use crate::prepare::{PlanProvider, PlanSource, PrepareRequest, prepare_plan};
use crate::report::{AppliedView, PlanPreview, PlannerView, PolicyView, StatusView};

/// External collaborators of the agent commands.
pub trait Backend {
    fn catalog(&self) -> Result<&dyn Catalog>;
    fn task_api(&self) -> Result<&dyn TaskApi>;
    /// Planner for this invocation; `flag` is the `--planner` override.
    fn planner(&self, flag: Option<&str>) -> Result<Box<dyn Planner>>;
}

/// REST API plus a shell planner, configured from config and environment.
pub struct LiveBackend {
    client: Option<RestClient>,
    config: AgentConfig,
    env_planner: Option<String>,
}

impl LiveBackend {
    /// The HTTP client is only built when a token is available; commands
    /// that never reach the API work without one.
    pub fn new(config: &AgentConfig, env: &EnvOverrides) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = resolve_api_token(env.api_token.as_deref(), config)
            .map(|token| RestClient::new(&config.api_base_url, &token, timeout))
            .transpose()?;
        Ok(Self {
            client,
            config: config.clone(),
            env_planner: env.planner_cmd.clone(),
        })
    }

    fn client(&self) -> Result<&RestClient> {
        self.client.as_ref().ok_or_else(|| {
            AgentError::usage(format!(
                "missing API token; set {TOKEN_ENV} or api_token in config.toml"
            ))
            .into()
        })
    }
}

impl Backend for LiveBackend {
    fn catalog(&self) -> Result<&dyn Catalog> {
        self.client().map(|client| client as &dyn Catalog)
    }

    fn task_api(&self) -> Result<&dyn TaskApi> {
        self.client().map(|client| client as &dyn TaskApi)
    }

    fn planner(&self, flag: Option<&str>) -> Result<Box<dyn Planner>> {
        let (command, source) = resolve_planner_cmd(
            flag,
            self.env_planner.as_deref(),
            self.config.planner_cmd.as_deref(),
        )
        .ok_or_else(|| {
            AgentError::usage(format!(
                "no planner configured; set {PLANNER_ENV}, pass --planner, \
                 or run `taskagent planner --set <cmd>`"
            ))
        })?;
        debug!(%source, "planner resolved");
        Ok(Box::new(ShellPlanner {
            command,
            timeout: Duration::from_secs(self.config.timeout_secs),
            output_limit_bytes: self.config.planner_output_limit_bytes,
        }))
    }
}

/// Per-invocation state shared by every command.
pub struct Session<'a> {
    pub paths: AgentPaths,
    pub config: AgentConfig,
    pub env: EnvOverrides,
    pub profile: String,
    pub backend: &'a dyn Backend,
    pub progress: &'a Progress,
    pub clock: &'a dyn Clock,
}

/// Load `config.toml` for a session; `--profile` overrides the configured one.
pub fn load_session_config(paths: &AgentPaths, profile: Option<&str>) -> Result<(AgentConfig, String)> {
    let config = load_config(&paths.config_path)?;
    let profile = profile
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(&config.profile)
        .to_string();
    Ok((config, profile))
}

/// Flags that shape the planner context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextArgs {
    pub projects: Vec<String>,
    pub labels: Vec<String>,
    pub completed: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
    pub instruction: String,
    pub out: Option<String>,
    pub planner: Option<String>,
    /// 0 selects the current plan version.
    pub plan_version: u32,
    pub context: ContextArgs,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyArgs {
    pub plan: Option<String>,
    pub instruction: Option<String>,
    pub confirm: Option<String>,
    pub force: bool,
    pub dry_run: bool,
    pub on_error: OnError,
    pub policy: Option<PathBuf>,
    pub plan_version: u32,
    pub planner: Option<String>,
    pub out: Option<String>,
    pub context: ContextArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyCommand {
    Apply,
    Run,
}

impl ApplyCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplyCommand::Apply => "apply",
            ApplyCommand::Run => "run",
        }
    }
}

/// What an apply or run produced.
#[derive(Debug, Clone)]
pub enum ApplyOutput {
    DryRun(PlanPreview),
    Applied(AppliedView),
}

impl ApplyOutput {
    /// `fail` mode aborts exit with ERROR; `continue` runs with failures
    /// exit with PARTIAL.
    pub fn exit_code(&self) -> i32 {
        match self {
            ApplyOutput::DryRun(_) => exit_codes::OK,
            ApplyOutput::Applied(view) if view.report.aborted => exit_codes::ERROR,
            ApplyOutput::Applied(view) if view.report.summary.failed_count > 0 => {
                exit_codes::PARTIAL
            }
            ApplyOutput::Applied(_) => exit_codes::OK,
        }
    }
}

fn expected_version(requested: u32) -> u32 {
    if requested == 0 { PLAN_VERSION } else { requested }
}

/// `--out` target, ignoring `-`.
fn out_path(out: Option<&str>) -> Option<&Path> {
    out.map(str::trim)
        .filter(|p| !p.is_empty() && *p != STDIN_PATH)
        .map(Path::new)
}

/// Build context, invoke the planner and return its validated plan.
#[instrument(skip_all, fields(profile = %session.profile))]
fn plan_instruction(
    session: &Session<'_>,
    instruction: &str,
    planner_flag: Option<&str>,
    context: &ContextArgs,
    expected_version: u32,
) -> Result<Plan> {
    let planner = session.backend.planner(planner_flag)?;
    let opts = ContextOptions {
        projects: context.projects.clone(),
        labels: context.labels.clone(),
        completed_days: parse_completed_window(context.completed.as_deref().unwrap_or_default())?,
    };
    let now = session.clock.now();
    let planner_context = build_planner_context(session.backend.catalog()?, &opts, now)
        .context("build planner context")?;
    let request = PlannerRequest {
        instruction: instruction.to_string(),
        profile: session.profile.clone(),
        context: planner_context,
        now: rfc3339(now),
    };
    run_planner(planner.as_ref(), &request, expected_version)
}

/// `plan`: generate a plan, persist it as the last plan and preview it.
pub fn plan_command(session: &Session<'_>, args: &PlanArgs) -> Result<PlanPreview> {
    let instruction = args.instruction.trim();
    if instruction.is_empty() {
        return Err(AgentError::usage("instruction is required").into());
    }
    let plan = plan_instruction(
        session,
        instruction,
        args.planner.as_deref(),
        &args.context,
        expected_version(args.plan_version),
    )?;
    session.progress.emit(
        PLAN_LOADED,
        json!({"command": "plan", "action_count": plan.actions.len(), "source": PlanSource::Planner.to_string()}),
    );
    if let Some(out) = out_path(args.out.as_deref()) {
        write_plan(out, &plan)?;
    }
    write_plan(&session.paths.last_plan_path, &plan)?;
    info!(confirm_token = %plan.confirm_token, actions = plan.actions.len(), "plan ready");
    Ok(PlanPreview::new(plan, false))
}

/// Plan sources for `apply`/`run` backed by the plan store and the planner.
struct SessionPlans<'s, 'a> {
    session: &'s Session<'a>,
    stdin: &'s mut dyn Read,
    args: &'s ApplyArgs,
    /// Confirm token of a plan generated during this command.
    planned_token: Option<String>,
}

impl PlanProvider for SessionPlans<'_, '_> {
    fn load_file(&mut self, path: &str) -> Result<Plan> {
        read_plan(path, self.stdin)
    }

    fn last_plan(&mut self) -> Result<Plan> {
        load_last_plan(&self.session.paths.last_plan_path)
    }

    /// Fresh plans are saved as the last plan (and to `--out`) before any
    /// gate runs, so a rejected or unconfirmed plan can be applied later by
    /// its token.
    fn plan_instruction(&mut self, instruction: &str) -> Result<Plan> {
        let plan = plan_instruction(
            self.session,
            instruction,
            self.args.planner.as_deref(),
            &self.args.context,
            expected_version(self.args.plan_version),
        )?;
        write_plan(&self.session.paths.last_plan_path, &plan)?;
        if let Some(out) = out_path(self.args.out.as_deref()) {
            write_plan(out, &plan)?;
        }
        info!(confirm_token = %plan.confirm_token, "planned plan saved as last plan");
        self.planned_token = Some(plan.confirm_token.clone());
        Ok(plan)
    }
}

/// `apply` and `run`. `run` additionally brackets the work with run-level
/// progress events.
pub fn apply_command(
    session: &Session<'_>,
    command: ApplyCommand,
    args: &ApplyArgs,
    stdin: &mut dyn Read,
) -> Result<ApplyOutput> {
    if command == ApplyCommand::Run {
        session.progress.emit(RUN_START, json!({"command": command.as_str()}));
    }
    let result = apply_inner(session, command, args, stdin);
    if command == ApplyCommand::Run {
        match &result {
            Ok(ApplyOutput::Applied(view)) if view.report.aborted => {
                let error = view
                    .report
                    .failure
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                session.progress.emit(RUN_ERROR, json!({"error": error}));
            }
            Ok(output) => {
                let (action_count, dry_run) = match output {
                    ApplyOutput::DryRun(preview) => (preview.action_count, true),
                    ApplyOutput::Applied(view) => (view.plan.actions.len(), false),
                };
                session.progress.emit(
                    RUN_COMPLETE,
                    json!({"action_count": action_count, "dry_run": dry_run}),
                );
            }
            Err(err) => session.progress.emit(RUN_ERROR, json!({"error": format!("{err:#}")})),
        }
    }
    result
}

#[instrument(skip_all, fields(command = command.as_str(), dry_run = args.dry_run, on_error = %args.on_error))]
fn apply_inner(
    session: &Session<'_>,
    command: ApplyCommand,
    args: &ApplyArgs,
    stdin: &mut dyn Read,
) -> Result<ApplyOutput> {
    let instruction = args
        .instruction
        .as_deref()
        .map(str::trim)
        .filter(|i| !i.is_empty());
    if command == ApplyCommand::Run && args.plan.is_none() && instruction.is_none() {
        return Err(AgentError::usage("instruction is required when --plan is not provided").into());
    }

    let location = discover_policy(args.policy.as_deref(), &session.paths.policy_path);
    let policy = load_policy(&location)?;
    let now = rfc3339(session.clock.now());
    let request = PrepareRequest {
        plan_path: args.plan.as_deref(),
        instruction,
        confirm: args.confirm.as_deref(),
        force: args.force,
        dry_run: args.dry_run,
        expected_version: expected_version(args.plan_version),
        now: &now,
    };
    let mut provider = SessionPlans {
        session,
        stdin,
        args,
        planned_token: None,
    };
    let prepared = match prepare_plan(&request, &mut provider, policy.as_ref()) {
        Ok(prepared) => prepared,
        Err(err) => {
            let unconfirmed = matches!(classify(&err), Some(AgentError::Usage(_)));
            return Err(match provider.planned_token {
                Some(token) if unconfirmed => err.context(format!(
                    "plan saved as last plan; review it and run `taskagent apply --confirm {token}`"
                )),
                _ => err,
            });
        }
    };
    let mut plan = prepared.plan;
    let action_count = plan.actions.len();
    session.progress.emit(
        PLAN_LOADED,
        json!({"command": command.as_str(), "action_count": action_count, "source": prepared.source.to_string()}),
    );

    if args.dry_run {
        session.progress.emit(
            APPLY_SUMMARY,
            json!({
                "command": command.as_str(),
                "dry_run": true,
                "ok_count": 0,
                "failed_count": 0,
                "skipped_replay": 0,
                "action_count": action_count,
            }),
        );
        if let Some(out) = out_path(args.out.as_deref()) {
            write_plan(out, &plan)?;
        }
        return Ok(ApplyOutput::DryRun(PlanPreview::new(plan, true)));
    }

    let api = session.backend.task_api()?;
    let resolver = CatalogResolver::new(session.backend.catalog()?);
    let dispatcher = ApiDispatcher {
        api,
        resolver: &resolver,
    };
    let journal = FileJournalStore::new(&session.paths.journal_path);
    let deps = ApplyDeps {
        dispatcher: &dispatcher,
        journal: &journal,
        progress: session.progress,
        clock: session.clock,
    };
    let run = apply_actions(&plan.confirm_token, &plan.actions, args.on_error, &deps)?;
    let outcome = run.outcome;

    let summary = outcome.summary(action_count);
    let finished_at = rfc3339(session.clock.now());
    if summary.any_applied() {
        plan.applied_at = Some(finished_at.clone());
    }
    let mut event = json!({
        "command": command.as_str(),
        "dry_run": false,
        "ok_count": summary.ok_count,
        "failed_count": summary.failed_count,
        "skipped_replay": summary.skipped_replay,
        "action_count": summary.action_count,
    });
    if let Some(failure) = &outcome.failure {
        event["error"] = json!(failure.to_string());
    }
    session.progress.emit(APPLY_SUMMARY, event);

    let report = ApplyReport {
        command: command.as_str().to_string(),
        confirm_token: plan.confirm_token.clone(),
        finished_at,
        on_error: args.on_error,
        summary,
        results: outcome.results,
        failure: outcome.failure,
        aborted: outcome.aborted,
    };
    write_plan(&session.paths.last_plan_path, &plan)?;
    write_apply_report(&session.paths.last_apply_path, &report)?;
    if let Some(out) = out_path(args.out.as_deref()) {
        write_plan(out, &plan)?;
    }
    if let Some(err) = run.error {
        return Err(err.context(format!(
            "apply stopped after {} of {action_count} actions; report saved to {}",
            report.results.len(),
            session.paths.last_apply_path.display()
        )));
    }
    info!(
        ok = summary.ok_count,
        failed = summary.failed_count,
        skipped_replay = summary.skipped_replay,
        aborted = report.aborted,
        "apply finished"
    );
    Ok(ApplyOutput::Applied(AppliedView { plan, report }))
}

/// `status`: the last plan plus the last apply report when one exists.
pub fn status_command(session: &Session<'_>) -> Result<StatusView> {
    let plan = load_last_plan(&session.paths.last_plan_path)?;
    let last_apply = load_apply_report(&session.paths.last_apply_path)?;
    Ok(StatusView {
        preview: PlanPreview::new(plan, false),
        last_apply,
    })
}

/// `policy`: the discovered policy file and its effective rules.
pub fn policy_command(session: &Session<'_>, explicit: Option<&Path>) -> Result<PolicyView> {
    let location = discover_policy(explicit, &session.paths.policy_path);
    let policy = load_policy(&location)?;
    let source = match location {
        PolicyLocation::Explicit(_) => "explicit",
        PolicyLocation::Default(_) => "default",
        PolicyLocation::None => "none",
    };
    Ok(PolicyView {
        source: source.to_string(),
        path: location.path().map(|p| p.display().to_string()),
        policy,
    })
}

/// `planner`: show the effective command, or persist a new one with `--set`.
pub fn planner_command(session: &Session<'_>, set: Option<&str>) -> Result<PlannerView> {
    if let Some(command) = set {
        let command = command.trim();
        if command.is_empty() {
            return Err(AgentError::usage("--set requires a planner command").into());
        }
        let mut config = session.config.clone();
        config.planner_cmd = Some(command.to_string());
        write_config(&session.paths.config_path, &config)?;
        info!(path = %session.paths.config_path.display(), "planner command saved");
        return Ok(PlannerView {
            planner_cmd: Some(command.to_string()),
            source: "config".to_string(),
            saved: true,
        });
    }
    let resolved = resolve_planner_cmd(
        None,
        session.env.planner_cmd.as_deref(),
        session.config.planner_cmd.as_deref(),
    );
    Ok(match resolved {
        Some((command, source)) => PlannerView {
            planner_cmd: Some(command),
            source: source.to_string(),
            saved: false,
        },
        None => PlannerView {
            planner_cmd: None,
            source: "none".to_string(),
            saved: false,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::Value;

    use super::*;
    use crate::core::replay::ReplayJournal;
    use crate::io::api::Task;
    use crate::io::progress::{ACTION_COMPLETE, ACTION_START};
    use crate::test_support::{
        FakeBackend, FakeCatalog, FixedClock, SharedBuffer, plan_with, task_add, task_delete,
        temp_state,
    };

    const PLANNED: &str =
        r#"{"actions":[{"type":"task_add","content":"Buy milk","project":"Groceries"}]}"#;

    struct Fixture {
        temp: tempfile::TempDir,
        paths: AgentPaths,
        backend: FakeBackend,
        buffer: SharedBuffer,
        progress: Progress,
        clock: FixedClock,
    }

    impl Fixture {
        fn new() -> Self {
            let mut catalog = FakeCatalog::default();
            catalog.add_project("100", "Groceries");
            catalog.add_project("200", "Work");
            catalog.add_task("t1", "File expenses", "200", &[]);
            catalog.add_task("t2", "Buy bread", "100", &[]);
            let backend = FakeBackend::new(PLANNED, catalog);
            let buffer = SharedBuffer::default();
            let progress = Progress::new(Box::new(buffer.clone()), Box::new(FixedClock::default()));
            let (temp, paths) = temp_state();
            Self {
                temp,
                paths,
                backend,
                buffer,
                progress,
                clock: FixedClock::default(),
            }
        }

        fn session(&self) -> Session<'_> {
            Session {
                paths: self.paths.clone(),
                config: AgentConfig::default(),
                env: EnvOverrides::default(),
                profile: "default".to_string(),
                backend: &self.backend,
                progress: &self.progress,
                clock: &self.clock,
            }
        }

        fn plan_file(&self, plan: &Plan) -> String {
            let path = self.temp.path().join("plan.json");
            write_plan(&path, plan).expect("write plan");
            path.display().to_string()
        }

        fn event_types(&self) -> Vec<String> {
            self.buffer
                .events()
                .iter()
                .map(|e| e["type"].as_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    fn apply(fx: &Fixture, command: ApplyCommand, args: &ApplyArgs) -> Result<ApplyOutput> {
        apply_command(&fx.session(), command, args, &mut std::io::empty())
    }

    #[test]
    fn plan_writes_last_plan_and_out() {
        let fx = Fixture::new();
        let out = fx.temp.path().join("out").join("plan.json");
        let args = PlanArgs {
            instruction: "buy milk".to_string(),
            out: Some(out.display().to_string()),
            ..PlanArgs::default()
        };
        let preview = plan_command(&fx.session(), &args).expect("plan");
        assert_eq!(preview.action_count, 1);
        assert!(!preview.dry_run);

        let last = load_last_plan(&fx.paths.last_plan_path).expect("last");
        assert_eq!(last, preview.plan);
        assert!(out.exists());
        assert_eq!(fx.event_types(), vec![PLAN_LOADED]);
    }

    #[test]
    fn plan_requires_instruction() {
        let fx = Fixture::new();
        let err = plan_command(&fx.session(), &PlanArgs::default()).expect_err("empty");
        assert_eq!(classify(&err), Some(&AgentError::usage("instruction is required")));
    }

    #[test]
    fn apply_last_plan_with_confirm() {
        let fx = Fixture::new();
        let preview = plan_command(
            &fx.session(),
            &PlanArgs {
                instruction: "buy milk".to_string(),
                ..PlanArgs::default()
            },
        )
        .expect("plan");

        let args = ApplyArgs {
            confirm: Some(preview.plan.confirm_token.clone()),
            ..ApplyArgs::default()
        };
        let output = apply(&fx, ApplyCommand::Apply, &args).expect("apply");
        assert_eq!(output.exit_code(), exit_codes::OK);
        let ApplyOutput::Applied(view) = output else {
            panic!("expected applied output");
        };
        assert_eq!(view.report.summary.ok_count, 1);
        assert_eq!(view.plan.applied_at.as_deref(), Some("2026-02-07T09:00:00Z"));
        assert_eq!(fx.backend.api.calls(), vec!["POST /tasks".to_string()]);

        let paths = &fx.paths;
        let report = load_apply_report(&paths.last_apply_path)
            .expect("read report")
            .expect("report written");
        assert_eq!(report.command, "apply");
        let journal: ReplayJournal =
            serde_json::from_str(&fs::read_to_string(&paths.journal_path).expect("journal"))
                .expect("journal json");
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn unconfirmed_run_keeps_plan_for_later_apply() {
        let fx = Fixture::new();
        let out = fx.temp.path().join("proposed.json");
        let args = ApplyArgs {
            instruction: Some("buy milk".to_string()),
            out: Some(out.display().to_string()),
            ..ApplyArgs::default()
        };
        let err = apply(&fx, ApplyCommand::Run, &args).expect_err("needs confirm");
        assert_eq!(
            classify(&err),
            Some(&AgentError::usage("--confirm is required (or use --force)"))
        );
        assert!(fx.backend.api.calls().is_empty());

        let saved = load_last_plan(&fx.paths.last_plan_path).expect("plan saved");
        assert!(format!("{err:#}").contains(&saved.confirm_token));
        assert!(out.exists());

        let confirm = ApplyArgs {
            confirm: Some(saved.confirm_token.clone()),
            ..ApplyArgs::default()
        };
        let output = apply(&fx, ApplyCommand::Apply, &confirm).expect("apply saved plan");
        assert_eq!(output.exit_code(), exit_codes::OK);
        assert_eq!(fx.backend.api.calls(), vec!["POST /tasks".to_string()]);
    }

    #[test]
    fn dry_run_never_dispatches() {
        let fx = Fixture::new();
        let plan = plan_with("abcd", vec![task_delete("7")]);
        let args = ApplyArgs {
            plan: Some(fx.plan_file(&plan)),
            dry_run: true,
            ..ApplyArgs::default()
        };
        let output = apply(&fx, ApplyCommand::Apply, &args).expect("dry run");
        assert!(matches!(output, ApplyOutput::DryRun(ref p) if p.dry_run));
        assert!(fx.backend.api.calls().is_empty());
        assert!(!fx.paths.journal_path.exists());
        assert_eq!(fx.event_types(), vec![PLAN_LOADED, APPLY_SUMMARY]);
    }

    #[test]
    fn continue_mode_reports_partial() {
        let fx = Fixture::new();
        fx.backend.api.fail_path("/tasks/7");
        let plan = plan_with("abcd", vec![task_delete("7"), task_add("next")]);
        let args = ApplyArgs {
            plan: Some(fx.plan_file(&plan)),
            confirm: Some("abcd".to_string()),
            on_error: OnError::Continue,
            ..ApplyArgs::default()
        };
        let output = apply(&fx, ApplyCommand::Apply, &args).expect("apply");
        assert_eq!(output.exit_code(), exit_codes::PARTIAL);

        let summary = fx
            .buffer
            .events()
            .into_iter()
            .find(|e| e["type"] == APPLY_SUMMARY)
            .expect("summary event");
        assert_eq!(summary["ok_count"], 1);
        assert_eq!(summary["failed_count"], 1);
        assert!(summary["error"].as_str().is_some_and(|e| e.contains("action 0 (task_delete)")));
    }

    #[test]
    fn fail_mode_abort_exits_with_error() {
        let fx = Fixture::new();
        fx.backend.api.fail_path("/tasks/7");
        let plan = plan_with("abcd", vec![task_delete("7"), task_add("next")]);
        let args = ApplyArgs {
            plan: Some(fx.plan_file(&plan)),
            force: true,
            ..ApplyArgs::default()
        };
        let output = apply(&fx, ApplyCommand::Apply, &args).expect("apply");
        assert_eq!(output.exit_code(), exit_codes::ERROR);
        let ApplyOutput::Applied(view) = output else {
            panic!("expected applied output");
        };
        assert!(view.plan.applied_at.is_none());
        assert_eq!(view.report.results.len(), 1);
    }

    #[test]
    fn run_emits_run_level_events() {
        let fx = Fixture::new();
        let args = ApplyArgs {
            instruction: Some("buy milk".to_string()),
            force: true,
            ..ApplyArgs::default()
        };
        apply(&fx, ApplyCommand::Run, &args).expect("run");
        assert_eq!(
            fx.event_types(),
            vec![
                RUN_START,
                PLAN_LOADED,
                ACTION_START,
                ACTION_COMPLETE,
                APPLY_SUMMARY,
                RUN_COMPLETE,
            ]
        );
        let sent: Value =
            serde_json::from_slice(&fx.backend.planner.last_input()).expect("planner input");
        assert_eq!(sent["context"]["projects"][0]["name"], "Groceries");
    }

    #[test]
    fn run_without_plan_or_instruction_is_usage_error() {
        let fx = Fixture::new();
        let err = apply(&fx, ApplyCommand::Run, &ApplyArgs::default()).expect_err("usage");
        assert_eq!(
            classify(&err),
            Some(&AgentError::usage("instruction is required when --plan is not provided"))
        );
        let events = fx.event_types();
        assert_eq!(events, vec![RUN_START, RUN_ERROR]);
    }

    #[test]
    fn context_flags_reach_the_planner() {
        let fx = Fixture::new();
        let args = PlanArgs {
            instruction: "tidy work".to_string(),
            context: ContextArgs {
                projects: vec!["work".to_string()],
                ..ContextArgs::default()
            },
            ..PlanArgs::default()
        };
        plan_command(&fx.session(), &args).expect("plan");
        let sent: Value =
            serde_json::from_slice(&fx.backend.planner.last_input()).expect("planner input");
        let tasks: Vec<Task> =
            serde_json::from_value(sent["context"]["active_tasks"].clone()).expect("tasks");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "t1");
        assert_eq!(sent["context"]["projects"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn status_shows_last_apply() {
        let fx = Fixture::new();
        let err = status_command(&fx.session()).expect_err("no plan");
        assert_eq!(classify(&err), Some(&AgentError::not_found("no last plan found")));

        let plan = plan_with("abcd", vec![task_add("x")]);
        let args = ApplyArgs {
            plan: Some(fx.plan_file(&plan)),
            confirm: Some("abcd".to_string()),
            ..ApplyArgs::default()
        };
        apply(&fx, ApplyCommand::Apply, &args).expect("apply");
        let status = status_command(&fx.session()).expect("status");
        assert_eq!(status.preview.plan.confirm_token, "abcd");
        assert_eq!(status.last_apply.expect("report").summary.ok_count, 1);
    }

    #[test]
    fn planner_set_persists_to_config() {
        let fx = Fixture::new();
        let view = planner_command(&fx.session(), Some(" my-planner --fast ")).expect("set");
        assert!(view.saved);

        let (config, _) =
            load_session_config(&fx.paths, None).expect("config");
        assert_eq!(config.planner_cmd.as_deref(), Some("my-planner --fast"));

        let mut session = fx.session();
        session.config = config;
        session.env.planner_cmd = Some("env-planner".to_string());
        let view = planner_command(&session, None).expect("show");
        assert_eq!(view.planner_cmd.as_deref(), Some("env-planner"));
        assert_eq!(view.source, "env");
    }

    #[test]
    fn policy_reports_discovered_file() {
        let fx = Fixture::new();
        let view = policy_command(&fx.session(), None).expect("policy");
        assert_eq!(view.source, "none");

        let paths = &fx.paths;
        fs::write(&paths.policy_path, r#"{"deny_action_types":["project_delete"]}"#)
            .expect("write policy");
        let view = policy_command(&fx.session(), None).expect("policy");
        assert_eq!(view.source, "default");
        assert!(view.policy.expect("policy").deny_action_types.contains("project_delete"));
    }

    #[test]
    fn live_backend_requires_token_only_for_api() {
        let backend = LiveBackend::new(&AgentConfig::default(), &EnvOverrides::default())
            .expect("backend");
        let err = backend.task_api().err().expect("no token");
        assert!(matches!(classify(&err), Some(AgentError::Usage(_))));
        let err = backend.planner(None).err().expect("no planner");
        assert_eq!(
            classify(&err),
            Some(&AgentError::usage(
                "no planner configured; set TASKAGENT_PLANNER_CMD, pass --planner, \
                 or run `taskagent planner --set <cmd>`"
            ))
        );
        assert!(backend.planner(Some("cat")).is_ok());
    }
}

//! Task agent CLI.
//!
//! Turns an instruction into a plan via an external planner command, previews
//! it, and applies it to the task manager once the user confirms the plan's
//! token. State lives under `--state-dir`, `TASKAGENT_HOME` or the platform
//! config directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use taskagent::agent::{
    ApplyArgs, ApplyCommand, ApplyOutput, ContextArgs, LiveBackend, PlanArgs, Session,
    apply_command, load_session_config, plan_command, planner_command, policy_command,
    status_command,
};
use taskagent::clock::SystemClock;
use taskagent::core::outcome::OnError;
use taskagent::core::schedule::RunArgs;
use taskagent::error::exit_code_for;
use taskagent::exit_codes;
use taskagent::io::config::EnvOverrides;
use taskagent::io::paths::AgentPaths;
use taskagent::io::plan_store::PLAN_SCHEMA;
use taskagent::io::progress::Progress;
use taskagent::logging;
use taskagent::report::{EXAMPLES, render};
use taskagent::schedule::{ScheduleFormat, render_schedule};

#[derive(Parser)]
#[command(
    name = "taskagent",
    version,
    about = "Plan and apply task-manager changes with an external planner",
    after_help = EXAMPLES
)]
struct Cli {
    /// State directory (defaults to $TASKAGENT_HOME, then the config dir).
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Append progress events as JSON lines to PATH (`-` for stderr).
    #[arg(long, global = true, value_name = "PATH")]
    progress_jsonl: Option<String>,

    /// Profile name passed to the planner.
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the planner for a plan and save it as the last plan.
    Plan {
        /// Instruction for the planner.
        #[arg(value_name = "INSTRUCTION", required = true)]
        instruction: Vec<String>,

        /// Also write the plan to this file.
        #[arg(long, value_name = "PATH")]
        out: Option<String>,

        /// Planner command for this invocation.
        #[arg(long)]
        planner: Option<String>,

        /// Expected plan version (0 = current).
        #[arg(long, default_value_t = 0)]
        plan_version: u32,

        #[command(flatten)]
        context: ContextFlags,
    },
    /// Apply a plan file, stdin (`--plan -`), a fresh plan or the last plan.
    Apply {
        /// Instruction for the planner (same as --instruction).
        #[arg(value_name = "INSTRUCTION", conflicts_with = "instruction")]
        words: Vec<String>,

        #[command(flatten)]
        flags: ApplyFlags,
    },
    /// Plan and apply in one step.
    Run {
        /// Instruction for the planner (same as --instruction).
        #[arg(value_name = "INSTRUCTION", conflicts_with = "instruction")]
        words: Vec<String>,

        #[command(flatten)]
        flags: ApplyFlags,
    },
    /// Show the last plan and the last apply result.
    Status,
    /// Show the effective agent policy.
    Policy {
        /// Policy file to inspect instead of the default.
        #[arg(long, value_name = "PATH")]
        policy: Option<PathBuf>,
    },
    /// Show or set the planner command.
    Planner {
        /// Save this planner command to config.toml.
        #[arg(long, value_name = "COMMAND")]
        set: Option<String>,
    },
    /// Scheduler entries for recurring runs.
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
    /// Print the plan JSON schema.
    Schema,
    /// Print usage examples.
    Examples,
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Print a launchd plist (or a crontab line) for a weekly run.
    Print(ScheduleFlags),
}

#[derive(Args, Debug, Default)]
struct ContextFlags {
    /// Limit planner context to this project (repeatable).
    #[arg(long = "context-project", value_name = "NAME")]
    projects: Vec<String>,

    /// Limit planner context to tasks with this label (repeatable).
    #[arg(long = "context-label", value_name = "NAME")]
    labels: Vec<String>,

    /// Include tasks completed in the last N days (`N` or `Nd`).
    #[arg(long = "context-completed", value_name = "DAYS")]
    completed: Option<String>,
}

impl ContextFlags {
    fn into_args(self) -> ContextArgs {
        ContextArgs {
            projects: self.projects,
            labels: self.labels,
            completed: self.completed,
        }
    }
}

#[derive(Args, Debug, Default)]
struct ApplyFlags {
    /// Plan file to apply (`-` reads stdin).
    #[arg(long, value_name = "PATH")]
    plan: Option<String>,

    /// Generate a fresh plan from this instruction.
    #[arg(long)]
    instruction: Option<String>,

    /// Confirmation token shown in the plan preview.
    #[arg(long)]
    confirm: Option<String>,

    /// Skip the confirmation check.
    #[arg(long)]
    force: bool,

    /// Preview only; nothing is sent to the API.
    #[arg(long)]
    dry_run: bool,

    /// What to do after a failed action: fail or continue.
    #[arg(long, default_value = "fail")]
    on_error: OnError,

    /// Policy file (defaults to agent_policy.json in the state dir).
    #[arg(long, value_name = "PATH")]
    policy: Option<PathBuf>,

    /// Expected plan version (0 = current).
    #[arg(long, default_value_t = 0)]
    plan_version: u32,

    /// Planner command for this invocation.
    #[arg(long)]
    planner: Option<String>,

    /// Also write the resulting plan to this file.
    #[arg(long, value_name = "PATH")]
    out: Option<String>,

    #[command(flatten)]
    context: ContextFlags,
}

impl ApplyFlags {
    /// Positional words, when given, become the instruction.
    fn with_words(self, words: Vec<String>) -> ApplyArgs {
        let mut args = self.into_args();
        if !words.is_empty() {
            args.instruction = Some(words.join(" "));
        }
        args
    }

    fn into_args(self) -> ApplyArgs {
        ApplyArgs {
            plan: self.plan,
            instruction: self.instruction,
            confirm: self.confirm,
            force: self.force,
            dry_run: self.dry_run,
            on_error: self.on_error,
            policy: self.policy,
            plan_version: self.plan_version,
            planner: self.planner,
            out: self.out,
            context: self.context.into_args(),
        }
    }
}

#[derive(Args, Debug)]
struct ScheduleFlags {
    /// Weekday and time, e.g. "sat 09:00".
    #[arg(long)]
    weekly: String,

    /// Print a crontab line instead of a launchd plist.
    #[arg(long)]
    cron: bool,

    /// Binary to schedule (defaults to this executable).
    #[arg(long)]
    bin: Option<String>,

    #[arg(long, value_name = "PATH")]
    plan: Option<String>,

    #[arg(long)]
    instruction: Option<String>,

    #[arg(long)]
    planner: Option<String>,

    #[arg(long)]
    confirm: Option<String>,

    #[arg(long)]
    force: bool,

    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value = "fail")]
    on_error: OnError,

    #[arg(long, default_value_t = 0)]
    plan_version: u32,

    #[command(flatten)]
    context: ContextFlags,
}

impl ScheduleFlags {
    fn run_args(&self) -> RunArgs {
        RunArgs {
            plan: self.plan.clone(),
            instruction: self.instruction.clone(),
            planner: self.planner.clone(),
            confirm: self.confirm.clone(),
            context_projects: self.context.projects.clone(),
            context_labels: self.context.labels.clone(),
            context_completed: self.context.completed.clone(),
            force: self.force,
            dry_run: self.dry_run,
            on_error: self.on_error,
            plan_version: self.plan_version,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Schema => {
            print!("{PLAN_SCHEMA}");
            if !PLAN_SCHEMA.ends_with('\n') {
                println!();
            }
            return Ok(exit_codes::OK);
        }
        Command::Examples => {
            print!("{EXAMPLES}");
            return Ok(exit_codes::OK);
        }
        Command::Schedule {
            command: ScheduleCommand::Print(flags),
        } => {
            let format = if flags.cron {
                ScheduleFormat::Cron
            } else {
                ScheduleFormat::Launchd
            };
            let bin = flags.bin.clone().unwrap_or_else(default_bin);
            let out = render_schedule(
                &flags.weekly,
                format,
                &bin,
                &flags.run_args(),
                &std::env::temp_dir(),
            )?;
            print!("{out}");
            return Ok(exit_codes::OK);
        }
        _ => {}
    }

    let env = EnvOverrides::from_process();
    let paths = AgentPaths::resolve(cli.state_dir.as_deref(), env.home.as_deref())?;
    let (config, profile) = load_session_config(&paths, cli.profile.as_deref())?;
    let backend = LiveBackend::new(&config, &env)?;
    let progress = Progress::open(cli.progress_jsonl.as_deref(), Box::new(SystemClock))?;
    let session = Session {
        paths,
        config,
        env,
        profile,
        backend: &backend,
        progress: &progress,
        clock: &SystemClock,
    };
    let json = cli.json;

    match cli.command {
        Command::Plan {
            instruction,
            out,
            planner,
            plan_version,
            context,
        } => {
            let args = PlanArgs {
                instruction: instruction.join(" "),
                out,
                planner,
                plan_version,
                context: context.into_args(),
            };
            let preview = plan_command(&session, &args)?;
            print!("{}", render(&preview, json)?);
            Ok(exit_codes::OK)
        }
        Command::Apply { words, flags } => {
            apply(&session, ApplyCommand::Apply, flags.with_words(words), json)
        }
        Command::Run { words, flags } => {
            apply(&session, ApplyCommand::Run, flags.with_words(words), json)
        }
        Command::Status => {
            print!("{}", render(&status_command(&session)?, json)?);
            Ok(exit_codes::OK)
        }
        Command::Policy { policy } => {
            print!("{}", render(&policy_command(&session, policy.as_deref())?, json)?);
            Ok(exit_codes::OK)
        }
        Command::Planner { set } => {
            print!("{}", render(&planner_command(&session, set.as_deref())?, json)?);
            Ok(exit_codes::OK)
        }
        Command::Schema | Command::Examples | Command::Schedule { .. } => Ok(exit_codes::OK),
    }
}

fn apply(session: &Session<'_>, command: ApplyCommand, args: ApplyArgs, json: bool) -> Result<i32> {
    let output = apply_command(session, command, &args, &mut std::io::stdin().lock())?;
    let rendered = match &output {
        ApplyOutput::DryRun(preview) => render(preview, json)?,
        ApplyOutput::Applied(view) => render(view, json)?,
    };
    print!("{rendered}");
    Ok(output.exit_code())
}

fn default_bin() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| "taskagent".to_string())
}

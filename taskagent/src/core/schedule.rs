//! Weekly schedule parsing and scheduler command lines for `taskagent run`.

use crate::core::outcome::OnError;
use crate::error::AgentError;

/// Weekly trigger. `weekday` uses launchd numbering: sunday = 1 .. saturday = 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySpec {
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
}

impl WeeklySpec {
    /// Cron numbering: sunday = 0 .. saturday = 6.
    pub fn cron_weekday(&self) -> u8 {
        self.weekday.saturating_sub(1) % 7
    }
}

/// Parse `"<day> HH:MM"`, e.g. `"sat 09:00"`.
pub fn parse_weekly_spec(input: &str) -> Result<WeeklySpec, AgentError> {
    let lowered = input.trim().to_lowercase();
    let parts: Vec<&str> = lowered.split_whitespace().collect();
    let [day, time] = parts.as_slice() else {
        return Err(AgentError::usage("weekly spec must be like \"sat 09:00\""));
    };
    let weekday =
        launchd_weekday(day).ok_or_else(|| AgentError::usage(format!("invalid weekday: {day}")))?;
    let (hour, minute) = parse_time(time)?;
    Ok(WeeklySpec {
        weekday,
        hour,
        minute,
    })
}

fn launchd_weekday(day: &str) -> Option<u8> {
    let weekday = match day {
        "sun" | "sunday" => 1,
        "mon" | "monday" => 2,
        "tue" | "tues" | "tuesday" => 3,
        "wed" | "weds" | "wednesday" => 4,
        "thu" | "thur" | "thurs" | "thursday" => 5,
        "fri" | "friday" => 6,
        "sat" | "saturday" => 7,
        _ => return None,
    };
    Some(weekday)
}

fn parse_time(value: &str) -> Result<(u8, u8), AgentError> {
    let Some((hour, minute)) = value.split_once(':') else {
        return Err(AgentError::usage("time must be HH:MM"));
    };
    let hour = hour
        .parse::<u8>()
        .ok()
        .filter(|h| *h <= 23)
        .ok_or_else(|| AgentError::usage("invalid hour in time"))?;
    let minute = minute
        .parse::<u8>()
        .ok()
        .filter(|m| *m <= 59)
        .ok_or_else(|| AgentError::usage("invalid minute in time"))?;
    Ok((hour, minute))
}

/// Flags forwarded to the scheduled `taskagent run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    pub plan: Option<String>,
    pub instruction: Option<String>,
    pub planner: Option<String>,
    pub confirm: Option<String>,
    pub context_projects: Vec<String>,
    pub context_labels: Vec<String>,
    pub context_completed: Option<String>,
    pub force: bool,
    pub dry_run: bool,
    pub on_error: OnError,
    pub plan_version: u32,
}

/// Argument vector (without the binary) for a scheduled run.
pub fn build_run_args(opts: &RunArgs) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    let mut push = |flag: &str, value: &str| {
        args.push(flag.to_string());
        args.push(value.to_string());
    };
    if let Some(plan) = non_blank(&opts.plan) {
        push("--plan", plan);
    }
    if let Some(instruction) = non_blank(&opts.instruction) {
        push("--instruction", instruction);
    }
    if let Some(planner) = non_blank(&opts.planner) {
        push("--planner", planner);
    }
    if let Some(confirm) = non_blank(&opts.confirm) {
        push("--confirm", confirm);
    }
    for project in &opts.context_projects {
        push("--context-project", project);
    }
    for label in &opts.context_labels {
        push("--context-label", label);
    }
    if let Some(window) = non_blank(&opts.context_completed) {
        push("--context-completed", window);
    }
    if opts.on_error != OnError::Fail {
        push("--on-error", opts.on_error.as_str());
    }
    if opts.plan_version > 0 {
        push("--plan-version", &opts.plan_version.to_string());
    }
    if opts.force {
        args.push("--force".to_string());
    }
    if opts.dry_run {
        args.push("--dry-run".to_string());
    }
    args
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Crontab entry: `M H * * W <bin> <args...>` with shell quoting.
pub fn cron_line(spec: &WeeklySpec, bin: &str, args: &[String]) -> String {
    let command: Vec<String> = std::iter::once(bin)
        .chain(args.iter().map(String::as_str))
        .map(shell_escape)
        .collect();
    format!(
        "{} {} * * {} {}",
        spec.minute,
        spec.hour,
        spec.cron_weekday(),
        command.join(" ")
    )
}

/// Single-quote a word when it contains whitespace or shell metacharacters.
pub fn shell_escape(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let needs_quotes = value.chars().any(|c| {
        c.is_whitespace()
            || matches!(
                c,
                '"' | '\'' | '\\' | '$' | '`' | ';' | '&' | '|' | '<' | '>' | '*' | '?' | '('
                    | ')' | '#' | '~' | '%'
            )
    });
    if !needs_quotes {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

//! `schedule print`: a weekly launchd job or crontab line running `taskagent run`.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{AutoEscape, Environment, context};
use tracing::debug;

use crate::core::schedule::{RunArgs, WeeklySpec, build_run_args, cron_line, parse_weekly_spec};

const PLIST_TEMPLATE: &str = include_str!("templates/launchd.plist.j2");

pub const LAUNCHD_LABEL: &str = "com.taskagent.weekly";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFormat {
    Launchd,
    Cron,
}

/// Render the scheduler entry for `weekly` (e.g. `"sat 09:00"`).
///
/// Launchd output sends the job's stdout/stderr to `taskagent.log` and
/// `taskagent.err` under `log_dir`.
pub fn render_schedule(
    weekly: &str,
    format: ScheduleFormat,
    bin: &str,
    run: &RunArgs,
    log_dir: &Path,
) -> Result<String> {
    let spec = parse_weekly_spec(weekly)?;
    let args = build_run_args(run);
    debug!(?format, weekday = spec.weekday, hour = spec.hour, minute = spec.minute, "rendering schedule");
    match format {
        ScheduleFormat::Cron => Ok(format!("{}\n", cron_line(&spec, bin, &args))),
        ScheduleFormat::Launchd => launchd_plist(&spec, bin, &args, log_dir),
    }
}

pub fn launchd_plist(spec: &WeeklySpec, bin: &str, args: &[String], log_dir: &Path) -> Result<String> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_filter("xml", xml_escape);
    env.add_template("launchd", PLIST_TEMPLATE)
        .context("load launchd template")?;

    let program: Vec<&str> = std::iter::once(bin)
        .chain(args.iter().map(String::as_str))
        .collect();
    let template = env.get_template("launchd")?;
    let mut rendered = template
        .render(context! {
            label => LAUNCHD_LABEL,
            program => program,
            weekday => spec.weekday,
            hour => spec.hour,
            minute => spec.minute,
            stdout_path => log_dir.join("taskagent.log").display().to_string(),
            stderr_path => log_dir.join("taskagent.err").display().to_string(),
        })
        .context("render launchd plist")?;
    rendered.push('\n');
    Ok(rendered)
}

fn xml_escape(value: String) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::OnError;
    use crate::error::{AgentError, classify};

    fn run_args() -> RunArgs {
        RunArgs {
            instruction: Some("weekly review & cleanup".to_string()),
            confirm: Some("abcd1234".to_string()),
            on_error: OnError::Continue,
            ..RunArgs::default()
        }
    }

    #[test]
    fn cron_output_is_one_quoted_line() {
        let out = render_schedule(
            "sat 09:30",
            ScheduleFormat::Cron,
            "/usr/local/bin/taskagent",
            &run_args(),
            Path::new("/tmp"),
        )
        .expect("render");
        assert_eq!(
            out,
            "30 9 * * 6 /usr/local/bin/taskagent run --instruction 'weekly review & cleanup' \
             --confirm abcd1234 --on-error continue\n"
        );
    }

    #[test]
    fn plist_escapes_arguments() {
        let out = render_schedule(
            "mon 07:05",
            ScheduleFormat::Launchd,
            "/opt/taskagent",
            &run_args(),
            Path::new("/var/log"),
        )
        .expect("render");
        assert!(out.contains("<string>com.taskagent.weekly</string>"));
        assert!(out.contains("      <string>/opt/taskagent</string>\n      <string>run</string>"));
        assert!(out.contains("<string>weekly review &amp; cleanup</string>"));
        assert!(out.contains("<key>Weekday</key>\n      <integer>2</integer>"));
        assert!(out.contains("<key>Minute</key>\n      <integer>5</integer>"));
        assert!(out.contains("<string>/var/log/taskagent.err</string>"));
        assert!(out.ends_with("</plist>\n"));
    }

    #[test]
    fn bad_weekly_spec_is_usage_error() {
        let err = render_schedule(
            "someday 9am",
            ScheduleFormat::Cron,
            "taskagent",
            &RunArgs::default(),
            Path::new("/tmp"),
        )
        .expect_err("invalid");
        assert_eq!(classify(&err), Some(&AgentError::usage("invalid weekday: someday")));
    }
}

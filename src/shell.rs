//! Shell command jobs.
//!
//! Each command runs through `sh -c`. The job's value is the command's
//! standard output with trailing whitespace removed; a non-zero exit status
//! fails the job.

use crate::job::Job;
use anyhow::{Context, bail};
use tokio::process::Command;

/// Build a job that runs `command` in a shell.
pub fn command_job(command: impl Into<String>) -> Job<String> {
    let command = command.into();
    let label = command.clone();

    Job::future(move || async move {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn `{}`", command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("`{}` exited with {}: {}", command, output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    })
    .with_label(label)
}

/// Extract the command from one line of a job script.
///
/// Blank lines and `#` comments yield `None`.
pub fn parse_job_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        None
    } else {
        Some(line)
    }
}

/// Turn a job script into shell command jobs.
pub fn parse_job_script(script: &str) -> Vec<Job<String>> {
    script.lines().filter_map(parse_job_line).map(command_job).collect()
}

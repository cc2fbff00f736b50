//! The second pass: a metadata-driven renamer run as an external program.
//!
//! The program is run in dry-run mode first and its human-readable output is
//! scraped for three lines: `Old filename`, `New filename` and
//! `<name> will be moved to <directory>`. The last line carrying each keyword
//! wins.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::config::RenamerCommand;
use crate::error::RenameError;

pub const SERIES_PLACEHOLDER: &str = "{series}";
pub const DESTINATION_PLACEHOLDER: &str = "{destination}";

const OLD_FILENAME: &str = "Old filename";
const NEW_FILENAME: &str = "New filename";
const MOVED_TO: &str = "moved to";

/// What the metadata renamer says it will do with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameProposal {
    pub old_name: String,
    pub new_name: String,
    pub destination_dir: PathBuf,
}

#[allow(async_fn_in_trait)]
pub trait SecondaryRenamer {
    /// Dry run. Nothing on disk may change.
    async fn propose_rename(
        &self,
        path: &Path,
        destination: &Path,
    ) -> Result<RenameProposal, RenameError>;

    async fn apply_rename(&self, path: &Path, destination: &Path) -> Result<(), RenameError>;
}

impl<T: SecondaryRenamer> SecondaryRenamer for &T {
    async fn propose_rename(
        &self,
        path: &Path,
        destination: &Path,
    ) -> Result<RenameProposal, RenameError> {
        (**self).propose_rename(path, destination).await
    }

    async fn apply_rename(&self, path: &Path, destination: &Path) -> Result<(), RenameError> {
        (**self).apply_rename(path, destination).await
    }
}

/// Directory template with a single `{series}` substitution point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTemplate(String);

impl DestinationTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn resolve(&self, series: &str) -> PathBuf {
        PathBuf::from(self.0.replacen(SERIES_PLACEHOLDER, series, 1))
    }
}

/// Series name for a file headed into the secondary stage: the configured one,
/// else whatever precedes ` - ` in the file stem.
pub fn series_for(path: &Path, configured: Option<&str>) -> String {
    if let Some(series) = configured {
        return series.to_string();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once(" - ") {
        Some((series, _)) => series.trim().to_string(),
        None => stem.trim().to_string(),
    }
}

/// Pulls the three keyword lines out of the renamer's stdout.
pub fn parse_renamer_output(output: &str) -> Option<RenameProposal> {
    let mut old_name = None;
    let mut new_name = None;
    let mut destination = None;

    for line in output.lines() {
        if line.contains(OLD_FILENAME) {
            old_name = Some(value_after(line, OLD_FILENAME));
        }
        if line.contains(NEW_FILENAME) {
            new_name = Some(value_after(line, NEW_FILENAME));
        }
        if let Some((_, dir)) = line.rsplit_once(MOVED_TO) {
            destination = Some(dir.trim().to_string());
        }
    }

    Some(RenameProposal {
        old_name: old_name.filter(|s| !s.is_empty())?,
        new_name: new_name.filter(|s| !s.is_empty())?,
        destination_dir: PathBuf::from(destination.filter(|s| !s.is_empty())?),
    })
}

fn value_after(line: &str, keyword: &str) -> String {
    let rest = line
        .split_once(keyword)
        .map_or(line, |(_, rest)| rest)
        .trim_start();
    rest.strip_prefix(':').unwrap_or(rest).trim().to_string()
}

/// Runs the configured renamer program.
#[derive(Debug, Clone)]
pub struct CommandRenamer {
    command: RenamerCommand,
}

impl CommandRenamer {
    pub fn new(command: RenamerCommand) -> Self {
        Self { command }
    }

    fn build_args(template: &[String], path: &Path, destination: &Path) -> Vec<String> {
        let destination = destination.to_string_lossy();
        let mut args: Vec<String> = template
            .iter()
            .map(|arg| arg.replace(DESTINATION_PLACEHOLDER, &destination))
            .collect();
        args.push(path.to_string_lossy().into_owned());
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<String, RenameError> {
        let program = &self.command.program;
        debug!("Running {program} {}", args.join(" "));

        let output = Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| RenameError::external(program, format!("failed to start: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenameError::external(
                program,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(stdout)
    }
}

impl SecondaryRenamer for CommandRenamer {
    async fn propose_rename(
        &self,
        path: &Path,
        destination: &Path,
    ) -> Result<RenameProposal, RenameError> {
        let args = Self::build_args(&self.command.dry_run_args, path, destination);
        let stdout = self.run(args).await?;
        parse_renamer_output(&stdout).ok_or_else(|| {
            RenameError::external(
                &self.command.program,
                format!("could not understand dry-run output for {}", path.display()),
            )
        })
    }

    async fn apply_rename(&self, path: &Path, destination: &Path) -> Result<(), RenameError> {
        let args = Self::build_args(&self.command.apply_args, path, destination);
        self.run(args).await.map(|_| ())
    }
}

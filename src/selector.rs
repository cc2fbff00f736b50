use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolCommand;
use crate::error::RenameError;

/// Picks the files to work on from a candidate list.
#[allow(async_fn_in_trait)]
pub trait Selector {
    async fn select(&self, candidates: &[PathBuf]) -> Result<Vec<PathBuf>, RenameError>;
}

impl<T: Selector> Selector for &T {
    async fn select(&self, candidates: &[PathBuf]) -> Result<Vec<PathBuf>, RenameError> {
        (**self).select(candidates).await
    }
}

/// Takes every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectAll;

impl Selector for SelectAll {
    async fn select(&self, candidates: &[PathBuf]) -> Result<Vec<PathBuf>, RenameError> {
        Ok(candidates.to_vec())
    }
}

/// Runs an external fuzzy selector: candidates go in on stdin one per line,
/// the chosen paths come back on stdout the same way.
#[derive(Debug, Clone)]
pub struct CommandSelector {
    command: ToolCommand,
}

impl CommandSelector {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl Selector for CommandSelector {
    async fn select(&self, candidates: &[PathBuf]) -> Result<Vec<PathBuf>, RenameError> {
        let program = &self.command.program;
        let mut child = Command::new(program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RenameError::external(program, format!("failed to start: {e}")))?;

        let list = candidates
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(list.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }

        let output = child.wait_with_output().await?;
        // Cancelling the selector exits non-zero with nothing on stdout.
        if !output.status.success() {
            debug!("{program} exited with {}", output.status);
        }

        Ok(parse_selection(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// One path per non-blank line, order preserved.
pub fn parse_selection(output: &str) -> Vec<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        let paths = parse_selection("b.mkv\n\n  a.mkv  \r\n");
        assert_eq!(paths, vec![PathBuf::from("b.mkv"), PathBuf::from("a.mkv")]);
        assert!(parse_selection("\n \n").is_empty());
    }

    #[tokio::test]
    async fn test_select_all() {
        let candidates = vec![PathBuf::from("x.mkv")];
        assert_eq!(SelectAll.select(&candidates).await.unwrap(), candidates);
    }

    #[tokio::test]
    async fn test_missing_selector_program() {
        let selector =
            CommandSelector::new(ToolCommand::new("episode-rename-no-such-selector", &[]));
        let err = selector.select(&[PathBuf::from("a")]).await.unwrap_err();
        assert!(matches!(err, RenameError::ExternalTool { .. }));
    }
}

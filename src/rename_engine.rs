use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RenameConfig;
use crate::error::{MoveError, RenameError};
use crate::normalizer;

/// A proposed rename inside the file's own directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub original_path: PathBuf,
    pub original_name: String,
    pub new_name: String,
}

impl RenamePlan {
    pub fn target_path(&self) -> PathBuf {
        self.original_path.with_file_name(&self.new_name)
    }

    pub fn needs_rename(&self) -> bool {
        self.original_name != self.new_name
    }
}

/// A committed (or no-op) rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
}

#[derive(Debug)]
pub struct RenameResult {
    pub plan: RenamePlan,
    pub outcome: Result<RenameOutcome, MoveError>,
}

/// Per-file results of one commit pass, in batch order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<RenameResult>,
}

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    original_path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_path: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl BatchReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &RenameOutcome> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&RenamePlan, &MoveError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (&r.plan, e)))
    }

    /// Paths to hand to the next stage.
    pub fn renamed_paths(&self) -> Vec<PathBuf> {
        self.outcomes().map(|o| o.new_path.clone()).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes().count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn to_json(&self) -> Result<String, RenameError> {
        let entries: Vec<ReportEntry<'_>> = self
            .results
            .iter()
            .map(|r| match &r.outcome {
                Ok(outcome) => ReportEntry {
                    original_path: &outcome.original_path,
                    new_path: Some(&outcome.new_path),
                    error: None,
                },
                Err(e) => ReportEntry {
                    original_path: &r.plan.original_path,
                    new_path: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), RenameError> {
        fs::write(path, self.to_json()?)?;
        info!("Wrote rename report to {}", path.display());
        Ok(())
    }
}

#[derive(Debug)]
pub struct RenameEngine<'a> {
    config: &'a RenameConfig,
}

impl<'a> RenameEngine<'a> {
    pub fn new(config: &'a RenameConfig) -> Self {
        Self { config }
    }

    /// Files directly inside the base directory whose name contains the
    /// search term (case-insensitive), sorted by name. Hidden files are skipped.
    pub fn scan_directory(&self) -> Result<Vec<PathBuf>, RenameError> {
        let directory = &self.config.directory;
        let needle = self.config.search.as_deref().map(str::to_lowercase);

        let mut files: Vec<PathBuf> = fs::read_dir(directory)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().to_lowercase();
                !name.starts_with('.')
                    && needle.as_deref().is_none_or(|needle| name.contains(needle))
            })
            .map(|entry| entry.path())
            .collect();
        files.sort();

        debug!(
            "Found {} candidate file(s) in {}",
            files.len(),
            directory.display()
        );
        Ok(files)
    }

    /// Computes the canonical name for one file. Touches nothing on disk.
    pub fn plan(&self, path: &Path) -> Result<RenamePlan, RenameError> {
        let original_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| RenameError::NoEpisodeMarker {
                file: path.display().to_string(),
            })?;

        let new_name = normalizer::normalize(&self.config.request_for(&original_name))?;
        debug!("Planned '{original_name}' -> '{new_name}'");

        Ok(RenamePlan {
            original_path: path.to_path_buf(),
            original_name,
            new_name,
        })
    }

    /// Plans every file, splitting out the ones that cannot be normalized.
    pub fn plan_all(&self, paths: &[PathBuf]) -> (Vec<RenamePlan>, Vec<(PathBuf, RenameError)>) {
        let mut plans = Vec::new();
        let mut rejected = Vec::new();

        for path in paths {
            match self.plan(path) {
                Ok(plan) => plans.push(plan),
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    rejected.push((path.clone(), e));
                }
            }
        }

        (plans, rejected)
    }

    /// Moves one file to its planned name. Never overwrites.
    pub fn rename_file(&self, plan: &RenamePlan) -> Result<RenameOutcome, MoveError> {
        let source = &plan.original_path;
        let target = plan.target_path();

        if !source.exists() {
            return Err(MoveError::SourceMissing(source.clone()));
        }
        if !plan.needs_rename() {
            return Ok(RenameOutcome {
                original_path: source.clone(),
                new_path: target,
            });
        }
        if target.exists() && !same_file(source, &target) {
            return Err(MoveError::DestinationExists(target));
        }

        fs::rename(source, &target).map_err(|e| MoveError::Io {
            path: source.clone(),
            source: e,
        })?;

        Ok(RenameOutcome {
            original_path: source.clone(),
            new_path: target,
        })
    }

    pub fn rename_files(&self, plans: &[RenamePlan]) -> BatchReport {
        let mut report = BatchReport::default();

        for plan in plans {
            let outcome = self.rename_file(plan);
            if let Err(e) = &outcome {
                warn!("Rename failed for {}: {e}", plan.original_path.display());
            }
            report.results.push(RenameResult {
                plan: plan.clone(),
                outcome,
            });
        }

        info!(
            "Renamed {} of {} file(s)",
            report.succeeded(),
            report.results.len()
        );
        report
    }
}

// Case-only renames on case-insensitive filesystems see the target as existing.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

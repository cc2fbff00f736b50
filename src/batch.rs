//! One invocation, start to finish: discover, select, normalize (preview,
//! confirm, commit), then the metadata renamer (dry run, confirm, apply).
//!
//! Both stages keep going past a single file's failure. Refusing a
//! confirmation stops the stage it guards; moves that already happened stay.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::RenameConfig;
use crate::console::Console;
use crate::error::RenameError;
use crate::rename_engine::{BatchReport, RenameEngine, RenamePlan};
use crate::secondary::{DestinationTemplate, RenameProposal, SecondaryRenamer, series_for};
use crate::selector::Selector;

#[derive(Debug)]
pub struct SecondaryResult {
    pub path: PathBuf,
    pub outcome: Result<RenameProposal, RenameError>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub selected: Vec<PathBuf>,
    /// Files dropped before the preview because no episode number was found.
    pub rejected: Vec<(PathBuf, RenameError)>,
    pub initial: Option<BatchReport>,
    pub secondary: Vec<SecondaryResult>,
}

pub struct Batch<'a, S, R, I, O: Write, E: Write> {
    config: &'a RenameConfig,
    engine: RenameEngine<'a>,
    selector: S,
    renamer: R,
    input: I,
    console: Console<O, E>,
}

impl<'a, S, R, I, O, E> Batch<'a, S, R, I, O, E>
where
    S: Selector,
    R: SecondaryRenamer,
    I: BufRead,
    O: Write,
    E: Write,
{
    pub fn new(
        config: &'a RenameConfig,
        selector: S,
        renamer: R,
        input: I,
        console: Console<O, E>,
    ) -> Self {
        Self {
            config,
            engine: RenameEngine::new(config),
            selector,
            renamer,
            input,
            console,
        }
    }

    pub fn into_console(self) -> Console<O, E> {
        self.console
    }

    pub async fn run(&mut self) -> Result<BatchSummary, RenameError> {
        let selected = self.select_files().await?;
        let mut summary = BatchSummary {
            selected: selected.clone(),
            ..Default::default()
        };

        let renamed = if self.config.skip_initial_rename {
            info!("Skipping filename normalization");
            selected
        } else {
            let (report, rejected) = self.initial_stage(&selected)?;
            let paths = report.renamed_paths();
            summary.rejected = rejected;
            summary.initial = Some(report);
            paths
        };

        if self.config.skip_secondary_rename {
            info!("Skipping metadata renamer");
        } else {
            summary.secondary = self.secondary_stage(&renamed).await?;
        }

        Ok(summary)
    }

    async fn select_files(&mut self) -> Result<Vec<PathBuf>, RenameError> {
        let candidates = self.engine.scan_directory()?;
        if candidates.is_empty() {
            let filter = self
                .config
                .search
                .as_deref()
                .map(|s| format!(" matching '{s}'"))
                .unwrap_or_default();
            return Err(RenameError::NoMatch(format!(
                "no candidate files in {}{filter}",
                self.config.directory.display()
            )));
        }

        let selected = if self.config.select_all {
            candidates
        } else {
            self.selector.select(&candidates).await?
        };

        if selected.is_empty() {
            return Err(RenameError::NoMatch("no files were selected".to_string()));
        }
        info!("{} file(s) selected", selected.len());
        Ok(selected)
    }

    fn initial_stage(
        &mut self,
        selected: &[PathBuf],
    ) -> Result<(BatchReport, Vec<(PathBuf, RenameError)>), RenameError> {
        let (plans, rejected) = self.engine.plan_all(selected);
        for (path, err) in &rejected {
            self.console
                .warn(format!("Skipping {}: {err}", display_name(path)));
        }
        if plans.is_empty() {
            return Err(RenameError::NoMatch(
                "none of the selected files has a recognizable episode number".to_string(),
            ));
        }

        self.console.heading("Proposed renames:");
        for plan in &plans {
            if plan.needs_rename() {
                self.console.preview(&plan.original_name, &plan.new_name);
            } else {
                self.console
                    .info(format!("  {} (unchanged)", plan.original_name));
            }
        }

        let question = format!("Rename {} file(s)?", plans.len());
        if !self.console.confirm(&question, &mut self.input)? {
            return Err(RenameError::UserAbort {
                stage: "initial rename",
            });
        }

        // Names are recomputed at commit time; the normalizer is pure.
        let committed: Vec<RenamePlan> = plans
            .iter()
            .filter_map(|plan| match self.engine.plan(&plan.original_path) {
                Ok(plan) => Some(plan),
                Err(e) => {
                    warn!("{} changed before commit: {e}", plan.original_path.display());
                    None
                }
            })
            .collect();

        let report = self.engine.rename_files(&committed);
        for result in &report.results {
            match &result.outcome {
                Ok(outcome) if result.plan.needs_rename() => self.console.success(format!(
                    "{} -> {}",
                    result.plan.original_name,
                    display_name(&outcome.new_path)
                )),
                Ok(_) => {}
                Err(e) => self.console.error(e),
            }
        }

        if let Some(path) = &self.config.report {
            report.write_json(path)?;
        }

        Ok((report, rejected))
    }

    async fn secondary_stage(
        &mut self,
        paths: &[PathBuf],
    ) -> Result<Vec<SecondaryResult>, RenameError> {
        let mut results = Vec::new();
        if paths.is_empty() {
            self.console.info("Nothing to hand to the metadata renamer.");
            return Ok(results);
        }

        let template = DestinationTemplate::new(self.config.destination_template.clone());
        let mut proposals = Vec::new();

        self.console.heading("Metadata renamer proposals:");
        for path in paths {
            let destination = template.resolve(&series_for(path, self.config.series.as_deref()));
            match self.renamer.propose_rename(path, &destination).await {
                Ok(proposal) => {
                    self.console.preview(
                        &proposal.old_name,
                        format!(
                            "{} in {}",
                            proposal.new_name,
                            proposal.destination_dir.display()
                        ),
                    );
                    proposals.push((path.clone(), destination, proposal));
                }
                Err(e) => {
                    self.console.error(format!("{}: {e}", display_name(path)));
                    results.push(SecondaryResult {
                        path: path.clone(),
                        outcome: Err(e),
                    });
                }
            }
        }

        if proposals.is_empty() {
            return Ok(results);
        }

        let question = format!("Move {} file(s) with the metadata renamer?", proposals.len());
        if !self.console.confirm(&question, &mut self.input)? {
            return Err(RenameError::UserAbort {
                stage: "metadata rename",
            });
        }

        for (path, destination, proposal) in proposals {
            let outcome = match self.renamer.apply_rename(&path, &destination).await {
                Ok(()) => {
                    self.console.success(format!(
                        "{} -> {}",
                        proposal.old_name,
                        proposal.destination_dir.join(&proposal.new_name).display()
                    ));
                    Ok(proposal)
                }
                Err(e) => {
                    self.console.error(format!("{}: {e}", display_name(&path)));
                    Err(e)
                }
            };
            results.push(SecondaryResult { path, outcome });
        }

        Ok(results)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

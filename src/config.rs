use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RenameError;
use crate::normalizer::{RenameRequest, SanitizeStyle, SeasonSpec};

pub const DEFAULT_DESTINATION: &str = "~/Videos/TV/{series}";
pub const SETTINGS_FILE: &str = "config.json";
pub const APP_DIR: &str = "episode-rename";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    name = "episode-rename",
    about = "Normalize TV episode filenames, then hand them to a metadata renamer"
)]
pub struct Args {
    /// Only offer files whose name contains this text (case-insensitive)
    pub search: Option<String>,

    /// Series name to use instead of the one parsed from each filename
    #[arg(short, long)]
    pub series: Option<String>,

    /// Season number (1-2 digits), `none` to drop the tag, or `keep` to reuse each file's own
    #[arg(long)]
    pub season: Option<String>,

    /// Extension for the renamed files (defaults to each file's own)
    #[arg(short, long)]
    pub extension: Option<String>,

    /// Add this to every episode number (may be negative)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub increment_by: i64,

    /// Skip the filename normalization stage
    #[arg(long)]
    pub skip_initial_rename: bool,

    /// Skip the metadata renamer stage
    #[arg(long)]
    pub skip_secondary_rename: bool,

    /// Directory to look for files in
    #[arg(short = 'd', long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub base_directory: PathBuf,

    /// Only fold underscores and keep `Part N` markers
    #[arg(long)]
    pub simple: bool,

    /// Take every matching file instead of opening the selector
    #[arg(short = 'a', long)]
    pub select_all: bool,

    /// Destination directory template for the metadata renamer, `{series}` is substituted
    #[arg(long)]
    pub destination: Option<String>,

    /// Settings file (JSON)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Write the list of renamed files to this JSON file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub report: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl FromStr for SeasonSpec {
    type Err = RenameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("none") {
            Ok(SeasonSpec::Omit)
        } else if value.eq_ignore_ascii_case("keep") {
            Ok(SeasonSpec::KeepExisting)
        } else if (1..=2).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit()) {
            Ok(SeasonSpec::Explicit(value.to_string()))
        } else {
            Err(RenameError::validation(format!(
                "season must be one or two digits, 'none' or 'keep' (got '{value}')"
            )))
        }
    }
}

/// An external program plus its fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// How to call the metadata renamer. `{destination}` in an argument is
/// replaced by the resolved destination directory; the file path is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenamerCommand {
    pub program: String,
    pub dry_run_args: Vec<String>,
    pub apply_args: Vec<String>,
}

impl Default for RenamerCommand {
    fn default() -> Self {
        Self {
            program: "tvnamer".to_string(),
            dry_run_args: ["--batch", "--dry-run", "--move", "--movedestination={destination}"]
                .map(String::from)
                .to_vec(),
            apply_args: ["--batch", "--move", "--movedestination={destination}"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Settings read from the optional JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub destination_template: String,
    pub selector: ToolCommand,
    pub renamer: RenamerCommand,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destination_template: DEFAULT_DESTINATION.to_string(),
            selector: ToolCommand::new("fzf", &["--multi"]),
            renamer: RenamerCommand::default(),
        }
    }
}

impl Settings {
    /// Loads `explicit`, or the per-user settings file when it exists, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, RenameError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_settings_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };

        debug!("Loading settings from {}", path.display());
        let text = fs::read_to_string(&path).map_err(|e| {
            RenameError::validation(format!("cannot read settings file {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
            .map_err(|e| RenameError::validation(format!("{}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// Validated, immutable options for one invocation.
#[derive(Debug, Clone)]
pub struct RenameConfig {
    pub directory: PathBuf,
    pub search: Option<String>,
    pub series: Option<String>,
    pub season: SeasonSpec,
    pub extension: Option<String>,
    pub increment_by: i64,
    pub style: SanitizeStyle,
    pub skip_initial_rename: bool,
    pub skip_secondary_rename: bool,
    pub select_all: bool,
    pub destination_template: String,
    pub selector: ToolCommand,
    pub renamer: RenamerCommand,
    pub report: Option<PathBuf>,
}

impl RenameConfig {
    pub fn try_from_args(args: &Args) -> Result<Self, RenameError> {
        let settings = Settings::load(args.config.as_deref())?;

        let mut builder = ConfigBuilder::new()
            .directory(&args.base_directory)
            .increment_by(args.increment_by)
            .skip_initial_rename(args.skip_initial_rename)
            .skip_secondary_rename(args.skip_secondary_rename)
            .select_all(args.select_all)
            .settings(settings);

        if let Some(search) = &args.search {
            builder = builder.search(search);
        }
        if let Some(series) = &args.series {
            builder = builder.series(series);
        }
        if let Some(season) = &args.season {
            builder = builder.season(season);
        }
        if let Some(extension) = &args.extension {
            builder = builder.extension(extension);
        }
        if let Some(destination) = &args.destination {
            builder = builder.destination(destination);
        }
        if let Some(report) = &args.report {
            builder = builder.report(report);
        }
        if args.simple {
            builder = builder.style(SanitizeStyle::Simple);
        }

        builder.build()
    }

    /// The normalization request for one file under this configuration.
    pub fn request_for(&self, file_name: &str) -> RenameRequest {
        RenameRequest {
            raw_filename: file_name.to_string(),
            series: self.series.clone(),
            season: self.season.clone(),
            extension: self.extension.clone(),
            increment: self.increment_by,
            style: self.style,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    directory: Option<PathBuf>,
    search: Option<String>,
    series: Option<String>,
    season: Option<String>,
    extension: Option<String>,
    increment_by: i64,
    style: SanitizeStyle,
    skip_initial_rename: bool,
    skip_secondary_rename: bool,
    select_all: bool,
    destination: Option<String>,
    settings: Settings,
    report: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.directory = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn search(mut self, search: &str) -> Self {
        self.search = Some(search.to_string());
        self
    }

    pub fn series(mut self, series: &str) -> Self {
        self.series = Some(series.to_string());
        self
    }

    pub fn season(mut self, season: &str) -> Self {
        self.season = Some(season.to_string());
        self
    }

    pub fn extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_string());
        self
    }

    pub fn increment_by(mut self, increment: i64) -> Self {
        self.increment_by = increment;
        self
    }

    pub fn style(mut self, style: SanitizeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn skip_initial_rename(mut self, skip: bool) -> Self {
        self.skip_initial_rename = skip;
        self
    }

    pub fn skip_secondary_rename(mut self, skip: bool) -> Self {
        self.skip_secondary_rename = skip;
        self
    }

    pub fn select_all(mut self, select_all: bool) -> Self {
        self.select_all = select_all;
        self
    }

    pub fn destination(mut self, template: &str) -> Self {
        self.destination = Some(template.to_string());
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn report<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.report = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<RenameConfig, RenameError> {
        let directory = self.directory.unwrap_or_else(|| PathBuf::from("."));
        if !directory.is_dir() {
            return Err(RenameError::validation(format!(
                "base directory does not exist: {}",
                directory.display()
            )));
        }

        let search = non_empty("search term", self.search)?;
        let series = non_empty("--series", self.series)?;

        let season = match self.season {
            Some(raw) => {
                reject_flag_like("--season", &raw)?;
                raw.parse()?
            }
            None => SeasonSpec::Default,
        };

        let extension = match non_empty("--extension", self.extension)? {
            Some(ext) => Some(validate_extension(&ext)?),
            None => None,
        };

        let destination_template = match non_empty("--destination", self.destination)? {
            Some(template) => template,
            None => self.settings.destination_template.clone(),
        };
        if !destination_template.contains("{series}") {
            debug!("Destination template '{destination_template}' has no {{series}} placeholder");
        }

        Ok(RenameConfig {
            directory,
            search,
            series,
            season,
            extension,
            increment_by: self.increment_by,
            style: self.style,
            skip_initial_rename: self.skip_initial_rename,
            skip_secondary_rename: self.skip_secondary_rename,
            select_all: self.select_all,
            destination_template: expand_home(&destination_template),
            selector: self.settings.selector,
            renamer: self.settings.renamer,
            report: self.report,
        })
    }
}

fn non_empty(option: &str, value: Option<String>) -> Result<Option<String>, RenameError> {
    match value {
        Some(value) => {
            reject_flag_like(option, &value)?;
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        None => Ok(None),
    }
}

fn reject_flag_like(option: &str, value: &str) -> Result<(), RenameError> {
    if value.trim_start().starts_with('-') {
        Err(RenameError::validation(format!(
            "value for {option} looks like another flag: '{value}'"
        )))
    } else {
        Ok(())
    }
}

fn validate_extension(extension: &str) -> Result<String, RenameError> {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty()
        || extension
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '.'))
    {
        return Err(RenameError::validation(format!(
            "extension must be a single word like 'mkv' (got '{extension}')"
        )));
    }
    Ok(extension.to_string())
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(template: &str) -> String {
    let rest = match template.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return template.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.display()),
        None => template.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_spec_parsing() {
        assert_eq!("1".parse::<SeasonSpec>().unwrap(), SeasonSpec::Explicit("1".into()));
        assert_eq!("01".parse::<SeasonSpec>().unwrap(), SeasonSpec::Explicit("01".into()));
        assert_eq!("none".parse::<SeasonSpec>().unwrap(), SeasonSpec::Omit);
        assert_eq!("Keep".parse::<SeasonSpec>().unwrap(), SeasonSpec::KeepExisting);
        assert!("123".parse::<SeasonSpec>().is_err());
        assert!("S1".parse::<SeasonSpec>().is_err());
        assert!("".parse::<SeasonSpec>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let dir = std::env::temp_dir();
        let config = ConfigBuilder::new()
            .directory(&dir)
            .series("  My Show ")
            .season("02")
            .extension(".mkv")
            .increment_by(-1)
            .build()
            .unwrap();

        assert_eq!(config.series.as_deref(), Some("My Show"));
        assert_eq!(config.season, SeasonSpec::Explicit("02".into()));
        assert_eq!(config.extension.as_deref(), Some("mkv"));
        assert_eq!(config.increment_by, -1);
        assert_eq!(config.selector.program, "fzf");
    }

    #[test]
    fn test_flag_like_values_rejected() {
        let err = ConfigBuilder::new()
            .directory(std::env::temp_dir())
            .series("--season")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("looks like another flag"));
    }

    #[test]
    fn test_missing_directory_rejected() {
        let err = ConfigBuilder::new()
            .directory("/definitely/not/here/episode-rename")
            .build()
            .unwrap_err();
        assert!(matches!(err, RenameError::Validation(_)));
    }

    #[test]
    fn test_bad_extension_rejected() {
        let result = ConfigBuilder::new()
            .directory(std::env::temp_dir())
            .extension("tar.gz")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_partial_json() {
        let settings =
            Settings::from_json(r#"{"selector": {"program": "sk"}, "destination_template": "/tv/{series}"}"#)
                .unwrap();
        assert_eq!(settings.selector, ToolCommand::new("sk", &[]));
        assert_eq!(settings.destination_template, "/tv/{series}");
        assert_eq!(settings.renamer, RenamerCommand::default());
    }

    #[test]
    fn test_expand_home_leaves_other_paths() {
        assert_eq!(expand_home("/srv/{series}"), "/srv/{series}");
        assert_eq!(expand_home("~user/x"), "~user/x");
    }
}

//! Filename normalization: turns a raw episode filename into
//! `<Series> - <SeasonTag>E<Episode>.<ext>`.
//!
//! Every function here is pure. Filesystem work lives in
//! [`crate::rename_engine`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RenameError;

static BRACKET_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

// The leading group keeps `S01` inside words like `Class1` intact.
static SEASON_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\p{L}\p{N}])[Ss](\d{1,2})").unwrap());

// Fallback for `--season keep` when the marker is glued to the title.
static GLUED_SEASON_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[Ss](\d{1,2})").unwrap());

static PART_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|[^\p{L}\p{N}])part[ ._-]*\d+").unwrap());

static EXTENDED_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_.\s]+").unwrap());

static SIMPLE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\s]+").unwrap());

static ILLEGAL_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*"?<>|~;]{1,255}"#).unwrap());

static LEADING_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\W+").unwrap());

static RESERVED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:CON|PRN|AUX|NUL|COM[0-9]|LPT[0-9])$").unwrap());

// A marked episode may be followed by a second episode (`E01E02`) or a
// release version (`E05v2`).
static MARKED_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<title>.*)[ ]+-?[ ]*|-?[ ]*)(?:[Ee][Pp]?|\d{1,2}[Xx])(?P<episode>\d+(?:-\d+){0,2})(?:$|[^\p{L}\p{N}]|[EeVv]\d)",
    )
    .unwrap()
});

// Only a release version may trail a bare number, so `1080p` is not an episode.
static BARE_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.*)[ ]+-?[ ]*(?P<episode>\d+(?:-\d+){0,2})(?:$|[^\p{L}\p{N}]|[Vv]\d)")
        .unwrap()
});

static EPISODE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"E(?P<span>\d+(?:-\d+){0,2})").unwrap());

static DOUBLE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ ]{2,}").unwrap());

/// Which sanitizer rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SanitizeStyle {
    /// Strips `Part N` markers and folds both `.` and `_` into spaces.
    #[default]
    Extended,
    /// Folds only `_`.
    Simple,
}

/// How the season tag of the canonical name is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeasonSpec {
    /// Digits exactly as given, so `1` gives `S1` and `01` gives `S01`.
    Explicit(String),
    /// No season tag at all.
    Omit,
    /// Reuse the marker already present in the raw filename.
    KeepExisting,
    #[default]
    Default,
}

/// Inputs for normalizing a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub raw_filename: String,
    pub series: Option<String>,
    pub season: SeasonSpec,
    pub extension: Option<String>,
    pub increment: i64,
    pub style: SanitizeStyle,
}

impl RenameRequest {
    pub fn new(raw_filename: impl Into<String>) -> Self {
        Self {
            raw_filename: raw_filename.into(),
            series: None,
            season: SeasonSpec::Default,
            extension: None,
            increment: 0,
            style: SanitizeStyle::Extended,
        }
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn season(mut self, season: SeasonSpec) -> Self {
        self.season = season;
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn increment(mut self, increment: i64) -> Self {
        self.increment = increment;
        self
    }

    pub fn style(mut self, style: SanitizeStyle) -> Self {
        self.style = style;
        self
    }
}

/// Result of looking for an episode number in a sanitized name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeMatch<'a> {
    Matched { title: &'a str, episode: &'a str },
    Unmatched { original: &'a str },
}

/// Sanitize with the extended rule set.
pub fn sanitize(raw: &str) -> String {
    sanitize_with(raw, SanitizeStyle::Extended)
}

/// Strips release noise and filesystem-hostile characters from a filename.
///
/// Steps run in a fixed order, each one changing what the next can see:
/// bracket tags, season marker, `Part N` (extended only), separator folding,
/// [`safe_filename`], and finally one leading underscore. Never fails; the
/// result may be empty.
pub fn sanitize_with(raw: &str, style: SanitizeStyle) -> String {
    let name = BRACKET_TAG.replace_all(raw, "");
    let name = SEASON_MARKER.replace_all(&name, "$1");
    let name = match style {
        SanitizeStyle::Extended => PART_MARKER.replace_all(&name, "$1").into_owned(),
        SanitizeStyle::Simple => name.into_owned(),
    };
    let separators = match style {
        SanitizeStyle::Extended => &*EXTENDED_SEPARATORS,
        SanitizeStyle::Simple => &*SIMPLE_SEPARATORS,
    };
    let name = separators.replace_all(&name, " ");
    let name = safe_filename(name.trim());

    match name.strip_prefix('_') {
        Some(rest) if !is_reserved(rest) => rest.trim().to_string(),
        _ => name.trim().to_string(),
    }
}

/// Makes a string usable as a single path segment.
///
/// Each run of illegal characters becomes one `_` (runs longer than 255 are
/// split), leading non-word characters are dropped, and reserved device names
/// get a `_` prefix.
pub fn safe_filename(name: &str) -> String {
    let replaced = ILLEGAL_RUN.replace_all(name, "_");
    let stripped = LEADING_NON_WORD.replace(&replaced, "");
    if is_reserved(&stripped) {
        format!("_{stripped}")
    } else {
        stripped.into_owned()
    }
}

fn is_reserved(name: &str) -> bool {
    let base = name.split('.').next().unwrap_or_default().trim();
    RESERVED_NAME.is_match(base)
}

/// Finds the title and episode span in a sanitized name.
///
/// An explicit marker (`E`, `EP`, `1x`) wins over a bare trailing number.
/// The title is greedy, so the last marker in the name is used.
pub fn extract_episode(sanitized: &str) -> EpisodeMatch<'_> {
    let captures = MARKED_EPISODE
        .captures(sanitized)
        .or_else(|| BARE_EPISODE.captures(sanitized));

    match captures {
        Some(caps) => EpisodeMatch::Matched {
            title: caps
                .name("title")
                .map_or("", |m| m.as_str().trim_end_matches([' ', '-']).trim()),
            episode: caps.name("episode").map_or("", |m| m.as_str()),
        },
        None => EpisodeMatch::Unmatched {
            original: sanitized,
        },
    }
}

/// Formats a sanitized name as `<series or title> - <season_tag>E<episode>`.
///
/// When no episode number is found the sanitized string comes back unchanged;
/// use [`extract_episode`] or [`has_episode_marker`] to tell the cases apart.
pub fn format_episode(sanitized: &str, series: Option<&str>, season_tag: &str) -> String {
    match extract_episode(sanitized) {
        EpisodeMatch::Matched { title, episode } => {
            compose(series.unwrap_or(title), season_tag, episode)
        }
        EpisodeMatch::Unmatched { original } => original.to_string(),
    }
}

fn compose(title: &str, season_tag: &str, episode: &str) -> String {
    let title = title.trim();
    let joined = if title.is_empty() {
        format!("{season_tag}E{episode}")
    } else {
        format!("{title} - {season_tag}E{episode}")
    };
    DOUBLE_SPACE
        .replace_all(&joined, " ")
        .replace(" - -", " -")
        .trim()
        .to_string()
}

/// True when the name carries an `E<digits>` token.
pub fn has_episode_marker(name: &str) -> bool {
    EPISODE_TOKEN.is_match(name)
}

/// Adds `increment` to every digit run of the last `E<digits>[-<digits>]` token
/// and appends `extension` when given.
///
/// Each run keeps its zero-padding width. A name without the token is
/// returned as is, extension aside.
pub fn adjust_episode_number(
    formatted: &str,
    increment: i64,
    extension: Option<&str>,
) -> Result<String, RenameError> {
    let mut adjusted = match EPISODE_TOKEN.captures_iter(formatted).last() {
        Some(caps) => {
            let span = caps
                .name("span")
                .ok_or_else(|| RenameError::validation("episode token without digits"))?;
            let runs = span
                .as_str()
                .split('-')
                .map(|run| shift_run(run, increment))
                .collect::<Result<Vec<_>, _>>()?;

            let mut out = String::with_capacity(formatted.len() + 4);
            out.push_str(&formatted[..span.start()]);
            out.push_str(&runs.join("-"));
            out.push_str(&formatted[span.end()..]);
            out
        }
        None => formatted.to_string(),
    };

    if let Some(ext) = extension.map(|e| e.trim_start_matches('.')).filter(|e| !e.is_empty()) {
        adjusted.push('.');
        adjusted.push_str(ext);
    }
    Ok(adjusted)
}

fn shift_run(run: &str, increment: i64) -> Result<String, RenameError> {
    let value: i64 = run
        .parse()
        .map_err(|_| RenameError::validation(format!("episode number '{run}' is out of range")))?;
    let shifted = value
        .checked_add(increment)
        .filter(|n| *n >= 0)
        .ok_or_else(|| {
            RenameError::validation(format!(
                "episode {value} shifted by {increment} is not a valid episode number"
            ))
        })?;
    Ok(format!("{:0width$}", shifted, width = run.len()))
}

/// Picks the season tag for a file.
pub fn resolve_season_tag(spec: &SeasonSpec, raw_filename: &str) -> String {
    match spec {
        SeasonSpec::Explicit(digits) => format!("S{digits}"),
        SeasonSpec::Omit => String::new(),
        SeasonSpec::KeepExisting => SEASON_MARKER
            .captures(raw_filename)
            .and_then(|caps| caps.get(2))
            .or_else(|| {
                GLUED_SEASON_MARKER
                    .captures(raw_filename)
                    .and_then(|caps| caps.get(1))
            })
            .map_or_else(|| "S1".to_string(), |digits| format!("S{}", digits.as_str())),
        SeasonSpec::Default => "S1".to_string(),
    }
}

/// Splits `name.ext` into stem and extension.
///
/// Only a short alphanumeric suffix that contains a letter counts as an
/// extension, so `Show.05` keeps its episode number.
pub fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic()) =>
        {
            (stem, Some(ext))
        }
        _ => (file_name, None),
    }
}

/// Runs the whole pipeline for one file.
pub fn normalize(request: &RenameRequest) -> Result<String, RenameError> {
    let (stem, original_ext) = split_extension(&request.raw_filename);
    let sanitized = sanitize_with(stem, request.style);
    let season_tag = resolve_season_tag(&request.season, &request.raw_filename);

    let (title, episode) = match extract_episode(&sanitized) {
        EpisodeMatch::Matched { title, episode } => (title, episode),
        EpisodeMatch::Unmatched { .. } => {
            return Err(RenameError::NoEpisodeMarker {
                file: request.raw_filename.clone(),
            });
        }
    };

    let series = request
        .series
        .as_deref()
        .map(|s| safe_filename(s.trim()))
        .filter(|s| !s.is_empty());
    let formatted = compose(series.as_deref().unwrap_or(title), &season_tag, episode);

    if !has_episode_marker(&formatted) {
        return Err(RenameError::NoEpisodeMarker {
            file: request.raw_filename.clone(),
        });
    }

    let extension = request.extension.as_deref().or(original_ext);
    adjust_episode_number(&formatted, request.increment, extension)
}

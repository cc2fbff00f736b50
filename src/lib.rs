//! Batch renaming of TV episode files into `Series - SxEyy.ext`, followed by
//! an optional pass through an external metadata renamer.

pub mod batch;
pub mod config;
pub mod console;
pub mod error;
pub mod normalizer;
pub mod rename_engine;
pub mod secondary;
pub mod selector;

pub use batch::{Batch, BatchSummary};
pub use config::{Args, ConfigBuilder, RenameConfig, Settings};
pub use console::Console;
pub use error::{MoveError, RenameError};
pub use normalizer::{RenameRequest, SanitizeStyle, SeasonSpec, normalize};
pub use rename_engine::{BatchReport, RenameEngine, RenameOutcome, RenamePlan};
pub use secondary::{CommandRenamer, DestinationTemplate, RenameProposal, SecondaryRenamer};
pub use selector::{CommandSelector, SelectAll, Selector};

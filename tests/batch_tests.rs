// Integration tests for batch orchestration, using in-memory collaborators

use std::cell::RefCell;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use episode_rename::{
    Batch, ConfigBuilder, Console, RenameConfig, RenameError, RenameProposal, SecondaryRenamer,
    SelectAll, Selector,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Returns a fixed subset of the candidates, by file name.
struct PickByName(Vec<&'static str>);

impl Selector for PickByName {
    async fn select(&self, candidates: &[PathBuf]) -> Result<Vec<PathBuf>, RenameError> {
        Ok(candidates
            .iter()
            .filter(|p| {
                let name = p.file_name().unwrap().to_string_lossy();
                self.0.iter().any(|wanted| *wanted == name)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeRenamer {
    fail_on: Option<&'static str>,
    proposed: RefCell<Vec<(PathBuf, PathBuf)>>,
    applied: RefCell<Vec<(PathBuf, PathBuf)>>,
}

impl SecondaryRenamer for FakeRenamer {
    async fn propose_rename(
        &self,
        path: &Path,
        destination: &Path,
    ) -> Result<RenameProposal, RenameError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if self.fail_on.is_some_and(|bad| name.contains(bad)) {
            return Err(RenameError::external("fake", "unparsable output"));
        }
        self.proposed
            .borrow_mut()
            .push((path.to_path_buf(), destination.to_path_buf()));
        Ok(RenameProposal {
            new_name: name.replace(".mkv", " - Title.mkv"),
            old_name: name,
            destination_dir: destination.to_path_buf(),
        })
    }

    async fn apply_rename(&self, path: &Path, destination: &Path) -> Result<(), RenameError> {
        self.applied
            .borrow_mut()
            .push((path.to_path_buf(), destination.to_path_buf()));
        Ok(())
    }
}

type TestConsole = Console<Vec<u8>, Vec<u8>>;

fn console() -> TestConsole {
    Console::new(Vec::new(), Vec::new())
}

fn library(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in files {
        fs::write(dir.path().join(name), name).unwrap();
    }
    dir
}

fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn config(dir: &Path) -> ConfigBuilder {
    let template = dir.join("tv").join("{series}");
    ConfigBuilder::new()
        .directory(dir)
        .destination(&template.to_string_lossy())
}

fn output(console: TestConsole) -> (String, String) {
    let (out, err) = console.into_inner();
    (
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

#[tokio::test]
async fn test_full_batch() {
    let dir = library(&["My.Show.S01E03.1080p-GROUP.mkv", "My.Show.S01E04.mkv", "Notes.txt"]);
    let config: RenameConfig = config(dir.path())
        .series("My Show")
        .season("1")
        .build()
        .unwrap();
    let renamer = FakeRenamer::default();

    let mut batch = Batch::new(
        &config,
        PickByName(vec!["My.Show.S01E03.1080p-GROUP.mkv", "My.Show.S01E04.mkv"]),
        &renamer,
        Cursor::new("Yes\nYes\n"),
        console(),
    );
    let summary = batch.run().await.unwrap();

    assert_eq!(
        names(dir.path()),
        vec!["My Show - S1E03.mkv", "My Show - S1E04.mkv", "Notes.txt"]
    );
    assert_eq!(summary.initial.as_ref().unwrap().succeeded(), 2);
    assert_eq!(summary.secondary.len(), 2);
    assert!(summary.secondary.iter().all(|r| r.outcome.is_ok()));

    let applied = renamer.applied.borrow();
    assert_eq!(
        *applied,
        vec![
            (
                dir.path().join("My Show - S1E03.mkv"),
                dir.path().join("tv").join("My Show")
            ),
            (
                dir.path().join("My Show - S1E04.mkv"),
                dir.path().join("tv").join("My Show")
            ),
        ]
    );

    let (out, _) = output(batch.into_console());
    assert!(out.contains("My Show - S1E03.mkv"));
}

#[tokio::test]
async fn test_anything_but_yes_aborts_without_moving() {
    for answer in ["yes\n", "Y\n", "\n", "No\n", ""] {
        let dir = library(&["show_ep5.mp4", "show_ep6.mp4"]);
        let config = config(dir.path()).season("none").build().unwrap();
        let renamer = FakeRenamer::default();

        let mut batch = Batch::new(&config, SelectAll, &renamer, Cursor::new(answer), console());
        let err = batch.run().await.unwrap_err();

        assert!(
            matches!(err, RenameError::UserAbort { stage: "initial rename" }),
            "answer {answer:?}"
        );
        assert_eq!(names(dir.path()), vec!["show_ep5.mp4", "show_ep6.mp4"]);
        assert!(renamer.proposed.borrow().is_empty());
    }
}

#[tokio::test]
async fn test_secondary_abort_keeps_initial_moves() {
    let dir = library(&["show_ep5.mp4"]);
    let config = config(dir.path())
        .season("none")
        .increment_by(10)
        .build()
        .unwrap();
    let renamer = FakeRenamer::default();

    let mut batch = Batch::new(&config, SelectAll, &renamer, Cursor::new("Yes\nNo\n"), console());
    let err = batch.run().await.unwrap_err();

    assert!(matches!(err, RenameError::UserAbort { stage: "metadata rename" }));
    assert_eq!(names(dir.path()), vec!["show - E15.mp4"]);
    assert_eq!(renamer.proposed.borrow().len(), 1);
    assert!(renamer.applied.borrow().is_empty());
}

#[tokio::test]
async fn test_secondary_failure_does_not_stop_batch() {
    let dir = library(&["Alpha.E01.mkv", "Beta.E01.mkv", "Gamma.E01.mkv"]);
    let config = config(dir.path()).build().unwrap();
    let renamer = FakeRenamer {
        fail_on: Some("Beta"),
        ..Default::default()
    };

    let mut batch = Batch::new(&config, SelectAll, &renamer, Cursor::new("Yes\nYes\n"), console());
    let summary = batch.run().await.unwrap();

    let failed: Vec<_> = summary
        .secondary
        .iter()
        .filter(|r| r.outcome.is_err())
        .map(|r| r.path.clone())
        .collect();
    assert_eq!(failed, vec![dir.path().join("Beta - S1E01.mkv")]);

    let applied: Vec<PathBuf> = renamer.applied.borrow().iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(
        applied,
        vec![dir.path().join("Alpha - S1E01.mkv"), dir.path().join("Gamma - S1E01.mkv")]
    );
    assert_eq!(renamer.applied.borrow()[0].1, dir.path().join("tv").join("Alpha"));

    let (_, err) = output(batch.into_console());
    assert!(err.contains("unparsable output"));
}

#[tokio::test]
async fn test_files_without_episode_are_skipped_with_warning() {
    let dir = library(&["Show.E01.mkv", "Behind.The.Scenes.mkv"]);
    let config = config(dir.path())
        .skip_secondary_rename(true)
        .build()
        .unwrap();

    let mut batch = Batch::new(
        &config,
        SelectAll,
        FakeRenamer::default(),
        Cursor::new("Yes\n"),
        console(),
    );
    let summary = batch.run().await.unwrap();

    assert_eq!(summary.rejected.len(), 1);
    assert_eq!(summary.rejected[0].0, dir.path().join("Behind.The.Scenes.mkv"));
    assert_eq!(
        names(dir.path()),
        vec!["Behind.The.Scenes.mkv", "Show - S1E01.mkv"]
    );

    let (_, err) = output(batch.into_console());
    assert!(err.contains("Behind.The.Scenes.mkv"));
}

#[tokio::test]
async fn test_skip_initial_rename_forwards_originals() {
    let dir = library(&["Show.E01.mkv"]);
    let config = config(dir.path())
        .series("Show")
        .skip_initial_rename(true)
        .build()
        .unwrap();
    let renamer = FakeRenamer::default();

    let mut batch = Batch::new(&config, SelectAll, &renamer, Cursor::new("Yes\n"), console());
    let summary = batch.run().await.unwrap();

    assert!(summary.initial.is_none());
    assert_eq!(names(dir.path()), vec!["Show.E01.mkv"]);
    assert_eq!(
        *renamer.applied.borrow(),
        vec![(dir.path().join("Show.E01.mkv"), dir.path().join("tv").join("Show"))]
    );
}

#[tokio::test]
async fn test_no_candidates_is_no_match() {
    let dir = library(&["Other.E01.mkv"]);
    let config = config(dir.path()).search("missing").build().unwrap();

    let mut batch = Batch::new(
        &config,
        SelectAll,
        FakeRenamer::default(),
        Cursor::new(""),
        console(),
    );
    let err = batch.run().await.unwrap_err();
    assert!(matches!(err, RenameError::NoMatch(msg) if msg.contains("missing")));
}

#[tokio::test]
async fn test_empty_selection_is_no_match() {
    let dir = library(&["Show.E01.mkv"]);
    let config = config(dir.path()).build().unwrap();

    let mut batch = Batch::new(
        &config,
        PickByName(vec![]),
        FakeRenamer::default(),
        Cursor::new("Yes\n"),
        console(),
    );
    let err = batch.run().await.unwrap_err();
    assert!(matches!(err, RenameError::NoMatch(_)));
    assert_eq!(names(dir.path()), vec!["Show.E01.mkv"]);
}

#[tokio::test]
async fn test_select_all_bypasses_selector() {
    let dir = library(&["Show.E01.mkv"]);
    let config = config(dir.path())
        .select_all(true)
        .skip_secondary_rename(true)
        .build()
        .unwrap();

    let mut batch = Batch::new(
        &config,
        PickByName(vec![]),
        FakeRenamer::default(),
        Cursor::new("Yes\n"),
        console(),
    );
    let summary = batch.run().await.unwrap();
    assert_eq!(summary.selected, vec![dir.path().join("Show.E01.mkv")]);
}

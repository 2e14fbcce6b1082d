use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use trellis_assets::CacheConfig;
use trellis_graph::DocumentKind;

use crate::{commands, loader};

fn write(root: &Path, relative: &str, text: &str) {
	let path = root.join(relative);
	fs::create_dir_all(path.parent().unwrap()).unwrap();
	fs::write(path, text).unwrap();
}

fn fixture(root: &Path) {
	write(root, "app/src/main.rs", "fn main() {}");
	write(root, "app/src/lib.rs", "pub fn lib() {}");
	write(root, "app/README.md", "# app");
	write(root, "app/.editorconfig", "root = true");
	write(root, "core/lib.rs", "pub struct Core;");
}

#[test]
fn copies_of_a_tree_share_every_checksum() {
	let first = tempfile::tempdir().unwrap();
	let second = tempfile::tempdir().unwrap();
	fixture(first.path());
	fixture(second.path());

	let a = loader::load_solution(first.path()).unwrap();
	let b = loader::load_solution(second.path()).unwrap();
	assert_eq!(a.checksum(), b.checksum());
	assert_eq!(commands::render_tree(&a), commands::render_tree(&b));
}

#[test]
fn subdirectories_become_projects_and_files_documents() {
	let dir = tempfile::tempdir().unwrap();
	fixture(dir.path());
	write(dir.path(), "stray.txt", "ignored at the root");
	fs::write(dir.path().join("app/blob.bin"), [0xff_u8, 0xfe, 0x00]).unwrap();

	let solution = loader::load_solution(dir.path()).unwrap();
	let names: Vec<_> = solution.projects().iter().map(|p| p.info().name.clone()).collect();
	assert_eq!(names, vec!["app", "core"]);

	let app = &solution.projects()[0];
	let paths: Vec<_> = app.documents().iter().map(|d| d.info().path.clone().unwrap()).collect();
	assert_eq!(paths, vec![".editorconfig", "README.md", "src/lib.rs", "src/main.rs"]);
	assert_eq!(app.info().language, "rs");
	assert_eq!(app.documents()[0].kind(), DocumentKind::AnalyzerConfig);
	assert_eq!(app.documents()[1].kind(), DocumentKind::Additional);
	assert_eq!(solution.node_count(), 1 + 2 + 4 + 1);
}

#[test]
fn gitignored_files_are_skipped() {
	let dir = tempfile::tempdir().unwrap();
	fixture(dir.path());
	write(dir.path(), "app/.gitignore", "target/\n");
	write(dir.path(), "app/target/out.rs", "generated");
	// `ignore` only honours .gitignore inside a repository.
	fs::create_dir_all(dir.path().join("app/.git")).unwrap();

	let solution = loader::load_solution(dir.path()).unwrap();
	let app = &solution.projects()[0];
	assert!(app.documents().iter().all(|d| !d.info().path.as_deref().unwrap().starts_with("target/")));
	assert!(app.documents().iter().all(|d| !d.info().path.as_deref().unwrap().starts_with(".git/")));
}

#[test]
fn classify_by_name() {
	assert_eq!(loader::classify(Path::new("a/.editorconfig")), DocumentKind::AnalyzerConfig);
	assert_eq!(loader::classify(Path::new("rules.globalconfig")), DocumentKind::AnalyzerConfig);
	assert_eq!(loader::classify(Path::new("notes.md")), DocumentKind::Additional);
	assert_eq!(loader::classify(Path::new("main.rs")), DocumentKind::Regular);
	assert_eq!(loader::classify(Path::new("Makefile")), DocumentKind::Regular);
}

#[test]
fn loading_a_file_fails() {
	let dir = tempfile::tempdir().unwrap();
	write(dir.path(), "file.rs", "");
	assert!(loader::load_solution(&dir.path().join("file.rs")).is_err());
}

#[test]
fn render_tree_indents_by_tier() {
	let dir = tempfile::tempdir().unwrap();
	write(dir.path(), "core/lib.rs", "pub struct Core;");
	let solution = loader::load_solution(dir.path()).unwrap();

	let rendered = commands::render_tree(&solution);
	let lines: Vec<_> = rendered.lines().collect();
	assert_eq!(lines.len(), 3);
	assert!(lines[0].starts_with("solution solution "));
	assert!(lines[1].starts_with("  project core "));
	assert!(lines[2].starts_with("    document lib.rs "));
	assert!(lines[2].ends_with(&solution.projects()[0].documents()[0].checksum().to_string()));
}

#[tokio::test]
async fn diff_fetches_only_the_edited_path() {
	let old = tempfile::tempdir().unwrap();
	let new = tempfile::tempdir().unwrap();
	fixture(old.path());
	fixture(new.path());
	write(new.path(), "app/src/lib.rs", "pub fn lib() { todo!() }");

	let old_solution = loader::load_solution(old.path()).unwrap();
	let new_solution = loader::load_solution(new.path()).unwrap();
	let report = commands::diff(&old_solution, &new_solution, CacheConfig::default()).await.unwrap();

	assert_eq!(report.baseline.transferred.len(), old_solution.node_count());
	assert_eq!(report.baseline.batches, 3);

	let app = &new_solution.projects()[0];
	let edited = app.documents().iter().find(|d| d.info().path.as_deref() == Some("src/lib.rs")).unwrap();
	let mut expected = vec![new_solution.checksum(), app.checksum(), edited.checksum()];
	let mut transferred = report.delta.transferred.clone();
	expected.sort();
	transferred.sort();
	assert_eq!(transferred, expected);

	let rendered = report.render();
	assert!(rendered.contains("delta: 3 of 8 nodes in 3 batches"));
	assert!(rendered.contains("  document src/lib.rs "));
}

#[tokio::test]
async fn diff_of_identical_trees_transfers_nothing() {
	let dir = tempfile::tempdir().unwrap();
	fixture(dir.path());
	let solution = loader::load_solution(dir.path()).unwrap();

	let report = commands::diff(&solution, &solution, CacheConfig::default()).await.unwrap();
	assert!(report.delta.transferred.is_empty());
	assert_eq!(report.delta.batches, 0);
}

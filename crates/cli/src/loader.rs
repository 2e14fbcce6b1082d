//! Loads a directory tree as a solution graph.
//!
//! Top-level subdirectories become projects; every file below a project
//! becomes a document. Identifiers are derived from relative paths, so two
//! copies of a tree produce the same ids and unchanged files keep their
//! checksums.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use ignore::WalkBuilder;
use trellis_graph::{DocumentInfo, DocumentKind, DocumentNode, ProjectInfo, ProjectNode, SolutionInfo, SolutionNode};
use trellis_primitives::{DocumentId, ProjectId, SolutionId};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_128;

fn stable_uuid(namespace: &str, key: &str) -> Uuid {
	Uuid::from_u128(xxh3_128(format!("{namespace}:{key}").as_bytes()))
}

/// Classifies a file by name: analyzer configs, auxiliary data, or source.
pub fn classify(path: &Path) -> DocumentKind {
	let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
	let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
	if name == ".editorconfig" || extension == "globalconfig" {
		return DocumentKind::AnalyzerConfig;
	}
	match extension {
		"md" | "txt" | "json" | "toml" | "yaml" | "yml" | "xml" | "lock" => DocumentKind::Additional,
		_ => DocumentKind::Regular,
	}
}

fn relative_key(path: &Path) -> String {
	path.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

pub fn load_solution(root: &Path) -> anyhow::Result<SolutionNode> {
	if !root.is_dir() {
		bail!("{} is not a directory", root.display());
	}

	let mut project_dirs: Vec<PathBuf> = Vec::new();
	for entry in std::fs::read_dir(root).with_context(|| format!("reading {}", root.display()))? {
		let entry = entry?;
		let path = entry.path();
		if entry.file_type()?.is_dir() {
			if entry.file_name().to_string_lossy().starts_with('.') {
				continue;
			}
			project_dirs.push(path);
		} else {
			tracing::debug!(path = %path.display(), "loader.skip_root_file");
		}
	}
	project_dirs.sort();

	let projects = project_dirs.iter().map(|dir| load_project(dir)).collect::<anyhow::Result<Vec<_>>>()?;
	let solution_id = SolutionId::from_uuid(stable_uuid("solution", ""), Some("solution".into()));
	let solution = SolutionNode::new(SolutionInfo::new(solution_id), projects);
	tracing::info!(
		root = %root.display(),
		projects = solution.projects().len(),
		nodes = solution.node_count(),
		checksum = %solution.checksum().short(),
		"loader.loaded"
	);
	Ok(solution)
}

fn load_project(dir: &Path) -> anyhow::Result<ProjectNode> {
	let name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

	let walker = WalkBuilder::new(dir)
		.hidden(false)
		.filter_entry(|entry| entry.file_name() != ".git")
		.build();
	let mut files = BTreeMap::new();
	for entry in walker {
		let entry = entry?;
		if !entry.file_type().is_some_and(|t| t.is_file()) {
			continue;
		}
		let relative = entry.path().strip_prefix(dir)?.to_path_buf();
		files.insert(relative_key(&relative), entry.into_path());
	}

	let mut extensions: BTreeMap<String, usize> = BTreeMap::new();
	let mut documents = Vec::with_capacity(files.len());
	for (relative, path) in files {
		let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
		let Ok(text) = String::from_utf8(bytes) else {
			tracing::warn!(path = %path.display(), "loader.skip_binary");
			continue;
		};
		let kind = classify(&path);
		if kind == DocumentKind::Regular
			&& let Some(extension) = path.extension()
		{
			*extensions.entry(extension.to_string_lossy().into_owned()).or_default() += 1;
		}
		let key = format!("{name}/{relative}");
		let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
		let id = DocumentId::from_uuid(stable_uuid("document", &key), Some(key.as_str().into()));
		documents.push(DocumentNode::new(DocumentInfo::new(id, file_name, kind).with_path(relative), text));
	}

	let language = extensions
		.into_iter()
		.max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
		.map_or_else(|| "unknown".to_string(), |(extension, _)| extension);
	let id = ProjectId::from_uuid(stable_uuid("project", &name), Some(name.as_str().into()));
	Ok(ProjectNode::new(ProjectInfo::new(id, name, language), documents))
}

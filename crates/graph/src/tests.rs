use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use trellis_primitives::{Checksum, DocumentId, ProjectId, SolutionId};

use super::*;

struct Fixture {
	solution: SolutionNode,
	project: ProjectId,
	d1: DocumentId,
	d2: DocumentId,
}

fn fixture(d1_text: &str, d2_text: &str) -> Fixture {
	let project = ProjectId::new("P");
	let d1 = DocumentId::new("D1");
	let d2 = DocumentId::new("D2");
	let solution = SolutionNode::new(
		SolutionInfo::new(SolutionId::new("S")),
		[ProjectNode::new(
			ProjectInfo::new(project.clone(), "P", "rust"),
			[
				DocumentNode::new(DocumentInfo::new(d1.clone(), "d1.rs", DocumentKind::Regular), d1_text),
				DocumentNode::new(DocumentInfo::new(d2.clone(), "d2.rs", DocumentKind::Regular), d2_text),
			],
		)],
	);
	Fixture { solution, project, d1, d2 }
}

fn payload_map(solution: &SolutionNode) -> HashMap<Checksum, NodePayload> {
	let mut map = HashMap::new();
	solution.walk(|node| {
		map.insert(node.checksum(), NodePayload::decode(&node.encode()).unwrap());
	});
	map
}

#[test]
fn construction_is_deterministic() {
	let project = ProjectId::new("P");
	let doc = DocumentId::new("D");
	let solution = SolutionId::new("S");
	let build = || {
		SolutionNode::new(
			SolutionInfo::new(solution.clone()),
			[ProjectNode::new(
				ProjectInfo::new(project.clone(), "P", "rust"),
				[DocumentNode::new(DocumentInfo::new(doc.clone(), "d.rs", DocumentKind::Regular), "fn main() {}")],
			)],
		)
	};
	assert_eq!(build().checksum(), build().checksum());
}

#[test]
fn separately_built_identical_documents_share_a_checksum() {
	let uuid = DocumentId::new("x").uuid();
	let build = || DocumentNode::new(DocumentInfo::new(DocumentId::from_uuid(uuid, Some("a.rs".into())), "a.rs", DocumentKind::Regular), "A");
	assert_eq!(build().checksum(), build().checksum());
	assert_eq!(build().id(), build().id());
}

#[test]
fn edit_changes_only_the_path_to_the_root() {
	let before = fixture("A", "X");
	let after = before.solution.with_document_text(&before.d1, "B").unwrap();

	let old_d1 = before.solution.document(&before.d1).unwrap();
	let new_d1 = after.document(&before.d1).unwrap();
	let old_d2 = before.solution.document(&before.d2).unwrap();
	let new_d2 = after.document(&before.d2).unwrap();
	let old_p = before.solution.project(&before.project).unwrap();
	let new_p = after.project(&before.project).unwrap();

	assert_ne!(after.checksum(), before.solution.checksum());
	assert_ne!(new_d1.checksum(), old_d1.checksum());
	assert_ne!(new_p.checksum(), old_p.checksum());
	assert_eq!(new_d2.checksum(), old_d2.checksum());
	assert!(Arc::ptr_eq(new_d2, old_d2), "untouched sibling is shared, not copied");
	assert_eq!(before.solution.document(&before.d1).unwrap().text(), "A");
}

#[test]
fn reverting_an_edit_restores_the_checksum() {
	let base = fixture("A", "X");
	let edited = base.solution.with_document_text(&base.d1, "B").unwrap();
	let reverted = edited.with_document_text(&base.d1, "A").unwrap();
	assert_eq!(reverted.checksum(), base.solution.checksum());
}

#[test]
fn child_order_is_part_of_the_checksum() {
	let f = fixture("A", "X");
	let project = f.solution.project(&f.project).unwrap();
	let reversed: Vec<_> = project.documents().iter().rev().cloned().collect();
	let swapped = ProjectNode::new(project.info().clone(), reversed);
	assert_ne!(swapped.checksum(), project.checksum());
}

#[test]
fn payload_round_trip_reproduces_checksums() {
	let f = fixture("A", "X");
	f.solution.walk(|node| {
		let bytes = node.encode();
		let decoded = NodePayload::decode(&bytes).unwrap();
		assert_eq!(decoded.kind(), node.kind());
		assert_eq!(decoded.children(), node.children().as_slice());
		assert_eq!(Checksum::of(&decoded.encode()), node.checksum());
	});
}

#[test]
fn assemble_rebuilds_an_equal_tree() {
	let f = fixture("A", "X");
	let rebuilt = assemble_solution(f.solution.checksum(), &payload_map(&f.solution)).unwrap();

	assert_eq!(rebuilt.checksum(), f.solution.checksum());
	assert_eq!(rebuilt.encode(), f.solution.encode());
	assert_eq!(rebuilt.document(&f.d1).unwrap().text(), "A");
	assert_eq!(rebuilt.document(&f.d2).unwrap().text(), "X");
	// Recomputing from content agrees with the trusted checksums.
	let recomputed = rebuilt.with_document_text(&f.d1, "A").unwrap();
	assert_eq!(recomputed.checksum(), f.solution.checksum());
}

#[test]
fn assemble_reports_missing_and_mistyped_nodes() {
	let f = fixture("A", "X");
	let mut payloads = payload_map(&f.solution);
	let d2 = f.solution.document(&f.d2).unwrap().checksum();
	payloads.remove(&d2);
	assert_eq!(
		assemble_solution(f.solution.checksum(), &payloads).unwrap_err(),
		AssembleError::Missing(d2)
	);

	let project = f.solution.project(&f.project).unwrap().checksum();
	assert_eq!(
		assemble_solution(project, &payload_map(&f.solution)).unwrap_err(),
		AssembleError::UnexpectedKind {
			checksum: project,
			expected: NodeKind::Solution,
			found: NodeKind::Project,
		}
	);
}

/// Serves payloads from a map but hands out one prebuilt document for reuse.
struct ReusingLookup {
	payloads: HashMap<Checksum, NodePayload>,
	keep: Arc<DocumentNode>,
	decoded: Vec<Checksum>,
	built: Vec<Checksum>,
}

impl NodeLookup for ReusingLookup {
	type Error = AssembleError;

	fn payload(&mut self, checksum: Checksum) -> Result<NodePayload, AssembleError> {
		self.decoded.push(checksum);
		self.payloads.get(&checksum).cloned().ok_or(AssembleError::Missing(checksum))
	}

	fn reuse_document(&mut self, checksum: Checksum) -> Option<Arc<DocumentNode>> {
		(checksum == self.keep.checksum()).then(|| Arc::clone(&self.keep))
	}

	fn assembled_document(&mut self, document: &Arc<DocumentNode>) {
		self.built.push(document.checksum());
	}
}

#[test]
fn assemble_with_splices_reused_subtrees() {
	let old = fixture("A", "X");
	let new = old.solution.with_document_text(&old.d1, "B").unwrap();
	let keep = Arc::clone(old.solution.document(&old.d2).unwrap());
	let mut payloads = payload_map(&new);
	payloads.remove(&keep.checksum());
	let mut lookup = ReusingLookup {
		payloads,
		keep: Arc::clone(&keep),
		decoded: Vec::new(),
		built: Vec::new(),
	};

	let rebuilt = assemble_with(new.checksum(), &mut lookup).unwrap();

	assert_eq!(rebuilt.checksum(), new.checksum());
	assert!(Arc::ptr_eq(rebuilt.document(&old.d2).unwrap(), &keep));
	let d1 = new.document(&old.d1).unwrap().checksum();
	assert_eq!(lookup.built, vec![d1]);
	assert!(!lookup.decoded.contains(&keep.checksum()));
}

#[test]
fn malformed_payload_is_an_error() {
	assert!(NodePayload::decode(&[0xff, 0xff, 0xff]).is_err());
}

#[test]
fn structural_edits_validate_ids() {
	let f = fixture("A", "X");
	let ghost = DocumentId::new("ghost");
	assert_eq!(
		f.solution.with_document_text(&ghost, "x").unwrap_err(),
		GraphError::DocumentNotFound(ghost.clone())
	);

	let dup = DocumentNode::new(DocumentInfo::new(f.d1.clone(), "dup.rs", DocumentKind::Regular), "");
	assert_eq!(
		f.solution.with_document_added(&f.project, dup).unwrap_err(),
		GraphError::DuplicateDocument(f.d1.clone())
	);

	let added = f
		.solution
		.with_document_added(&f.project, DocumentNode::new(DocumentInfo::new(ghost.clone(), "g.rs", DocumentKind::Additional), ""))
		.unwrap();
	assert_eq!(added.project(&f.project).unwrap().documents().len(), 3);

	let removed = added.with_document_removed(&ghost).unwrap();
	assert_eq!(removed.checksum(), f.solution.checksum());

	let dropped = f.solution.with_project_removed(&f.project).unwrap();
	assert!(dropped.projects().is_empty());
	assert_eq!(
		dropped.with_project_removed(&f.project).unwrap_err(),
		GraphError::ProjectNotFound(f.project.clone())
	);
}

#[test]
fn project_info_edit_shares_documents() {
	let f = fixture("A", "X");
	let mut info = f.solution.project(&f.project).unwrap().info().clone();
	info.options.insert("edition".into(), "2024".into());
	let after = f.solution.with_project_info(info).unwrap();

	let old_project = f.solution.project(&f.project).unwrap();
	let new_project = after.project(&f.project).unwrap();
	assert_ne!(new_project.checksum(), old_project.checksum());
	assert!(Arc::ptr_eq(&new_project.documents()[0], &old_project.documents()[0]));
}

#[test]
fn walk_visits_every_node_once_in_pre_order() {
	let f = fixture("A", "X");
	let mut kinds = Vec::new();
	f.solution.walk(|node| kinds.push(node.kind()));
	assert_eq!(kinds, vec![NodeKind::Solution, NodeKind::Project, NodeKind::Document, NodeKind::Document]);
	assert_eq!(f.solution.node_count(), kinds.len());
}

proptest! {
	#[test]
	fn edits_never_disturb_siblings(texts in prop::collection::vec(".{0,24}", 2..6), target in any::<prop::sample::Index>(), replacement in ".{0,24}") {
		let project_id = ProjectId::new("P");
		let ids: Vec<DocumentId> = (0..texts.len()).map(|i| DocumentId::new(format!("d{i}"))).collect();
		let documents = ids
			.iter()
			.zip(&texts)
			.map(|(id, text)| DocumentNode::new(DocumentInfo::new(id.clone(), "f", DocumentKind::Regular), text.as_str()));
		let solution = SolutionNode::new(
			SolutionInfo::new(SolutionId::new("S")),
			[ProjectNode::new(ProjectInfo::new(project_id, "P", "rust"), documents)],
		);

		let target = target.index(ids.len());
		prop_assume!(texts[target] != replacement);
		let edited = solution.with_document_text(&ids[target], replacement.as_str()).unwrap();

		prop_assert_ne!(edited.checksum(), solution.checksum());
		for (i, id) in ids.iter().enumerate() {
			let before = solution.document(id).unwrap().checksum();
			let after = edited.document(id).unwrap().checksum();
			if i == target {
				prop_assert_ne!(before, after);
			} else {
				prop_assert_eq!(before, after);
			}
		}
	}
}

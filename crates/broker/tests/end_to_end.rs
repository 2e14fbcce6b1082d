//! Host and remote wired together through the request types.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use trellis_assets::AssetCache;
use trellis_broker::{
	DocumentEvent, HostEndpoint, ListenerError, RemoteEndpoint, RemoteSession, RequestPayload, ResponsePayload, ServiceRegistry, TrellisConfig,
	WorkspaceChange, WorkspaceListener,
};
use trellis_graph::{DocumentInfo, DocumentKind, DocumentNode, ProjectInfo, ProjectNode, SolutionInfo, SolutionNode};
use trellis_host::{HostAssetStore, HostConfig, Workspace};
use trellis_primitives::{Checksum, DocumentId, DocumentNotification, ProjectId, SolutionId};
use trellis_sync::{AssetSource, LateBoundSource, SyncError};
use trellis_worker::SessionClock;

/// Records every checksum the remote asks the host for.
struct Recording {
	host: HostEndpoint,
	requested: Mutex<Vec<Checksum>>,
}

impl Recording {
	fn take(&self) -> Vec<Checksum> {
		std::mem::take(&mut *self.requested.lock().unwrap())
	}
}

#[async_trait]
impl AssetSource for Recording {
	async fn get_missing_assets(&self, checksums: &[Checksum], cancel: &CancellationToken) -> Result<Vec<Bytes>, SyncError> {
		self.requested.lock().unwrap().extend_from_slice(checksums);
		self.host.get_missing_assets(checksums, cancel).await
	}
}

/// Remembers the text of D1 in every version it is shown.
struct TextTracker {
	document: DocumentId,
	texts: Mutex<Vec<String>>,
}

#[async_trait]
impl WorkspaceListener for TextTracker {
	async fn document_opened(&self, event: &DocumentEvent, _cancel: &CancellationToken) -> Result<(), ListenerError> {
		self.texts.lock().unwrap().push(format!("opened:{}", event.document.text()));
		Ok(())
	}

	async fn workspace_changed(&self, change: &WorkspaceChange, _cancel: &CancellationToken) -> Result<(), ListenerError> {
		let old = change.old.document(&self.document).ok_or_else(|| ListenerError::new("missing in old"))?;
		let new = change.new.document(&self.document).ok_or_else(|| ListenerError::new("missing in new"))?;
		self.texts.lock().unwrap().push(format!("{}->{}", old.text(), new.text()));
		Ok(())
	}
}

fn sorted(mut checksums: Vec<Checksum>) -> Vec<Checksum> {
	checksums.sort();
	checksums
}

#[tokio::test]
async fn edit_transfers_only_the_changed_path_and_events_arrive_in_order() {
	let _ = tracing_subscriber::fmt::try_init();

	let project_id = ProjectId::new("P");
	let d1 = DocumentId::new("D1");
	let d2 = DocumentId::new("D2");
	let solution = SolutionNode::new(
		SolutionInfo::new(SolutionId::new("S")),
		[ProjectNode::new(
			ProjectInfo::new(project_id.clone(), "P", "rust"),
			[
				DocumentNode::new(DocumentInfo::new(d1.clone(), "d1.rs", DocumentKind::Regular), "A"),
				DocumentNode::new(DocumentInfo::new(d2.clone(), "d2.rs", DocumentKind::Regular), "X"),
			],
		)],
	);
	let store = HostAssetStore::new();
	let mut workspace = Workspace::new(solution, store.clone(), &HostConfig::default());
	let v1 = workspace.current().clone();

	// Remote comes up before its host connection.
	let late = Arc::new(LateBoundSource::new());
	let cache = AssetCache::default();
	let session = RemoteSession::connect(
		&SessionClock::new(),
		cache.clone(),
		late.clone(),
		Arc::new(ServiceRegistry::builder().build().unwrap()),
		&TrellisConfig::default(),
	);
	let tracker = Arc::new(TextTracker {
		document: d1.clone(),
		texts: Mutex::new(Vec::new()),
	});
	session.events().subscribe(tracker.clone()).unwrap();
	let remote = RemoteEndpoint::new(session.events().clone());
	let cancel = CancellationToken::new();

	let open = remote.handle(
		RequestPayload::DocumentOpened(DocumentNotification {
			checksum: v1.checksum(),
			document_id: d1.clone(),
		}),
		&cancel,
	);

	let recording = Arc::new(Recording {
		host: HostEndpoint::new(store.clone()),
		requested: Mutex::new(Vec::new()),
	});
	assert!(late.attach(recording.clone()));
	assert_eq!(open.await, Ok(ResponsePayload::Ack));

	let project = &v1.projects()[0];
	assert_eq!(
		sorted(recording.take()),
		sorted(vec![
			v1.checksum(),
			project.checksum(),
			v1.document(&d1).unwrap().checksum(),
			v1.document(&d2).unwrap().checksum(),
		])
	);

	// Two edits, forwarded back to back.
	let first = workspace.set_document_text(&d1, "B").unwrap();
	let v2 = workspace.current().clone();
	let second = workspace.set_document_text(&d1, "C").unwrap();
	let ack_first = remote.handle(RequestPayload::WorkspaceChanged(first), &cancel);
	let ack_second = remote.handle(RequestPayload::WorkspaceChanged(second), &cancel);
	assert_eq!(ack_second.await, Ok(ResponsePayload::Ack));
	assert_eq!(ack_first.await, Ok(ResponsePayload::Ack));

	let transferred = recording.take();
	let v3 = workspace.current();
	let changed_path = |s: &SolutionNode| vec![s.checksum(), s.projects()[0].checksum(), s.document(&d1).unwrap().checksum()];
	let mut expected = changed_path(&v2);
	expected.extend(changed_path(v3));
	assert_eq!(sorted(transferred), sorted(expected), "only S, P and D1 of each new version travel");
	assert!(!recording.requested.lock().unwrap().contains(&v1.document(&d2).unwrap().checksum()));

	assert_eq!(*tracker.texts.lock().unwrap(), vec!["opened:A", "A->B", "B->C"]);
	assert_eq!(cache.stats().pinned_entries, 0, "every dispatch released its pins");

	session.disconnect();
	let after = remote
		.handle(
			RequestPayload::DocumentOpened(DocumentNotification {
				checksum: v3.checksum(),
				document_id: d1,
			}),
			&cancel,
		)
		.await;
	assert!(after.is_err());
}

//! # Attachment Store
//!
//! Turns selected files into typed, serializable `Attachment` records and
//! holds them until the next submission takes them.
//!
//! Every ingestion gets a stable `AttachmentId` when it *starts*. Reads run
//! independently and may finish in any order; each finished read is appended
//! in completion order. Removal is keyed by id, never by position, so a
//! removal cannot hit the wrong file when a read lands in between.
//!
//! ```text
//! begin() ──► id (in flight) ──read──► complete(id, result) ──► pending[]
//!                 │                                                 │
//!                 └──── remove(id) / clear() ──► completion dropped  └──► take_all()
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
];

const TEXT_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("toml", "application/toml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("rs", "text/x-rust"),
    ("py", "text/x-python"),
];

/// A file attached to a user message. Immutable once created.
///
/// `payload` is a base64 data-URL for images and the decoded text for
/// everything else.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub payload: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Stable identity for one ingestion, allocated before the read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttachmentId(u64);

impl From<u64> for AttachmentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure to ingest one file. Other attachments are unaffected.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is {size} bytes, the limit is {max}")]
    TooLarge { name: String, size: u64, max: u64 },
}

/// Guess a mime type from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    IMAGE_TYPES
        .iter()
        .chain(TEXT_TYPES)
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

/// Reads one file into an `Attachment`.
pub async fn read_attachment(path: &Path, max_bytes: u64) -> Result<Attachment, IngestError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let io_err = |source| IngestError::Io {
        name: name.clone(),
        source,
    };

    let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
    if size > max_bytes {
        return Err(IngestError::TooLarge {
            name,
            size,
            max: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(io_err)?;
    let mime_type = mime_for_path(path).to_string();
    let payload = if mime_type.starts_with("image/") {
        format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes))
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };

    debug!("Read attachment {} ({}, {} bytes)", name, mime_type, bytes.len());
    Ok(Attachment {
        name,
        mime_type,
        payload,
    })
}

/// A finished ingestion waiting for the next submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub id: AttachmentId,
    pub attachment: Attachment,
}

/// What happened to a completed read.
#[derive(Debug)]
pub enum IngestOutcome {
    Added(AttachmentId),
    Failed(IngestError),
    /// The id was removed or the draft was cleared while the read ran.
    Discarded,
}

/// Pending attachments for the message being drafted.
#[derive(Debug, Default)]
pub struct AttachmentStore {
    next_id: u64,
    in_flight: BTreeSet<AttachmentId>,
    pending: Vec<PendingAttachment>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for a read that is about to start.
    pub fn begin(&mut self) -> AttachmentId {
        self.next_id += 1;
        let id = AttachmentId(self.next_id);
        self.in_flight.insert(id);
        id
    }

    /// Records the result of a read started with `begin`.
    pub fn complete(
        &mut self,
        id: AttachmentId,
        result: Result<Attachment, IngestError>,
    ) -> IngestOutcome {
        if !self.in_flight.remove(&id) {
            debug!("Dropping completed read {} (no longer wanted)", id);
            return IngestOutcome::Discarded;
        }
        match result {
            Ok(attachment) => {
                self.pending.push(PendingAttachment { id, attachment });
                IngestOutcome::Added(id)
            }
            Err(e) => {
                warn!("Attachment {} failed: {}", id, e);
                IngestOutcome::Failed(e)
            }
        }
    }

    /// Removes a pending attachment or cancels an in-flight one.
    /// Returns false when the id is unknown.
    pub fn remove(&mut self, id: AttachmentId) -> bool {
        if self.in_flight.remove(&id) {
            return true;
        }
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    /// Hands every finished attachment to the caller, in completion order.
    /// Reads still in flight stay in flight and land in the next draft.
    pub fn take_all(&mut self) -> Vec<Attachment> {
        self.pending.drain(..).map(|p| p.attachment).collect()
    }

    /// Drops everything, including reads still running.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight.clear();
    }

    pub fn pending(&self) -> &[PendingAttachment] {
        &self.pending
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_file(name: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            payload: "body".to_string(),
        }
    }

    #[test]
    fn test_completion_order_not_selection_order() {
        let mut store = AttachmentStore::new();
        let first = store.begin();
        let second = store.begin();

        store.complete(second, Ok(text_file("b.txt")));
        store.complete(first, Ok(text_file("a.txt")));

        let names: Vec<_> = store.pending().iter().map(|p| p.attachment.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
    }

    #[test]
    fn test_remove_by_id_survives_late_completion() {
        let mut store = AttachmentStore::new();
        let a = store.begin();
        let b = store.begin();
        let c = store.begin();
        store.complete(a, Ok(text_file("a.txt")));
        store.complete(b, Ok(text_file("b.txt")));

        // Removing "b" then letting "c" land must not disturb "a".
        assert!(store.remove(b));
        store.complete(c, Ok(text_file("c.txt")));

        let names: Vec<_> = store.pending().iter().map(|p| p.attachment.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
        assert!(!store.remove(b));
    }

    #[test]
    fn test_remove_in_flight_discards_completion() {
        let mut store = AttachmentStore::new();
        let id = store.begin();
        assert!(store.remove(id));
        assert!(matches!(
            store.complete(id, Ok(text_file("late.txt"))),
            IngestOutcome::Discarded
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_read_is_isolated() {
        let mut store = AttachmentStore::new();
        let ok = store.begin();
        let bad = store.begin();
        store.complete(ok, Ok(text_file("ok.txt")));
        let outcome = store.complete(
            bad,
            Err(IngestError::TooLarge {
                name: "huge.bin".to_string(),
                size: 10,
                max: 1,
            }),
        );
        assert!(matches!(outcome, IngestOutcome::Failed(_)));
        assert_eq!(store.pending().len(), 1);
        assert_eq!(store.in_flight_count(), 0);
    }

    #[test]
    fn test_take_all_leaves_in_flight_reads() {
        let mut store = AttachmentStore::new();
        let done = store.begin();
        let running = store.begin();
        store.complete(done, Ok(text_file("done.txt")));

        let taken = store.take_all();
        assert_eq!(taken.len(), 1);
        assert!(store.is_empty());

        store.complete(running, Ok(text_file("running.txt")));
        assert_eq!(store.pending().len(), 1);
    }

    #[test]
    fn test_clear_drops_in_flight() {
        let mut store = AttachmentStore::new();
        let id = store.begin();
        store.clear();
        assert!(matches!(
            store.complete(id, Ok(text_file("x.txt"))),
            IngestOutcome::Discarded
        ));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = AttachmentStore::new();
        let a = store.begin();
        store.clear();
        let b = store.begin();
        assert_ne!(a, b);
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("cat.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("notes.md")), "text/markdown");
        assert_eq!(mime_for_path(Path::new("Makefile")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_read_image_as_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, [0x89u8, b'P', b'N', b'G']).unwrap();

        let attachment = read_attachment(&path, DEFAULT_MAX_ATTACHMENT_BYTES).await.unwrap();
        assert_eq!(attachment.name, "dot.png");
        assert!(attachment.is_image());
        assert_eq!(attachment.payload, "data:image/png;base64,iVBORw==");
    }

    #[tokio::test]
    async fn test_read_text_as_decoded_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\nline two").unwrap();

        let attachment = read_attachment(&path, DEFAULT_MAX_ATTACHMENT_BYTES).await.unwrap();
        assert!(!attachment.is_image());
        assert_eq!(attachment.mime_type, "text/plain");
        assert_eq!(attachment.payload, "line one\nline two");
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "0123456789").unwrap();

        let err = read_attachment(&path, 4).await.unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { size: 10, max: 4, .. }));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let err = read_attachment(Path::new("/definitely/not/here.txt"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Io { ref name, .. } if name == "here.txt"));
    }
}

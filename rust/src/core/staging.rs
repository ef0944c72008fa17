//! Media the user has picked or recorded but not sent yet.

use std::path::{Path, PathBuf};

use crate::grouping::format_elapsed;
use crate::state::{StagedAttachment, StagedKind};

/// Encoded preview of a photo or video poster frame.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Thumbnail {
    pub(crate) jpeg: Vec<u8>,
    /// Dimensions of the source image, not of the shrunken preview.
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnail")
            .field("jpeg_len", &self.jpeg.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingAttachment {
    pub(crate) id: String,
    pub(crate) kind: StagedKind,
    pub(crate) thumbnail: Option<Thumbnail>,
    /// Staged video copy or recorded audio file. Owned by the queue: deleted
    /// when the item is discarded.
    pub(crate) source_path: Option<PathBuf>,
    pub(crate) duration_secs: Option<f64>,
}

impl PendingAttachment {
    pub(crate) fn photo(thumbnail: Thumbnail) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: StagedKind::Photo,
            thumbnail: Some(thumbnail),
            source_path: None,
            duration_secs: None,
        }
    }

    pub(crate) fn video(staged_copy: PathBuf, poster: Option<Thumbnail>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: StagedKind::Video,
            thumbnail: poster,
            source_path: Some(staged_copy),
            duration_secs: None,
        }
    }

    pub(crate) fn audio(path: PathBuf, duration_secs: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: StagedKind::Audio,
            thumbnail: None,
            source_path: Some(path),
            duration_secs: Some(duration_secs),
        }
    }

    pub(crate) fn to_view(&self) -> StagedAttachment {
        StagedAttachment {
            id: self.id.clone(),
            kind: self.kind,
            thumbnail_jpeg: self.thumbnail.as_ref().map(|t| t.jpeg.clone()),
            width: self.thumbnail.as_ref().map(|t| t.width),
            height: self.thumbnail.as_ref().map(|t| t.height),
            duration_secs: self.duration_secs,
            duration_label: self.duration_secs.map(format_elapsed),
        }
    }
}

/// Remove a staged file. Missing files are fine; anything else is logged.
pub(crate) fn delete_staged_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "deleted staged file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), %e, "failed to delete staged file"),
    }
}

fn discard(item: PendingAttachment) {
    if let Some(path) = &item.source_path {
        delete_staged_file(path);
    }
}

/// One attachment on its way out, with the body its message will carry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutgoingMedia {
    pub(crate) attachment: PendingAttachment,
    pub(crate) body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SendPlan {
    Nothing,
    Text(String),
    Media(Vec<OutgoingMedia>),
}

#[derive(Debug, Default)]
pub(crate) struct AttachmentStagingQueue {
    items: Vec<PendingAttachment>,
}

impl AttachmentStagingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn items(&self) -> &[PendingAttachment] {
        &self.items
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Swap the picked media for a fresh selection. A staged voice recording
    /// survives at the head of the queue.
    pub(crate) fn replace_picked(&mut self, resolved: Vec<PendingAttachment>) {
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| item.kind == StagedKind::Audio);
        dropped.into_iter().for_each(discard);
        self.items = kept;
        self.items.extend(resolved);
    }

    /// Stage a recording at the head, discarding any earlier recording.
    pub(crate) fn add_recorded_audio(
        &mut self,
        path: PathBuf,
        duration_secs: f64,
    ) -> &PendingAttachment {
        if let Some(pos) = self.items.iter().position(|i| i.kind == StagedKind::Audio) {
            let previous = self.items.remove(pos);
            tracing::debug!(attachment_id = %previous.id, "replacing staged recording");
            discard(previous);
        }
        self.items
            .insert(0, PendingAttachment::audio(path, duration_secs));
        &self.items[0]
    }

    pub(crate) fn remove(&mut self, attachment_id: &str) -> Option<PendingAttachment> {
        let pos = self.items.iter().position(|i| i.id == attachment_id)?;
        let item = self.items.remove(pos);
        if let Some(path) = &item.source_path {
            delete_staged_file(path);
        }
        Some(item)
    }

    /// Drain the queue into a send plan. Only the first attachment carries
    /// the caption, sent as typed; whitespace-only text counts as none.
    ///
    /// Staged files are handed to the plan, not deleted.
    pub(crate) fn take_for_send(&mut self, caption: &str) -> SendPlan {
        let caption = if caption.trim().is_empty() { "" } else { caption };
        if self.items.is_empty() {
            if caption.is_empty() {
                return SendPlan::Nothing;
            }
            return SendPlan::Text(caption.to_string());
        }
        let outgoing = std::mem::take(&mut self.items)
            .into_iter()
            .enumerate()
            .map(|(i, attachment)| OutgoingMedia {
                attachment,
                body: if i == 0 {
                    caption.to_string()
                } else {
                    String::new()
                },
            })
            .collect();
        SendPlan::Media(outgoing)
    }

    /// Close-time cleanup: every staged file is deleted.
    pub(crate) fn teardown(&mut self) {
        std::mem::take(&mut self.items).into_iter().for_each(discard);
    }

    pub(crate) fn views(&self) -> Vec<StagedAttachment> {
        self.items.iter().map(PendingAttachment::to_view).collect()
    }
}

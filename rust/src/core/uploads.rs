//! Per-attachment upload pipelines: blob upload(s), then the message record.
//!
//! Each pipeline is independent. A failure is reported for that attachment
//! only; siblings from the same send keep going.

use std::sync::Arc;

use chatroom_backend_traits::{ChatBackend, MediaFields, MessageKind, UploadCategory};
use flume::Sender;

use super::staging::{delete_staged_file, OutgoingMedia, PendingAttachment};
use crate::error::ChatRoomError;
use crate::state::{StagedKind, UploadPhase};
use crate::updates::{CoreMsg, InternalEvent};

pub(crate) struct UploadJob {
    pub(crate) upload_id: String,
    pub(crate) chat_id: String,
    pub(crate) sender_id: String,
    pub(crate) media: OutgoingMedia,
}

/// Reports phase transitions back to the actor.
struct Progress<'a> {
    upload_id: &'a str,
    tx: &'a Sender<CoreMsg>,
}

impl Progress<'_> {
    fn persisting(&self) {
        let _ = self.tx.send(CoreMsg::Internal(Box::new(
            InternalEvent::UploadPhaseChanged {
                upload_id: self.upload_id.to_string(),
                phase: UploadPhase::Persisting,
            },
        )));
    }
}

async fn read_source(attachment: &PendingAttachment) -> Result<Vec<u8>, ChatRoomError> {
    let path = attachment
        .source_path
        .as_deref()
        .ok_or_else(|| ChatRoomError::Media("attachment has no source file".to_string()))?;
    tokio::fs::read(path)
        .await
        .map_err(|e| ChatRoomError::Media(format!("read {}: {e}", path.display())))
}

async fn upload(
    backend: &dyn ChatBackend,
    bytes: Vec<u8>,
    category: UploadCategory,
) -> Result<String, ChatRoomError> {
    backend
        .upload_blob(bytes, category)
        .await
        .map_err(ChatRoomError::UploadFailed)
}

async fn send_photo(
    backend: &dyn ChatBackend,
    job: &UploadJob,
    progress: &Progress<'_>,
) -> Result<(), ChatRoomError> {
    let thumbnail = job
        .media
        .attachment
        .thumbnail
        .as_ref()
        .ok_or_else(|| ChatRoomError::Media("photo has no image data".to_string()))?;
    let url = upload(backend, thumbnail.jpeg.clone(), UploadCategory::PhotoMessage).await?;
    progress.persisting();
    let media = MediaFields {
        thumbnail_url: Some(url),
        thumbnail_width: Some(thumbnail.width),
        thumbnail_height: Some(thumbnail.height),
        ..MediaFields::default()
    };
    persist(backend, job, MessageKind::Photo, media).await
}

async fn send_video(
    backend: &dyn ChatBackend,
    job: &UploadJob,
    progress: &Progress<'_>,
) -> Result<(), ChatRoomError> {
    let attachment = &job.media.attachment;
    let poster = attachment
        .thumbnail
        .as_ref()
        .ok_or_else(|| ChatRoomError::Media("video has no poster frame".to_string()))?;
    let bytes = read_source(attachment).await?;

    let (video_url, poster_url) = tokio::join!(
        upload(backend, bytes, UploadCategory::VideoMessage),
        upload(backend, poster.jpeg.clone(), UploadCategory::PhotoMessage),
    );
    let (video_url, poster_url) = (video_url?, poster_url?);
    progress.persisting();
    let media = MediaFields {
        thumbnail_url: Some(poster_url),
        thumbnail_width: Some(poster.width),
        thumbnail_height: Some(poster.height),
        video_url: Some(video_url),
        ..MediaFields::default()
    };
    persist(backend, job, MessageKind::Video, media).await
}

async fn send_audio(
    backend: &dyn ChatBackend,
    job: &UploadJob,
    progress: &Progress<'_>,
) -> Result<(), ChatRoomError> {
    let attachment = &job.media.attachment;
    let bytes = read_source(attachment).await?;
    let url = upload(backend, bytes, UploadCategory::VoiceMessage).await?;
    progress.persisting();
    let media = MediaFields {
        audio_url: Some(url),
        audio_duration_secs: attachment.duration_secs,
        ..MediaFields::default()
    };
    persist(backend, job, MessageKind::Audio, media).await
}

async fn persist(
    backend: &dyn ChatBackend,
    job: &UploadJob,
    kind: MessageKind,
    media: MediaFields,
) -> Result<(), ChatRoomError> {
    backend
        .send_media_message(&job.chat_id, &job.sender_id, kind, media, &job.media.body)
        .await
        .map_err(ChatRoomError::PersistFailed)
}

/// Run one pipeline to completion and report the outcome.
///
/// Staged files are deleted afterwards whatever the outcome.
pub(crate) async fn run_upload(backend: Arc<dyn ChatBackend>, job: UploadJob, tx: Sender<CoreMsg>) {
    let progress = Progress {
        upload_id: &job.upload_id,
        tx: &tx,
    };
    let backend = backend.as_ref();
    let result = match job.media.attachment.kind {
        StagedKind::Photo => send_photo(backend, &job, &progress).await,
        StagedKind::Video => send_video(backend, &job, &progress).await,
        StagedKind::Audio => send_audio(backend, &job, &progress).await,
    };
    if let Some(path) = job.media.attachment.source_path.as_deref() {
        delete_staged_file(path);
    }
    let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::UploadFinished {
        upload_id: job.upload_id,
        result,
    })));
}

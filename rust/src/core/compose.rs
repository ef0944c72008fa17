use std::path::PathBuf;

use super::media::{resolve_selection, ResolveContext};
use super::staging::{delete_staged_file, PendingAttachment, SendPlan};
use super::uploads::{run_upload, UploadJob};
use super::AppCore;
use crate::error::ChatRoomError;
use crate::state::{PickerItem, UploadPhase, UploadProgress};
use crate::updates::InternalEvent;

/// Delete the staged copies of attachments nobody will send.
fn discard_resolved(attachments: Vec<PendingAttachment>) {
    for attachment in attachments {
        if let Some(path) = attachment.source_path.as_deref() {
            delete_staged_file(path);
        }
    }
}

impl AppCore {
    pub(super) fn stage_recording(&mut self, path: String, duration_secs: f64) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let staged = room
            .staging
            .add_recorded_audio(PathBuf::from(path), duration_secs);
        tracing::debug!(attachment_id = %staged.id, duration_secs, "recording staged");
        self.emit_state();
    }

    pub(super) fn resolve_picker_selection(&mut self, items: Vec<PickerItem>) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        room.picker_seq += 1;
        let selection = room.picker_seq;
        let generation = room.generation;

        let frame_source = match self.frame_source.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        };
        let ctx = ResolveContext {
            staging_dir: self.config.media_staging_dir(&self.data_dir),
            thumbnail_max_edge: self.config.thumbnail_max_edge(),
            video_thumbnail_at_secs: self.config.video_thumbnail_at_secs(),
            frame_source,
        };
        let tx = self.core_sender.clone();
        self.runtime.spawn_blocking(move || {
            let attachments = resolve_selection(&items, &ctx);
            Self::send_internal(
                &tx,
                InternalEvent::PickerSelectionResolved {
                    generation,
                    selection,
                    attachments,
                },
            );
        });
        self.set_busy(|b| b.resolving_media = true);
        self.emit_state();
    }

    pub(super) fn on_picker_resolved(
        &mut self,
        generation: u64,
        selection: u64,
        attachments: Vec<PendingAttachment>,
    ) {
        let Some(room) = self.room_for(generation) else {
            discard_resolved(attachments);
            return;
        };
        if room.picker_seq != selection {
            tracing::debug!(selection, current = room.picker_seq, "superseded picker selection dropped");
            discard_resolved(attachments);
            return;
        }
        tracing::debug!(count = attachments.len(), "picker selection staged");
        room.staging.replace_picked(attachments);
        self.set_busy(|b| b.resolving_media = false);
        self.emit_state();
    }

    /// Dispatch the draft and staged media, then clear the composer right
    /// away. Uploads continue in the background.
    pub(super) fn send_staged(&mut self, user_id: String) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let chat_id = room.chat_id.clone();
        let plan = room.staging.take_for_send(&room.draft);
        if !matches!(plan, SendPlan::Nothing) {
            // A selection still resolving belongs to the composer being cleared.
            room.picker_seq += 1;
            self.state.busy.resolving_media = false;
        }
        match plan {
            SendPlan::Nothing => return,
            SendPlan::Text(body) => {
                let backend = self.backend.clone();
                let tx = self.core_sender.clone();
                self.runtime.spawn(async move {
                    let result = backend.send_text_message(&chat_id, &user_id, &body).await;
                    Self::send_internal(&tx, InternalEvent::TextSent { chat_id, result });
                });
            }
            SendPlan::Media(outgoing) => {
                tracing::info!(%chat_id, count = outgoing.len(), "sending media");
                for media in outgoing {
                    let upload_id = uuid::Uuid::new_v4().to_string();
                    self.state.uploads.push(UploadProgress {
                        upload_id: upload_id.clone(),
                        chat_id: chat_id.clone(),
                        kind: media.attachment.kind,
                        phase: UploadPhase::Uploading,
                    });
                    let job = UploadJob {
                        upload_id,
                        chat_id: chat_id.clone(),
                        sender_id: user_id.clone(),
                        media,
                    };
                    self.runtime
                        .spawn(run_upload(self.backend.clone(), job, self.core_sender.clone()));
                }
            }
        }
        if let Some(room) = self.room.as_mut() {
            room.draft.clear();
        }
        self.emit_state();
    }

    pub(super) fn on_upload_phase(&mut self, upload_id: String, phase: UploadPhase) {
        if let Some(progress) = self
            .state
            .uploads
            .iter_mut()
            .find(|u| u.upload_id == upload_id)
        {
            progress.phase = phase;
            self.emit_state();
        }
    }

    pub(super) fn on_upload_finished(
        &mut self,
        upload_id: String,
        result: Result<(), ChatRoomError>,
    ) {
        let Some(pos) = self
            .state
            .uploads
            .iter()
            .position(|u| u.upload_id == upload_id)
        else {
            return;
        };
        let progress = self.state.uploads.remove(pos);
        match result {
            Ok(()) => tracing::info!(%upload_id, kind = ?progress.kind, "media sent"),
            // No retry and no toast: the pipeline is just dropped.
            Err(err) => {
                tracing::warn!(%upload_id, chat_id = %progress.chat_id, kind = ?progress.kind, %err, "media send failed")
            }
        }
        self.emit_state();
    }
}

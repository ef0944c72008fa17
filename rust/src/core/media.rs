//! Turns picker selections into staged attachments: decode, shrink, encode.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};

use super::staging::{PendingAttachment, Thumbnail};
use crate::error::ChatRoomError;
use crate::state::{PickedKind, PickerItem};
use crate::VideoFrameSource;

#[derive(Debug, thiserror::Error)]
pub(crate) enum MediaError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("no video frame source registered")]
    NoFrameSource,
    #[error("no frame at {0}s")]
    NoFrame(f64),
}

impl MediaError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<MediaError> for ChatRoomError {
    fn from(e: MediaError) -> Self {
        ChatRoomError::Media(e.to_string())
    }
}

/// Everything resolution needs, captured so it can run off the actor thread.
#[derive(Clone)]
pub(crate) struct ResolveContext {
    pub(crate) staging_dir: PathBuf,
    pub(crate) thumbnail_max_edge: u32,
    pub(crate) video_thumbnail_at_secs: f64,
    pub(crate) frame_source: Option<Arc<dyn VideoFrameSource>>,
}

/// Decode `bytes`, shrink to fit `max_edge` and re-encode as JPEG.
///
/// The returned dimensions are those of the source image.
pub(crate) fn make_thumbnail(bytes: &[u8], max_edge: u32) -> Result<Thumbnail, MediaError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());
    let preview = if width > max_edge || height > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img
    };
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(preview.to_rgb8());
    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
    Ok(Thumbnail {
        jpeg,
        width,
        height,
    })
}

pub(crate) fn resolve_image(path: &Path, max_edge: u32) -> Result<PendingAttachment, MediaError> {
    let bytes = std::fs::read(path).map_err(|e| MediaError::io(path, e))?;
    Ok(PendingAttachment::photo(make_thumbnail(&bytes, max_edge)?))
}

/// Copy the video into the staging dir and grab a poster frame.
///
/// The copy is removed again if no poster can be produced.
pub(crate) fn resolve_video(
    path: &Path,
    ctx: &ResolveContext,
) -> Result<PendingAttachment, MediaError> {
    let source = ctx.frame_source.as_ref().ok_or(MediaError::NoFrameSource)?;
    std::fs::create_dir_all(&ctx.staging_dir).map_err(|e| MediaError::io(&ctx.staging_dir, e))?;
    let copy = ctx
        .staging_dir
        .join(format!("{}.mov", uuid::Uuid::new_v4()));
    std::fs::copy(path, &copy).map_err(|e| MediaError::io(path, e))?;

    let poster = source
        .frame_at(
            copy.to_string_lossy().into_owned(),
            ctx.video_thumbnail_at_secs,
        )
        .ok_or(MediaError::NoFrame(ctx.video_thumbnail_at_secs))
        .and_then(|frame| make_thumbnail(&frame, ctx.thumbnail_max_edge));
    match poster {
        Ok(poster) => Ok(PendingAttachment::video(copy, Some(poster))),
        Err(e) => {
            super::staging::delete_staged_file(&copy);
            Err(e)
        }
    }
}

/// Resolve a picker selection in order. Items that fail are logged and
/// skipped.
pub(crate) fn resolve_selection(items: &[PickerItem], ctx: &ResolveContext) -> Vec<PendingAttachment> {
    items
        .iter()
        .filter_map(|item| {
            let path = Path::new(&item.path);
            let resolved = match item.kind {
                PickedKind::Image => resolve_image(path, ctx.thumbnail_max_edge),
                PickedKind::Video => resolve_video(path, ctx),
            };
            match resolved {
                Ok(attachment) => Some(attachment),
                Err(e) => {
                    tracing::warn!(item_id = %item.id, kind = ?item.kind, %e, "skipping picked item");
                    None
                }
            }
        })
        .collect()
}

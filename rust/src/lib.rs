mod actions;
mod core;
mod error;
pub mod grouping;
mod logging;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use chatroom_backend_traits::ChatBackend;
use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use error::ChatRoomError;
pub use state::*;
pub use updates::AppUpdate;

use crate::core::SharedFrameSource;
use crate::updates::CoreMsg;

/// Return the default `chatroom_config.json` payload used when no config file exists.
#[uniffi::export]
pub fn default_config_json() -> String {
    core::default_app_config_json()
}

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

/// Platform-side video decoder used for poster frames of picked videos.
///
/// Returns an encoded still (JPEG/PNG) of the frame at `at_seconds`, or
/// `None` if the video cannot be read. Called off the main thread.
#[uniffi::export(callback_interface)]
pub trait VideoFrameSource: Send + Sync + 'static {
    fn frame_at(&self, video_path: String, at_seconds: f64) -> Option<Vec<u8>>;
}

#[derive(uniffi::Object)]
pub struct FfiApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
    video_frame_source: SharedFrameSource,
}

impl FfiApp {
    /// Start the app actor against `backend`.
    ///
    /// The backend is a Rust-side dependency; platform shells construct the
    /// app through a wrapper crate that owns the concrete backend.
    pub fn new(data_dir: String, backend: Arc<dyn ChatBackend>) -> Arc<Self> {
        logging::init_logging(&data_dir);
        tracing::info!(data_dir = %data_dir, "FfiApp::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));
        let video_frame_source: SharedFrameSource = Arc::new(RwLock::new(None));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        let frame_source_for_core = video_frame_source.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                backend,
                frame_source_for_core,
            );
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            video_frame_source,
        })
    }
}

#[uniffi::export]
impl FfiApp {
    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    pub fn set_video_frame_source(&self, source: Box<dyn VideoFrameSource>) {
        let source: Arc<dyn VideoFrameSource> = Arc::from(source);
        match self.video_frame_source.write() {
            Ok(mut slot) => {
                *slot = Some(source);
            }
            Err(poison) => {
                *poison.into_inner() = Some(source);
            }
        }
    }
}

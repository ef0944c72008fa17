/// Log targets for mobile builds: the core at debug, the in-memory backend at
/// info, everything else at info.
#[cfg(any(target_os = "ios", target_os = "android"))]
const MOBILE_FILTER: &str = "chatroom_core=debug,chatroom_memory_backend=info,info";

/// Install the tracing subscriber for the host platform. First call wins;
/// later calls (a second `FfiApp`, a CLI that set its own subscriber) are
/// no-ops.
///
/// iOS sends events to os_log under `com.chatroom.app` and mirrors them to
/// `<data_dir>/chatroom.log`. Android sends them to logcat with the
/// `chatroom` tag. Desktop and test builds print to stderr, honoring
/// `RUST_LOG`.
pub fn init_logging(#[allow(unused)] data_dir: &str) {
    #[cfg(target_os = "ios")]
    {
        use tracing_subscriber::prelude::*;

        let os_log = tracing_oslog::OsLogger::new("com.chatroom.app", "default");

        let log_path = std::path::Path::new(data_dir).join("chatroom.log");
        let _ = std::fs::create_dir_all(data_dir);
        let env_filter = tracing_subscriber::EnvFilter::new(MOBILE_FILTER);

        // Missing file layer is fine; os_log still receives everything.
        let file_layer = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok()
            .map(|file| {
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
            });

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(os_log)
            .with(file_layer)
            .try_init();
    }

    #[cfg(target_os = "android")]
    {
        use tracing_subscriber::prelude::*;

        let android_layer =
            paranoid_android::layer("chatroom").with_filter(tracing_subscriber::EnvFilter::new(MOBILE_FILTER));

        let _ = tracing_subscriber::registry()
            .with(android_layer)
            .try_init();
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "chatroom_core=debug,info".into()),
            )
            .try_init();
    }
}

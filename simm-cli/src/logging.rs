use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

type FileLayer = Option<Box<dyn Layer<Registry> + Send + Sync>>;

/// Handle for attaching the per-run log file after startup.
pub struct RunLog {
    handle: reload::Handle<FileLayer, Registry>,
}

/// Install the global subscriber writing to stderr. The file layer starts
/// empty; see [`RunLog::attach`].
pub fn init_tracing() -> RunLog {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (file_layer, handle) = reload::Layer::new(FileLayer::None);

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
    RunLog { handle }
}

impl RunLog {
    /// Start copying every event to `path` (created, parents included).
    pub fn attach(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory {}", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create run log {}", path.display()))?;
        let layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .boxed();
        self.handle
            .reload(Some(layer))
            .with_context(|| format!("failed to attach run log {}", path.display()))
    }
}

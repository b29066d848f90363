use std::{
    io::{ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

use super::TimeTrackerStore;

pub const STATE_FILE_NAME: &str = "tracker.json";

/// Interface for abstracting persistence of the tracker state. The state is
/// one composite document, so a save can never leave the totals and the
/// session lists pointing at different generations of the data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Loads the persisted state. A state that was never saved comes back
    /// as the empty default.
    async fn load(&self) -> Result<TimeTrackerStore>;

    /// Rewrites the persisted state in a single write.
    async fn save(&self, store: &TimeTrackerStore) -> Result<()>;
}

/// File-backed [StateStorage] keeping the state as pretty-printed JSON in
/// the application directory. Advisory locks guard against another
/// punchclock process reading a half-written document.
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(STATE_FILE_NAME),
        }
    }
}

#[async_trait]
impl StateStorage for JsonStateFile {
    async fn load(&self) -> Result<TimeTrackerStore> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {:?}, starting empty", self.path);
                return Ok(TimeTrackerStore::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Can't open state file {:?}", self.path))
            }
        };

        file.lock_shared()?;
        let mut contents = String::new();
        let read = file.read_to_string(&mut contents).await;
        file.unlock_async().await?;
        read?;

        let store = serde_json::from_str(&contents)
            .with_context(|| format!("Corrupted state file {:?}", self.path))?;
        Ok(store)
    }

    async fn save(&self, store: &TimeTrackerStore) -> Result<()> {
        let buffer = serde_json::to_vec_pretty(store)?;

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await
            .with_context(|| format!("Can't open state file {:?} for writing", self.path))?;

        // Truncation happens after the lock is held, not at open time.
        file.lock_exclusive()?;
        let written = overwrite(&mut file, &buffer).await;
        file.unlock_async().await?;
        written
    }
}

async fn overwrite(file: &mut File, buffer: &[u8]) -> Result<()> {
    file.set_len(0).await?;
    file.seek(SeekFrom::Start(0)).await?;
    file.write_all(buffer).await?;
    file.flush().await?;
    Ok(())
}

use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use crate::utils::time::date_to_session_name;

use super::entities::SessionRecordEntity;

/// Interface for abstracting storage of session records.
pub trait StatsStorage {
    /// Retrieves the stored session for a day. A day without a stored
    /// session, or one whose file can't be understood anymore, reads as
    /// `None` so the caller starts from empty counters.
    fn load_session(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<SessionRecordEntity>>> + Send;

    /// Persists the full session record for its day, atomically replacing
    /// whatever was there.
    fn store_session(
        &self,
        record: &SessionRecordEntity,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref + Sync> StatsStorage for T
where
    T::Target: StatsStorage + Sync,
{
    fn load_session(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<SessionRecordEntity>>> + Send {
        self.deref().load_session(date)
    }

    fn store_session(
        &self,
        record: &SessionRecordEntity,
    ) -> impl Future<Output = Result<()>> + Send {
        self.deref().store_session(record)
    }
}

/// The main realization of [StatsStorage]. One JSON file per UTC day; writes
/// go through a temp file in the same directory and an atomic rename, so an
/// interrupted daemon never leaves a half-written store behind.
pub struct StatsStorageImpl {
    session_dir: PathBuf,
}

impl StatsStorageImpl {
    pub fn new(session_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&session_dir)?;

        Ok(Self { session_dir })
    }

    fn session_path(&self, date: NaiveDate) -> PathBuf {
        self.session_dir.join(date_to_session_name(date))
    }

    async fn read_all(path: &Path) -> Result<Option<String>, std::io::Error> {
        debug!("Extracting {path:?}");
        let file = match File::open(path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        file.lock_shared()?;
        let mut file = file;
        let mut content = String::new();
        let read_result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        read_result?;
        Ok(Some(content))
    }
}

impl StatsStorage for StatsStorageImpl {
    async fn load_session(&self, date: NaiveDate) -> Result<Option<SessionRecordEntity>> {
        let path = self.session_path(date);
        let Some(content) = Self::read_all(&path).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<SessionRecordEntity>(&content) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                // Might happen after shutdowns on an older version of the
                // format. Recoverable, the day just starts over.
                warn!("Session file {path:?} holds illegal json: {e}");
                Ok(None)
            }
        }
    }

    async fn store_session(&self, record: &SessionRecordEntity) -> Result<()> {
        let path = self.session_path(record.date);
        let temp_path = self
            .session_dir
            .join(format!(".{}.tmp", date_to_session_name(record.date)));

        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await?;

        // Semi-safe acquire-release for the temp file, so two daemons racing
        // a checkpoint don't interleave their bytes.
        file.lock_exclusive()?;
        Self::write_record(file, record).await?;

        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

impl StatsStorageImpl {
    async fn write_record(mut file: File, record: &SessionRecordEntity) -> Result<()> {
        let write_all = async {
            let buffer = serde_json::to_vec(record)?;
            file.write_all(&buffer).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;
        file.unlock_async().await?;
        write_all
    }
}

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, error, warn};

use crate::tracker::state::WorkState;

use super::record::{decode, encode};

pub const STATE_COPIES: usize = 3;

/// Interface for abstracting persistence of the tracker state.
pub trait StateStore {
    /// Returns the most recent valid state, or `None` if nothing usable was found.
    fn load(&self) -> impl Future<Output = Option<WorkState>>;

    /// Persists the state. Implementations should attempt every location even if some fail.
    fn save(&self, state: &WorkState) -> impl Future<Output = Result<()>>;
}

/// Keeps the same state in several files so that a crash during a write or a damaged file
/// doesn't lose it.
pub struct RedundantStateStore {
    locations: Vec<PathBuf>,
}

impl RedundantStateStore {
    pub fn new(locations: Vec<PathBuf>) -> Result<Self> {
        if locations.len() < 2 {
            bail!("At least 2 state locations are needed, got {}", locations.len());
        }
        for location in &locations {
            if let Some(parent) = location.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {parent:?}"))?;
            }
        }
        Ok(Self { locations })
    }

    /// Standard layout: `work-log-state{1,2,3}.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::new(
            (1..=STATE_COPIES)
                .map(|i| dir.join(format!("work-log-state{i}.json")))
                .collect(),
        )
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }
}

impl StateStore for RedundantStateStore {
    async fn load(&self) -> Option<WorkState> {
        let mut best: Option<WorkState> = None;
        for path in &self.locations {
            match read_copy(path).await {
                Ok(state) => {
                    debug!("Found valid state in {path:?}, updated at {}", state.last_update);
                    if best
                        .as_ref()
                        .map_or(true, |b| state.last_update > b.last_update)
                    {
                        best = Some(state);
                    }
                }
                Err(e) => warn!("Skipping state copy {path:?}: {e:#}"),
            }
        }
        best
    }

    async fn save(&self, state: &WorkState) -> Result<()> {
        let record = encode(state)?;

        // One copy at a time, so an interrupted save can tear at most one of them.
        let mut failed = 0;
        for path in &self.locations {
            if let Err(e) = write_copy(path, &record).await {
                error!("Failed to write state copy {path:?}: {e:?}");
                failed += 1;
            }
        }
        if failed > 0 {
            bail!(
                "Failed to write {failed} of {} state copies",
                self.locations.len()
            );
        }
        Ok(())
    }
}

async fn read_copy(path: &Path) -> Result<WorkState> {
    let mut file = File::open(path).await?;
    file.lock_shared()?;
    let mut bytes = Vec::new();
    let read = file.read_to_end(&mut bytes).await;
    file.unlock_async().await?;
    read?;

    decode(&String::from_utf8(bytes)?)
}

async fn write_copy(path: &Path, record: &str) -> Result<()> {
    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await?;
    // Truncate only after the lock is held, a concurrent reader would see an empty file otherwise.
    file.lock_exclusive()?;
    let result = write_locked(&mut file, record).await;
    file.unlock_async().await?;
    result
}

async fn write_locked(file: &mut File, record: &str) -> Result<()> {
    file.set_len(0).await?;
    file.write_all(record.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, sync::Arc};

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use fs4::tokio::AsyncFileExt;
    use tempfile::tempdir;
    use tokio::{fs::File, time::Instant};

    use crate::{
        storage::record::{decode, encode, UNVERIFIED_DIGEST},
        tracker::state::{Mode, WorkState},
    };

    use super::{RedundantStateStore, StateStore};

    fn test_state() -> WorkState {
        let mut state = WorkState::fresh(
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap(),
            Duration::minutes(450),
            Duration::hours(8),
        );
        state.mode = Mode::Home;
        state.afk = true;
        state.done = Duration::minutes(200);
        state.overtime = Duration::minutes(-30);
        state
    }

    #[tokio::test]
    async fn test_save_then_load() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        let state = test_state();

        store.save(&state).await?;

        assert_eq!(store.load().await, Some(state));
        for location in store.locations() {
            assert!(location.exists());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_load_nothing() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        assert_eq!(store.load().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_single_valid_copy_is_recovered() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        let state = test_state();
        store.save(&state).await?;

        let locations = store.locations();
        fs::write(&locations[0], "truncated {")?;
        let damaged = fs::read_to_string(&locations[2])?.replacen("\"home\"", "\"office\"", 1);
        fs::write(&locations[2], damaged)?;

        assert_eq!(store.load().await, Some(state));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_copies_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        let state = test_state();
        store.save(&state).await?;

        fs::remove_file(&store.locations()[0])?;
        fs::remove_file(&store.locations()[1])?;

        assert_eq!(store.load().await, Some(state));
        Ok(())
    }

    #[tokio::test]
    async fn test_most_recent_copy_wins() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        let old = test_state();
        let mut newest = old.clone();
        newest.last_update += Duration::minutes(1);
        newest.done += Duration::minutes(1);
        let mut middle = old.clone();
        middle.last_update += Duration::seconds(30);

        fs::write(&store.locations()[0], encode(&middle)?)?;
        fs::write(&store.locations()[1], encode(&newest)?)?;
        fs::write(&store.locations()[2], encode(&old)?)?;

        assert_eq!(store.load().await, Some(newest));
        Ok(())
    }

    #[tokio::test]
    async fn test_hand_edited_copy_is_accepted() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        let mut state = test_state();
        state.overtime = Duration::hours(2);
        let json = serde_json::to_string_pretty(&state)?;

        fs::write(&store.locations()[1], format!("{json}\n{UNVERIFIED_DIGEST}\n"))?;

        assert_eq!(store.load().await, Some(state));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_location_does_not_block_others() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        // A directory can't be opened for writing.
        fs::create_dir(&store.locations()[1])?;
        let state = test_state();

        assert!(store.save(&state).await.is_err());

        assert!(store.locations()[0].is_file());
        assert!(store.locations()[2].is_file());
        assert_eq!(store.load().await, Some(state));
        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_shorter_record() -> Result<()> {
        let dir = tempdir()?;
        let store = RedundantStateStore::in_dir(dir.path())?;
        let mut state = test_state();
        state.done = Duration::milliseconds(123_456_789);
        store.save(&state).await?;

        state.done = Duration::zero();
        state.last_update += Duration::seconds(30);
        store.save(&state).await?;

        assert_eq!(store.load().await, Some(state));
        Ok(())
    }

    fn stored(path: &Path) -> Option<WorkState> {
        decode(&fs::read_to_string(path).ok()?).ok()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_copies_are_written_one_at_a_time() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(RedundantStateStore::in_dir(dir.path())?);
        let old = test_state();
        store.save(&old).await?;
        let mut new = old.clone();
        new.last_update += Duration::minutes(1);
        new.done += Duration::minutes(1);

        // A reader holding the second copy stops the save right before it.
        let reader = File::open(&store.locations()[1]).await?;
        reader.lock_shared()?;
        let saving = tokio::spawn({
            let store = store.clone();
            let new = new.clone();
            async move { store.save(&new).await }
        });

        let deadline = Instant::now() + std::time::Duration::from_secs(10);
        while stored(&store.locations()[0]).as_ref() != Some(&new) {
            assert!(Instant::now() < deadline, "first copy was never written");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        // Every copy holds a complete record while the save waits.
        assert_eq!(stored(&store.locations()[1]).as_ref(), Some(&old));
        assert_eq!(stored(&store.locations()[2]).as_ref(), Some(&old));

        reader.unlock_async().await?;
        drop(reader);
        saving.await??;
        for location in store.locations() {
            assert_eq!(stored(location).as_ref(), Some(&new));
        }
        Ok(())
    }

    #[test]
    fn test_needs_redundancy() {
        assert!(RedundantStateStore::new(vec!["only-one".into()]).is_err());
    }
}

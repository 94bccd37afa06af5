//! Durable storage for missions, cards, progress and activity history.
//!
//! [`FileStore`] keeps one JSON document per record type plus an append-only
//! JSONL activity log, all under a single data directory:
//!
//! ```text
//! <data_dir>/
//!   .lock               exclusive writer lock, held while the store is open
//!   missions.json
//!   cards.json
//!   owned_cards.json
//!   progress.json
//!   reset_anchor.json
//!   activities.jsonl
//!   commit.json         pending change set, present only mid-commit
//! ```
//!
//! Documents are replaced atomically (temp file, fsync, rename). A commit
//! first writes its whole change set to `commit.json`, then applies it and
//! removes the journal; a journal found later is replayed by
//! [`Store::recover`]. A document that fails to parse is logged and treated
//! as empty; a bad activity line is skipped.

use crate::{
    ActivityEvent, CardDefinition, Error, Mission, OwnedCard, ResetAnchor, Result, UserProgress,
};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Records changed by one engine event, written together
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Changes {
    /// Full mission list; empty when missions did not change
    pub missions: Vec<Mission>,
    pub owned_cards: Vec<OwnedCard>,
    pub progress: Option<UserProgress>,
    pub anchor: Option<ResetAnchor>,
    pub activity: Option<ActivityEvent>,
}

/// Write a change set record by record
///
/// The reset anchor goes after the missions it reopened and the activity
/// goes last, so a failure part way leaves work the next event redoes.
pub fn write_changes<S: Store + ?Sized>(store: &mut S, changes: &Changes) -> Result<()> {
    if !changes.missions.is_empty() {
        store.save_missions(&changes.missions)?;
    }
    for owned in &changes.owned_cards {
        store.save_owned_card(owned)?;
    }
    if let Some(progress) = &changes.progress {
        store.save_user_progress(progress)?;
    }
    if let Some(anchor) = &changes.anchor {
        store.save_reset_anchor(anchor)?;
    }
    if let Some(activity) = &changes.activity {
        store.append_activity(activity)?;
    }
    Ok(())
}

/// Record storage used by the progression engine
///
/// The engine re-reads everything it needs at the start of each event, so
/// implementations must return what was last written.
pub trait Store {
    fn missions(&self) -> Result<Vec<Mission>>;
    fn save_mission(&mut self, mission: &Mission) -> Result<()>;

    fn catalog(&self) -> Result<Vec<CardDefinition>>;
    fn save_card_definition(&mut self, card: &CardDefinition) -> Result<()>;

    fn owned_cards(&self) -> Result<Vec<OwnedCard>>;
    fn save_owned_card(&mut self, card: &OwnedCard) -> Result<()>;

    fn user_progress(&self) -> Result<UserProgress>;
    fn save_user_progress(&mut self, progress: &UserProgress) -> Result<()>;

    /// `None` when no reset has ever been recorded
    fn reset_anchor(&self) -> Result<Option<ResetAnchor>>;
    fn save_reset_anchor(&mut self, anchor: &ResetAnchor) -> Result<()>;

    fn activities(&self) -> Result<Vec<ActivityEvent>>;
    fn append_activity(&mut self, event: &ActivityEvent) -> Result<()>;

    /// Upsert several missions at once
    fn save_missions(&mut self, missions: &[Mission]) -> Result<()> {
        for mission in missions {
            self.save_mission(mission)?;
        }
        Ok(())
    }

    /// Upsert several card definitions at once
    fn save_catalog(&mut self, cards: &[CardDefinition]) -> Result<()> {
        for card in cards {
            self.save_card_definition(card)?;
        }
        Ok(())
    }

    /// Apply every change of one event
    ///
    /// Stores that can fail between records should override this so the
    /// whole set lands or none of it does.
    fn commit(&mut self, changes: &Changes) -> Result<()> {
        write_changes(self, changes)
    }

    /// Finish a commit that was interrupted; called before each event
    fn recover(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Replace the record whose key matches, or append it
fn upsert<T: Clone>(records: &mut Vec<T>, record: &T, same: impl Fn(&T, &T) -> bool) {
    match records.iter_mut().find(|r| same(r, record)) {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
}

fn same_mission(a: &Mission, b: &Mission) -> bool {
    a.id == b.id
}

fn same_card(a: &CardDefinition, b: &CardDefinition) -> bool {
    a.id == b.id
}

fn same_owned(a: &OwnedCard, b: &OwnedCard) -> bool {
    a.card_id == b.card_id
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store backed by plain vectors, for tests and embedding
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    missions: Vec<Mission>,
    catalog: Vec<CardDefinition>,
    owned_cards: Vec<OwnedCard>,
    progress: UserProgress,
    anchor: Option<ResetAnchor>,
    activities: Vec<ActivityEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn missions(&self) -> Result<Vec<Mission>> {
        Ok(self.missions.clone())
    }

    fn save_mission(&mut self, mission: &Mission) -> Result<()> {
        upsert(&mut self.missions, mission, same_mission);
        Ok(())
    }

    fn catalog(&self) -> Result<Vec<CardDefinition>> {
        Ok(self.catalog.clone())
    }

    fn save_card_definition(&mut self, card: &CardDefinition) -> Result<()> {
        upsert(&mut self.catalog, card, same_card);
        Ok(())
    }

    fn owned_cards(&self) -> Result<Vec<OwnedCard>> {
        Ok(self.owned_cards.clone())
    }

    fn save_owned_card(&mut self, card: &OwnedCard) -> Result<()> {
        upsert(&mut self.owned_cards, card, same_owned);
        Ok(())
    }

    fn user_progress(&self) -> Result<UserProgress> {
        Ok(self.progress.clone())
    }

    fn save_user_progress(&mut self, progress: &UserProgress) -> Result<()> {
        self.progress = progress.clone();
        Ok(())
    }

    fn reset_anchor(&self) -> Result<Option<ResetAnchor>> {
        Ok(self.anchor)
    }

    fn save_reset_anchor(&mut self, anchor: &ResetAnchor) -> Result<()> {
        self.anchor = Some(*anchor);
        Ok(())
    }

    fn activities(&self) -> Result<Vec<ActivityEvent>> {
        Ok(self.activities.clone())
    }

    fn append_activity(&mut self, event: &ActivityEvent) -> Result<()> {
        self.activities.push(event.clone());
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

const LOCK_FILE: &str = ".lock";
const MISSIONS_FILE: &str = "missions.json";
const CARDS_FILE: &str = "cards.json";
const OWNED_CARDS_FILE: &str = "owned_cards.json";
const PROGRESS_FILE: &str = "progress.json";
const RESET_ANCHOR_FILE: &str = "reset_anchor.json";
const ACTIVITIES_FILE: &str = "activities.jsonl";
const JOURNAL_FILE: &str = "commit.json";

/// Store rooted in a data directory
///
/// Opening the store takes an exclusive lock on `<data_dir>/.lock`; a second
/// process opening the same directory blocks until the first one drops its
/// store.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    _lock: File,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        lock.lock_exclusive().map_err(|e| {
            Error::Store(format!("Unable to lock data directory {:?}: {}", dir, e))
        })?;

        tracing::debug!("Opened store at {:?}", dir);
        let mut store = Self { dir, _lock: lock };
        store.recover()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn activities_path(&self) -> PathBuf {
        self.dir.join(ACTIVITIES_FILE)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn upsert_document<T, F>(&self, name: &str, record: &T, same: F) -> Result<()>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: Fn(&T, &T) -> bool,
    {
        let path = self.path(name);
        let mut records: Vec<T> = load_document(&path)?;
        upsert(&mut records, record, same);
        write_document(&path, &records)
    }

    fn upsert_many<T, F>(&self, name: &str, batch: &[T], same: F) -> Result<()>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: Fn(&T, &T) -> bool,
    {
        let path = self.path(name);
        let mut records: Vec<T> = load_document(&path)?;
        for record in batch {
            upsert(&mut records, record, &same);
        }
        write_document(&path, &records)
    }

    /// Apply a journaled change set; the activity is skipped if already logged
    fn replay(&mut self, changes: &Changes) -> Result<()> {
        let logged = match &changes.activity {
            Some(event) => self.activities()?.iter().any(|a| a.id == event.id),
            None => false,
        };
        if logged {
            let pending = Changes {
                activity: None,
                ..changes.clone()
            };
            write_changes(self, &pending)
        } else {
            write_changes(self, changes)
        }
    }
}

impl Store for FileStore {
    fn missions(&self) -> Result<Vec<Mission>> {
        load_document(&self.path(MISSIONS_FILE))
    }

    fn save_mission(&mut self, mission: &Mission) -> Result<()> {
        self.upsert_document(MISSIONS_FILE, mission, same_mission)
    }

    fn save_missions(&mut self, missions: &[Mission]) -> Result<()> {
        self.upsert_many(MISSIONS_FILE, missions, same_mission)
    }

    fn catalog(&self) -> Result<Vec<CardDefinition>> {
        load_document(&self.path(CARDS_FILE))
    }

    fn save_card_definition(&mut self, card: &CardDefinition) -> Result<()> {
        self.upsert_document(CARDS_FILE, card, same_card)
    }

    fn save_catalog(&mut self, cards: &[CardDefinition]) -> Result<()> {
        self.upsert_many(CARDS_FILE, cards, same_card)
    }

    fn owned_cards(&self) -> Result<Vec<OwnedCard>> {
        load_document(&self.path(OWNED_CARDS_FILE))
    }

    fn save_owned_card(&mut self, card: &OwnedCard) -> Result<()> {
        self.upsert_document(OWNED_CARDS_FILE, card, same_owned)
    }

    fn user_progress(&self) -> Result<UserProgress> {
        load_document(&self.path(PROGRESS_FILE))
    }

    fn save_user_progress(&mut self, progress: &UserProgress) -> Result<()> {
        write_document(&self.path(PROGRESS_FILE), progress)
    }

    fn reset_anchor(&self) -> Result<Option<ResetAnchor>> {
        load_document(&self.path(RESET_ANCHOR_FILE))
    }

    fn save_reset_anchor(&mut self, anchor: &ResetAnchor) -> Result<()> {
        write_document(&self.path(RESET_ANCHOR_FILE), anchor)
    }

    fn activities(&self) -> Result<Vec<ActivityEvent>> {
        read_activities(&self.activities_path())
    }

    fn append_activity(&mut self, event: &ActivityEvent) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.activities_path())?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(event)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.sync_all()?;
        file.unlock()?;

        tracing::debug!("Appended activity {} to log", event.id);
        Ok(())
    }

    fn commit(&mut self, changes: &Changes) -> Result<()> {
        let journal = self.path(JOURNAL_FILE);
        write_document(&journal, changes)?;
        self.replay(changes)?;
        std::fs::remove_file(&journal)?;
        Ok(())
    }

    fn recover(&mut self) -> Result<()> {
        let journal = self.path(JOURNAL_FILE);
        if !journal.exists() {
            return Ok(());
        }

        match load_document::<Option<Changes>>(&journal)? {
            Some(changes) => {
                tracing::warn!("Replaying interrupted commit from {:?}", journal);
                self.replay(&changes)?;
            }
            None => tracing::warn!("Discarding unreadable commit journal {:?}", journal),
        }

        std::fs::remove_file(&journal)?;
        Ok(())
    }
}

/// Load a JSON document with shared locking
///
/// A missing, unreadable or corrupted file yields `T::default()`.
fn load_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        tracing::debug!("No document at {:?}, using defaults", path);
        return Ok(T::default());
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("Unable to open {:?}: {}. Using defaults.", path, e);
            return Ok(T::default());
        }
    };

    if let Err(e) = file.lock_shared() {
        tracing::warn!("Unable to lock {:?}: {}. Using defaults.", path, e);
        return Ok(T::default());
    }

    let mut contents = String::new();
    let mut reader = BufReader::new(&file);
    if let Err(e) = reader.read_to_string(&mut contents) {
        let _ = file.unlock();
        tracing::warn!("Failed to read {:?}: {}. Using defaults.", path, e);
        return Ok(T::default());
    }

    file.unlock()?;

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!("Failed to parse {:?}: {}. Using defaults.", path, e);
            Ok(T::default())
        }
    }
}

/// Atomically replace a JSON document
fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Store(format!("Document path {:?} has no parent", path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Wrote {:?}", path);
    Ok(())
}

/// Read every activity from a JSONL log, skipping unparseable lines
pub fn read_activities(path: &Path) -> Result<Vec<ActivityEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut activities = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ActivityEvent>(&line) {
            Ok(event) => activities.push(event),
            Err(e) => {
                tracing::warn!("Skipping activity at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} activities from {:?}", activities.len(), path);
    Ok(activities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::build_default_card_catalog;
    use crate::missions::build_default_missions;
    use crate::{Category, Intensity, MissionStatus};
    use chrono::Utc;

    fn open_temp() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_empty_store_reads_defaults() {
        let (_dir, store) = open_temp();

        assert!(store.missions().unwrap().is_empty());
        assert!(store.catalog().unwrap().is_empty());
        assert!(store.owned_cards().unwrap().is_empty());
        assert_eq!(store.user_progress().unwrap(), UserProgress::default());
        assert_eq!(store.reset_anchor().unwrap(), None);
        assert!(store.activities().unwrap().is_empty());
    }

    #[test]
    fn test_mission_upsert_replaces_by_id() {
        let (_dir, mut store) = open_temp();
        let missions = build_default_missions();
        store.save_missions(&missions).unwrap();

        let mut first = missions[0].clone();
        first.current_progress = first.target_value;
        first.status = MissionStatus::Completed;
        first.completed_at = Some(Utc::now());
        store.save_mission(&first).unwrap();

        let loaded = store.missions().unwrap();
        assert_eq!(loaded.len(), missions.len());
        assert_eq!(loaded[0], first);
    }

    #[test]
    fn test_catalog_and_owned_cards_persist() {
        let (dir, mut store) = open_temp();
        store.save_catalog(&build_default_card_catalog()).unwrap();

        let owned = OwnedCard {
            card_id: "idea_spark".into(),
            owned_count: 1,
            first_obtained_at: Utc::now(),
        };
        store.save_owned_card(&owned).unwrap();
        store
            .save_owned_card(&OwnedCard {
                owned_count: 2,
                ..owned.clone()
            })
            .unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.catalog().unwrap().len(), 50);
        let owned_cards = reopened.owned_cards().unwrap();
        assert_eq!(owned_cards.len(), 1);
        assert_eq!(owned_cards[0].owned_count, 2);
    }

    #[test]
    fn test_anchor_roundtrip() {
        let (_dir, mut store) = open_temp();
        let anchor = ResetAnchor {
            last_daily_reset: Utc::now(),
            last_weekly_reset: Utc::now(),
        };
        store.save_reset_anchor(&anchor).unwrap();
        assert_eq!(store.reset_anchor().unwrap(), Some(anchor));
    }

    #[test]
    fn test_corrupted_documents_fall_back() {
        crate::logging::init_test();
        let (dir, store) = open_temp();
        std::fs::write(dir.path().join(PROGRESS_FILE), "{ not json").unwrap();
        std::fs::write(dir.path().join(RESET_ANCHOR_FILE), "garbage").unwrap();
        std::fs::write(dir.path().join(MISSIONS_FILE), "[{\"id\":").unwrap();

        assert_eq!(store.user_progress().unwrap(), UserProgress::default());
        assert_eq!(store.reset_anchor().unwrap(), None);
        assert!(store.missions().unwrap().is_empty());
    }

    #[test]
    fn test_activity_log_skips_bad_lines() {
        let (dir, mut store) = open_temp();
        let event = ActivityEvent::new(Category::Energy, Intensity::High, Utc::now());
        store.append_activity(&event).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join(ACTIVITIES_FILE))
            .unwrap();
        writeln!(file, "{{\"truncated\":").unwrap();

        store
            .append_activity(&ActivityEvent::new(Category::Idea, Intensity::Low, Utc::now()))
            .unwrap();

        let activities = store.activities().unwrap();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0], event);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (dir, mut store) = open_temp();
        for _ in 0..5 {
            store.save_user_progress(&UserProgress::default()).unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {:?}", names);
    }

    fn sample_changes() -> Changes {
        let mut missions = build_default_missions();
        missions[0].current_progress = missions[0].target_value;
        missions[0].status = MissionStatus::Completed;
        missions[0].completed_at = Some(Utc::now());

        Changes {
            missions,
            owned_cards: vec![OwnedCard {
                card_id: "energy_bolt".into(),
                owned_count: 1,
                first_obtained_at: Utc::now(),
            }],
            progress: Some(UserProgress {
                total_points: 150,
                total_activities: 1,
                ..Default::default()
            }),
            anchor: Some(ResetAnchor {
                last_daily_reset: Utc::now(),
                last_weekly_reset: Utc::now(),
            }),
            activity: Some(ActivityEvent::new(Category::Energy, Intensity::High, Utc::now())),
        }
    }

    #[test]
    fn test_commit_writes_all_records() {
        let (dir, mut store) = open_temp();
        let changes = sample_changes();

        store.commit(&changes).unwrap();

        assert_eq!(store.missions().unwrap(), changes.missions);
        assert_eq!(store.owned_cards().unwrap(), changes.owned_cards);
        assert_eq!(Some(store.user_progress().unwrap()), changes.progress);
        assert_eq!(store.reset_anchor().unwrap(), changes.anchor);
        assert_eq!(store.activities().unwrap(), vec![changes.activity.unwrap()]);
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }

    #[test]
    fn test_interrupted_commit_replayed_on_open() {
        crate::logging::init_test();
        let dir = tempfile::tempdir().unwrap();
        let changes = sample_changes();

        {
            // Journal written and the activity appended, but no document
            // updated before the process went away
            let mut store = FileStore::open(dir.path()).unwrap();
            write_document(&dir.path().join(JOURNAL_FILE), &changes).unwrap();
            store
                .append_activity(changes.activity.as_ref().unwrap())
                .unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.missions().unwrap(), changes.missions);
        assert_eq!(store.owned_cards().unwrap(), changes.owned_cards);
        assert_eq!(Some(store.user_progress().unwrap()), changes.progress);
        assert_eq!(store.reset_anchor().unwrap(), changes.anchor);
        assert_eq!(store.activities().unwrap().len(), 1);
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }

    #[test]
    fn test_unreadable_journal_discarded() {
        crate::logging::init_test();
        let (dir, mut store) = open_temp();
        std::fs::write(dir.path().join(JOURNAL_FILE), "{ half a commit").unwrap();

        store.recover().unwrap();

        assert!(!dir.path().join(JOURNAL_FILE).exists());
        assert_eq!(store.user_progress().unwrap(), UserProgress::default());
    }

    #[test]
    fn test_memory_store_upserts() {
        let mut store = MemoryStore::new();
        let missions = build_default_missions();
        store.save_missions(&missions).unwrap();
        store.save_missions(&missions).unwrap();
        assert_eq!(store.missions().unwrap().len(), missions.len());
        assert_eq!(store.reset_anchor().unwrap(), None);
    }
}

//! Simple file-backed stores that survive restarts on a single host.
//!
//! Issuance records and quota counters live in separate JSON snapshots
//! (`issuance.json`, `quota.json`) guarded by separate locks, so the two concerns never contend.
//! Every mutation rewrites its snapshot through a temp file and an atomic rename.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{IssuanceRecord, SubjectId},
	quota::{QuotaDecision, QuotaRecord},
	store::{InsertOutcome, IssuanceStore, QuotaStore, StoreError, StoreFuture},
};

const ISSUANCE_FILE: &str = "issuance.json";
const QUOTA_FILE: &str = "quota.json";

#[derive(Debug)]
struct Snapshot<V> {
	path: PathBuf,
	entries: RwLock<HashMap<SubjectId, V>>,
}
impl<V> Snapshot<V>
where
	V: Clone + Serialize + DeserializeOwned,
{
	fn open(path: PathBuf) -> Result<Self, StoreError> {
		let entries = Self::load(&path)?;

		Ok(Self { path, entries: RwLock::new(entries) })
	}

	fn load(path: &Path) -> Result<HashMap<SubjectId, V>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn persist_locked(&self, contents: &HashMap<SubjectId, V>) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn retain(&self, mut keep: impl FnMut(&V) -> bool) -> Result<usize, StoreError> {
		let mut guard = self.entries.write();
		let kept = guard
			.iter()
			.filter(|&(_, value)| keep(value))
			.map(|(subject, value)| (subject.clone(), value.clone()))
			.collect::<HashMap<_, _>>();
		let purged = guard.len() - kept.len();

		if purged > 0 {
			self.persist_locked(&kept)?;

			*guard = kept;
		}

		Ok(purged)
	}
}

/// Persists issuance records and quota counters as JSON snapshots in a directory.
///
/// Each snapshot sits behind a single lock, which suits the low write rates of a single
/// download host; use the sharded memory stores or a shared backend when contention matters.
#[derive(Clone, Debug)]
pub struct FileStore {
	issuance: Arc<Snapshot<IssuanceRecord>>,
	quota: Arc<Snapshot<QuotaRecord>>,
}
impl FileStore {
	/// Opens (or creates) a store rooted at `dir`, eagerly loading existing snapshots.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let dir = dir.into();

		fs::create_dir_all(&dir).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", dir.display()),
		})?;

		Ok(Self {
			issuance: Arc::new(Snapshot::open(dir.join(ISSUANCE_FILE))?),
			quota: Arc::new(Snapshot::open(dir.join(QUOTA_FILE))?),
		})
	}
}
impl IssuanceStore for FileStore {
	fn insert_if_absent(&self, record: IssuanceRecord) -> StoreFuture<'_, InsertOutcome> {
		Box::pin(async move {
			let mut guard = self.issuance.entries.write();

			if let Some(existing) = guard.get(&record.subject) {
				return Ok(InsertOutcome::Existing(existing.clone()));
			}

			guard.insert(record.subject.clone(), record.clone());

			if let Err(e) = self.issuance.persist_locked(&guard) {
				guard.remove(&record.subject);

				return Err(e);
			}

			Ok(InsertOutcome::Inserted(record))
		})
	}

	fn fetch<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, Option<IssuanceRecord>> {
		Box::pin(async move { Ok(self.issuance.entries.read().get(subject).cloned()) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move { self.issuance.retain(|record| !record.is_expired_at(now)) })
	}
}
impl QuotaStore for FileStore {
	fn try_consume<'a>(
		&'a self,
		subject: &'a SubjectId,
		cap: u32,
		now: OffsetDateTime,
	) -> StoreFuture<'a, QuotaDecision> {
		Box::pin(async move {
			let mut guard = self.quota.entries.write();
			let previous = guard.get(subject).copied();
			let decision = guard
				.entry(subject.clone())
				.or_insert_with(|| QuotaRecord::new(cap, now))
				.consume();

			if let Err(e) = self.quota.persist_locked(&guard) {
				match previous {
					Some(record) => guard.insert(subject.clone(), record),
					None => guard.remove(subject),
				};

				return Err(e);
			}

			Ok(decision)
		})
	}

	fn remaining<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, Option<u32>> {
		Box::pin(async move {
			Ok(self.quota.entries.read().get(subject).map(|record| record.remaining))
		})
	}
}

//! The in-memory archive: one blob, an entry arena, and two indices.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use imgpack_types::Digest;
use tracing::debug;

use crate::config::ArchiveConfig;
use crate::entry::{Entry, EntryId};
use crate::error::{ArchiveError, ArchiveResult};

/// Mutable archive state, always accessed under the archive lock.
///
/// Invariants:
/// - every entry range lies within `blob`;
/// - entries with equal digests have equal ranges;
/// - entries with different digests have disjoint ranges;
/// - `by_digest` holds exactly the digests referenced by live entries.
#[derive(Default)]
pub(crate) struct ArchiveState {
    pub(crate) blob: Vec<u8>,
    pub(crate) entries: BTreeMap<EntryId, Entry>,
    by_name: HashMap<String, EntryId>,
    by_digest: HashMap<Digest, EntryId>,
    next_id: u64,
}

impl ArchiveState {
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name).and_then(|id| self.entries.get(id))
    }

    pub(crate) fn payload(&self, entry: &Entry) -> &[u8] {
        &self.blob[entry.range()]
    }

    pub(crate) fn insert(&mut self, name: &str, bytes: &[u8]) -> ArchiveResult<Entry> {
        if self.by_name.contains_key(name) {
            return Err(ArchiveError::DuplicateKey(name.to_string()));
        }
        let length = u32::try_from(bytes.len()).map_err(|_| ArchiveError::EntryTooLarge {
            name: name.to_string(),
            size: bytes.len(),
        })?;

        let digest = Digest::from_data(bytes);
        let id = EntryId(self.next_id);
        self.next_id += 1;

        let shared = self
            .by_digest
            .get(&digest)
            .and_then(|rep| self.entries.get(rep))
            .map(|rep| (rep.offset, rep.length));

        let entry = match shared {
            Some((offset, length)) => {
                debug!(name, %digest, offset, "dedup: reusing stored payload");
                Entry {
                    name: name.to_string(),
                    offset,
                    length,
                    digest,
                }
            }
            None => {
                let offset = self.blob.len() as u64;
                self.blob.extend_from_slice(bytes);
                self.by_digest.insert(digest, id);
                debug!(name, %digest, offset, length, "appended payload");
                Entry {
                    name: name.to_string(),
                    offset,
                    length,
                    digest,
                }
            }
        };

        self.by_name.insert(name.to_string(), id);
        self.entries.insert(id, entry.clone());
        Ok(entry)
    }

    pub(crate) fn remove(&mut self, name: &str) -> ArchiveResult<Entry> {
        let id = match self.by_name.get(name) {
            Some(id) => *id,
            None => return Err(ArchiveError::KeyNotFound(name.to_string())),
        };
        let Some(removed) = self.entries.remove(&id) else {
            return Err(ArchiveError::KeyNotFound(name.to_string()));
        };
        self.by_name.remove(name);

        let survivor = self
            .entries
            .iter()
            .find(|(_, e)| e.digest == removed.digest)
            .map(|(id, _)| *id);

        match survivor {
            Some(survivor) => {
                if self.by_digest.get(&removed.digest) == Some(&id) {
                    self.by_digest.insert(removed.digest, survivor);
                }
                debug!(name, digest = %removed.digest, "payload still referenced");
            }
            None => {
                self.by_digest.remove(&removed.digest);
                self.compact(&removed);
            }
        }
        Ok(removed)
    }

    /// Cut a dead payload out of the blob and shift later entries down.
    fn compact(&mut self, dead: &Entry) {
        self.blob.drain(dead.range());
        let shift = u64::from(dead.length);
        for entry in self.entries.values_mut() {
            if entry.offset > dead.offset {
                entry.offset -= shift;
            }
        }
        debug!(
            name = %dead.name,
            offset = dead.offset,
            length = dead.length,
            blob_len = self.blob.len(),
            "compacted blob"
        );
    }
}

/// Content-addressed archive of named payloads.
///
/// Payloads are appended to a single blob; a payload whose digest is already
/// stored is not written again, and the new name shares the existing byte
/// range. All operations are serialized behind one instance-wide lock, so an
/// `ImageArchive` can be shared across threads by reference.
pub struct ImageArchive {
    config: ArchiveConfig,
    state: Mutex<ArchiveState>,
}

impl ImageArchive {
    /// Create an empty archive with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ArchiveConfig::default())
    }

    /// Create an empty archive with the given configuration.
    pub fn with_config(config: ArchiveConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ArchiveState::default()),
        }
    }

    /// The configuration this archive was created with.
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ArchiveState> {
        // State is only mutated after every fallible step, so a poisoned
        // guard still holds consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a payload under `name`.
    ///
    /// Fails with [`ArchiveError::DuplicateKey`] if the name is taken, leaving
    /// the archive unchanged.
    pub fn add(&self, name: &str, bytes: &[u8]) -> ArchiveResult<Entry> {
        self.lock().insert(name, bytes)
    }

    /// Remove the entry `name`, compacting the blob if its payload is no
    /// longer referenced.
    ///
    /// Fails with [`ArchiveError::KeyNotFound`] if the name is absent, leaving
    /// the archive unchanged.
    pub fn remove(&self, name: &str) -> ArchiveResult<Entry> {
        self.lock().remove(name)
    }

    /// Whether an entry named `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Whether a payload with this digest is stored.
    pub fn exists_digest(&self, digest: &Digest) -> bool {
        self.lock().by_digest.contains_key(digest)
    }

    /// The payload stored under `name`.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        state.get(name).map(|e| state.payload(e).to_vec())
    }

    /// The entry stored under `name`.
    pub fn entry(&self, name: &str) -> Option<Entry> {
        self.lock().get(name).cloned()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Vec<Entry> {
        self.lock().entries.values().cloned().collect()
    }

    /// All names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.lock()
            .entries
            .values()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Number of distinct payloads physically stored.
    pub fn unique_len(&self) -> usize {
        self.lock().by_digest.len()
    }

    /// Size of the blob in bytes.
    pub fn blob_len(&self) -> u64 {
        self.lock().blob.len() as u64
    }

    /// A copy of the blob.
    pub fn blob(&self) -> Vec<u8> {
        self.lock().blob.clone()
    }
}

impl Default for ImageArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ImageArchive")
            .field("entries", &state.entries.len())
            .field("unique", &state.by_digest.len())
            .field("blob_len", &state.blob.len())
            .finish()
    }
}

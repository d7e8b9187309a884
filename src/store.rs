//! Program-wide table of loaded packs

use std::path::Path;
use std::sync::Arc;

use log::warn;

use crate::pack::Pack;
use crate::result::FsResult;

/// Capacity of the pack table.
pub const MAX_PACK_FILES: usize = 32;

/// Registry of loaded packs, addressed by small ids.
///
/// Id 0 never names a pack and doubles as the "no pack" sentinel; the
/// first pack gets id 1. Ids stay stable for a pack's lifetime and are
/// reused after a free. The table is plain owned state: build one at
/// startup, drop (or [`PackStore::shutdown`]) it at teardown.
#[derive(Debug)]
pub struct PackStore {
    slots: Vec<Option<Arc<Pack>>>,
}

impl PackStore {
    pub fn new() -> PackStore {
        PackStore {
            slots: vec![None; 1 + MAX_PACK_FILES],
        }
    }

    /// Load a pack file and register it. The format is picked from the
    /// file name: a `.pk3` extension (case-insensitive) is a zip archive,
    /// anything else a classic PAK. Returns the new pack id, or 0 if the
    /// file was absent, had no entries, or the table is full.
    pub fn load_pack(&mut self, path: &Path) -> FsResult<usize> {
        let is_pk3 = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("pk3"));

        let pack = if is_pk3 {
            Pack::from_pk3_file(path)?
        } else {
            Pack::from_pak_file(path)?
        };

        Ok(match pack {
            Some(pack) => self.register(pack),
            None => 0,
        })
    }

    /// Add a pack to the first free slot. Returns 0 and drops the pack if
    /// the table is already full.
    fn register(&mut self, pack: Pack) -> usize {
        for i in 1..self.slots.len() {
            if self.slots[i].is_none() {
                self.slots[i] = Some(Arc::new(pack));
                return i;
            }
        }
        warn!(
            "too many pack files loaded, ignoring {}",
            pack.filename().display()
        );
        0
    }

    pub(crate) fn get(&self, id: usize) -> Option<&Arc<Pack>> {
        self.slots.get(id)?.as_ref()
    }

    /// Detach a pack from the table, transferring ownership to the caller.
    pub(crate) fn take(&mut self, id: usize) -> Option<Arc<Pack>> {
        self.slots.get_mut(id)?.take()
    }

    /// Drop the pack with the given id. Handles opened from it keep it
    /// alive until they close.
    pub fn free_pack(&mut self, id: usize) {
        self.take(id);
    }

    /// Drop every loaded pack.
    pub fn shutdown(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// OS path of a pack, if the id names one.
    pub fn pack_name(&self, id: usize) -> Option<&Path> {
        self.get(id).map(|pack| pack.filename())
    }

    /// Number of entries in a pack, or 0 if the id names none.
    pub fn pack_num_files(&self, id: usize) -> usize {
        self.get(id).map_or(0, |pack| pack.num_files())
    }

    /// Name of one entry of a pack.
    pub fn pack_entry_name(&self, id: usize, idx: usize) -> Option<&str> {
        self.get(id)?.entries().get(idx).map(|entry| entry.name())
    }

    /// Declared size of one entry of a pack.
    pub fn pack_entry_size(&self, id: usize, idx: usize) -> Option<u64> {
        self.get(id)?.entries().get(idx).map(|entry| entry.size())
    }
}

impl Default for PackStore {
    fn default() -> PackStore {
        PackStore::new()
    }
}

//! Mutable byte sequence with modification tracking and grouped undo.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::access::AddressSpace;

/// Per-byte modification state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModTag {
    /// Byte matches the loaded file.
    Original,
    /// Byte was overwritten.
    Changed,
    /// Byte was inserted and has no on-disk counterpart.
    Inserted,
}

/// Receives store change notifications. Callbacks fire after the store's
/// internal lock has been released, so an observer may read the store or
/// take its own locks.
pub trait StoreObserver: Send + Sync {
    /// Bytes at `offset` were overwritten with `contents`.
    fn data_written(&self, offset: u64, contents: &[u8]) {
        let _ = (offset, contents);
    }
    /// `contents` were inserted at `offset`.
    fn data_inserted(&self, offset: u64, contents: &[u8]) {
        let _ = (offset, contents);
    }
    /// `len` bytes at `offset` were removed.
    fn data_removed(&self, offset: u64, len: usize) {
        let _ = (offset, len);
    }
}

enum StoreEvent {
    Written { offset: u64, contents: Vec<u8> },
    Inserted { offset: u64, contents: Vec<u8> },
    Removed { offset: u64, len: usize },
}

enum EditRecord {
    Write {
        offset: usize,
        old: Vec<u8>,
        new: Vec<u8>,
        old_tags: Vec<ModTag>,
    },
    Insert {
        offset: usize,
        bytes: Vec<u8>,
    },
    Remove {
        offset: usize,
        old: Vec<u8>,
        old_tags: Vec<ModTag>,
    },
}

struct UndoGroup {
    before: u64,
    after: u64,
    entries: Vec<EditRecord>,
}

struct StoreState {
    data: Vec<u8>,
    tags: Vec<ModTag>,
    modified: bool,
    pending: Vec<EditRecord>,
    undo_buffer: Vec<UndoGroup>,
    redo_buffer: Vec<UndoGroup>,
    // Index into the undo buffer at which the store matches its on-disk
    // form; None once that state becomes unreachable.
    unmodified_undo_index: Option<usize>,
}

/// A mutable byte sequence with per-byte modification tags, observer
/// notifications and grouped undo/redo.
pub struct ByteStore {
    state: Mutex<StoreState>,
    observers: Mutex<Vec<Weak<dyn StoreObserver>>>,
}

impl StoreState {
    fn write(&mut self, ofs: usize, data: &[u8], events: &mut Vec<StoreEvent>) -> usize {
        if data.is_empty() {
            return 0;
        }
        if ofs == self.data.len() {
            return self.insert(ofs, data, events);
        }
        if ofs >= self.data.len() {
            return 0;
        }
        // A write running past the end becomes a write plus an insert.
        let mut append: &[u8] = &[];
        let mut data = data;
        if ofs + data.len() > self.data.len() {
            append = &data[self.data.len() - ofs..];
            data = &data[..self.data.len() - ofs];
        }

        self.pending.push(EditRecord::Write {
            offset: ofs,
            old: self.data[ofs..ofs + data.len()].to_vec(),
            new: data.to_vec(),
            old_tags: self.tags[ofs..ofs + data.len()].to_vec(),
        });

        self.apply_write(ofs, data, events);

        if !append.is_empty() {
            let at = self.data.len();
            return data.len() + self.insert(at, append, events);
        }
        data.len()
    }

    fn apply_write(&mut self, ofs: usize, data: &[u8], events: &mut Vec<StoreEvent>) {
        self.data[ofs..ofs + data.len()].copy_from_slice(data);
        for tag in &mut self.tags[ofs..ofs + data.len()] {
            if *tag == ModTag::Original {
                *tag = ModTag::Changed;
            }
        }
        events.push(StoreEvent::Written {
            offset: ofs as u64,
            contents: data.to_vec(),
        });
        self.modified = true;
    }

    fn insert(&mut self, ofs: usize, data: &[u8], events: &mut Vec<StoreEvent>) -> usize {
        if data.is_empty() || ofs > self.data.len() {
            return 0;
        }
        self.pending.push(EditRecord::Insert {
            offset: ofs,
            bytes: data.to_vec(),
        });
        self.apply_insert(ofs, data, events);
        data.len()
    }

    fn apply_insert(&mut self, ofs: usize, data: &[u8], events: &mut Vec<StoreEvent>) {
        self.data.splice(ofs..ofs, data.iter().copied());
        self.tags.splice(ofs..ofs, data.iter().map(|_| ModTag::Inserted));
        events.push(StoreEvent::Inserted {
            offset: ofs as u64,
            contents: data.to_vec(),
        });
        self.modified = true;
    }

    fn remove(&mut self, ofs: usize, size: usize, events: &mut Vec<StoreEvent>) -> usize {
        if size == 0 || ofs >= self.data.len() {
            return 0;
        }
        let size = size.min(self.data.len() - ofs);
        self.pending.push(EditRecord::Remove {
            offset: ofs,
            old: self.data[ofs..ofs + size].to_vec(),
            old_tags: self.tags[ofs..ofs + size].to_vec(),
        });
        self.apply_remove(ofs, size, events);
        size
    }

    fn apply_remove(&mut self, ofs: usize, size: usize, events: &mut Vec<StoreEvent>) {
        self.data.drain(ofs..ofs + size);
        self.tags.drain(ofs..ofs + size);
        events.push(StoreEvent::Removed {
            offset: ofs as u64,
            len: size,
        });
        self.modified = true;
    }

    fn undo_entry(&mut self, entry: &EditRecord, events: &mut Vec<StoreEvent>) {
        match entry {
            EditRecord::Write {
                offset,
                old,
                old_tags,
                ..
            } => {
                self.data[*offset..offset + old.len()].copy_from_slice(old);
                self.tags[*offset..offset + old_tags.len()].copy_from_slice(old_tags);
                events.push(StoreEvent::Written {
                    offset: *offset as u64,
                    contents: old.clone(),
                });
            }
            EditRecord::Insert { offset, bytes } => {
                self.data.drain(*offset..offset + bytes.len());
                self.tags.drain(*offset..offset + bytes.len());
                events.push(StoreEvent::Removed {
                    offset: *offset as u64,
                    len: bytes.len(),
                });
            }
            EditRecord::Remove {
                offset,
                old,
                old_tags,
            } => {
                self.data.splice(*offset..*offset, old.iter().copied());
                self.tags.splice(*offset..*offset, old_tags.iter().copied());
                events.push(StoreEvent::Inserted {
                    offset: *offset as u64,
                    contents: old.clone(),
                });
            }
        }
    }

    fn redo_entry(&mut self, entry: &EditRecord, events: &mut Vec<StoreEvent>) {
        match entry {
            EditRecord::Write { offset, new, .. } => {
                let (offset, new) = (*offset, new.clone());
                self.apply_write(offset, &new, events);
            }
            EditRecord::Insert { offset, bytes } => {
                let (offset, bytes) = (*offset, bytes.clone());
                self.apply_insert(offset, &bytes, events);
            }
            EditRecord::Remove { offset, old, .. } => {
                let (offset, len) = (*offset, old.len());
                self.apply_remove(offset, len, events);
            }
        }
    }
}

impl ByteStore {
    /// Create a store over a byte buffer.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let tags = vec![ModTag::Original; data.len()];
        ByteStore {
            state: Mutex::new(StoreState {
                data,
                tags,
                modified: false,
                pending: Vec::new(),
                undo_buffer: Vec::new(),
                redo_buffer: Vec::new(),
                unmodified_undo_index: Some(0),
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Load a store from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::from_bytes(fs::read(path)?))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an observer. Observers are held weakly.
    pub fn add_observer(&self, observer: &Arc<dyn StoreObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::downgrade(observer));
    }

    fn dispatch(&self, events: Vec<StoreEvent>) {
        if events.is_empty() {
            return;
        }
        let observers: Vec<Arc<dyn StoreObserver>> = {
            let mut list = self.observers.lock().unwrap_or_else(|e| e.into_inner());
            list.retain(|w| w.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };
        for event in &events {
            for observer in &observers {
                match event {
                    StoreEvent::Written { offset, contents } => {
                        observer.data_written(*offset, contents)
                    }
                    StoreEvent::Inserted { offset, contents } => {
                        observer.data_inserted(*offset, contents)
                    }
                    StoreEvent::Removed { offset, len } => observer.data_removed(*offset, *len),
                }
            }
        }
    }

    /// Number of bytes in the store.
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    /// True when the store holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the store differs from its on-disk form.
    pub fn is_modified(&self) -> bool {
        self.lock().modified
    }

    /// Per-byte modification tags for `[ofs, ofs+size)`, clipped.
    pub fn get_modification(&self, ofs: usize, size: usize) -> Vec<ModTag> {
        let st = self.lock();
        let end = (ofs + size).min(st.tags.len());
        if ofs >= end {
            return Vec::new();
        }
        st.tags[ofs..end].to_vec()
    }

    /// Overwrite bytes at `ofs`; a write past the end is split into a write
    /// of the overlap plus an insert. Returns the number of bytes written.
    pub fn write_at(&self, ofs: usize, data: &[u8]) -> usize {
        let mut events = Vec::new();
        let written = self.lock().write(ofs, data, &mut events);
        self.dispatch(events);
        written
    }

    /// Insert bytes at `ofs`. Returns the number of bytes inserted.
    pub fn insert(&self, ofs: usize, data: &[u8]) -> usize {
        let mut events = Vec::new();
        let inserted = self.lock().insert(ofs, data, &mut events);
        self.dispatch(events);
        inserted
    }

    /// Remove up to `size` bytes at `ofs`. Returns the number removed.
    pub fn remove(&self, ofs: usize, size: usize) -> usize {
        let mut events = Vec::new();
        let removed = self.lock().remove(ofs, size, &mut events);
        self.dispatch(events);
        removed
    }

    /// Find the first regex match at or after `start`.
    pub fn find(&self, regex: &regex::bytes::Regex, start: usize) -> Option<usize> {
        let st = self.lock();
        if start > st.data.len() {
            return None;
        }
        regex.find_at(&st.data, start).map(|m| m.start())
    }

    /// Write the store to `path` and mark it unmodified.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut st = self.lock();
        fs::write(path, &st.data)?;
        let len = st.data.len();
        st.tags = vec![ModTag::Original; len];
        st.modified = false;
        st.unmodified_undo_index = Some(st.undo_buffer.len());
        Ok(())
    }

    /// Close the pending undo group, tagging it with the caller's cursor
    /// descriptors. Clears the redo stack.
    pub fn commit_undo(&self, before: u64, after: u64) {
        let mut st = self.lock();
        if st.pending.is_empty() {
            return;
        }
        if let Some(index) = st.unmodified_undo_index {
            if st.undo_buffer.len() < index {
                st.unmodified_undo_index = None;
            }
        }
        let entries = std::mem::take(&mut st.pending);
        st.undo_buffer.push(UndoGroup {
            before,
            after,
            entries,
        });
        st.redo_buffer.clear();
    }

    /// True if any undo group is available.
    pub fn has_undo_actions(&self) -> bool {
        !self.lock().undo_buffer.is_empty()
    }

    /// Undo the most recent group, returning its *before* cursor.
    pub fn undo(&self) -> Option<u64> {
        let mut events = Vec::new();
        let result = {
            let mut st = self.lock();
            let group = st.undo_buffer.pop()?;
            for entry in group.entries.iter().rev() {
                st.undo_entry(entry, &mut events);
            }
            let before = group.before;
            st.redo_buffer.push(group);
            st.modified = st.unmodified_undo_index != Some(st.undo_buffer.len());
            Some(before)
        };
        self.dispatch(events);
        result
    }

    /// Redo the most recently undone group, returning its *after* cursor.
    pub fn redo(&self) -> Option<u64> {
        let mut events = Vec::new();
        let result = {
            let mut st = self.lock();
            let group = st.redo_buffer.pop()?;
            for entry in group.entries.iter() {
                st.redo_entry(entry, &mut events);
            }
            let after = group.after;
            st.undo_buffer.push(group);
            st.modified = st.unmodified_undo_index != Some(st.undo_buffer.len());
            Some(after)
        };
        self.dispatch(events);
        result
    }
}

impl AddressSpace for ByteStore {
    fn read(&self, ofs: u64, size: usize) -> Vec<u8> {
        let st = self.lock();
        let ofs = ofs as usize;
        let end = ofs.saturating_add(size).min(st.data.len());
        if ofs >= end {
            return Vec::new();
        }
        st.data[ofs..end].to_vec()
    }

    fn write(&self, ofs: u64, data: &[u8]) -> usize {
        self.write_at(ofs as usize, data)
    }

    fn start(&self) -> u64 {
        0
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_marks_bytes_changed() {
        let store = ByteStore::from_bytes(vec![0u8; 4]);
        assert_eq!(store.write_at(1, &[1, 2]), 2);
        assert_eq!(store.read(0, 4), vec![0, 1, 2, 0]);
        assert_eq!(
            store.get_modification(0, 4),
            vec![
                ModTag::Original,
                ModTag::Changed,
                ModTag::Changed,
                ModTag::Original
            ]
        );
        assert!(store.is_modified());
    }

    #[test]
    fn write_past_end_splits_into_insert() {
        let store = ByteStore::from_bytes(vec![9u8; 2]);
        assert_eq!(store.write_at(1, &[1, 2, 3]), 3);
        assert_eq!(store.len(), 4);
        assert_eq!(store.read(0, 4), vec![9, 1, 2, 3]);
        assert_eq!(
            store.get_modification(0, 4),
            vec![
                ModTag::Original,
                ModTag::Changed,
                ModTag::Inserted,
                ModTag::Inserted
            ]
        );
    }

    #[test]
    fn write_out_of_range_is_rejected() {
        let store = ByteStore::from_bytes(vec![0u8; 2]);
        assert_eq!(store.write_at(5, &[1]), 0);
        assert_eq!(store.insert(5, &[1]), 0);
    }

    #[test]
    fn remove_truncates_to_available() {
        let store = ByteStore::from_bytes(vec![1, 2, 3]);
        assert_eq!(store.remove(1, 10), 2);
        assert_eq!(store.read(0, 4), vec![1]);
    }

    #[test]
    fn undo_redo_round_trip() {
        let store = ByteStore::from_bytes(vec![0u8; 4]);
        store.write_at(0, &[1, 2]);
        store.commit_undo(0, 2);
        store.insert(4, &[7]);
        store.remove(1, 1);
        store.commit_undo(2, 1);

        let data = store.read(0, store.len());
        let tags = store.get_modification(0, store.len());

        assert_eq!(store.undo(), Some(2));
        assert_eq!(store.undo(), Some(0));
        assert_eq!(store.read(0, store.len()), vec![0, 0, 0, 0]);
        assert_eq!(store.undo(), None);

        assert_eq!(store.redo(), Some(2));
        assert_eq!(store.redo(), Some(1));
        assert_eq!(store.redo(), None);
        assert_eq!(store.read(0, store.len()), data);
        assert_eq!(store.get_modification(0, store.len()), tags);
    }

    #[test]
    fn unmodified_watermark_tracks_undo_depth() {
        let store = ByteStore::from_bytes(vec![0u8; 2]);
        store.write_at(0, &[5]);
        store.commit_undo(0, 0);
        assert!(store.is_modified());
        store.undo();
        assert!(!store.is_modified());
        store.redo();
        assert!(store.is_modified());
    }

    #[test]
    fn inserted_bytes_stay_inserted_after_write() {
        let store = ByteStore::from_bytes(vec![0u8; 1]);
        store.insert(1, &[1]);
        store.write_at(1, &[2]);
        assert_eq!(store.get_modification(1, 1), vec![ModTag::Inserted]);
    }

    #[test]
    fn regex_find() {
        let store = ByteStore::from_bytes(b"abcabc".to_vec());
        let re = regex::bytes::Regex::new("bc").expect("regex");
        assert_eq!(store.find(&re, 0), Some(1));
        assert_eq!(store.find(&re, 2), Some(4));
        assert_eq!(store.find(&re, 5), None);
    }
}

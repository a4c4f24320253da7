//! Virtual-address-space projection of an executable file.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use burin_asm::Arch;

use crate::access::AddressSpace;
use crate::store::{ByteStore, ModTag, StoreObserver};
use crate::{elf, macho, pe, ParseError};

bitflags::bitflags! {
    /// Segment permissions, ELF-style bit order.
    pub struct SegmentPerms: u8 {
        /// Executable.
        const EXEC = 1;
        /// Writable.
        const WRITE = 2;
        /// Readable.
        const READ = 4;
    }
}

/// One mapped region of the virtual address space.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    /// Virtual start address.
    pub vaddr: u64,
    /// Virtual size; the tail past `file_size` reads as zeros.
    pub vsize: u64,
    /// Backing file offset.
    pub file_offset: u64,
    /// Number of file-backed bytes.
    pub file_size: u64,
    /// Permissions.
    pub perms: SegmentPerms,
}

impl Segment {
    fn contains(&self, addr: u64) -> bool {
        self.vsize != 0 && addr >= self.vaddr && addr < self.vaddr + self.vsize
    }
}

/// Container format an [`Image`] was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Flat bytes mapped at zero.
    Raw,
    /// ELF32 or ELF64.
    Elf,
    /// PE32 or PE32+.
    Pe,
    /// Mach-O, 32- or 64-bit, either endianness.
    MachO,
}

/// Symbol and PLT tables of an image. User-editable after parsing.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Symbol name to virtual address.
    pub by_name: BTreeMap<String, u64>,
    /// Virtual address to symbol name.
    pub by_addr: BTreeMap<u64, String>,
    /// PLT/IAT slot address to the imported symbol's bare name.
    pub plt: BTreeMap<u64, String>,
}

/// Receives image change notifications in virtual-address space.
pub trait ImageObserver: Send + Sync {
    /// File-backed bytes covering `vaddr` were overwritten.
    fn data_written(&self, vaddr: u64, contents: &[u8]);
}

/// A virtual-address view over a [`ByteStore`], produced by one of the
/// container parsers or [`Image::raw`].
pub struct Image {
    store: Arc<ByteStore>,
    format: Format,
    arch: Option<Arch>,
    entry: Option<u64>,
    segments: Vec<Segment>,
    symbols: Mutex<SymbolTable>,
    observers: Mutex<Vec<Weak<dyn ImageObserver>>>,
}

// Piece of a virtual range after segment translation.
enum Chunk {
    File { offset: u64, len: usize },
    Zero { len: usize },
}

fn virtual_chunks(segments: &[Segment], mut ofs: u64, mut len: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    while len > 0 {
        // First matching segment wins.
        let seg = match segments.iter().find(|s| s.contains(ofs)) {
            Some(seg) => seg,
            None => break,
        };
        let prog_ofs = ofs - seg.vaddr;
        let mem_len = (seg.vsize - prog_ofs).min(len as u64) as usize;
        let file_len = (seg.file_size as i64) - (prog_ofs as i64);

        if file_len <= 0 {
            chunks.push(Chunk::Zero { len: mem_len });
            len -= mem_len;
            ofs += mem_len as u64;
            continue;
        }

        let file_len = (file_len as usize).min(len);
        chunks.push(Chunk::File {
            offset: seg.file_offset + prog_ofs,
            len: file_len,
        });
        len -= file_len;
        ofs += file_len as u64;
    }
    chunks
}

/// Read through a segment table out of a flat file snapshot. Used by the
/// PE parser, which walks its import tables by virtual address.
pub(crate) fn virtual_read(segments: &[Segment], data: &[u8], ofs: u64, len: usize) -> Vec<u8> {
    let mut result = Vec::new();
    for chunk in virtual_chunks(segments, ofs, len) {
        match chunk {
            Chunk::File { offset, len } => {
                let offset = offset as usize;
                let end = offset.saturating_add(len).min(data.len());
                if offset >= end {
                    break;
                }
                result.extend_from_slice(&data[offset..end]);
            }
            Chunk::Zero { len } => result.extend(std::iter::repeat(0u8).take(len)),
        }
    }
    result
}

impl Image {
    pub(crate) fn build(
        store: Arc<ByteStore>,
        format: Format,
        arch: Option<Arch>,
        entry: Option<u64>,
        segments: Vec<Segment>,
        symbols: SymbolTable,
    ) -> Arc<Image> {
        let image = Arc::new(Image {
            store,
            format,
            arch,
            entry,
            segments,
            symbols: Mutex::new(symbols),
            observers: Mutex::new(Vec::new()),
        });
        let observer: Arc<dyn StoreObserver> = image.clone();
        image.store.add_observer(&observer);
        image
    }

    /// View raw bytes as a flat image mapped at address zero.
    pub fn raw(store: Arc<ByteStore>, arch: Option<Arch>) -> Arc<Image> {
        Image::build(store, Format::Raw, arch, None, Vec::new(), SymbolTable::default())
    }

    /// Parse an ELF image.
    pub fn parse_elf(store: Arc<ByteStore>) -> Result<Arc<Image>, ParseError> {
        elf::parse(store)
    }

    /// Parse a PE image.
    pub fn parse_pe(store: Arc<ByteStore>) -> Result<Arc<Image>, ParseError> {
        pe::parse(store)
    }

    /// Parse a Mach-O image.
    pub fn parse_macho(store: Arc<ByteStore>) -> Result<Arc<Image>, ParseError> {
        macho::parse(store)
    }

    /// Try each container parser, falling back to a raw view.
    pub fn load(store: Arc<ByteStore>) -> Arc<Image> {
        Image::parse_elf(store.clone())
            .or_else(|_| Image::parse_pe(store.clone()))
            .or_else(|_| Image::parse_macho(store.clone()))
            .unwrap_or_else(|_| Image::raw(store, None))
    }

    /// Whether any container parser recognizes the store contents.
    pub fn is_executable_format(store: &Arc<ByteStore>) -> bool {
        Image::parse_elf(store.clone()).is_ok()
            || Image::parse_pe(store.clone()).is_ok()
            || Image::parse_macho(store.clone()).is_ok()
    }

    /// Load a file and build the best available view over it.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Arc<Image>> {
        let store = Arc::new(ByteStore::from_file(path)?);
        Ok(Image::load(store))
    }

    fn lock_symbols(&self) -> MutexGuard<'_, SymbolTable> {
        self.symbols.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Raw images follow the store length; parsed images have a fixed
    // segment table.
    fn effective_segments(&self) -> Vec<Segment> {
        if self.format == Format::Raw {
            let len = self.store.len() as u64;
            vec![Segment {
                vaddr: 0,
                vsize: len,
                file_offset: 0,
                file_size: len,
                perms: SegmentPerms::all(),
            }]
        } else {
            self.segments.clone()
        }
    }

    /// The underlying byte store.
    pub fn store(&self) -> &Arc<ByteStore> {
        &self.store
    }

    /// Container format of this view.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Machine architecture, when recognized.
    pub fn arch(&self) -> Option<Arch> {
        self.arch
    }

    /// Program entry point; raw images fall back to the start address.
    pub fn entry(&self) -> Option<u64> {
        self.entry.or_else(|| {
            if self.format == Format::Raw {
                Some(0)
            } else {
                self.effective_segments().iter().map(|s| s.vaddr).min()
            }
        })
    }

    /// Mapped segments.
    pub fn segments(&self) -> Vec<Segment> {
        self.effective_segments()
    }

    /// Lowest mapped segment start at or above `ofs`.
    pub fn next_valid_addr(&self, ofs: u64) -> Option<u64> {
        self.effective_segments()
            .iter()
            .filter(|s| s.vsize != 0 && s.vaddr >= ofs)
            .map(|s| s.vaddr)
            .min()
    }

    /// Per-byte modification tags translated to virtual addresses. BSS
    /// tails report [`ModTag::Original`].
    pub fn get_modification(&self, ofs: u64, len: usize) -> Vec<ModTag> {
        let segments = self.effective_segments();
        let mut result = Vec::new();
        for chunk in virtual_chunks(&segments, ofs, len) {
            match chunk {
                Chunk::File { offset, len } => {
                    result.extend(self.store.get_modification(offset as usize, len))
                }
                Chunk::Zero { len } => result.extend(std::iter::repeat(ModTag::Original).take(len)),
            }
        }
        result
    }

    /// Inserting into an image is always rejected.
    pub fn insert(&self, _ofs: u64, _data: &[u8]) -> usize {
        0
    }

    /// Removing from an image is always rejected.
    pub fn remove(&self, _ofs: u64, _size: usize) -> usize {
        0
    }

    /// Register an observer for virtual-address write notifications.
    pub fn add_observer(&self, observer: &Arc<dyn ImageObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::downgrade(observer));
    }

    /// Find the first regex match at or after `addr`, hopping unmapped
    /// gaps between segments.
    pub fn find(&self, regex: &regex::bytes::Regex, addr: u64) -> Option<u64> {
        let end = self.end();
        let mut addr = addr;
        while addr < end {
            let data = self.read(addr, (end - addr) as usize);
            if data.is_empty() {
                match self.next_valid_addr(addr) {
                    Some(next) if next > addr => {
                        addr = next;
                        continue;
                    }
                    _ => break,
                }
            }
            if let Some(m) = regex.find(&data) {
                return Some(addr + m.start() as u64);
            }
            addr += data.len() as u64;
            match self.next_valid_addr(addr) {
                Some(next) => addr = next,
                None => break,
            }
        }
        None
    }

    /// Decorate an imported symbol name the way this format renders its
    /// indirect-call slots.
    pub fn decorate_plt_name(&self, name: &str) -> String {
        match self.format {
            Format::Pe => format!("{name}@IAT"),
            _ => format!("{name}@PLT"),
        }
    }

    /// Define (or redefine) a symbol.
    pub fn create_symbol(&self, addr: u64, name: &str) {
        let mut symbols = self.lock_symbols();
        symbols.by_name.insert(name.to_string(), addr);
        symbols.by_addr.insert(addr, name.to_string());
    }

    /// Remove a symbol by both keys.
    pub fn delete_symbol(&self, addr: u64, name: &str) {
        let mut symbols = self.lock_symbols();
        symbols.by_name.remove(name);
        symbols.by_addr.remove(&addr);
    }

    /// Symbol name at an address.
    pub fn symbol_by_addr(&self, addr: u64) -> Option<String> {
        self.lock_symbols().by_addr.get(&addr).cloned()
    }

    /// Address of a named symbol.
    pub fn symbol_by_name(&self, name: &str) -> Option<u64> {
        self.lock_symbols().by_name.get(name).copied()
    }

    /// Imported name behind a PLT/IAT slot address.
    pub fn plt_name(&self, addr: u64) -> Option<String> {
        self.lock_symbols().plt.get(&addr).cloned()
    }

    /// Copy of the symbol tables.
    pub fn symbols(&self) -> SymbolTable {
        self.lock_symbols().clone()
    }

    /// Whether the store differs from its on-disk form.
    pub fn is_modified(&self) -> bool {
        self.store.is_modified()
    }

    /// Save the underlying store.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        self.store.save(path)
    }

    /// True if any undo group is available.
    pub fn has_undo_actions(&self) -> bool {
        self.store.has_undo_actions()
    }

    /// Close the pending undo group on the underlying store.
    pub fn commit_undo(&self, before: u64, after: u64) {
        self.store.commit_undo(before, after)
    }

    /// Undo the most recent group.
    pub fn undo(&self) -> Option<u64> {
        self.store.undo()
    }

    /// Redo the most recently undone group.
    pub fn redo(&self) -> Option<u64> {
        self.store.redo()
    }
}

impl AddressSpace for Image {
    fn read(&self, ofs: u64, len: usize) -> Vec<u8> {
        let segments = self.effective_segments();
        let mut result = Vec::new();
        for chunk in virtual_chunks(&segments, ofs, len) {
            match chunk {
                Chunk::File { offset, len } => {
                    let bytes = self.store.read(offset, len);
                    let short = bytes.len() < len;
                    result.extend(bytes);
                    if short {
                        break;
                    }
                }
                Chunk::Zero { len } => result.extend(std::iter::repeat(0u8).take(len)),
            }
        }
        result
    }

    fn write(&self, ofs: u64, data: &[u8]) -> usize {
        let segments = self.effective_segments();
        let mut written = 0;
        let mut data = data;
        for chunk in virtual_chunks(&segments, ofs, data.len()) {
            match chunk {
                Chunk::File { offset, len } => {
                    written += self.store.write_at(offset as usize, &data[..len]);
                    data = &data[len..];
                }
                // Only the file-backed portion is writable.
                Chunk::Zero { .. } => break,
            }
        }
        written
    }

    fn start(&self) -> u64 {
        self.effective_segments()
            .iter()
            .filter(|s| s.vsize != 0)
            .map(|s| s.vaddr)
            .min()
            .unwrap_or(0)
    }

    fn size(&self) -> u64 {
        let segments = self.effective_segments();
        let start = self.start();
        segments
            .iter()
            .filter(|s| s.vsize != 0)
            .map(|s| s.vaddr + s.vsize)
            .max()
            .map(|max| max - start)
            .unwrap_or(0)
    }
}

impl StoreObserver for Image {
    // Re-emit store writes in virtual-address space, clipped to the
    // file-backed portion of each covering segment.
    fn data_written(&self, offset: u64, contents: &[u8]) {
        let observers: Vec<Arc<dyn ImageObserver>> = {
            let mut list = self.observers.lock().unwrap_or_else(|e| e.into_inner());
            list.retain(|w| w.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };
        if observers.is_empty() {
            return;
        }
        for seg in self.effective_segments() {
            if seg.vsize == 0 {
                continue;
            }
            let seg_end = seg.file_offset + seg.file_size;
            if offset + contents.len() as u64 <= seg.file_offset || offset >= seg_end {
                continue;
            }
            let from_start = offset as i64 - seg.file_offset as i64;
            let mut data_ofs = 0i64;
            let mut length = contents.len() as i64;
            let mut from_start = from_start;
            if from_start < 0 {
                length += from_start;
                data_ofs -= from_start;
                from_start = 0;
            }
            if from_start + length > seg.file_size as i64 {
                length = seg.file_size as i64 - from_start;
            }
            if length > 0 {
                let slice = &contents[data_ofs as usize..(data_ofs + length) as usize];
                for observer in &observers {
                    observer.data_written(seg.vaddr + from_start as u64, slice);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(segments: Vec<Segment>, bytes: Vec<u8>) -> Arc<Image> {
        let store = Arc::new(ByteStore::from_bytes(bytes));
        Image::build(store, Format::Elf, None, None, segments, SymbolTable::default())
    }

    #[test]
    fn read_translates_and_zero_fills() {
        let image = test_image(
            vec![Segment {
                vaddr: 0x1000,
                vsize: 8,
                file_offset: 2,
                file_size: 4,
                perms: SegmentPerms::READ,
            }],
            vec![0, 0, 1, 2, 3, 4],
        );
        assert_eq!(image.read(0x1000, 8), vec![1, 2, 3, 4, 0, 0, 0, 0]);
        assert_eq!(image.read(0x1002, 2), vec![3, 4]);
        assert_eq!(image.read(0xfff, 1), Vec::<u8>::new());
        assert_eq!(image.start(), 0x1000);
        assert_eq!(image.end(), 0x1008);
    }

    #[test]
    fn write_clips_to_file_backed_bytes() {
        let image = test_image(
            vec![Segment {
                vaddr: 0x1000,
                vsize: 8,
                file_offset: 0,
                file_size: 4,
                perms: SegmentPerms::READ | SegmentPerms::WRITE,
            }],
            vec![0; 4],
        );
        assert_eq!(image.write(0x1002, &[9, 9, 9, 9]), 2);
        assert_eq!(image.read(0x1000, 4), vec![0, 0, 9, 9]);
        assert_eq!(image.insert(0x1000, &[1]), 0);
        assert_eq!(image.remove(0x1000, 1), 0);
    }

    #[test]
    fn raw_image_follows_store() {
        let store = Arc::new(ByteStore::from_bytes(vec![1, 2, 3]));
        let image = Image::raw(store.clone(), None);
        assert_eq!(image.read(0, 3), vec![1, 2, 3]);
        store.insert(3, &[4]);
        assert_eq!(image.end(), 4);
        assert_eq!(image.read(3, 1), vec![4]);
    }

    #[test]
    fn symbols_are_editable() {
        let image = test_image(Vec::new(), Vec::new());
        image.create_symbol(0x100, "main");
        assert_eq!(image.symbol_by_addr(0x100), Some("main".to_string()));
        assert_eq!(image.symbol_by_name("main"), Some(0x100));
        image.delete_symbol(0x100, "main");
        assert_eq!(image.symbol_by_addr(0x100), None);
    }
}

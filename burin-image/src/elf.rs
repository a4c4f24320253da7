//! ELF parser: program headers, symbol tables and jump-slot relocations.

use std::sync::Arc;

use burin_asm::Arch;

use crate::image::{Format, Image, Segment, SegmentPerms, SymbolTable};
use crate::reader::{string_at, Reader};
use crate::store::ByteStore;
use crate::{AddressSpace, ParseError};

struct SectionHeader {
    kind: u32,
    offset: u64,
    size: u64,
    link: u32,
}

struct SymbolEntry {
    name: String,
    value: u64,
}

fn arch_from_machine(machine: u16) -> Option<Arch> {
    match machine {
        2 => Some(Arch::Sparc),
        3 => Some(Arch::X86),
        4 => Some(Arch::M68000),
        8 => Some(Arch::Mips),
        15 => Some(Arch::PaRisc),
        18 => Some(Arch::Sparc32Plus),
        20 => Some(Arch::Ppc),
        40 => Some(Arch::Arm),
        41 => Some(Arch::Alpha),
        43 => Some(Arch::SparcV9),
        62 => Some(Arch::X86_64),
        _ => None,
    }
}

fn parse_sections(
    r: &mut Reader<'_>,
    offset: u64,
    count: u16,
    is_64: bool,
) -> Result<Vec<SectionHeader>, ParseError> {
    let mut sections = Vec::new();
    let entry_size = if is_64 { 64 } else { 40 };
    for i in 0..count {
        r.seek((offset + (i as u64) * entry_size) as usize);
        let _name = r.u32_le("section header")?;
        let kind = r.u32_le("section header")?;
        if is_64 {
            let _flags = r.u64_le("section header")?;
            let _addr = r.u64_le("section header")?;
            let offset = r.u64_le("section header")?;
            let size = r.u64_le("section header")?;
            let link = r.u32_le("section header")?;
            sections.push(SectionHeader {
                kind,
                offset,
                size,
                link,
            });
        } else {
            let _flags = r.u32_le("section header")?;
            let _addr = r.u32_le("section header")?;
            let offset = r.u32_le("section header")? as u64;
            let size = r.u32_le("section header")? as u64;
            let link = r.u32_le("section header")?;
            sections.push(SectionHeader {
                kind,
                offset,
                size,
                link,
            });
        }
    }
    Ok(sections)
}

fn parse_symbol_table(
    data: &[u8],
    section: &SectionHeader,
    strings: &[u8],
    is_64: bool,
    symbols: &mut SymbolTable,
) -> Result<Vec<SymbolEntry>, ParseError> {
    let mut entries = Vec::new();
    let entry_size: u64 = if is_64 { 24 } else { 16 };
    let mut r = Reader::new(data);
    for i in 0..section.size / entry_size {
        r.seek((section.offset + i * entry_size) as usize);
        let (name_offset, value) = if is_64 {
            let name_offset = r.u32_le("symbol")?;
            let _info = r.u8("symbol")?;
            let _other = r.u8("symbol")?;
            let _section = r.u16_le("symbol")?;
            let value = r.u64_le("symbol")?;
            let _size = r.u64_le("symbol")?;
            (name_offset, value)
        } else {
            let name_offset = r.u32_le("symbol")?;
            let value = r.u32_le("symbol")? as u64;
            let _size = r.u32_le("symbol")?;
            let _info = r.u8("symbol")?;
            let _other = r.u8("symbol")?;
            let _section = r.u16_le("symbol")?;
            (name_offset, value)
        };
        let name = string_at(strings, name_offset as usize);
        if !name.is_empty() {
            symbols.by_name.insert(name.clone(), value);
            symbols.by_addr.insert(value, name.clone());
        }
        entries.push(SymbolEntry { name, value });
    }
    Ok(entries)
}

// Record JUMP_SLOT relocations (type 7 for both 386 and x86_64) into the
// PLT table and expose each slot as `name@PLT`.
fn parse_relocs(
    data: &[u8],
    section: &SectionHeader,
    entry_size: u64,
    is_64: bool,
    dynamic_symbols: &[SymbolEntry],
    symbols: &mut SymbolTable,
) -> Result<(), ParseError> {
    let mut r = Reader::new(data);
    for i in 0..section.size / entry_size {
        r.seek((section.offset + i * entry_size) as usize);
        let (ofs, sym, reloc_type) = if is_64 {
            let ofs = r.u64_le("relocation")?;
            let info = r.u64_le("relocation")?;
            (ofs, (info >> 32) as usize, info & 0xff)
        } else {
            let ofs = r.u32_le("relocation")? as u64;
            let info = r.u32_le("relocation")?;
            (ofs, (info >> 8) as usize, (info & 0xff) as u64)
        };
        if reloc_type == 7 {
            if let Some(symbol) = dynamic_symbols.get(sym) {
                let decorated = format!("{}@PLT", symbol.name);
                symbols.plt.insert(ofs, symbol.name.clone());
                symbols.by_name.insert(decorated.clone(), ofs);
                symbols.by_addr.insert(ofs, decorated);
            }
        }
    }
    Ok(())
}

pub(crate) fn parse(store: Arc<ByteStore>) -> Result<Arc<Image>, ParseError> {
    let data = store.read(0, store.len());
    if data.len() < 4 || &data[0..4] != b"\x7fELF" {
        return Err(ParseError::BadMagic);
    }

    let mut r = Reader::new(&data);
    r.seek(4);
    let file_class = r.u8("ident")?;
    let _encoding = r.u8("ident")?;
    let _version = r.u8("ident")?;
    let _abi = r.u8("ident")?;
    let _abi_version = r.u8("ident")?;
    r.seek(16);
    let _file_type = r.u16_le("header")?;
    let machine = r.u16_le("header")?;
    let _elf_version = r.u32_le("header")?;

    let is_64 = match file_class {
        1 => false,
        2 => true,
        _ => return Err(ParseError::Unsupported("ELF class")),
    };

    let (entry, ph_offset, sh_offset) = if is_64 {
        let entry = r.u64_le("header")?;
        let ph_offset = r.u64_le("header")?;
        let sh_offset = r.u64_le("header")?;
        (entry, ph_offset, sh_offset)
    } else {
        let entry = r.u32_le("header")? as u64;
        let ph_offset = r.u32_le("header")? as u64;
        let sh_offset = r.u32_le("header")? as u64;
        (entry, ph_offset, sh_offset)
    };
    let _flags = r.u32_le("header")?;
    let _header_size = r.u16_le("header")?;
    let _ph_size = r.u16_le("header")?;
    let ph_count = r.u16_le("header")?;
    let _sh_size = r.u16_le("header")?;
    let sh_count = r.u16_le("header")?;
    let _string_table = r.u16_le("header")?;

    // Section headers are not required to load an ELF, skip errors.
    let sections = parse_sections(&mut r, sh_offset, sh_count, is_64).unwrap_or_default();

    let mut segments = Vec::new();
    let ph_entry_size: u64 = if is_64 { 56 } else { 32 };
    for i in 0..ph_count {
        r.seek((ph_offset + (i as u64) * ph_entry_size) as usize);
        let (offset, vaddr, file_size, memory_size, flags) = if is_64 {
            let _kind = r.u32_le("program header")?;
            let flags = r.u32_le("program header")?;
            let offset = r.u64_le("program header")?;
            let vaddr = r.u64_le("program header")?;
            let _paddr = r.u64_le("program header")?;
            let file_size = r.u64_le("program header")?;
            let memory_size = r.u64_le("program header")?;
            (offset, vaddr, file_size, memory_size, flags)
        } else {
            let _kind = r.u32_le("program header")?;
            let offset = r.u32_le("program header")? as u64;
            let vaddr = r.u32_le("program header")? as u64;
            let _paddr = r.u32_le("program header")?;
            let file_size = r.u32_le("program header")? as u64;
            let memory_size = r.u32_le("program header")? as u64;
            let flags = r.u32_le("program header")?;
            (offset, vaddr, file_size, memory_size, flags)
        };
        if memory_size != 0 {
            segments.push(Segment {
                vaddr,
                vsize: memory_size,
                file_offset: offset,
                file_size,
                perms: SegmentPerms::from_bits_truncate(flags as u8),
            });
        }
    }

    let mut symbols = SymbolTable::default();
    symbols.by_name.insert("_start".to_string(), entry);
    symbols.by_addr.insert(entry, "_start".to_string());

    // Symbol tables are optional; a damaged one leaves the image usable.
    let mut dynamic_symbols = Vec::new();
    for section in &sections {
        if section.kind == 2 || section.kind == 11 {
            let strings = match sections.get(section.link as usize) {
                Some(s) => data
                    .get(s.offset as usize..(s.offset + s.size) as usize)
                    .unwrap_or(&[]),
                None => continue,
            };
            match parse_symbol_table(&data, section, strings, is_64, &mut symbols) {
                Ok(entries) => {
                    if section.kind == 11 {
                        dynamic_symbols = entries;
                    }
                }
                Err(_) => continue,
            }
        }
    }

    for section in &sections {
        let entry_size = match (section.kind, is_64) {
            (9, false) => 8,
            (9, true) => 16,
            (4, false) => 12,
            (4, true) => 24,
            _ => continue,
        };
        let _ = parse_relocs(
            &data,
            section,
            entry_size,
            is_64,
            &dynamic_symbols,
            &mut symbols,
        );
    }

    Ok(Image::build(
        store,
        Format::Elf,
        arch_from_machine(machine),
        Some(entry),
        segments,
        symbols,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal ELF64 with one PT_LOAD, a dynsym and one RELA jump slot.
    fn build_elf64() -> Vec<u8> {
        let mut data = vec![0u8; 0x200];
        data[0..4].copy_from_slice(b"\x7fELF");
        data[4] = 2; // 64-bit
        data[5] = 1;
        data[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        data[18..20].copy_from_slice(&62u16.to_le_bytes()); // x86_64
        data[24..32].copy_from_slice(&0x401000u64.to_le_bytes()); // entry
        data[32..40].copy_from_slice(&0x40u64.to_le_bytes()); // phoff
        data[40..48].copy_from_slice(&0x78u64.to_le_bytes()); // shoff
        data[56..58].copy_from_slice(&1u16.to_le_bytes()); // phnum
        data[60..62].copy_from_slice(&3u16.to_le_bytes()); // shnum

        // Program header: load file [0, 0x200) at 0x400000, mem 0x300
        let ph = 0x40;
        data[ph..ph + 4].copy_from_slice(&1u32.to_le_bytes());
        data[ph + 4..ph + 8].copy_from_slice(&5u32.to_le_bytes()); // r-x
        data[ph + 8..ph + 16].copy_from_slice(&0u64.to_le_bytes());
        data[ph + 16..ph + 24].copy_from_slice(&0x400000u64.to_le_bytes());
        data[ph + 32..ph + 40].copy_from_slice(&0x200u64.to_le_bytes());
        data[ph + 40..ph + 48].copy_from_slice(&0x300u64.to_le_bytes());

        // Section 1: dynsym at 0x140, two entries, strings in section 2
        let sh = 0x78 + 64;
        data[sh + 4..sh + 8].copy_from_slice(&11u32.to_le_bytes());
        data[sh + 24..sh + 32].copy_from_slice(&0x140u64.to_le_bytes());
        data[sh + 32..sh + 40].copy_from_slice(&48u64.to_le_bytes());
        data[sh + 40..sh + 44].copy_from_slice(&2u32.to_le_bytes());

        // Section 2: string table at 0x1a0
        let sh2 = 0x78 + 128;
        data[sh2 + 4..sh2 + 8].copy_from_slice(&3u32.to_le_bytes());
        data[sh2 + 24..sh2 + 32].copy_from_slice(&0x1a0u64.to_le_bytes());
        data[sh2 + 32..sh2 + 40].copy_from_slice(&16u64.to_le_bytes());

        // Section 0 reused as RELA table at 0x1b0, one 24-byte entry
        let sh0 = 0x78;
        data[sh0 + 4..sh0 + 8].copy_from_slice(&4u32.to_le_bytes());
        data[sh0 + 24..sh0 + 32].copy_from_slice(&0x1b0u64.to_le_bytes());
        data[sh0 + 32..sh0 + 40].copy_from_slice(&24u64.to_le_bytes());

        // dynsym entry 1: name offset 1 ("printf"), value 0
        let sym = 0x140 + 24;
        data[sym..sym + 4].copy_from_slice(&1u32.to_le_bytes());

        // strings: \0printf\0
        data[0x1a1..0x1a7].copy_from_slice(b"printf");

        // RELA: slot 0x400018, type 7 (jump slot), symbol 1
        let rela = 0x1b0;
        data[rela..rela + 8].copy_from_slice(&0x400018u64.to_le_bytes());
        data[rela + 8..rela + 16].copy_from_slice(&((1u64 << 32) | 7).to_le_bytes());

        data
    }

    #[test]
    fn parses_segments_symbols_and_plt() {
        let store = Arc::new(ByteStore::from_bytes(build_elf64()));
        let image = Image::parse_elf(store).expect("valid ELF");

        assert_eq!(image.arch(), Some(Arch::X86_64));
        assert_eq!(image.entry(), Some(0x401000));
        assert_eq!(image.start(), 0x400000);
        assert_eq!(image.end(), 0x400300);

        assert_eq!(image.symbol_by_name("_start"), Some(0x401000));
        assert_eq!(image.plt_name(0x400018), Some("printf".to_string()));
        assert_eq!(image.symbol_by_name("printf@PLT"), Some(0x400018));
        assert_eq!(
            image.symbol_by_addr(0x400018),
            Some("printf@PLT".to_string())
        );

        // BSS tail reads as zeros
        assert_eq!(image.read(0x400200, 2), vec![0, 0]);
    }

    #[test]
    fn rejects_non_elf() {
        let store = Arc::new(ByteStore::from_bytes(b"MZnope".to_vec()));
        assert!(Image::parse_elf(store).is_err());
    }
}

//! PE/COFF parser: sections, the import address table and exports.

use std::sync::Arc;

use burin_asm::Arch;

use crate::image::{virtual_read, Format, Image, Segment, SegmentPerms, SymbolTable};
use crate::reader::Reader;
use crate::store::ByteStore;
use crate::{AddressSpace, ParseError};

const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

fn arch_from_machine(machine: u16) -> Option<Arch> {
    match machine {
        0x14c => Some(Arch::X86),
        0x8664 => Some(Arch::X86_64),
        0x166 | 0x366 => Some(Arch::Mips),
        0x266 | 0x466 => Some(Arch::Mips16),
        0x1f0 | 0x1f1 => Some(Arch::Ppc),
        0x1c0 => Some(Arch::Arm),
        0x1c2 | 0x1c4 => Some(Arch::Thumb),
        0xaa64 => Some(Arch::Arm64),
        0x200 => Some(Arch::Ia64),
        _ => None,
    }
}

fn section_perms(characteristics: u32) -> SegmentPerms {
    let mut perms = SegmentPerms::empty();
    if characteristics & IMAGE_SCN_MEM_EXECUTE != 0 {
        perms |= SegmentPerms::EXEC;
    }
    if characteristics & IMAGE_SCN_MEM_READ != 0 {
        perms |= SegmentPerms::READ;
    }
    if characteristics & IMAGE_SCN_MEM_WRITE != 0 {
        perms |= SegmentPerms::WRITE;
    }
    perms
}

fn vread_string(segments: &[Segment], data: &[u8], mut addr: u64) -> String {
    let mut result = String::new();
    loop {
        let byte = virtual_read(segments, data, addr, 1);
        match byte.first() {
            Some(0) | None => break,
            Some(&b) => result.push(b as char),
        }
        addr += 1;
    }
    result
}

fn file_offset_of(segments: &[Segment], addr: u64) -> Option<u64> {
    let seg = segments.iter().find(|s| {
        s.vsize != 0 && addr >= s.vaddr && addr < s.vaddr + s.vsize
    })?;
    Some(seg.file_offset + (addr - seg.vaddr))
}

struct DataDir {
    virtual_address: u32,
    size: u32,
}

#[allow(clippy::too_many_arguments)]
fn parse_imports(
    data: &[u8],
    segments: &[Segment],
    image_base: u64,
    dir: &DataDir,
    bits: u32,
    symbols: &mut SymbolTable,
) -> Result<(), ParseError> {
    let mut descriptors = Vec::new();
    for i in 0..dir.size as u64 / 20 {
        let desc_vaddr = image_base + dir.virtual_address as u64 + i * 20;
        if virtual_read(segments, data, desc_vaddr, 4) == [0, 0, 0, 0] {
            break;
        }
        if virtual_read(segments, data, desc_vaddr + 16, 4) == [0, 0, 0, 0] {
            break;
        }
        let base = file_offset_of(segments, image_base + dir.virtual_address as u64)
            .ok_or(ParseError::Truncated("import directory"))?
            + i * 20;
        let mut r = Reader::new(data);
        r.seek(base as usize);
        let lookup = r.u32_le("import descriptor")?;
        let _timestamp = r.u32_le("import descriptor")?;
        let _forward_chain = r.u32_le("import descriptor")?;
        let name = r.u32_le("import descriptor")?;
        let iat = r.u32_le("import descriptor")?;
        descriptors.push((lookup, name, iat));
    }

    for (lookup, name, iat) in descriptors {
        let full_name = vread_string(segments, data, image_base + name as u64);
        // Strip the extension from the DLL file name.
        let dll = match full_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => full_name,
        };

        let mut entry_ofs = image_base + lookup as u64;
        let mut iat_ofs = image_base + iat as u64;
        loop {
            let (entry, is_ordinal) = if bits == 32 {
                let bytes = virtual_read(segments, data, entry_ofs, 4);
                if bytes.len() < 4 {
                    break;
                }
                let raw = u32::from_le_bytes(bytes.try_into().unwrap_or([0; 4]));
                ((raw & 0x7fff_ffff) as u64, raw & 0x8000_0000 != 0)
            } else {
                let bytes = virtual_read(segments, data, entry_ofs, 8);
                if bytes.len() < 8 {
                    break;
                }
                let raw = u64::from_le_bytes(bytes.try_into().unwrap_or([0; 8]));
                (raw & 0x7fff_ffff_ffff_ffff, raw & 0x8000_0000_0000_0000 != 0)
            };

            if !is_ordinal && entry == 0 {
                break;
            }

            let func = if is_ordinal {
                format!("{dll}!Ordinal{}", entry & 0xffff)
            } else {
                format!("{dll}!{}", vread_string(segments, data, image_base + entry + 2))
            };

            let decorated = format!("{func}@IAT");
            symbols.plt.insert(iat_ofs, func);
            symbols.by_name.insert(decorated.clone(), iat_ofs);
            symbols.by_addr.insert(iat_ofs, decorated);

            entry_ofs += (bits / 8) as u64;
            iat_ofs += (bits / 8) as u64;
        }
    }
    Ok(())
}

fn parse_exports(
    data: &[u8],
    segments: &[Segment],
    image_base: u64,
    dir: &DataDir,
    symbols: &mut SymbolTable,
) -> Result<(), ParseError> {
    let base = file_offset_of(segments, image_base + dir.virtual_address as u64)
        .ok_or(ParseError::Truncated("export directory"))?;
    let mut r = Reader::new(data);
    r.seek(base as usize);
    let _characteristics = r.u32_le("export directory")?;
    let _timestamp = r.u32_le("export directory")?;
    let _major = r.u16_le("export directory")?;
    let _minor = r.u16_le("export directory")?;
    let _dll_name = r.u32_le("export directory")?;
    let ordinal_base = r.u32_le("export directory")?;
    let function_count = r.u32_le("export directory")?;
    let name_count = r.u32_le("export directory")?;
    let address_of_functions = r.u32_le("export directory")?;
    let address_of_names = r.u32_le("export directory")?;
    let address_of_name_ordinals = r.u32_le("export directory")?;

    let functions_base = file_offset_of(segments, image_base + address_of_functions as u64)
        .ok_or(ParseError::Truncated("export functions"))?;
    let mut functions = Vec::new();
    for i in 0..function_count as u64 {
        r.seek((functions_base + i * 4) as usize);
        functions.push(r.u32_le("export functions")?);
    }

    let names_base = file_offset_of(segments, image_base + address_of_names as u64)
        .ok_or(ParseError::Truncated("export names"))?;
    let ordinals_base = file_offset_of(segments, image_base + address_of_name_ordinals as u64)
        .ok_or(ParseError::Truncated("export ordinals"))?;

    for i in 0..name_count as u64 {
        r.seek((names_base + i * 4) as usize);
        let name_addr = r.u32_le("export names")?;
        r.seek((ordinals_base + i * 2) as usize);
        let ordinal = r.u16_le("export ordinals")?;

        let function_index = (ordinal as u32).wrapping_sub(ordinal_base) as usize;
        let address = match functions.get(function_index) {
            Some(rva) => image_base + *rva as u64,
            None => continue,
        };
        let name = vread_string(segments, data, image_base + name_addr as u64);

        symbols.by_addr.insert(address, name.clone());
        symbols.by_name.insert(name, address);
    }
    Ok(())
}

pub(crate) fn parse(store: Arc<ByteStore>) -> Result<Arc<Image>, ParseError> {
    let data = store.read(0, store.len());
    if data.len() < 0x40 || &data[0..2] != b"MZ" {
        return Err(ParseError::BadMagic);
    }

    let mut r = Reader::new(&data);
    r.seek(0x3c);
    let pe_offset = r.u32_le("MZ header")? as usize;
    r.seek(pe_offset);
    let magic = r.u32_le("PE header")?;
    if magic != 0x0000_4550 {
        return Err(ParseError::BadMagic);
    }
    let machine = r.u16_le("PE header")?;
    let section_count = r.u16_le("PE header")?;
    let _timestamp = r.u32_le("PE header")?;
    let _coff_symbol_table = r.u32_le("PE header")?;
    let _coff_symbol_count = r.u32_le("PE header")?;
    let optional_header_size = r.u16_le("PE header")?;
    let _characteristics = r.u16_le("PE header")?;

    let opt_magic = r.u16_le("optional header")?;
    let _major_linker = r.u8("optional header")?;
    let _minor_linker = r.u8("optional header")?;
    let _size_of_code = r.u32_le("optional header")?;
    let _size_of_init = r.u32_le("optional header")?;
    let _size_of_uninit = r.u32_le("optional header")?;
    let entry_rva = r.u32_le("optional header")?;
    let _base_of_code = r.u32_le("optional header")?;

    let (bits, image_base, section_align, file_align, data_dir_count, size_of_headers) =
        match opt_magic {
            0x10b => {
                let _base_of_data = r.u32_le("optional header")?;
                let image_base = r.u32_le("optional header")? as u64;
                let section_align = r.u32_le("optional header")?;
                let file_align = r.u32_le("optional header")?;
                r.seek(r.pos() + 12); // os/image/subsystem versions
                let _win32_version = r.u32_le("optional header")?;
                let _size_of_image = r.u32_le("optional header")?;
                let size_of_headers = r.u32_le("optional header")?;
                let _checksum = r.u32_le("optional header")?;
                let _subsystem = r.u16_le("optional header")?;
                let _dll_characteristics = r.u16_le("optional header")?;
                r.seek(r.pos() + 16);
                let _loader_flags = r.u32_le("optional header")?;
                let data_dir_count = r.u32_le("optional header")?;
                (32u32, image_base, section_align, file_align, data_dir_count, size_of_headers)
            }
            0x20b => {
                let image_base = r.u64_le("optional header")?;
                let section_align = r.u32_le("optional header")?;
                let file_align = r.u32_le("optional header")?;
                r.seek(r.pos() + 12); // os/image/subsystem versions
                let _win32_version = r.u32_le("optional header")?;
                let _size_of_image = r.u32_le("optional header")?;
                let size_of_headers = r.u32_le("optional header")?;
                let _checksum = r.u32_le("optional header")?;
                let _subsystem = r.u16_le("optional header")?;
                let _dll_characteristics = r.u16_le("optional header")?;
                r.seek(r.pos() + 32);
                let _loader_flags = r.u32_le("optional header")?;
                let data_dir_count = r.u32_le("optional header")?;
                (64u32, image_base, section_align, file_align, data_dir_count, size_of_headers)
            }
            _ => return Err(ParseError::Unsupported("optional header magic")),
        };

    let mut data_dirs = Vec::new();
    for _ in 0..data_dir_count {
        let virtual_address = r.u32_le("data directory")?;
        let size = r.u32_le("data directory")?;
        data_dirs.push(DataDir {
            virtual_address,
            size,
        });
    }

    // The first segment synthesizes the PE headers themselves.
    let mut segments = vec![Segment {
        vaddr: image_base,
        vsize: size_of_headers as u64,
        file_offset: 0,
        file_size: size_of_headers as u64,
        perms: SegmentPerms::READ,
    }];

    for i in 0..section_count {
        r.seek(pe_offset + optional_header_size as usize + 24 + (i as usize) * 40);
        let _name = r.bytes(8, "section header")?;
        let virtual_size = r.u32_le("section header")?;
        let virtual_address = r.u32_le("section header")?;
        let size_of_raw_data = r.u32_le("section header")?;
        let pointer_to_raw_data = r.u32_le("section header")?;
        let _pointer_to_relocs = r.u32_le("section header")?;
        let _pointer_to_line_numbers = r.u32_le("section header")?;
        let _reloc_count = r.u16_le("section header")?;
        let _line_number_count = r.u16_le("section header")?;
        let characteristics = r.u32_le("section header")?;

        segments.push(Segment {
            vaddr: image_base + (virtual_address & !(section_align.wrapping_sub(1))) as u64,
            vsize: virtual_size as u64,
            file_offset: (pointer_to_raw_data & !(file_align.wrapping_sub(1))) as u64,
            file_size: size_of_raw_data as u64,
            perms: section_perms(characteristics),
        });
    }

    let entry = image_base + entry_rva as u64;
    let mut symbols = SymbolTable::default();
    symbols.by_name.insert("_start".to_string(), entry);
    symbols.by_addr.insert(entry, "_start".to_string());

    // Import and export directories are optional; swallow their failures.
    if data_dirs.len() >= 2 {
        let _ = parse_imports(&data, &segments, image_base, &data_dirs[1], bits, &mut symbols);
    }
    if !data_dirs.is_empty() && data_dirs[0].size >= 40 {
        let _ = parse_exports(&data, &segments, image_base, &data_dirs[0], &mut symbols);
    }

    Ok(Image::build(
        store,
        Format::Pe,
        arch_from_machine(machine),
        Some(entry),
        segments,
        symbols,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal PE32 with one section and one imported function.
    fn build_pe32() -> Vec<u8> {
        let mut data = vec![0u8; 0x400];
        data[0..2].copy_from_slice(b"MZ");
        data[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());

        let pe = 0x80;
        data[pe..pe + 4].copy_from_slice(b"PE\0\0");
        data[pe + 4..pe + 6].copy_from_slice(&0x14cu16.to_le_bytes()); // x86
        data[pe + 6..pe + 8].copy_from_slice(&1u16.to_le_bytes()); // sections
        data[pe + 20..pe + 22].copy_from_slice(&224u16.to_le_bytes()); // opt size

        let opt = pe + 24;
        data[opt..opt + 2].copy_from_slice(&0x10bu16.to_le_bytes());
        data[opt + 16..opt + 20].copy_from_slice(&0x1000u32.to_le_bytes()); // entry rva
        data[opt + 28..opt + 32].copy_from_slice(&0x400000u32.to_le_bytes()); // image base
        data[opt + 32..opt + 36].copy_from_slice(&0x1000u32.to_le_bytes()); // section align
        data[opt + 36..opt + 40].copy_from_slice(&0x200u32.to_le_bytes()); // file align
        data[opt + 60..opt + 64].copy_from_slice(&0x200u32.to_le_bytes()); // headers size
        data[opt + 92..opt + 96].copy_from_slice(&16u32.to_le_bytes()); // dir count
        // Import directory: rva 0x1100, size 40
        data[opt + 104..opt + 108].copy_from_slice(&0x1100u32.to_le_bytes());
        data[opt + 108..opt + 112].copy_from_slice(&40u32.to_le_bytes());

        // Section header: .text at rva 0x1000, raw 0x200..0x400
        let sh = opt + 224;
        data[sh..sh + 8].copy_from_slice(b".text\0\0\0");
        data[sh + 8..sh + 12].copy_from_slice(&0x200u32.to_le_bytes()); // vsize
        data[sh + 12..sh + 16].copy_from_slice(&0x1000u32.to_le_bytes()); // va
        data[sh + 16..sh + 20].copy_from_slice(&0x200u32.to_le_bytes()); // raw size
        data[sh + 20..sh + 24].copy_from_slice(&0x200u32.to_le_bytes()); // raw ptr
        data[sh + 36..sh + 40].copy_from_slice(&0x6000_0020u32.to_le_bytes());

        // Import descriptor at rva 0x1100 (file 0x300)
        let desc = 0x300;
        data[desc..desc + 4].copy_from_slice(&0x1140u32.to_le_bytes()); // lookup rva
        data[desc + 12..desc + 16].copy_from_slice(&0x1160u32.to_le_bytes()); // name rva
        data[desc + 16..desc + 20].copy_from_slice(&0x1150u32.to_le_bytes()); // iat rva

        // Lookup table at rva 0x1140 (file 0x340): hint/name rva 0x1170
        data[0x340..0x344].copy_from_slice(&0x1170u32.to_le_bytes());
        // IAT at rva 0x1150 (file 0x350)
        data[0x350..0x354].copy_from_slice(&0x1170u32.to_le_bytes());
        // DLL name at rva 0x1160 (file 0x360)
        data[0x360..0x36c].copy_from_slice(b"KERNEL32.dll");
        // Hint/name at rva 0x1170 (file 0x370): hint + "ExitProcess"
        data[0x372..0x37d].copy_from_slice(b"ExitProcess");

        data
    }

    #[test]
    fn parses_sections_and_imports() {
        let store = Arc::new(ByteStore::from_bytes(build_pe32()));
        let image = Image::parse_pe(store).expect("valid PE");

        assert_eq!(image.arch(), Some(Arch::X86));
        assert_eq!(image.entry(), Some(0x401000));
        assert_eq!(image.start(), 0x400000);

        assert_eq!(image.symbol_by_name("_start"), Some(0x401000));
        assert_eq!(
            image.plt_name(0x401150),
            Some("KERNEL32!ExitProcess".to_string())
        );
        assert_eq!(
            image.symbol_by_addr(0x401150),
            Some("KERNEL32!ExitProcess@IAT".to_string())
        );
        assert_eq!(image.decorate_plt_name("f"), "f@IAT");
    }

    #[test]
    fn rejects_non_pe() {
        let store = Arc::new(ByteStore::from_bytes(vec![0u8; 0x100]));
        assert!(Image::parse_pe(store).is_err());
    }
}

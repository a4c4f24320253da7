//! Mach-O parser: load commands, thread-state entry point, symbol table
//! and the DYLD_INFO bind opcode streams.

use std::sync::Arc;

use burin_asm::Arch;

use crate::image::{Format, Image, Segment, SegmentPerms, SymbolTable};
use crate::reader::{read_uleb128, string_at, Reader};
use crate::store::ByteStore;
use crate::{AddressSpace, ParseError};

const LC_SEGMENT: u32 = 1;
const LC_SYMTAB: u32 = 2;
const LC_UNIX_THREAD: u32 = 5;
const LC_SEGMENT_64: u32 = 25;
const LC_DYLD_INFO: u32 = 0x22;

const CPU_TYPE_X86: u32 = 7;
const CPU_TYPE_X86_64: u32 = 0x0100_0007;
const CPU_TYPE_ARM: u32 = 12;
const CPU_TYPE_PPC: u32 = 18;
const CPU_TYPE_PPC64: u32 = 0x0100_0012;

fn arch_from_cputype(cputype: u32) -> Option<Arch> {
    match cputype {
        CPU_TYPE_X86 => Some(Arch::X86),
        CPU_TYPE_X86_64 => Some(Arch::X86_64),
        CPU_TYPE_ARM => Some(Arch::Arm),
        CPU_TYPE_PPC | CPU_TYPE_PPC64 => Some(Arch::Ppc),
        _ => None,
    }
}

struct RawSymbol {
    name: String,
    kind: u8,
    section: u8,
    value: u64,
}

// The DYLD_INFO bind interpreter; the same byte code drives both the bind
// and lazy-bind tables. Not documented by Apple.
fn parse_dynamic_table(
    data: &[u8],
    table_offset: u64,
    table_size: u64,
    segments: &[Segment],
    pointer_size: u64,
    symbols: &mut SymbolTable,
) {
    let start = table_offset as usize;
    let end = (table_offset + table_size) as usize;
    if start >= data.len() {
        return;
    }
    let opcodes = &data[start..end.min(data.len())];

    let mut segment = 0usize;
    let mut offset = 0u64;
    let mut sym_type = 0u8;
    let mut name = String::new();

    let mut i = 0usize;
    while i < opcodes.len() {
        let opcode = opcodes[i];
        i += 1;
        match opcode >> 4 {
            0 => continue,
            1 => { /* ordinal from low nibble */ }
            2 => {
                let _ordinal = read_uleb128(opcodes, &mut i);
            }
            3 => { /* negative ordinal from low nibble */ }
            4 => {
                name.clear();
                while i < opcodes.len() {
                    let ch = opcodes[i];
                    i += 1;
                    if ch == 0 {
                        break;
                    }
                    name.push(ch as char);
                }
            }
            5 => sym_type = opcode & 0xf,
            6 => {
                let _addend = read_uleb128(opcodes, &mut i);
            }
            7 => {
                segment = (opcode & 0xf) as usize;
                offset = read_uleb128(opcodes, &mut i);
            }
            8 => {
                offset = offset.wrapping_add(read_uleb128(opcodes, &mut i));
            }
            _ => {
                if sym_type == 1 && segment <= segments.len() && segment > 0 {
                    // Pointer-typed bindings are the PLT slots.
                    let addr = segments[segment - 1].vaddr.wrapping_add(offset);
                    symbols.plt.insert(addr, name.clone());
                    let decorated = format!("{name}@PLT");
                    symbols.by_name.insert(decorated.clone(), addr);
                    symbols.by_addr.insert(addr, decorated);
                }
                offset = offset.wrapping_add(pointer_size);
                match opcode >> 4 {
                    10 => {
                        offset = offset.wrapping_add(read_uleb128(opcodes, &mut i));
                    }
                    11 => {
                        offset = offset.wrapping_add(((opcode & 0xf) as u64) * 4);
                    }
                    12 => {
                        let _count = read_uleb128(opcodes, &mut i);
                        let _skip = read_uleb128(opcodes, &mut i);
                    }
                    _ => {}
                }
            }
        }
    }
}

fn unix_thread_entry(r: &mut Reader<'_>, cputype: u32) -> Result<Option<u64>, ParseError> {
    let entry = match cputype {
        CPU_TYPE_X86 => {
            let _flavor = r.u32_le("thread state")?;
            let _count = r.u32_le("thread state")?;
            // eax ebx ecx edx edi esi ebp esp ss eflags eip ...
            let mut eip = 0u32;
            for i in 0..16 {
                let value = r.u32_le("thread state")?;
                if i == 10 {
                    eip = value;
                }
            }
            Some(eip as u64)
        }
        CPU_TYPE_X86_64 => {
            let _flavor = r.u32_le("thread state")?;
            let _count = r.u32_le("thread state")?;
            // rax rbx rcx rdx rdi rsi rbp rsp r8..r15 rip ...
            let mut rip = 0u64;
            for i in 0..21 {
                let value = r.u64_le("thread state")?;
                if i == 16 {
                    rip = value;
                }
            }
            Some(rip)
        }
        CPU_TYPE_PPC => {
            let _flavor = r.u32_be("thread state")?;
            let _count = r.u32_be("thread state")?;
            Some(r.u32_be("thread state")? as u64) // srr0
        }
        CPU_TYPE_PPC64 => {
            let _flavor = r.u32_be("thread state")?;
            let _count = r.u32_be("thread state")?;
            Some(r.u64_be("thread state")?) // srr0
        }
        CPU_TYPE_ARM => {
            let _flavor = r.u32_le("thread state")?;
            let _count = r.u32_le("thread state")?;
            // r0-r12 sp lr pc cpsr
            let mut pc = 0u32;
            for i in 0..16 {
                let value = r.u32_le("thread state")?;
                if i == 15 {
                    pc = value;
                }
            }
            Some(pc as u64)
        }
        _ => None,
    };
    Ok(entry)
}

pub(crate) fn parse(store: Arc<ByteStore>) -> Result<Arc<Image>, ParseError> {
    let data = store.read(0, store.len());
    if data.len() < 4 {
        return Err(ParseError::BadMagic);
    }

    let mut r = Reader::new(&data);
    let magic = r.u32_le("header")?;
    let (big_endian, is_64) = match magic {
        0xfeedface => (false, false),
        0xfeedfacf => (false, true),
        0xcefaedfe => (true, false),
        0xcffaedfe => (true, true),
        _ => return Err(ParseError::BadMagic),
    };

    let cputype = r.u32(big_endian, "header")?;
    let _cpusubtype = r.u32(big_endian, "header")?;
    let _filetype = r.u32(big_endian, "header")?;
    let cmd_count = r.u32(big_endian, "header")?;
    let _cmd_size = r.u32(big_endian, "header")?;
    let _flags = r.u32(big_endian, "header")?;
    if is_64 {
        let _reserved = r.u32(big_endian, "header")?;
    }

    let mut segments = Vec::new();
    let mut section_count = 0usize;
    let mut entry_addr = None;
    let mut raw_symbols = Vec::new();
    let mut dyld_tables = Vec::new();

    let mut offset = r.pos();
    for _ in 0..cmd_count {
        r.seek(offset);
        let cmd = r.u32(big_endian, "load command")?;
        let cmd_size = r.u32(big_endian, "load command")?;

        match cmd {
            LC_SEGMENT | LC_SEGMENT_64 => {
                let _name = r.bytes(16, "segment command")?;
                let (vmaddr, vmsize, fileoff, filesize) = if cmd == LC_SEGMENT_64 {
                    (
                        r.u64(big_endian, "segment command")?,
                        r.u64(big_endian, "segment command")?,
                        r.u64(big_endian, "segment command")?,
                        r.u64(big_endian, "segment command")?,
                    )
                } else {
                    (
                        r.u32(big_endian, "segment command")? as u64,
                        r.u32(big_endian, "segment command")? as u64,
                        r.u32(big_endian, "segment command")? as u64,
                        r.u32(big_endian, "segment command")? as u64,
                    )
                };
                let _maxprot = r.u32(big_endian, "segment command")?;
                let initprot = r.u32(big_endian, "segment command")?;
                let nsects = r.u32(big_endian, "segment command")?;
                let _seg_flags = r.u32(big_endian, "segment command")?;

                // Drop __PAGE_ZERO and anything like it.
                if initprot != 0 {
                    segments.push(Segment {
                        vaddr: vmaddr,
                        vsize: vmsize,
                        file_offset: fileoff,
                        file_size: filesize,
                        perms: SegmentPerms::from_bits_truncate((initprot & 7) as u8),
                    });
                }
                section_count += nsects as usize;
            }
            LC_UNIX_THREAD => {
                if let Some(entry) = unix_thread_entry(&mut r, cputype)? {
                    entry_addr = Some(entry);
                }
            }
            LC_SYMTAB => {
                let symoff = r.u32(big_endian, "symtab command")?;
                let nsyms = r.u32(big_endian, "symtab command")?;
                let stroff = r.u32(big_endian, "symtab command")? as usize;
                let strsize = r.u32(big_endian, "symtab command")? as usize;
                let strings = data
                    .get(stroff..(stroff + strsize).min(data.len()))
                    .unwrap_or(&[]);

                let mut sym_offset = symoff as usize;
                for _ in 0..nsyms {
                    r.seek(sym_offset);
                    let parse_one = |r: &mut Reader<'_>| -> Result<RawSymbol, ParseError> {
                        let strx = r.u32(big_endian, "symbol")?;
                        let kind = r.u8("symbol")?;
                        let section = r.u8("symbol")?;
                        let _desc = r.u16(big_endian, "symbol")?;
                        let value = if is_64 {
                            r.u64(big_endian, "symbol")?
                        } else {
                            r.u32(big_endian, "symbol")? as u64
                        };
                        Ok(RawSymbol {
                            name: string_at(strings, strx as usize),
                            kind,
                            section,
                            value,
                        })
                    };
                    // A truncated symbol table is ignored, not fatal.
                    match parse_one(&mut r) {
                        Ok(sym) => raw_symbols.push(sym),
                        Err(_) => break,
                    }
                    sym_offset += if is_64 { 16 } else { 12 };
                }
            }
            c if c & 0x7fff_ffff == LC_DYLD_INFO => {
                let _rebase_off = r.u32(big_endian, "dyld info")?;
                let _rebase_size = r.u32(big_endian, "dyld info")?;
                let bind_off = r.u32(big_endian, "dyld info")?;
                let bind_size = r.u32(big_endian, "dyld info")?;
                let _weak_bind_off = r.u32(big_endian, "dyld info")?;
                let _weak_bind_size = r.u32(big_endian, "dyld info")?;
                let lazy_bind_off = r.u32(big_endian, "dyld info")?;
                let lazy_bind_size = r.u32(big_endian, "dyld info")?;
                dyld_tables.push((bind_off as u64, bind_size as u64));
                dyld_tables.push((lazy_bind_off as u64, lazy_bind_size as u64));
            }
            _ => {}
        }

        offset += cmd_size as usize;
        if cmd_size == 0 {
            break;
        }
    }

    let mut symbols = SymbolTable::default();

    // Only use symbols that sit within a section.
    for sym in &raw_symbols {
        if sym.kind & 0xe == 0xe && (sym.section as usize) <= section_count {
            symbols.by_name.insert(sym.name.clone(), sym.value);
            symbols.by_addr.insert(sym.value, sym.name.clone());
        }
    }

    let pointer_size: u64 = if is_64 { 8 } else { 4 };
    for (table_offset, table_size) in dyld_tables {
        parse_dynamic_table(
            &data,
            table_offset,
            table_size,
            &segments,
            pointer_size,
            &mut symbols,
        );
    }

    Ok(Image::build(
        store,
        Format::MachO,
        arch_from_cputype(cputype),
        entry_addr,
        segments,
        symbols,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal 64-bit Mach-O: one segment, a thread command and DYLD_INFO
    // with a single pointer bind.
    fn build_macho64() -> Vec<u8> {
        let mut data = vec![0u8; 0x300];
        data[0..4].copy_from_slice(&0xfeedfacfu32.to_le_bytes());
        data[4..8].copy_from_slice(&CPU_TYPE_X86_64.to_le_bytes());
        data[16..20].copy_from_slice(&3u32.to_le_bytes()); // cmds
        // header is 32 bytes

        // LC_SEGMENT_64
        let seg = 32;
        data[seg..seg + 4].copy_from_slice(&LC_SEGMENT_64.to_le_bytes());
        data[seg + 4..seg + 8].copy_from_slice(&72u32.to_le_bytes());
        data[seg + 24..seg + 32].copy_from_slice(&0x1000u64.to_le_bytes()); // vmaddr
        data[seg + 32..seg + 40].copy_from_slice(&0x200u64.to_le_bytes()); // vmsize
        data[seg + 40..seg + 48].copy_from_slice(&0u64.to_le_bytes()); // fileoff
        data[seg + 48..seg + 56].copy_from_slice(&0x100u64.to_le_bytes()); // filesize
        data[seg + 60..seg + 64].copy_from_slice(&7u32.to_le_bytes()); // initprot

        // LC_UNIX_THREAD: flavor, count, 21 u64 regs; rip is index 16
        let th = seg + 72;
        data[th..th + 4].copy_from_slice(&LC_UNIX_THREAD.to_le_bytes());
        let th_size = 8 + 8 + 21 * 8;
        data[th + 4..th + 8].copy_from_slice(&(th_size as u32).to_le_bytes());
        let rip = th + 16 + 16 * 8;
        data[rip..rip + 8].copy_from_slice(&0x1040u64.to_le_bytes());

        // LC_DYLD_INFO: bind table binds "dyld_stub_binder" at seg0+0x80
        let dy = th + th_size;
        data[dy..dy + 4].copy_from_slice(&LC_DYLD_INFO.to_le_bytes());
        data[dy + 4..dy + 8].copy_from_slice(&48u32.to_le_bytes());
        let bind = 0x2c0u32;
        data[dy + 16..dy + 20].copy_from_slice(&bind.to_le_bytes());
        data[dy + 20..dy + 24].copy_from_slice(&24u32.to_le_bytes());

        // Bind opcodes: set name, type=1, segment 1 offset 0x80, do bind
        let mut stream = Vec::new();
        stream.push(0x40); // opcode 4: symbol name
        stream.extend(b"_puts\0");
        stream.push(0x51); // opcode 5: type = 1 (pointer)
        stream.push(0x71); // opcode 7: segment 1
        stream.push(0x80); // uleb128 offset 0x80 (two bytes)
        stream.push(0x01);
        stream.push(0x90); // opcode 9: bind
        data[bind as usize..bind as usize + stream.len()].copy_from_slice(&stream);

        data
    }

    #[test]
    fn parses_segments_entry_and_bindings() {
        let store = Arc::new(ByteStore::from_bytes(build_macho64()));
        let image = Image::parse_macho(store).expect("valid Mach-O");

        assert_eq!(image.arch(), Some(Arch::X86_64));
        assert_eq!(image.entry(), Some(0x1040));
        assert_eq!(image.start(), 0x1000);
        assert_eq!(image.end(), 0x1200);

        assert_eq!(image.plt_name(0x1080), Some("_puts".to_string()));
        assert_eq!(image.symbol_by_name("_puts@PLT"), Some(0x1080));
        assert_eq!(image.decorate_plt_name("x"), "x@PLT");
    }

    #[test]
    fn big_endian_magic_is_recognized() {
        let mut data = vec![0u8; 32];
        data[0..4].copy_from_slice(&0xcefaedfeu32.to_le_bytes());
        // cputype big-endian PPC
        data[4..8].copy_from_slice(&CPU_TYPE_PPC.to_be_bytes());
        let store = Arc::new(ByteStore::from_bytes(data));
        let image = Image::parse_macho(store).expect("valid Mach-O");
        assert_eq!(image.arch(), Some(Arch::Ppc));
        assert_eq!(image.format(), Format::MachO);
    }

    #[test]
    fn rejects_other_magic() {
        let store = Arc::new(ByteStore::from_bytes(vec![0u8; 16]));
        assert!(Image::parse_macho(store).is_err());
    }
}

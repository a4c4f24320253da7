use std::sync::Arc;

use burin_analysis::{Analysis, DisasmInstr, TokenKind};
use burin_asm::Arch;
use burin_image::{AddressSpace, ByteStore, Image};

fn raw_x86(code: &[u8]) -> Arc<Image> {
    let store = Arc::new(ByteStore::from_bytes(code.to_vec()));
    Image::raw(store, Some(Arch::X86))
}

#[test]
fn conditional_branch_splits_into_blocks() {
    // jne +2; nop; nop; ret
    let image = raw_x86(&[0x75, 0x02, 0x90, 0x90, 0xc3]);
    let analysis = Analysis::new(image);
    analysis.analyze_entry_point();
    analysis.process_queue();

    analysis.with_functions(|functions| {
        let func = &functions[&0];
        assert!(func.ready);
        assert_eq!(
            func.blocks.keys().copied().collect::<Vec<_>>(),
            vec![0, 2, 4]
        );

        let head = &func.blocks[&0];
        assert_eq!(head.instrs.len(), 1);
        assert_eq!(head.true_path, Some(4));
        assert_eq!(head.false_path, Some(2));
        assert_eq!(head.exits, vec![4, 2]);

        let fallthrough = &func.blocks[&2];
        assert_eq!(fallthrough.instrs.len(), 2);
        assert_eq!(fallthrough.exits, vec![4]);
        assert_eq!(fallthrough.prev, vec![0]);

        let tail = &func.blocks[&4];
        assert_eq!(tail.instrs.len(), 1);
        let mut prev = tail.prev.clone();
        prev.sort_unstable();
        assert_eq!(prev, vec![0, 2]);
    });
}

#[test]
fn graph_edges_are_consistent() {
    // A loop: dec eax; jne -3; ret
    let image = raw_x86(&[0x48, 0x75, 0xfd, 0xc3]);
    let analysis = Analysis::new(image);
    analysis.analyze_entry_point();
    analysis.process_queue();

    analysis.with_functions(|functions| {
        for func in functions.values() {
            for block in func.blocks.values() {
                for exit in &block.exits {
                    let target = &func.blocks[exit];
                    assert!(target.prev.contains(&block.entry));
                }
                for prev in &block.prev {
                    assert!(func.blocks[prev].exits.contains(&block.entry));
                }
            }
        }
    });
}

#[test]
fn backward_jump_splits_current_block() {
    // nop; nop; jmp -3 (back to the second nop)
    let image = raw_x86(&[0x90, 0x90, 0xeb, 0xfd, 0xc3]);
    let analysis = Analysis::new(image);
    analysis.analyze_entry_point();
    analysis.process_queue();

    analysis.with_functions(|functions| {
        let func = &functions[&0];
        assert_eq!(
            func.blocks.keys().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(func.blocks[&0].instrs.len(), 1);
        assert_eq!(func.blocks[&0].exits, vec![1]);
        // Tail block holds the second nop and the jump back to itself
        assert_eq!(func.blocks[&1].instrs.len(), 2);
        assert_eq!(func.blocks[&1].exits, vec![1]);
        let mut prev = func.blocks[&1].prev.clone();
        prev.sort_unstable();
        assert_eq!(prev, vec![0, 1]);
    });
}

#[test]
fn calls_queue_new_functions() {
    // call +3; ret / target: ret
    let image = raw_x86(&[0xe8, 0x01, 0x00, 0x00, 0x00, 0xc3, 0xc3]);
    let analysis = Analysis::new(image);
    analysis.analyze_entry_point();
    assert_eq!(analysis.queue_len(), 1);
    analysis.process_queue();

    analysis.with_functions(|functions| {
        assert_eq!(functions.keys().copied().collect::<Vec<_>>(), vec![0, 6]);
        assert_eq!(functions[&0].name, "_start");
        assert_eq!(functions[&6].name, "sub_00000006");
        // Call does not end the block
        assert_eq!(functions[&0].blocks[&0].instrs.len(), 2);
    });
}

#[test]
fn analysis_is_idempotent() {
    let image = raw_x86(&[0x75, 0x02, 0x90, 0x90, 0xc3]);
    let analysis = Analysis::new(image);
    analysis.analyze_entry_point();
    analysis.process_queue();

    let first = analysis.with_functions(|functions| {
        functions[&0]
            .blocks
            .iter()
            .map(|(&entry, block)| (entry, block.instrs.len(), block.exits.clone()))
            .collect::<Vec<_>>()
    });

    analysis.analyze_at(0);
    analysis.process_queue();

    let second = analysis.with_functions(|functions| {
        functions[&0]
            .blocks
            .iter()
            .map(|(&entry, block)| (entry, block.instrs.len(), block.exits.clone()))
            .collect::<Vec<_>>()
    });
    assert_eq!(first, second);
}

#[test]
fn data_edit_requeues_containing_function() {
    let image = raw_x86(&[0x75, 0x02, 0x90, 0x90, 0xc3]);
    let analysis = Analysis::new(image.clone());
    analysis.analyze_entry_point();
    analysis.process_queue();
    assert_eq!(analysis.queue_len(), 0);

    let before = analysis.with_functions(|functions| functions[&0].update_id);

    // Overwrite a byte inside the block at offset 2
    assert_eq!(image.write(3, &[0x90]), 1);
    assert_eq!(analysis.queue_len(), 1);
    // A second overlapping write does not queue a duplicate
    image.write(3, &[0x91]);
    assert_eq!(analysis.queue_len(), 1);

    analysis.process_queue();
    let after = analysis.with_functions(|functions| functions[&0].update_id);
    assert!(after > before);
}

#[test]
fn create_symbol_renames_function_and_requests_update() {
    let image = raw_x86(&[0xc3]);
    let analysis = Analysis::new(image.clone());
    analysis.analyze_entry_point();
    analysis.process_queue();

    analysis.create_symbol(0, "entry_thunk");
    assert!(analysis.update_requested());
    analysis.with_functions(|functions| {
        assert_eq!(functions[&0].name, "entry_thunk");
    });
    assert_eq!(image.symbol_by_name("entry_thunk"), Some(0));

    analysis.undefine_symbol(0, "entry_thunk");
    analysis.with_functions(|functions| {
        assert_eq!(functions[&0].name, "sub_00000000");
    });
}

#[test]
fn find_instr_scans_all_functions() {
    let image = raw_x86(&[0xe8, 0x01, 0x00, 0x00, 0x00, 0xc3, 0xc3]);
    let analysis = Analysis::new(image);
    analysis.analyze_entry_point();
    analysis.process_queue();

    assert_eq!(analysis.find_instr(0, true), Some((0, 0)));
    // Mid-instruction hit without exact match
    assert_eq!(analysis.find_instr(2, false), Some((0, 0)));
    assert_eq!(analysis.find_instr(2, true), None);
    assert_eq!(analysis.find_instr(6, false), Some((6, 6)));
    assert_eq!(analysis.find_instr(0x100, false), None);
}

#[test]
fn address_option_changes_rendering() {
    let image = raw_x86(&[0xc3]);
    let analysis = Analysis::new(image);
    analysis.analyze_entry_point();

    analysis.set_address_view(true);
    assert!(analysis.update_requested());
    analysis.update_all();

    analysis.with_functions(|functions| {
        let block = &functions[&0].blocks[&0];
        let line = &block.instrs[0].text.lines[0];
        assert!(line[0].text.starts_with("00000000"));
    });
}

#[test]
fn worker_thread_discovers_and_stops() {
    let image = raw_x86(&[0xe8, 0x01, 0x00, 0x00, 0x00, 0xc3, 0xc3]);
    let analysis = Analysis::new(image);
    analysis.start();

    let mut found = false;
    for _ in 0..200 {
        std::thread::sleep(std::time::Duration::from_millis(10));
        found = analysis.with_functions(|functions| {
            functions.len() == 2 && functions.values().all(|f| f.ready)
        });
        if found {
            break;
        }
    }
    analysis.stop();
    assert!(found, "worker did not finish discovery in time");
}

// Patch round-trips: every built-in patch decodes back to its intended
// replacement.
mod patches {
    use super::*;

    fn decode(image: &Arc<Image>, addr: u64) -> DisasmInstr {
        DisasmInstr::decode(image, Arch::X86, addr).expect("decodable")
    }

    #[test]
    fn nop_fill() {
        let image = raw_x86(&[0xe8, 0x01, 0x00, 0x00, 0x00, 0xc3]);
        let call = decode(&image, 0);
        call.patch_to_nop(&image);
        assert_eq!(image.read(0, 5), vec![0x90; 5]);
        assert_eq!(decode(&image, 0).len(), 1);
    }

    #[test]
    fn always_branch_preserves_target() {
        let image = raw_x86(&[0x75, 0x02, 0x90, 0x90, 0xc3]);
        let branch = decode(&image, 0);
        assert!(branch.is_patch_branch_allowed());
        assert_eq!(branch.target, Some(4));
        branch.patch_to_always_branch(&image);

        let replaced = decode(&image, 0);
        assert!(!replaced.is_conditional_branch());
        assert!(replaced.is_block_ending());
        assert_eq!(replaced.target, Some(4));
    }

    #[test]
    fn always_branch_two_byte_form() {
        // 0f 85 rel32 at 0: jne 0x102
        let image = raw_x86(&[0x0f, 0x85, 0xfc, 0x00, 0x00, 0x00, 0xc3]);
        let branch = decode(&image, 0);
        assert_eq!(branch.target, Some(0x102));
        branch.patch_to_always_branch(&image);

        // One nop, then an e9 jump reusing the original displacement
        let nop = decode(&image, 0);
        assert_eq!(nop.len(), 1);
        let jump = decode(&image, 1);
        assert!(jump.is_block_ending());
        assert_eq!(jump.target, Some(0x102));
    }

    #[test]
    fn invert_branch_flips_condition() {
        let image = raw_x86(&[0x75, 0x02, 0x90, 0x90, 0xc3]);
        decode(&image, 0).patch_to_invert_branch(&image);
        assert_eq!(image.read(0, 1), vec![0x74]); // je
        let inverted = decode(&image, 0);
        assert!(inverted.is_conditional_branch());
        assert_eq!(inverted.target, Some(4));
    }

    #[test]
    fn zero_return_replaces_call() {
        let image = raw_x86(&[0xe8, 0x01, 0x00, 0x00, 0x00, 0xc3, 0xc3]);
        let call = decode(&image, 0);
        assert!(call.is_patch_to_zero_return_allowed());
        call.patch_to_zero_return(&image);
        assert_eq!(image.read(0, 5), vec![0x31, 0xc0, 0x90, 0x90, 0x90]);

        let xor = decode(&image, 0);
        assert_eq!(xor.len(), 2);
        assert!(xor.is_valid());
    }

    #[test]
    fn fixed_return_value_encodes_immediate() {
        let image = raw_x86(&[0xe8, 0x01, 0x00, 0x00, 0x00, 0xc3, 0xc3]);
        let call = decode(&image, 0);
        assert!(call.is_patch_to_fixed_return_value_allowed());
        call.patch_to_fixed_return_value(&image, 0x2a);
        assert_eq!(image.read(0, 5), vec![0xb8, 0x2a, 0x00, 0x00, 0x00]);

        let mov = decode(&image, 0);
        assert!(mov.is_valid());
        assert_eq!(mov.len(), 5);
    }
}

// An ELF with a PLT slot and a single-instruction trampoline: the
// trampoline is detected, renamed and rendered symbolically.
mod plt {
    use super::*;

    fn build_elf64() -> Vec<u8> {
        let mut data = vec![0u8; 0x1100];
        data[0..4].copy_from_slice(b"\x7fELF");
        data[4] = 2;
        data[5] = 1;
        data[16..18].copy_from_slice(&2u16.to_le_bytes());
        data[18..20].copy_from_slice(&62u16.to_le_bytes()); // x86_64
        data[24..32].copy_from_slice(&0x401000u64.to_le_bytes()); // entry
        data[32..40].copy_from_slice(&0x40u64.to_le_bytes()); // phoff
        data[40..48].copy_from_slice(&0x78u64.to_le_bytes()); // shoff
        data[56..58].copy_from_slice(&1u16.to_le_bytes()); // phnum
        data[60..62].copy_from_slice(&3u16.to_le_bytes()); // shnum

        // One PT_LOAD: file [0, 0x1100) at 0x400000
        let ph = 0x40;
        data[ph..ph + 4].copy_from_slice(&1u32.to_le_bytes());
        data[ph + 4..ph + 8].copy_from_slice(&5u32.to_le_bytes());
        data[ph + 16..ph + 24].copy_from_slice(&0x400000u64.to_le_bytes());
        data[ph + 32..ph + 40].copy_from_slice(&0x1100u64.to_le_bytes());
        data[ph + 40..ph + 48].copy_from_slice(&0x1100u64.to_le_bytes());

        // Sections: 0 = RELA, 1 = dynsym, 2 = strings
        let sh0 = 0x78;
        data[sh0 + 4..sh0 + 8].copy_from_slice(&4u32.to_le_bytes());
        data[sh0 + 24..sh0 + 32].copy_from_slice(&0x1b0u64.to_le_bytes());
        data[sh0 + 32..sh0 + 40].copy_from_slice(&24u64.to_le_bytes());

        let sh1 = 0x78 + 64;
        data[sh1 + 4..sh1 + 8].copy_from_slice(&11u32.to_le_bytes());
        data[sh1 + 24..sh1 + 32].copy_from_slice(&0x140u64.to_le_bytes());
        data[sh1 + 32..sh1 + 40].copy_from_slice(&48u64.to_le_bytes());
        data[sh1 + 40..sh1 + 44].copy_from_slice(&2u32.to_le_bytes());

        let sh2 = 0x78 + 128;
        data[sh2 + 4..sh2 + 8].copy_from_slice(&3u32.to_le_bytes());
        data[sh2 + 24..sh2 + 32].copy_from_slice(&0x1a0u64.to_le_bytes());
        data[sh2 + 32..sh2 + 40].copy_from_slice(&16u64.to_le_bytes());

        // dynsym entry 1 named "printf"
        let sym = 0x140 + 24;
        data[sym..sym + 4].copy_from_slice(&1u32.to_le_bytes());
        data[0x1a1..0x1a7].copy_from_slice(b"printf");

        // RELA jump slot: 0x400018 -> symbol 1
        let rela = 0x1b0;
        data[rela..rela + 8].copy_from_slice(&0x400018u64.to_le_bytes());
        data[rela + 8..rela + 16].copy_from_slice(&((1u64 << 32) | 7).to_le_bytes());

        // Entry code at 0x401000: call 0x401030; ret
        data[0x1000..0x1005].copy_from_slice(&[0xe8, 0x2b, 0x00, 0x00, 0x00]);
        data[0x1005] = 0xc3;

        // Trampoline at 0x401030: jmp [rip-0x101e] -> slot 0x400018
        data[0x1030..0x1036].copy_from_slice(&[0xff, 0x25, 0xe2, 0xef, 0xff, 0xff]);

        data
    }

    #[test]
    fn trampoline_is_renamed_and_rendered() {
        let store = Arc::new(ByteStore::from_bytes(build_elf64()));
        let image = Image::parse_elf(store).expect("valid ELF");
        let analysis = Analysis::new(image.clone());
        analysis.analyze_entry_point();
        analysis.process_queue();
        analysis.update_all();

        analysis.with_functions(|functions| {
            let trampoline = &functions[&0x401030];
            assert!(trampoline.plt);
            assert_eq!(trampoline.name, "printf");

            // The call site renders a navigable token with the PLT name
            let call_block = &functions[&0x401000].blocks[&0x401000];
            let tokens = &call_block.instrs[0].text.tokens[0];
            let ptr = tokens
                .iter()
                .find(|t| t.kind == TokenKind::Ptr(0x401030))
                .expect("call target token");
            assert_eq!(ptr.text, "printf");
        });

        // The trampoline name was written back into the symbol table
        assert_eq!(image.symbol_by_addr(0x401030), Some("printf".to_string()));
    }
}

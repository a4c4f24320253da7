use burin_asm::x86::{self, InstrFlags, Operand};
use rstest::rstest;

#[test]
fn relative_call_resolves_target() {
    let instr = x86::disassemble64(&[0xe8, 0x0b, 0x00, 0x00, 0x00], 0x401000);
    assert_eq!(instr.operation, Some("calln"));
    assert_eq!(instr.length, 5);
    assert_eq!(
        instr.operands,
        vec![Operand::Imm {
            value: 0x401010,
            size: 8
        }]
    );
}

#[test]
fn short_conditional_branch() {
    let instr = x86::disassemble32(&[0x75, 0x02], 0x1000);
    assert_eq!(instr.operation, Some("jne"));
    assert_eq!(instr.length, 2);
    assert_eq!(
        instr.operands,
        vec![Operand::Imm {
            value: 0x1004,
            size: 4
        }]
    );
}

#[rstest]
#[case(0x70, "jo")]
#[case(0x71, "jno")]
#[case(0x74, "je")]
#[case(0x75, "jne")]
#[case(0x78, "js")]
#[case(0x7c, "jl")]
#[case(0x7f, "jg")]
fn conditional_branch_mnemonics(#[case] opcode: u8, #[case] name: &str) {
    let instr = x86::disassemble32(&[opcode, 0x00], 0);
    assert_eq!(instr.operation, Some(name));
}

#[test]
fn plain_return_and_halt() {
    assert_eq!(x86::disassemble32(&[0xc3], 0).operation, Some("retn"));
    assert_eq!(x86::disassemble32(&[0xf4], 0).operation, Some("hlt"));
    assert_eq!(x86::disassemble32(&[0x90], 0).operation, Some("nop"));
}

#[test]
fn register_forms_follow_modrm() {
    let instr = x86::disassemble32(&[0x89, 0xd8], 0);
    assert_eq!(instr.operation, Some("mov"));
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg {
                name: "eax",
                size: 4
            },
            Operand::Reg {
                name: "ebx",
                size: 4
            }
        ]
    );
}

#[test]
fn rex_widens_registers() {
    let instr = x86::disassemble64(&[0x48, 0x89, 0xd8], 0);
    assert_eq!(instr.operation, Some("mov"));
    assert_eq!(instr.length, 3);
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg {
                name: "rax",
                size: 8
            },
            Operand::Reg {
                name: "rbx",
                size: 8
            }
        ]
    );
}

#[test]
fn rex_b_turns_nop_into_xchg() {
    let instr = x86::disassemble64(&[0x49, 0x90], 0);
    assert_eq!(instr.operation, Some("xchg"));
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg {
                name: "rax",
                size: 8
            },
            Operand::Reg {
                name: "r8",
                size: 8
            }
        ]
    );
}

#[test]
fn immediate_moves() {
    let instr = x86::disassemble32(&[0xb8, 0x78, 0x56, 0x34, 0x12], 0);
    assert_eq!(instr.operation, Some("mov"));
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg {
                name: "eax",
                size: 4
            },
            Operand::Imm {
                value: 0x12345678,
                size: 4
            }
        ]
    );

    let instr = x86::disassemble64(
        &[0x48, 0xb8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11],
        0,
    );
    assert_eq!(instr.operation, Some("mov"));
    assert_eq!(instr.length, 10);
    assert_eq!(
        instr.operands[1],
        Operand::Imm {
            value: 0x1122334455667788,
            size: 8
        }
    );
}

#[test]
fn rip_relative_memory_resolves_at_decode() {
    let instr = x86::disassemble64(&[0x48, 0x8b, 0x05, 0x10, 0x00, 0x00, 0x00], 0x1000);
    assert_eq!(instr.operation, Some("mov"));
    assert_eq!(instr.length, 7);
    assert!(instr.flags.contains(InstrFlags::ADDR64));
    match &instr.operands[1] {
        Operand::Mem {
            displacement,
            rip_relative,
            components,
            ..
        } => {
            assert!(*rip_relative);
            assert_eq!(*displacement, 0x1017);
            assert_eq!(*components, [None, None]);
        }
        other => panic!("expected memory operand, got {other:?}"),
    }
}

#[test]
fn sib_scaled_index() {
    let instr = x86::disassemble32(&[0x8b, 0x04, 0x8b], 0);
    assert_eq!(instr.operation, Some("mov"));
    match &instr.operands[1] {
        Operand::Mem {
            components, scale, ..
        } => {
            assert_eq!(*components, [Some("ebx"), Some("ecx")]);
            assert_eq!(*scale, 4);
        }
        other => panic!("expected memory operand, got {other:?}"),
    }
}

#[test]
fn sixteen_bit_memory_forms() {
    let instr = x86::disassemble16(&[0x8b, 0x07], 0);
    assert_eq!(instr.operation, Some("mov"));
    assert_eq!(instr.addr_size, 2);
    match &instr.operands[1] {
        Operand::Mem { components, .. } => assert_eq!(*components, [Some("bx"), None]),
        other => panic!("expected memory operand, got {other:?}"),
    }
}

#[test]
fn lock_requires_memory_destination() {
    let instr = x86::disassemble32(&[0xf0, 0x01, 0x03], 0);
    assert_eq!(instr.operation, Some("add"));
    assert!(instr.flags.contains(InstrFlags::LOCK));

    // Register destination
    assert!(!x86::disassemble32(&[0xf0, 0x01, 0xc0], 0).is_valid());
    // cmp never takes lock
    assert!(!x86::disassemble32(&[0xf0, 0x39, 0x03], 0).is_valid());
}

#[test]
fn operand_size_prefix() {
    let instr = x86::disassemble32(&[0x66, 0x50], 0);
    assert_eq!(instr.operation, Some("push"));
    assert!(instr.flags.contains(InstrFlags::OPSIZE));
    assert_eq!(instr.operands, vec![Operand::Reg { name: "ax", size: 2 }]);
}

#[test]
fn invalid_in_long_mode() {
    assert!(x86::disassemble32(&[0x60], 0).is_valid()); // pusha
    assert!(!x86::disassemble64(&[0x60], 0).is_valid());
}

#[test]
fn truncated_window_is_invalid() {
    let instr = x86::disassemble32(&[0xe8, 0x01], 0);
    assert!(!instr.is_valid());
    assert!(instr.flags.contains(InstrFlags::INSUFFICIENT_LENGTH));
}

#[test]
fn address_size_selects_jecxz() {
    let instr = x86::disassemble32(&[0xe3, 0x05], 0);
    assert_eq!(instr.operation, Some("jecxz"));
    let instr = x86::disassemble64(&[0xe3, 0x05], 0);
    assert_eq!(instr.operation, Some("jrcxz"));
}

#[test]
fn group_encodings_use_reg_field() {
    let instr = x86::disassemble32(&[0xff, 0xd0], 0);
    assert_eq!(instr.operation, Some("calln"));
    assert_eq!(instr.operands, vec![Operand::Reg { name: "eax", size: 4 }]);

    let instr = x86::disassemble32(&[0xf7, 0xd8], 0);
    assert_eq!(instr.operation, Some("neg"));
}

#[test]
fn movzx_mixes_operand_sizes() {
    let instr = x86::disassemble32(&[0x0f, 0xb6, 0xc0], 0);
    assert_eq!(instr.operation, Some("movzx"));
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg {
                name: "eax",
                size: 4
            },
            Operand::Reg { name: "al", size: 1 }
        ]
    );
}

#[test]
fn near_branch_with_rel32() {
    let instr = x86::disassemble32(&[0x0f, 0x84, 0xfc, 0x00, 0x00, 0x00], 0);
    assert_eq!(instr.operation, Some("je"));
    assert_eq!(instr.length, 6);
    assert_eq!(
        instr.operands,
        vec![Operand::Imm {
            value: 0x102,
            size: 4
        }]
    );
}

#[test]
fn three_byte_sparse_map() {
    let instr = x86::disassemble32(&[0x0f, 0x38, 0x00, 0xc1], 0);
    assert_eq!(instr.operation, Some("pshufb"));
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg {
                name: "mm0",
                size: 8
            },
            Operand::Reg {
                name: "mm1",
                size: 8
            }
        ]
    );
}

#[test]
fn sse_prefix_selects_mnemonic() {
    // movss xmm0, xmm1 with the f3 prefix
    let instr = x86::disassemble32(&[0xf3, 0x0f, 0x10, 0xc1], 0);
    assert_eq!(instr.operation, Some("movss"));
    // movupd with 66
    let instr = x86::disassemble32(&[0x66, 0x0f, 0x10, 0xc1], 0);
    assert_eq!(instr.operation, Some("movupd"));
}

#[test]
fn fpu_escape_splits_on_modrm() {
    // fadd dword [eax]
    let instr = x86::disassemble32(&[0xd8, 0x00], 0);
    assert_eq!(instr.operation, Some("fadd"));
    // fadd st0, st1
    let instr = x86::disassemble32(&[0xd8, 0xc1], 0);
    assert_eq!(instr.operation, Some("fadd"));
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg {
                name: "st0",
                size: 10
            },
            Operand::Reg {
                name: "st1",
                size: 10
            }
        ]
    );
}

#[test]
fn rep_prefix_recorded_for_string_ops() {
    let instr = x86::disassemble32(&[0xf3, 0xa4], 0);
    assert_eq!(instr.operation, Some("movsb"));
    assert!(instr.flags.contains(InstrFlags::REP));

    let instr = x86::disassemble32(&[0xf2, 0xa6], 0);
    assert_eq!(instr.operation, Some("cmpsb"));
    assert!(instr.flags.contains(InstrFlags::REPNE));
}

#[test]
fn display_matches_nasm_style() {
    let instr = x86::disassemble32(&[0xb8, 0x78, 0x56, 0x34, 0x12], 0);
    assert_eq!(instr.to_string(), "mov     eax, 0x12345678");

    let instr = x86::disassemble32(&[0x8b, 0x44, 0x8b, 0x04], 0);
    assert_eq!(instr.to_string(), "mov     eax, dword [ebx+ecx*4+0x04]");

    let instr = x86::disassemble32(&[0x0f, 0x0b], 0);
    assert_eq!(instr.to_string().trim_end(), "ud2");
}

use burin_asm::arm::{self, MemComponent, Operand};
use rstest::rstest;

fn op(instr: &arm::Instruction) -> &str {
    instr.operation.as_deref().unwrap_or("??")
}

fn reg(name: &'static str) -> Operand {
    Operand::Reg(arm::RegOperand {
        name,
        negative: false,
        writeback: false,
    })
}

#[test]
fn unconditional_branch() {
    let instr = arm::disassemble(0xea000002, 0x8000);
    assert_eq!(op(&instr), "b");
    assert_eq!(instr.operands, vec![Operand::Imm(0x8010)]);
    assert_eq!(instr.length, 4);
}

#[test]
fn branch_and_link() {
    let instr = arm::disassemble(0xeb000002, 0x8000);
    assert_eq!(op(&instr), "bl");
    assert_eq!(instr.operands, vec![Operand::Imm(0x8010)]);
}

#[test]
fn backward_branch_sign_extends() {
    let instr = arm::disassemble(0xeafffffe, 0x8000);
    assert_eq!(op(&instr), "b");
    assert_eq!(instr.operands, vec![Operand::Imm(0x8000)]);
}

#[rstest]
#[case(0x0a000002, "b.eq")]
#[case(0x1a000002, "b.ne")]
#[case(0xba000002, "b.lt")]
fn condition_suffix(#[case] word: u32, #[case] name: &str) {
    let instr = arm::disassemble(word, 0x8000);
    assert_eq!(op(&instr), name);
}

#[test]
fn unconditional_blx_exchanges_to_thumb() {
    let instr = arm::disassemble(0xfa000002, 0x8000);
    assert_eq!(op(&instr), "blx");
    assert_eq!(instr.operands, vec![Operand::Imm(0x8011)]);
}

#[test]
fn data_processing_register() {
    let instr = arm::disassemble(0xe0832004, 0);
    assert_eq!(op(&instr), "add");
    assert_eq!(instr.operands, vec![reg("r2"), reg("r3"), reg("r4")]);

    let instr = arm::disassemble(0xe1a00000, 0);
    assert_eq!(op(&instr), "mov");
    assert_eq!(instr.operands, vec![reg("r0"), reg("r0")]);
}

#[test]
fn multiply_uses_high_rd() {
    let instr = arm::disassemble(0xe0010392, 0);
    assert_eq!(op(&instr), "mul");
    assert_eq!(instr.operands, vec![reg("r1"), reg("r2"), reg("r3")]);
}

#[test]
fn branch_exchange() {
    let instr = arm::disassemble(0xe12fff1e, 0);
    assert_eq!(op(&instr), "bx");
    assert_eq!(instr.operands, vec![reg("lr")]);
}

#[test]
fn load_with_immediate_offset() {
    let instr = arm::disassemble(0xe5d12004, 0);
    assert_eq!(op(&instr), "ldrb");
    assert_eq!(instr.operands.len(), 2);
    match &instr.operands[1] {
        Operand::Mem(m) => {
            assert!(!m.writeback);
            assert_eq!(m.components.len(), 2);
            assert_eq!(m.components[1], MemComponent::Imm(4));
        }
        other => panic!("expected memory operand, got {other:?}"),
    }
}

#[test]
fn pc_relative_load_resolves_literal() {
    let instr = arm::disassemble(0xe59f0010, 0x1000);
    assert_eq!(op(&instr), "ldr");
    match &instr.operands[1] {
        Operand::Mem(m) => assert_eq!(m.components, vec![MemComponent::Imm(0x1018)]),
        other => panic!("expected memory operand, got {other:?}"),
    }
}

#[test]
fn block_transfers() {
    let instr = arm::disassemble(0xe92d4010, 0);
    assert_eq!(op(&instr), "stmdb");
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg(arm::RegOperand {
                name: "sp",
                negative: false,
                writeback: true,
            }),
            reg("r4"),
            reg("lr"),
        ]
    );

    let instr = arm::disassemble(0xe8bd8010, 0);
    assert_eq!(op(&instr), "ldmia");
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg(arm::RegOperand {
                name: "sp",
                negative: false,
                writeback: true,
            }),
            reg("r4"),
            reg("pc"),
        ]
    );
}

#[test]
fn supervisor_call() {
    let instr = arm::disassemble(0xef000000, 0);
    assert_eq!(op(&instr), "svc");
    assert_eq!(instr.operands, vec![Operand::Imm(0)]);
}

#[test]
fn thumb_conditional_branch() {
    let instr = arm::disassemble(0xd1fd, 0x8001);
    assert_eq!(op(&instr), "b.ne");
    assert_eq!(instr.length, 2);
    assert_eq!(instr.operands, vec![Operand::Imm(0x7fff)]);
}

#[test]
fn thumb_push_pop() {
    let instr = arm::disassemble(0xb510, 0x8001);
    assert_eq!(op(&instr), "push");
    assert_eq!(instr.operands, vec![reg("r4"), reg("lr")]);
    assert_eq!(instr.length, 2);

    let instr = arm::disassemble(0xbd10, 0x8001);
    assert_eq!(op(&instr), "pop");
    assert_eq!(instr.operands, vec![reg("r4"), reg("pc")]);
}

#[test]
fn thumb_literal_load() {
    let instr = arm::disassemble(0x4902, 0x8001);
    assert_eq!(op(&instr), "ldr");
    assert_eq!(instr.operands[0], reg("r1"));
    match &instr.operands[1] {
        Operand::Mem(m) => assert_eq!(m.components, vec![MemComponent::Imm(0x800c)]),
        other => panic!("expected memory operand, got {other:?}"),
    }
}

#[test]
fn thumb_32_bit_bl() {
    let instr = arm::disassemble(0xf802f000, 0x8001);
    assert_eq!(op(&instr), "bl");
    assert_eq!(instr.length, 4);
    assert_eq!(instr.operands, vec![Operand::Imm(0x8009)]);
}

#[test]
fn undefined_word_is_invalid() {
    // Media instructions are not decoded
    let instr = arm::disassemble(0xe6000010, 0);
    assert!(!instr.is_valid());
}

#[test]
fn display_strips_condition_dots() {
    let instr = arm::disassemble(0x0a000002, 0x8000);
    assert_eq!(instr.to_string(), "beq     0x8010");
}

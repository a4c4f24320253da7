use burin_asm::ppc::{self, Operand};
use rstest::rstest;

fn op(instr: &ppc::Instruction) -> &str {
    instr.operation.as_deref().unwrap_or("??")
}

#[test]
fn unconditional_branches() {
    let instr = ppc::disassemble(0x48000010, 0x1000);
    assert_eq!(op(&instr), "b");
    assert_eq!(instr.operands, vec![Operand::Imm(0x1010)]);

    let instr = ppc::disassemble(0x48000011, 0x1000);
    assert_eq!(op(&instr), "bl");
    assert_eq!(instr.operands, vec![Operand::Imm(0x1010)]);

    // Absolute form ignores the fetch address
    let instr = ppc::disassemble(0x48000012, 0x1000);
    assert_eq!(op(&instr), "ba");
    assert_eq!(instr.operands, vec![Operand::Imm(0x10)]);
}

#[test]
fn branch_to_link_register() {
    // bclr with BO=20: branch always
    let instr = ppc::disassemble(0x4e800020, 0);
    assert_eq!(op(&instr), "blr");
    assert!(instr.operands.is_empty());

    let instr = ppc::disassemble(0x4e800420, 0);
    assert_eq!(op(&instr), "bctr");
}

#[test]
fn conditional_branch_extended_mnemonics() {
    // bc BO=12 BI=10: branch if cr2 eq
    let instr = ppc::disassemble(0x418a0008, 0x2000);
    assert_eq!(op(&instr), "beq");
    assert_eq!(
        instr.operands,
        vec![Operand::Reg("cr2"), Operand::Imm(0x2008)]
    );

    // bdnz (BO=16) keeps the count prefix and drops the cr operand
    let instr = ppc::disassemble(0x42000008, 0x2000);
    assert_eq!(op(&instr), "bdnz");
    assert_eq!(instr.operands, vec![Operand::Imm(0x2008)]);
}

#[rstest]
#[case(0x60000000, "nop")]
#[case(0x7fe00008, "trap")]
fn idioms_collapse(#[case] word: u32, #[case] name: &str) {
    let instr = ppc::disassemble(word, 0);
    assert_eq!(op(&instr), name);
    assert!(instr.operands.is_empty());
}

#[test]
fn load_immediate() {
    let instr = ppc::disassemble(0x38600001, 0);
    assert_eq!(op(&instr), "li");
    assert_eq!(instr.operands, vec![Operand::Reg("r3"), Operand::Imm(1)]);

    // With a base register it stays addi
    let instr = ppc::disassemble(0x38610001, 0);
    assert_eq!(op(&instr), "addi");
    assert_eq!(
        instr.operands,
        vec![Operand::Reg("r3"), Operand::Reg("r1"), Operand::Imm(1)]
    );
}

#[test]
fn register_moves() {
    // or r3, r4, r4
    let instr = ppc::disassemble(0x7c832378, 0);
    assert_eq!(op(&instr), "mr");
    assert_eq!(instr.operands, vec![Operand::Reg("r3"), Operand::Reg("r4")]);

    let instr = ppc::disassemble(0x7c0802a6, 0);
    assert_eq!(op(&instr), "mflr");
    assert_eq!(instr.operands, vec![Operand::Reg("r0")]);

    let instr = ppc::disassemble(0x7c0803a6, 0);
    assert_eq!(op(&instr), "mtlr");
    assert_eq!(instr.operands, vec![Operand::Reg("r0")]);
}

#[test]
fn trap_conditions() {
    // tw 4, r0, r0
    let instr = ppc::disassemble(0x7c800008, 0);
    assert_eq!(op(&instr), "tweq");
    assert_eq!(instr.operands, vec![Operand::Reg("r0"), Operand::Reg("r0")]);
}

#[test]
fn record_and_overflow_bits() {
    // add r1, r2, r3
    let instr = ppc::disassemble(0x7c221a14, 0);
    assert_eq!(op(&instr), "add");
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg("r1"),
            Operand::Reg("r2"),
            Operand::Reg("r3")
        ]
    );

    let instr = ppc::disassemble(0x7c221a15, 0);
    assert_eq!(op(&instr), "add.");
}

#[test]
fn rotate_family() {
    // rlwinm with mb=0, me=31-sh collapses to slwi
    let instr = ppc::disassemble(0x5483103a, 0);
    assert_eq!(op(&instr), "slwi");
    assert_eq!(
        instr.operands,
        vec![Operand::Reg("r4"), Operand::Reg("r3"), Operand::Imm(2)]
    );
}

#[test]
fn loads_and_stores() {
    let instr = ppc::disassemble(0x80610010, 0);
    assert_eq!(op(&instr), "lwz");
    assert_eq!(
        instr.operands,
        vec![Operand::Reg("r3"), Operand::Reg("r1"), Operand::Imm(0x10)]
    );

    // std / stdu are DS-form
    let instr = ppc::disassemble(0xf8210010, 0);
    assert_eq!(op(&instr), "std");
    let instr = ppc::disassemble(0xf8210011, 0);
    assert_eq!(op(&instr), "stdu");
}

#[test]
fn floating_point_group() {
    let instr = ppc::disassemble(0xfc22182a, 0);
    assert_eq!(op(&instr), "fadd");
    assert_eq!(
        instr.operands,
        vec![
            Operand::Reg("f1"),
            Operand::Reg("f2"),
            Operand::Reg("f3")
        ]
    );
}

#[test]
fn condition_register_idioms() {
    // crxor 6, 6, 6
    let instr = ppc::disassemble(0x4cc63182, 0);
    assert_eq!(op(&instr), "crclr");
    assert_eq!(instr.operands, vec![Operand::Imm(6)]);
}

#[test]
fn undefined_word_is_invalid() {
    let instr = ppc::disassemble(0x00000000, 0);
    assert!(!instr.is_valid());
}

#[test]
fn display_pads_mnemonic() {
    let instr = ppc::disassemble(0x38600001, 0);
    assert_eq!(instr.to_string(), "li      r3, 0x1");
}

//! PowerPC disassembler.
//!
//! Takes one 32-bit big-endian instruction word plus its address. Primary
//! dispatch is on bits 31..26; opcodes 19, 30, 31, 58, 59 and 63 fan out on
//! extended-opcode subfields of the same word. Extended mnemonics are
//! produced for conditional branches and for the usual idioms (`mr`, `not`,
//! `nop`, `li`, the `rlwinm` rotate family, `crset`/`crclr`/`crmove`, trap
//! conditions, and the `xer`/`lr`/`ctr` special registers).

use core::fmt;
use std::sync::OnceLock;

static REGISTERS: [&str; 32] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "r24", "r25", "r26",
    "r27", "r28", "r29", "r30", "r31",
];

static FLOAT_REGISTERS: [&str; 32] = [
    "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13",
    "f14", "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24", "f25", "f26",
    "f27", "f28", "f29", "f30", "f31",
];

static CR_FIELDS: [&str; 8] = ["cr0", "cr1", "cr2", "cr3", "cr4", "cr5", "cr6", "cr7"];

/// A PowerPC operand: a register name or an immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Register (general purpose, float or condition field).
    Reg(&'static str),
    /// Immediate value or resolved branch target.
    Imm(i64),
}

/// A decoded PowerPC instruction. Every instruction is four bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Mnemonic (including record/link/overflow suffixes), or `None`.
    pub operation: Option<String>,
    /// Operands in display order.
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Whether the word decoded to a recognized instruction.
    pub fn is_valid(&self) -> bool {
        self.operation.is_some()
    }
}

fn all_conds(pattern: &str) -> Vec<String> {
    let prefixes = ["", "dnz", "dz"];
    let conds = ["lt", "gt", "eq", "so", "ge", "le", "ne", "ns"];
    let suffixes = ["", "+", "-"];
    let mut result: Vec<String> = ["dnz", "dz"]
        .iter()
        .map(|c| pattern.replace('$', c))
        .collect();
    for prefix in prefixes {
        for cond in conds {
            for suffix in suffixes {
                let mut name = pattern.replace('$', &format!("{prefix}{cond}"));
                name.push_str(suffix);
                result.push(name);
            }
        }
    }
    result
}

/// All conditional-branch mnemonics this decoder can emit.
pub fn conditional_branches() -> &'static [String] {
    static SET: OnceLock<Vec<String>> = OnceLock::new();
    SET.get_or_init(|| {
        let mut v = all_conds("b$");
        v.extend(all_conds("b$a"));
        v
    })
}

/// All call mnemonics (branch and link forms).
pub fn call_instructions() -> &'static [String] {
    static SET: OnceLock<Vec<String>> = OnceLock::new();
    SET.get_or_init(|| {
        let mut v = vec!["bl".to_string(), "bla".to_string(), "bctrl".to_string()];
        v.extend(all_conds("b$l"));
        v.extend(all_conds("b$la"));
        v.extend(all_conds("b$ctrl"));
        v
    })
}

/// All branch mnemonics, conditional or not.
pub fn branch_instructions() -> &'static [String] {
    static SET: OnceLock<Vec<String>> = OnceLock::new();
    SET.get_or_init(|| {
        let mut v = conditional_branches().to_vec();
        v.extend(["b", "ba", "blr", "bctr"].iter().map(|s| s.to_string()));
        v.extend(all_conds("b$lr"));
        v.extend(all_conds("b$ctr"));
        v
    })
}

fn sign_extend_16(val: u32) -> i64 {
    (val as u16 as i16) as i64
}

fn sign_extend_24(val: u32) -> i64 {
    if val & 0x800000 != 0 {
        (val as i64) - 0x1000000
    } else {
        val as i64
    }
}

/// Operand field extractors, named as in the architecture manual.
#[derive(Debug, Clone, Copy)]
enum Field {
    Si,
    Ui,
    Ds,
    Sh,
    ShD,
    Nb,
    Mb,
    MbD,
    Me,
    MeD,
    Ra,
    Ra0,
    Rb,
    Rs,
    Rt,
    FrA,
    FrB,
    FrC,
    FrS,
    FrT,
    Sr,
    L,
    L2,
    Bf,
    Bf2,
    Bfa2,
    Bi,
    Bo,
    Bt,
    Ba,
    Bb,
    To,
    Lev,
    Spr,
    Fxm,
    Flm,
    U,
}

impl Field {
    fn decode(self, opcode: u32) -> Operand {
        use Operand::{Imm, Reg};
        match self {
            Field::Si => Imm(sign_extend_16(opcode & 0xffff)),
            Field::Ui => Imm((opcode & 0xffff) as i64),
            Field::Ds => Imm((opcode & 0xfffc) as i64),
            Field::Sh => Imm(((opcode >> 11) & 31) as i64),
            Field::ShD => Imm((((opcode >> 11) & 31) | ((opcode & 2) << 4)) as i64),
            Field::Nb => Imm(((opcode >> 11) & 31) as i64),
            Field::Mb => Imm(((opcode >> 6) & 31) as i64),
            Field::MbD | Field::MeD => Imm((((opcode >> 6) & 31) | (opcode & 0x20)) as i64),
            Field::Me => Imm(((opcode >> 1) & 31) as i64),
            Field::Ra => Reg(REGISTERS[((opcode >> 16) & 31) as usize]),
            Field::Ra0 => {
                let index = ((opcode >> 16) & 31) as usize;
                if index == 0 {
                    Imm(0)
                } else {
                    Reg(REGISTERS[index])
                }
            }
            Field::Rb => Reg(REGISTERS[((opcode >> 11) & 31) as usize]),
            Field::Rs | Field::Rt => Reg(REGISTERS[((opcode >> 21) & 31) as usize]),
            Field::FrA => Reg(FLOAT_REGISTERS[((opcode >> 16) & 31) as usize]),
            Field::FrB => Reg(FLOAT_REGISTERS[((opcode >> 11) & 31) as usize]),
            Field::FrC => Reg(FLOAT_REGISTERS[((opcode >> 6) & 31) as usize]),
            Field::FrS | Field::FrT => Reg(FLOAT_REGISTERS[((opcode >> 21) & 31) as usize]),
            Field::Sr => Imm(((opcode >> 16) & 15) as i64),
            Field::L => Imm(((opcode >> 21) & 1) as i64),
            Field::L2 => Imm(((opcode >> 16) & 1) as i64),
            Field::Bf => Imm(((opcode >> 21) & 31) as i64),
            Field::Bf2 => Reg(CR_FIELDS[((opcode >> 23) & 7) as usize]),
            Field::Bfa2 => Reg(CR_FIELDS[((opcode >> 18) & 7) as usize]),
            Field::Bi => Imm(((opcode >> 16) & 31) as i64),
            Field::Bo => Imm(((opcode >> 21) & 31) as i64),
            Field::Bt => Imm(((opcode >> 21) & 31) as i64),
            Field::Ba => Imm(((opcode >> 16) & 31) as i64),
            Field::Bb => Imm(((opcode >> 11) & 31) as i64),
            Field::To => Imm(((opcode >> 21) & 31) as i64),
            Field::Lev => Imm(((opcode >> 5) & 0x7f) as i64),
            Field::Spr => Imm((((opcode >> 16) & 0x1f) | ((opcode >> 6) & 0x3e0)) as i64),
            Field::Fxm => Imm(((opcode >> 12) & 0xff) as i64),
            Field::Flm => Imm(((opcode >> 17) & 0xff) as i64),
            Field::U => Imm(((opcode >> 12) & 0xf) as i64),
        }
    }
}

type Fixup = fn(&mut Instruction, u32, u64);

struct GroupEntry {
    operation: &'static str,
    fields: &'static [Field],
    fixup: Option<Fixup>,
}

const fn ge(operation: &'static str, fields: &'static [Field], fixup: Option<Fixup>) -> GroupEntry {
    GroupEntry {
        operation,
        fields,
        fixup,
    }
}

fn imm_at(instr: &Instruction, index: usize) -> Option<i64> {
    match instr.operands.get(index) {
        Some(Operand::Imm(v)) => Some(*v),
        _ => None,
    }
}

fn cond_bit(instr: &mut Instruction, opcode: u32, _addr: u64) {
    if opcode & 1 != 0 {
        if let Some(op) = instr.operation.as_mut() {
            op.push('.');
        }
    }
}

fn link_bit(instr: &mut Instruction, opcode: u32, _addr: u64) {
    if opcode & 1 != 0 {
        if let Some(op) = instr.operation.as_mut() {
            op.push('l');
        }
    }
}

fn overflow_bit(instr: &mut Instruction, opcode: u32, _addr: u64) {
    if opcode & 0x400 != 0 {
        if let Some(op) = instr.operation.as_mut() {
            op.push('o');
        }
    }
}

fn double_bit(instr: &mut Instruction, opcode: u32, _addr: u64) {
    if let Some(op) = instr.operation.take() {
        let word = if opcode & 0x200000 != 0 { "d" } else { "w" };
        instr.operation = Some(op.replace('$', word));
    }
}

fn cond_overflow_bits(instr: &mut Instruction, opcode: u32, addr: u64) {
    overflow_bit(instr, opcode, addr);
    cond_bit(instr, opcode, addr);
}

// Extended mnemonics for conditional branches: decode BO/BI into the
// condition name, hint suffix and optional crN operand.
fn cond_branch(instr: &mut Instruction) {
    let bo = imm_at(instr, 0).unwrap_or(0);
    let bi = imm_at(instr, 1).unwrap_or(0);
    let mut cond = String::new();
    let mut label = None;
    let mut suffix = "";

    if bo & 6 == 0 {
        // Decrement CTR, branch if CTR not zero
        cond.push_str("dnz");
        if bo & 0x8 != 0 {
            suffix = if bo & 1 != 0 { "+" } else { "-" };
        }
    } else if bo & 6 == 2 {
        // Decrement CTR, branch if CTR is zero
        cond.push_str("dz");
        if bo & 0x8 != 0 {
            suffix = if bo & 1 != 0 { "+" } else { "-" };
        }
    }

    if bo & 0x10 == 0 {
        // Condition bits used
        if bi & 8 != 0 {
            cond.push_str(["lt", "gt", "eq", "so"][(bi & 3) as usize]);
        } else {
            cond.push_str(["ge", "le", "ne", "ns"][(bi & 3) as usize]);
        }
        if bi & 0x1c != 0 {
            label = Some(CR_FIELDS[(bi >> 2) as usize]);
        }
    }

    if let Some(op) = instr.operation.take() {
        let mut name = op.replace('$', &cond);
        name.push_str(suffix);
        instr.operation = Some(name);
    }
    let rest: Vec<Operand> = instr.operands.split_off(2);
    instr.operands = match label {
        Some(cr) => {
            let mut v = vec![Operand::Reg(cr)];
            v.extend(rest);
            v
        }
        None => rest,
    };
}

fn link_bit_and_cond_branch(instr: &mut Instruction, opcode: u32, addr: u64) {
    link_bit(instr, opcode, addr);
    cond_branch(instr);
}

fn crset(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if instr.operands[0] == instr.operands[1] && instr.operands[1] == instr.operands[2] {
        // creqv bx, bx, bx => crset bx
        instr.operation = Some("crset".to_string());
        instr.operands.truncate(1);
    }
}

fn crclr(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if instr.operands[0] == instr.operands[1] && instr.operands[1] == instr.operands[2] {
        // crxor bx, bx, bx => crclr bx
        instr.operation = Some("crclr".to_string());
        instr.operands.truncate(1);
    }
}

fn crmove(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if instr.operands[1] == instr.operands[2] {
        // cror bx, by, by => crmove bx, by
        instr.operation = Some("crmove".to_string());
        instr.operands.truncate(2);
    }
}

fn trap(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    let to = match imm_at(instr, 0) {
        Some(v) => v,
        None => return,
    };
    if to == 31 {
        // Unconditional trap
        instr.operation = Some("trap".to_string());
        instr.operands.clear();
        return;
    }

    let name = match to {
        1 => "lgt",
        2 => "llt",
        4 => "eq",
        5 => "lge",
        6 => "lle",
        8 => "gt",
        12 => "ge",
        16 => "lt",
        20 => "le",
        24 => "ne",
        _ => return,
    };

    if let Some(op) = instr.operation.take() {
        // tw -> tweq, tdi -> tdeqi and so on
        let mut new = String::new();
        new.push_str(&op[0..2]);
        new.push_str(name);
        new.push_str(&op[2..]);
        instr.operation = Some(new);
    }
    instr.operands.remove(0);
}

fn spr_name(spr: i64) -> Option<&'static str> {
    match spr {
        1 => Some("xer"),
        8 => Some("lr"),
        9 => Some("ctr"),
        _ => None,
    }
}

fn mfspr(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if let Some(name) = imm_at(instr, 1).and_then(spr_name) {
        instr.operation = Some(format!("mf{name}"));
        instr.operands.truncate(1);
    }
}

fn mtspr(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if let Some(name) = imm_at(instr, 0).and_then(spr_name) {
        instr.operation = Some(format!("mt{name}"));
        instr.operands.remove(0);
    }
}

fn nop(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if instr.operands[0] == Operand::Reg("r0")
        && instr.operands[1] == Operand::Reg("r0")
        && instr.operands[2] == Operand::Imm(0)
    {
        instr.operation = Some("nop".to_string());
        instr.operands.clear();
    }
}

fn li(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if instr.operands[1] == Operand::Imm(0) {
        instr.operation = Some("li".to_string());
        instr.operands = vec![instr.operands[0], instr.operands[2]];
    }
}

fn lis(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if instr.operands[1] == Operand::Imm(0) {
        instr.operation = Some("lis".to_string());
        instr.operands = vec![instr.operands[0], instr.operands[2]];
    }
}

fn mr(instr: &mut Instruction, opcode: u32, addr: u64) {
    if instr.operands[1] == instr.operands[2] {
        instr.operation = Some("mr".to_string());
        instr.operands.truncate(2);
    }
    cond_bit(instr, opcode, addr);
}

fn nor(instr: &mut Instruction, opcode: u32, addr: u64) {
    if instr.operands[1] == instr.operands[2] {
        instr.operation = Some("not".to_string());
        instr.operands.truncate(2);
    }
    cond_bit(instr, opcode, addr);
}

fn mtcr(instr: &mut Instruction, _opcode: u32, _addr: u64) {
    if instr.operands[0] == Operand::Imm(0xff) {
        instr.operation = Some("mtcr".to_string());
        instr.operands.remove(0);
    }
}

fn rlwinm(instr: &mut Instruction, opcode: u32, addr: u64) {
    let (sh, mb, me) = match (imm_at(instr, 2), imm_at(instr, 3), imm_at(instr, 4)) {
        (Some(sh), Some(mb), Some(me)) => (sh, mb, me),
        _ => return,
    };
    let (a, b) = (instr.operands[0], instr.operands[1]);
    if me == 31 {
        if mb == 0 {
            instr.operation = Some("rotlwi".to_string());
            instr.operands = vec![a, b, Operand::Imm(sh)];
        } else if sh == 32 - mb {
            instr.operation = Some("srwi".to_string());
            instr.operands = vec![a, b, Operand::Imm(mb)];
        } else if sh == 0 {
            instr.operation = Some("clrlwi".to_string());
            instr.operands = vec![a, b, Operand::Imm(mb)];
        } else if sh >= 32 - mb {
            instr.operation = Some("extrwi".to_string());
            instr.operands = vec![a, b, Operand::Imm(32 - mb), Operand::Imm((32 - mb) - sh)];
        }
    } else if mb == 0 && me == 31 - sh {
        instr.operation = Some("slwi".to_string());
        instr.operands = vec![a, b, Operand::Imm(sh)];
    } else if sh == 0 && mb == 0 {
        instr.operation = Some("clrrwi".to_string());
        instr.operands = vec![a, b, Operand::Imm(31 - me)];
    } else if mb == 0 {
        instr.operation = Some("extlwi".to_string());
        instr.operands = vec![a, b, Operand::Imm(me + 1), Operand::Imm(sh)];
    }
    cond_bit(instr, opcode, addr);
}

fn rlwnm(instr: &mut Instruction, opcode: u32, addr: u64) {
    if imm_at(instr, 3) == Some(0) && imm_at(instr, 4) == Some(31) {
        instr.operation = Some("rotlw".to_string());
        instr.operands.truncate(3);
    }
    cond_bit(instr, opcode, addr);
}

fn apply(instr: &mut Instruction, entry: &GroupEntry, opcode: u32, addr: u64) {
    instr.operation = Some(entry.operation.to_string());
    instr.operands = entry.fields.iter().map(|f| f.decode(opcode)).collect();
    if let Some(fixup) = entry.fixup {
        fixup(instr, opcode, addr);
    }
}

fn bc(instr: &mut Instruction, opcode: u32, addr: u64) {
    let target;
    if opcode & 2 != 0 {
        instr.operation = Some(if opcode & 1 != 0 { "b$la" } else { "b$a" }.to_string());
        target = sign_extend_16(opcode & 0xfffc);
    } else {
        instr.operation = Some(if opcode & 1 != 0 { "b$l" } else { "b$" }.to_string());
        target = sign_extend_16(opcode & 0xfffc).wrapping_add(addr as i64);
    }
    instr.operands = vec![Field::Bo.decode(opcode), Field::Bi.decode(opcode)];
    instr.operands.push(Operand::Imm(target));
    cond_branch(instr);
}

fn b(instr: &mut Instruction, opcode: u32, addr: u64) {
    let target;
    if opcode & 2 != 0 {
        instr.operation = Some(if opcode & 1 != 0 { "bla" } else { "ba" }.to_string());
        target = sign_extend_24(opcode & 0xfffffc);
    } else {
        instr.operation = Some(if opcode & 1 != 0 { "bl" } else { "b" }.to_string());
        target = sign_extend_24(opcode & 0xfffffc).wrapping_add(addr as i64);
    }
    instr.operands = vec![Operand::Imm(target)];
}

fn std(instr: &mut Instruction, opcode: u32, _addr: u64) {
    instr.operation = Some(if opcode & 1 != 0 { "stdu" } else { "std" }.to_string());
    instr.operands = vec![Field::Rs.decode(opcode), Field::Ra.decode(opcode)];
    instr.operands.push(Operand::Imm(sign_extend_16(opcode & 0xfffc)));
}

fn group19(ext: u32) -> Option<GroupEntry> {
    use Field::*;
    Some(match ext {
        0 => ge("mcrf", &[Bf2, Bfa2], None),
        16 => ge("b$lr", &[Bo, Bi], Some(link_bit_and_cond_branch)),
        18 => ge("rfid", &[], None),
        33 => ge("crnor", &[Bt, Ba, Bb], None),
        129 => ge("crandc", &[Bt, Ba, Bb], None),
        150 => ge("isync", &[], None),
        193 => ge("crxor", &[Bt, Ba, Bb], Some(crclr)),
        225 => ge("crnand", &[Bt, Ba, Bb], None),
        257 => ge("crand", &[Bt, Ba, Bb], None),
        274 => ge("hrfid", &[], None),
        289 => ge("creqv", &[Bt, Ba, Bb], Some(crset)),
        417 => ge("crorc", &[Bt, Ba, Bb], None),
        449 => ge("cror", &[Bt, Ba, Bb], Some(crmove)),
        528 => ge("b$ctr", &[Bo, Bi], Some(link_bit_and_cond_branch)),
        _ => return None,
    })
}

fn group30(ext: u32) -> Option<GroupEntry> {
    use Field::*;
    Some(match ext {
        0 | 1 => ge("rldicl", &[Ra, Rs, ShD, MbD], Some(cond_bit)),
        2 | 3 => ge("rldicr", &[Ra, Rs, ShD, MeD], Some(cond_bit)),
        4 | 5 => ge("rldic", &[Ra, Rs, ShD, MbD], Some(cond_bit)),
        6 | 7 => ge("rldimi", &[Ra, Rs, ShD, MbD], Some(cond_bit)),
        8 => ge("rldcl", &[Ra, Rs, Rb, MbD], Some(cond_bit)),
        9 => ge("rldcr", &[Ra, Rs, Rb, MeD], Some(cond_bit)),
        _ => return None,
    })
}

fn group31(ext: u32) -> Option<GroupEntry> {
    use Field::*;
    Some(match ext {
        0 => ge("cmp$", &[Bf2, Ra, Rb], Some(double_bit)),
        4 => ge("tw", &[To, Ra, Rb], Some(trap)),
        8 => ge("subfc", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        9 => ge("mulhdu", &[Rt, Ra, Rb], Some(cond_bit)),
        10 => ge("addc", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        11 => ge("mulhwu", &[Rt, Ra, Rb], Some(cond_bit)),
        19 => ge("mfcr", &[Rt], None),
        20 => ge("lwarx", &[Rt, Ra0, Rb], None),
        21 => ge("ldx", &[Rt, Ra0, Rb], None),
        23 => ge("lwzx", &[Rt, Ra0, Rb], None),
        24 => ge("slw", &[Ra, Rs, Rb], Some(cond_bit)),
        26 => ge("cntlzw", &[Ra, Rs], Some(cond_bit)),
        27 => ge("sld", &[Ra, Rs, Rb], Some(cond_bit)),
        28 => ge("and", &[Ra, Rs, Rb], Some(cond_bit)),
        32 => ge("cmp$l", &[Bf2, Ra, Rb], Some(double_bit)),
        40 => ge("subf", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        53 => ge("ldux", &[Rt, Ra, Rb], None),
        54 => ge("dcbst", &[Ra0, Rb], None),
        55 => ge("lwzux", &[Rt, Ra, Rb], None),
        58 => ge("cntlzd", &[Ra, Rs], Some(cond_bit)),
        60 => ge("andc", &[Ra, Rs, Rb], Some(cond_bit)),
        68 => ge("td", &[To, Ra, Rb], Some(trap)),
        73 => ge("mulhd", &[Rt, Ra, Rb], Some(cond_bit)),
        75 => ge("mulhw", &[Rt, Ra, Rb], Some(cond_bit)),
        83 => ge("mfmsr", &[Rt], None),
        84 => ge("ldarx", &[Rt, Ra0, Rb], None),
        86 => ge("dcbf", &[Ra0, Rb], None),
        87 => ge("lbzx", &[Rt, Ra0, Rb], None),
        104 => ge("neg", &[Rt, Ra], Some(cond_overflow_bits)),
        119 => ge("lbzux", &[Rt, Ra, Rb], None),
        122 => ge("popcntb", &[Ra, Rs], Some(cond_bit)),
        124 => ge("nor", &[Ra, Rs, Rb], Some(nor)),
        136 => ge("subfe", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        138 => ge("adde", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        144 => ge("mtcrf", &[Fxm, Rs], Some(mtcr)),
        146 => ge("mtmsr", &[Rs, L2], None),
        149 => ge("stdx", &[Rs, Ra0, Rb], None),
        150 => ge("stwcx.", &[Rs, Ra0, Rb], None),
        151 => ge("stwx", &[Rs, Ra0, Rb], None),
        178 => ge("mtmsrd", &[Rs, L2], None),
        181 => ge("stdux", &[Rs, Ra, Rb], None),
        183 => ge("stwux", &[Rs, Ra, Rb], None),
        200 => ge("subfze", &[Rt, Ra], Some(cond_overflow_bits)),
        202 => ge("addze", &[Rt, Ra], Some(cond_overflow_bits)),
        210 => ge("mtsr", &[Sr, Rs], None),
        214 => ge("stdcx.", &[Rs, Ra0, Rb], None),
        215 => ge("stbx", &[Rs, Ra0, Rb], None),
        232 => ge("subfme", &[Rt, Ra], Some(cond_overflow_bits)),
        233 => ge("mulld", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        234 => ge("addme", &[Rt, Ra], Some(cond_overflow_bits)),
        235 => ge("mullw", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        242 => ge("mtsrin", &[Rs, Rb], None),
        246 => ge("dcbtst", &[Ra0, Rb], None),
        247 => ge("stbux", &[Rs, Ra, Rb], None),
        266 => ge("add", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        274 => ge("tlbiel", &[Rb, L], None),
        278 => ge("dcbt", &[Ra0, Rb], None),
        279 => ge("lhzx", &[Rt, Ra0, Rb], None),
        284 => ge("eqv", &[Ra, Rs, Rb], Some(cond_bit)),
        306 => ge("tlbie", &[Rb, L], None),
        310 => ge("eciwx", &[Rt, Ra0, Rb], None),
        311 => ge("lhzux", &[Rt, Ra, Rb], None),
        316 => ge("xor", &[Ra, Rs, Rb], Some(cond_bit)),
        339 => ge("mfspr", &[Rt, Spr], Some(mfspr)),
        341 => ge("lwax", &[Rt, Ra0, Rb], None),
        343 => ge("lhax", &[Rt, Ra0, Rb], None),
        370 => ge("tlbia", &[], None),
        371 => ge("mftb", &[Rt, Spr], None),
        373 => ge("lwaux", &[Rt, Ra, Rb], None),
        375 => ge("lhaux", &[Rt, Ra, Rb], None),
        402 => ge("slbmte", &[Rs, Rb], None),
        407 => ge("sthx", &[Rs, Ra0, Rb], None),
        412 => ge("orc", &[Ra, Rs, Rb], Some(cond_bit)),
        413 => ge("sradi", &[Ra, Rs, ShD], Some(cond_bit)),
        434 => ge("slbie", &[Rb], None),
        438 => ge("ecowx", &[Rs, Ra0, Rb], None),
        439 => ge("sthux", &[Rs, Ra, Rb], None),
        444 => ge("or", &[Ra, Rs, Rb], Some(mr)),
        457 => ge("divdu", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        459 => ge("divwu", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        467 => ge("mtspr", &[Spr, Rs], Some(mtspr)),
        476 => ge("nand", &[Ra, Rs, Rb], Some(cond_bit)),
        489 => ge("divd", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        491 => ge("divw", &[Rt, Ra, Rb], Some(cond_overflow_bits)),
        498 => ge("slbia", &[], None),
        512 => ge("mcrxr", &[Bf2], None),
        533 => ge("lswx", &[Rt, Ra0, Rb], None),
        534 => ge("lwbrx", &[Rt, Ra0, Rb], None),
        535 => ge("lfsx", &[FrT, Ra0, Rb], None),
        536 => ge("srw", &[Ra, Rs, Rb], Some(cond_bit)),
        539 => ge("srd", &[Ra, Rs, Rb], Some(cond_bit)),
        566 => ge("tlbsync", &[], None),
        567 => ge("lfsux", &[FrT, Ra, Rb], None),
        595 => ge("mfsr", &[Rt, Sr], None),
        597 => ge("lswi", &[Rt, Ra0, Nb], None),
        598 => ge("sync", &[], None),
        599 => ge("lfdx", &[FrT, Ra0, Rb], None),
        631 => ge("lfdux", &[FrT, Ra, Rb], None),
        659 => ge("mfsrin", &[Rt, Rb], None),
        661 => ge("stswx", &[Rs, Ra0, Rb], None),
        662 => ge("stwbrx", &[Rs, Ra0, Rb], None),
        663 => ge("stfsx", &[FrS, Ra0, Rb], None),
        695 => ge("stfsux", &[FrS, Ra, Rb], None),
        725 => ge("stswi", &[Rs, Ra0, Nb], None),
        727 => ge("stfdx", &[FrS, Ra0, Rb], None),
        759 => ge("stfdux", &[FrS, Ra, Rb], None),
        790 => ge("lhbrx", &[Rt, Ra0, Rb], None),
        792 => ge("sraw", &[Ra, Rs, Rb], Some(cond_bit)),
        794 => ge("srad", &[Ra, Rs, Rb], Some(cond_bit)),
        824 => ge("srawi", &[Ra, Rs, Sh], Some(cond_bit)),
        851 => ge("slbmfev", &[Rt, Rb], None),
        854 => ge("eieio", &[], None),
        915 => ge("slbmfee", &[Rt, Rb], None),
        918 => ge("sthbrx", &[Rs, Ra0, Rb], None),
        922 => ge("extsh", &[Ra, Rs], Some(cond_bit)),
        954 => ge("extsb", &[Ra, Rs], Some(cond_bit)),
        982 => ge("icbi", &[Ra0, Rb], None),
        983 => ge("stfiwx", &[FrS, Ra0, Rb], None),
        986 => ge("extsw", &[Ra, Rs], Some(cond_bit)),
        1014 => ge("dcbz", &[Ra0, Rb], None),
        _ => return None,
    })
}

fn group58(ext: u32) -> Option<GroupEntry> {
    use Field::*;
    Some(match ext {
        0 => ge("ld", &[Rt, Ra0, Ds], None),
        1 => ge("ldu", &[Rt, Ra, Ds], None),
        2 => ge("lwa", &[Rt, Ra0, Ds], None),
        _ => return None,
    })
}

fn group59(ext: u32) -> Option<GroupEntry> {
    use Field::*;
    Some(match ext {
        18 => ge("fdivs", &[FrT, FrA, FrB], Some(cond_bit)),
        20 => ge("fsubs", &[FrT, FrA, FrB], Some(cond_bit)),
        21 => ge("fadds", &[FrT, FrA, FrB], Some(cond_bit)),
        22 => ge("fsqrts", &[FrT, FrB], Some(cond_bit)),
        24 => ge("fres", &[FrT, FrB], Some(cond_bit)),
        25 => ge("fmuls", &[FrT, FrA, FrC], Some(cond_bit)),
        26 => ge("frsqrtes", &[FrT, FrB], Some(cond_bit)),
        28 => ge("fmsubs", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
        29 => ge("fmadds", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
        30 => ge("fnmsubs", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
        31 => ge("fnmadds", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
        _ => return None,
    })
}

fn group63(ext: u32) -> Option<GroupEntry> {
    use Field::*;
    Some(match ext {
        0 => ge("fcmpu", &[Bf2, FrA, FrB], None),
        12 => ge("frsp", &[FrT, FrB], Some(cond_bit)),
        14 => ge("fctiw", &[FrT, FrB], Some(cond_bit)),
        15 => ge("fctiwz", &[FrT, FrB], Some(cond_bit)),
        32 => ge("fcmpo", &[Bf2, FrA, FrB], None),
        38 => ge("mtfsb1", &[Bf], Some(cond_bit)),
        40 => ge("fneg", &[FrT, FrB], Some(cond_bit)),
        64 => ge("mcrfs", &[Bf2, Bfa2], None),
        70 => ge("mtfsb0", &[Bf], Some(cond_bit)),
        72 => ge("fmr", &[FrT, FrB], Some(cond_bit)),
        134 => ge("mtfsfi", &[Bf2, U], Some(cond_bit)),
        136 => ge("fnabs", &[FrT, FrB], Some(cond_bit)),
        264 => ge("fabs", &[FrT, FrB], Some(cond_bit)),
        583 => ge("mffs", &[FrT], Some(cond_bit)),
        711 => ge("mtfsf", &[Flm, FrB], Some(cond_bit)),
        814 => ge("fctid", &[FrT, FrB], Some(cond_bit)),
        815 => ge("fctidz", &[FrT, FrB], Some(cond_bit)),
        846 => ge("fcfid", &[FrT, FrB], Some(cond_bit)),
        // The arithmetic family repeats every 32 extended opcodes.
        _ => match ext & 31 {
            18 => ge("fdiv", &[FrT, FrA, FrB], Some(cond_bit)),
            20 => ge("fsub", &[FrT, FrA, FrB], Some(cond_bit)),
            21 => ge("fadd", &[FrT, FrA, FrB], Some(cond_bit)),
            22 => ge("fsqrt", &[FrT, FrB], Some(cond_bit)),
            23 => ge("fsel", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
            24 => ge("fre", &[FrT, FrB], Some(cond_bit)),
            25 => ge("fmul", &[FrT, FrA, FrC], Some(cond_bit)),
            26 => ge("fsqrte", &[FrT, FrB], Some(cond_bit)),
            28 => ge("fmsub", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
            29 => ge("fmadd", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
            30 => ge("fnmsub", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
            31 => ge("fnmadd", &[FrT, FrA, FrC, FrB], Some(cond_bit)),
            _ => return None,
        },
    })
}

fn primary(opcode: u32) -> Option<GroupEntry> {
    use Field::*;
    Some(match (opcode >> 26) & 63 {
        2 => ge("tdi", &[To, Ra, Si], Some(trap)),
        3 => ge("twi", &[To, Ra, Si], Some(trap)),
        7 => ge("mulli", &[Rt, Ra, Si], None),
        8 => ge("subfic", &[Rt, Ra, Si], None),
        10 => ge("cmpl$i", &[Bf2, Ra, Ui], Some(double_bit)),
        11 => ge("cmp$i", &[Bf2, Ra, Si], Some(double_bit)),
        12 => ge("addic", &[Rt, Ra, Si], None),
        13 => ge("addic.", &[Rt, Ra, Si], None),
        14 => ge("addi", &[Rt, Ra0, Si], Some(li)),
        15 => ge("addis", &[Rt, Ra0, Si], Some(lis)),
        17 => ge("sc", &[Lev], None),
        20 => ge("rlwimi", &[Rs, Ra, Sh, Mb, Me], Some(cond_bit)),
        21 => ge("rlwinm", &[Rs, Ra, Sh, Mb, Me], Some(rlwinm)),
        23 => ge("rlwnm", &[Rs, Ra, Rb, Mb, Me], Some(rlwnm)),
        24 => ge("ori", &[Rs, Ra, Ui], Some(nop)),
        25 => ge("oris", &[Rs, Ra, Ui], None),
        26 => ge("xori", &[Rs, Ra, Ui], None),
        27 => ge("xoris", &[Rs, Ra, Ui], None),
        28 => ge("andi", &[Rs, Ra, Ui], None),
        29 => ge("andis", &[Rs, Ra, Ui], None),
        32 => ge("lwz", &[Rt, Ra0, Si], None),
        33 => ge("lwzu", &[Rt, Ra, Si], None),
        34 => ge("lbz", &[Rt, Ra0, Si], None),
        35 => ge("lbzu", &[Rt, Ra, Si], None),
        36 => ge("stw", &[Rs, Ra0, Si], None),
        37 => ge("stwu", &[Rs, Ra, Si], None),
        38 => ge("stb", &[Rs, Ra0, Si], None),
        39 => ge("stbu", &[Rs, Ra, Si], None),
        40 => ge("lhz", &[Rt, Ra0, Si], None),
        41 => ge("lhzu", &[Rt, Ra, Si], None),
        42 => ge("lha", &[Rt, Ra0, Si], None),
        43 => ge("lhau", &[Rt, Ra, Si], None),
        44 => ge("sth", &[Rs, Ra0, Si], None),
        45 => ge("sthu", &[Rs, Ra, Si], None),
        46 => ge("lmw", &[Rt, Ra0, Si], None),
        47 => ge("stmw", &[Rs, Ra0, Si], None),
        48 => ge("lfs", &[FrT, Ra0, Si], None),
        49 => ge("lfsu", &[FrT, Ra, Si], None),
        50 => ge("lfd", &[FrT, Ra0, Si], None),
        51 => ge("lfdu", &[FrT, Ra, Si], None),
        52 => ge("stfs", &[FrS, Ra0, Si], None),
        53 => ge("stfsu", &[FrS, Ra, Si], None),
        54 => ge("stfd", &[FrS, Ra0, Si], None),
        55 => ge("stfdu", &[FrS, Ra, Si], None),
        _ => return None,
    })
}

/// Decode one big-endian instruction word fetched from `addr`.
pub fn disassemble(opcode: u32, addr: u64) -> Instruction {
    let mut instr = Instruction::default();
    match (opcode >> 26) & 63 {
        16 => bc(&mut instr, opcode, addr),
        18 => b(&mut instr, opcode, addr),
        19 => {
            if let Some(entry) = group19((opcode >> 1) & 1023) {
                apply(&mut instr, &entry, opcode, addr);
            }
        }
        30 => {
            if let Some(entry) = group30((opcode >> 1) & 15) {
                apply(&mut instr, &entry, opcode, addr);
            }
        }
        31 => {
            if let Some(entry) = group31((opcode >> 1) & 1023) {
                apply(&mut instr, &entry, opcode, addr);
            }
        }
        58 => {
            if let Some(entry) = group58(opcode & 3) {
                apply(&mut instr, &entry, opcode, addr);
            }
        }
        59 => {
            if let Some(entry) = group59((opcode >> 1) & 31) {
                apply(&mut instr, &entry, opcode, addr);
            }
        }
        62 => std(&mut instr, opcode, addr),
        63 => {
            if let Some(entry) = group63((opcode >> 1) & 1023) {
                apply(&mut instr, &entry, opcode, addr);
            }
        }
        _ => {
            if let Some(entry) = primary(opcode) {
                apply(&mut instr, &entry, opcode, addr);
            }
        }
    }
    instr
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(name) => write!(f, "{name}"),
            Operand::Imm(v) if *v < 0 => write!(f, "-0x{:x}", -v),
            Operand::Imm(v) => write!(f, "0x{v:x}"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operation = match &self.operation {
            Some(op) => op,
            None => return write!(f, "??"),
        };
        write!(f, "{operation:<7}")?;
        for (j, op) in self.operands.iter().enumerate() {
            if j != 0 {
                write!(f, ",")?;
            }
            write!(f, " {op}")?;
        }
        Ok(())
    }
}

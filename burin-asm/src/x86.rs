//! x86 instruction decoder for 16-, 32- and 64-bit modes.
//!
//! The decoder is table driven: a 256-entry primary opcode map, a two-byte
//! map behind `0f`, sparse three-byte maps behind `0f 38` / `0f 3a`, FPU
//! escape maps selected by ModR/M, and group / SSE tables keyed by the reg
//! field and the effective SSE prefix. Decoding consumes at most fifteen
//! bytes and always terminates; running out of bytes yields an instruction
//! with no operation and the attempted length.

use core::fmt;

mod tables;

use tables::{
    Entry, Op, SseOperand, FPU_REGS, GROUP_0F01_REG_OPERATIONS, GROUP_OPERATIONS, MAIN_OPCODE_MAP,
    MMX_GROUP_OPERATIONS, MMX_REGS, REG16, REG32, REG64, REG8, REG8_REX, RM16_COMPONENTS,
    SPARSE_3DNOW_OPCODES, SSE_TABLE, THREE_BYTE_0F38_MAP, THREE_BYTE_0F3A_MAP,
    TWO_BYTE_OPCODE_MAP,
};

bitflags::bitflags! {
    /// Prefix and status flags attached to a decoded instruction.
    pub struct InstrFlags: u32 {
        /// `lock` prefix present and accepted.
        const LOCK = 0x0000_0001;
        /// `rep` prefix on a string instruction.
        const REP = 0x0000_0002;
        /// `repne` prefix on a conditional string instruction.
        const REPNE = 0x0000_0004;
        /// `repe` prefix on a conditional string instruction.
        const REPE = 0x0000_0008;
        /// `66` operand-size override was present.
        const OPSIZE = 0x0000_0010;
        /// `67` address-size override was present.
        const ADDRSIZE = 0x0000_0020;
        /// The instruction forms a 64-bit address (moffs64 or RIP-relative).
        const ADDR64 = 0x0000_0040;
        /// The byte window ended before the instruction did.
        const INSUFFICIENT_LENGTH = 0x8000_0000;
    }
}

impl InstrFlags {
    /// True if any of the three repeat prefixes is set.
    pub fn has_any_rep(self) -> bool {
        self.intersects(InstrFlags::REP | InstrFlags::REPNE | InstrFlags::REPE)
    }
}

/// A decoded operand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Immediate value. `size` is the operand size in bytes the immediate
    /// was decoded at (which bounds how it renders).
    Imm {
        /// Immediate or resolved relative-branch target.
        value: i64,
        /// Operand size in bytes.
        size: u16,
    },
    /// Register operand.
    Reg {
        /// Register name.
        name: &'static str,
        /// Register size in bytes.
        size: u16,
    },
    /// Memory operand.
    Mem {
        /// Base and index register names.
        components: [Option<&'static str>; 2],
        /// Index scale factor (1, 2, 4 or 8).
        scale: u8,
        /// Displacement, or the absolute address once RIP-relative
        /// operands have been resolved.
        displacement: i64,
        /// Access size in bytes.
        size: u16,
        /// Effective segment.
        segment: Option<&'static str>,
        /// Set while the operand is RIP-relative (the displacement holds
        /// the resolved absolute address after decode).
        rip_relative: bool,
    },
}

/// A decoded x86 instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Mnemonic, or `None` when the bytes do not decode.
    pub operation: Option<&'static str>,
    /// Operands in encounter order.
    pub operands: Vec<Operand>,
    /// Prefix and status flags.
    #[cfg_attr(feature = "serde", serde(skip, default = "InstrFlags::empty"))]
    pub flags: InstrFlags,
    /// Explicit segment override prefix, if any.
    pub segment: Option<&'static str>,
    /// Encoded length in bytes.
    pub length: usize,
    /// Effective address size of the decode (2, 4 or 8).
    pub addr_size: u16,
}

impl Instruction {
    /// Whether the bytes decoded to a recognized instruction.
    pub fn is_valid(&self) -> bool {
        self.operation.is_some()
    }
}

// Internal decode-behaviour flags, one set per encoding table entry.
const DEC_REG_RM_SIZE_MASK: u16 = 0x0003;
const DEC_REG_RM_2X_SIZE: u16 = 0x0001;
const DEC_REG_RM_FAR_SIZE: u16 = 0x0002;
const DEC_REG_RM_NO_SIZE: u16 = 0x0003;
const DEC_LOCK: u16 = 0x0020;
const DEC_REP: u16 = 0x0040;
const DEC_REP_COND: u16 = 0x0080;
const DEC_BYTE: u16 = 0x0100;
const DEC_FLIP_OPERANDS: u16 = 0x0200;
const DEC_IMM_SX: u16 = 0x0400;
const DEC_INC_OPERATION_FOR_64: u16 = 0x0800;
const DEC_OPERATION_OP_SIZE: u16 = 0x1000;
const DEC_FORCE_16BIT: u16 = 0x2000;
const DEC_INVALID_IN_64BIT: u16 = 0x4000;
const DEC_DEFAULT_TO_64BIT: u16 = 0x8000;

type RegList = &'static [&'static str];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rep {
    None,
    RepNe,
    RepE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Empty,
    Imm,
    Mem,
    Reg(&'static str),
}

#[derive(Debug, Clone)]
struct OperandSlot {
    kind: SlotKind,
    components: [Option<&'static str>; 2],
    scale: u8,
    size: u16,
    immediate: i64,
    segment: Option<&'static str>,
    rip_relative: bool,
}

impl Default for OperandSlot {
    fn default() -> Self {
        OperandSlot {
            kind: SlotKind::Empty,
            components: [None, None],
            scale: 1,
            size: 0,
            immediate: 0,
            segment: None,
            rip_relative: false,
        }
    }
}

struct DecodeState {
    buf: [u8; 15],
    len: usize,
    pos: usize,
    orig_len: usize,
    addr: u64,
    consumed: usize,
    prev_opcode: u8,
    op: Op,
    ops: [OperandSlot; 3],
    result_flags: InstrFlags,
    seg_override: Option<&'static str>,
    dec_flags: u16,
    invalid: bool,
    insufficient: bool,
    op_prefix: bool,
    rep: Rep,
    using64: bool,
    rex: bool,
    rex_rm1: bool,
    rex_rm2: bool,
    rex_reg: bool,
    op_size: u16,
    addr_size: u16,
    final_op_size: u16,
}

impl DecodeState {
    fn new(opcode: &[u8], addr: u64, addr_size: u16, op_size: u16, using64: bool) -> Self {
        let mut buf = [0u8; 15];
        let len = opcode.len().min(15);
        buf[..len].copy_from_slice(&opcode[..len]);
        DecodeState {
            buf,
            len,
            pos: 0,
            orig_len: len,
            addr,
            consumed: 0,
            prev_opcode: 0,
            op: Op::None,
            ops: Default::default(),
            result_flags: InstrFlags::empty(),
            seg_override: None,
            dec_flags: 0,
            invalid: false,
            insufficient: false,
            op_prefix: false,
            rep: Rep::None,
            using64,
            rex: false,
            rex_rm1: false,
            rex_rm2: false,
            rex_reg: false,
            op_size,
            addr_size,
            final_op_size: op_size,
        }
    }

    // Flip-aware operand slot indices. `a` is the logical first operand,
    // `b` the logical second; FLIP_OPERANDS swaps where they land.
    fn a(&self) -> usize {
        if self.dec_flags & DEC_FLIP_OPERANDS != 0 {
            1
        } else {
            0
        }
    }

    fn b(&self) -> usize {
        1 - self.a()
    }
}

fn read8(st: &mut DecodeState) -> u8 {
    if st.pos >= st.len {
        // Past the end of the window; 0xcc from here on guarantees exit.
        st.invalid = true;
        st.insufficient = true;
        return 0xcc;
    }
    let val = st.buf[st.pos];
    st.pos += 1;
    st.prev_opcode = val;
    st.consumed += 1;
    val
}

fn peek8(st: &mut DecodeState) -> u8 {
    if st.pos >= st.len {
        st.invalid = true;
        st.insufficient = true;
        return 0xcc;
    }
    st.buf[st.pos]
}

fn read16(st: &mut DecodeState) -> u64 {
    let lo = read8(st) as u64;
    lo | ((read8(st) as u64) << 8)
}

fn read32(st: &mut DecodeState) -> u64 {
    let lo = read16(st);
    lo | (read16(st) << 16)
}

fn read64(st: &mut DecodeState) -> u64 {
    let lo = read32(st);
    lo | (read32(st) << 32)
}

fn read8_signed(st: &mut DecodeState) -> i64 {
    read8(st) as i8 as i64
}

fn read16_signed(st: &mut DecodeState) -> i64 {
    read16(st) as u16 as i16 as i64
}

fn read32_signed(st: &mut DecodeState) -> i64 {
    read32(st) as u32 as i32 as i64
}

fn read_final_op_size(st: &mut DecodeState) -> i64 {
    if st.dec_flags & DEC_IMM_SX != 0 {
        return read8_signed(st);
    }
    match st.final_op_size {
        1 => read8(st) as i64,
        2 => read16(st) as i64,
        4 => read32(st) as i64,
        _ => read32_signed(st),
    }
}

fn read_addr_size(st: &mut DecodeState) -> i64 {
    match st.addr_size {
        2 => read16(st) as i64,
        4 => read32(st) as i64,
        _ => read64(st) as i64,
    }
}

fn read_signed_final_op_size(st: &mut DecodeState) -> i64 {
    match st.final_op_size {
        1 => read8_signed(st),
        2 => read16_signed(st),
        _ => read32_signed(st),
    }
}

fn get_byte_reg_list(st: &DecodeState) -> RegList {
    if st.rex {
        &REG8_REX
    } else {
        &REG8
    }
}

fn regs_for_final_op_size(st: &DecodeState) -> RegList {
    match st.final_op_size {
        1 => get_byte_reg_list(st),
        2 => &REG16,
        8 => &REG64,
        _ => &REG32,
    }
}

fn regs_for_addr_size(st: &DecodeState) -> RegList {
    match st.addr_size {
        2 => &REG16,
        8 => &REG64,
        _ => &REG32,
    }
}

fn get_final_op_size(st: &DecodeState) -> u16 {
    if st.dec_flags & DEC_BYTE != 0 {
        1
    } else {
        st.op_size
    }
}

// Resolve an operation list keyed by operand size (16/32/64 classes).
fn resolve_sized_for_op_size(st: &mut DecodeState) {
    if let Op::Sized(list) = st.op {
        st.op = if st.final_op_size == 4 {
            Op::O(list[1])
        } else if st.final_op_size == 8 {
            if list.len() < 3 {
                st.final_op_size = 4;
                Op::O(list[1])
            } else {
                Op::O(list[2])
            }
        } else {
            Op::O(list[0])
        };
    }
}

fn resolve_sized_for_addr_size(st: &mut DecodeState) {
    if let Op::Sized(list) = st.op {
        st.op = match st.addr_size {
            4 => Op::O(list[1]),
            8 => Op::O(list[2]),
            _ => Op::O(list[0]),
        };
    }
}

fn get_final_segment(st: &DecodeState, seg: &'static str) -> &'static str {
    st.seg_override.unwrap_or(seg)
}

fn set_mem_operand(st: &mut DecodeState, idx: usize, rmdef: usize, immed: i64) {
    let (c0, c1, seg) = RM16_COMPONENTS[rmdef];
    let seg = get_final_segment(st, seg);
    let op = &mut st.ops[idx];
    op.kind = SlotKind::Mem;
    op.components = [c0, c1];
    op.immediate = immed;
    op.segment = Some(seg);
}

fn decode_rm(st: &mut DecodeState, idx: usize, reg_list: RegList, rm_size: u16) -> usize {
    let rm_byte = read8(st);
    let mod_field = rm_byte >> 6;
    let rm = (rm_byte & 7) as usize;
    let reg_field = ((rm_byte >> 3) & 7) as usize;

    st.ops[idx].size = rm_size;
    if st.addr_size == 2 {
        match mod_field {
            0 => {
                if rm == 6 {
                    let imm = read16(st) as i64;
                    set_mem_operand(st, idx, 8, imm);
                } else {
                    set_mem_operand(st, idx, rm, 0);
                }
            }
            1 => {
                let imm = read8_signed(st);
                set_mem_operand(st, idx, rm, imm);
            }
            2 => {
                let imm = read16_signed(st);
                set_mem_operand(st, idx, rm, imm);
            }
            _ => st.ops[idx].kind = SlotKind::Reg(reg_list[rm]),
        }
        if st.ops[idx].components[0].is_none() {
            st.ops[idx].immediate &= 0xffff;
        }
    } else {
        let addr_regs = regs_for_addr_size(st);
        let rm_reg1_offset = if st.rex_rm1 { 8 } else { 0 };
        let rm_reg2_offset = if st.rex_rm2 { 8 } else { 0 };
        let mut seg = None;
        st.ops[idx].kind = SlotKind::Mem;
        if mod_field != 3 && rm == 4 {
            // SIB byte present
            let sib_byte = read8(st) as usize;
            let base = sib_byte & 7;
            let index = (sib_byte >> 3) & 7;
            st.ops[idx].scale = 1 << (sib_byte >> 6);
            if mod_field != 0 || base != 5 {
                st.ops[idx].components[0] = Some(addr_regs[base + rm_reg1_offset]);
            }
            if index + rm_reg2_offset != 4 {
                st.ops[idx].components[1] = Some(addr_regs[index + rm_reg2_offset]);
            }
            match mod_field {
                0 => {
                    if base == 5 {
                        st.ops[idx].immediate = read32_signed(st);
                    }
                }
                1 => st.ops[idx].immediate = read8_signed(st),
                2 => st.ops[idx].immediate = read32_signed(st),
                _ => {}
            }
            seg = Some(if base + rm_reg1_offset == 4 || base + rm_reg1_offset == 5 {
                "ss"
            } else {
                "ds"
            });
        } else {
            match mod_field {
                0 => {
                    if rm == 5 {
                        st.ops[idx].immediate = read32_signed(st);
                        if st.addr_size == 8 {
                            st.ops[idx].rip_relative = true;
                            st.result_flags |= InstrFlags::ADDR64;
                        }
                    } else {
                        st.ops[idx].components[0] = Some(addr_regs[rm + rm_reg1_offset]);
                    }
                    seg = Some("ds");
                }
                1 => {
                    st.ops[idx].components[0] = Some(addr_regs[rm + rm_reg1_offset]);
                    st.ops[idx].immediate = read8_signed(st);
                    seg = Some(if rm == 5 { "ss" } else { "ds" });
                }
                2 => {
                    st.ops[idx].components[0] = Some(addr_regs[rm + rm_reg1_offset]);
                    st.ops[idx].immediate = read32_signed(st);
                    seg = Some(if rm == 5 { "ss" } else { "ds" });
                }
                _ => st.ops[idx].kind = SlotKind::Reg(reg_list[rm + rm_reg1_offset]),
            }
        }
        if let Some(seg) = seg {
            st.ops[idx].segment = Some(get_final_segment(st, seg));
        }
    }

    reg_field
}

#[allow(clippy::too_many_arguments)]
fn decode_rm_reg(
    st: &mut DecodeState,
    rm_idx: usize,
    rm_list: RegList,
    rm_size: u16,
    reg_idx: usize,
    reg_list: RegList,
    reg_size: u16,
) {
    let reg = decode_rm(st, rm_idx, rm_list, rm_size);
    let reg_offset = if st.rex_reg { 8 } else { 0 };
    st.ops[reg_idx].size = reg_size;
    st.ops[reg_idx].kind = SlotKind::Reg(reg_list[reg + reg_offset]);
}

fn set_operand_to_es_edi(st: &mut DecodeState, idx: usize, size: u16) {
    let reg = regs_for_addr_size(st)[7];
    let op = &mut st.ops[idx];
    op.kind = SlotKind::Mem;
    op.components[0] = Some(reg);
    op.size = size;
    op.segment = Some("es");
}

fn set_operand_to_ds_esi(st: &mut DecodeState, idx: usize, size: u16) {
    let reg = regs_for_addr_size(st)[6];
    let seg = get_final_segment(st, "ds");
    let op = &mut st.ops[idx];
    op.kind = SlotKind::Mem;
    op.components[0] = Some(reg);
    op.size = size;
    op.segment = Some(seg);
}

fn set_operand_to_imm_addr(st: &mut DecodeState, idx: usize) {
    let imm = read_addr_size(st);
    let seg = get_final_segment(st, "ds");
    let size = st.final_op_size;
    let op = &mut st.ops[idx];
    op.kind = SlotKind::Mem;
    op.immediate = imm;
    op.segment = Some(seg);
    op.size = size;
}

fn set_operand_to_eax(st: &mut DecodeState, idx: usize) {
    let name = regs_for_final_op_size(st)[0];
    st.ops[idx].kind = SlotKind::Reg(name);
    st.ops[idx].size = st.final_op_size;
}

fn set_operand_to_op_reg(st: &mut DecodeState, idx: usize) {
    let reg_offset = if st.rex_rm1 { 8 } else { 0 };
    let name = regs_for_final_op_size(st)[(st.prev_opcode & 7) as usize + reg_offset];
    st.ops[idx].kind = SlotKind::Reg(name);
    st.ops[idx].size = st.final_op_size;
}

fn set_operand_to_imm(st: &mut DecodeState, idx: usize) {
    let size = st.final_op_size;
    let value = read_final_op_size(st);
    st.ops[idx].kind = SlotKind::Imm;
    st.ops[idx].size = size;
    st.ops[idx].immediate = value;
}

fn set_operand_to_imm8(st: &mut DecodeState, idx: usize) {
    let value = read8(st) as i64;
    st.ops[idx].kind = SlotKind::Imm;
    st.ops[idx].size = 1;
    st.ops[idx].immediate = value;
}

fn set_operand_to_imm16(st: &mut DecodeState, idx: usize) {
    let value = read16(st) as i64;
    st.ops[idx].kind = SlotKind::Imm;
    st.ops[idx].size = 2;
    st.ops[idx].immediate = value;
}

fn decode_sse_prefix(st: &mut DecodeState) -> usize {
    if st.op_prefix {
        st.op_prefix = false;
        1
    } else if st.rep == Rep::RepNe {
        st.rep = Rep::None;
        2
    } else if st.rep == Rep::RepE {
        st.rep = Rep::None;
        3
    } else {
        0
    }
}

fn get_size_for_sse_type(prefix: usize) -> u16 {
    match prefix {
        2 => 8,
        3 => 4,
        _ => 16,
    }
}

fn sse_slot(st: &DecodeState, ty: SseOperand, operand_index: usize) -> usize {
    let operand_index = if ty == SseOperand::Sse128Flip {
        1 - operand_index
    } else {
        operand_index
    };
    if operand_index == 0 {
        st.a()
    } else {
        st.b()
    }
}

fn sse_reg_list(st: &DecodeState, ty: SseOperand) -> RegList {
    match ty {
        SseOperand::Mmx32 | SseOperand::Mmx64 => &MMX_REGS,
        SseOperand::Gpr32Or64 => {
            if st.final_op_size == 8 {
                &REG64
            } else {
                &REG32
            }
        }
        _ => &tables::XMM_REGS,
    }
}

fn sse_size(st: &DecodeState, ty: SseOperand) -> u16 {
    match ty {
        SseOperand::Sse16 => 2,
        SseOperand::Sse32 | SseOperand::Mmx32 => 4,
        SseOperand::Sse64 | SseOperand::Mmx64 => 8,
        SseOperand::Gpr32Or64 => {
            if st.final_op_size == 8 {
                8
            } else {
                4
            }
        }
        _ => 16,
    }
}

fn sse_update_operation(st: &mut DecodeState, ty: SseOperand) {
    if ty != SseOperand::Gpr32Or64 {
        return;
    }
    if let Op::Sized(list) = st.op {
        st.op = if st.final_op_size == 8 {
            Op::O(list[1])
        } else {
            Op::O(list[0])
        };
    }
}

fn group_operation(op: Op, reg_field: usize) -> Op {
    match op {
        Op::N(group) => match GROUP_OPERATIONS[group][reg_field] {
            Some(m) => Op::O(m),
            None => Op::None,
        },
        _ => Op::None,
    }
}

fn op_is(op: Op, mnemonic: &str) -> bool {
    matches!(op, Op::O(m) if m == mnemonic)
}

fn invalid_decode(st: &mut DecodeState) {
    st.invalid = true;
}

fn decode_two_byte(st: &mut DecodeState) {
    let opcode = read8(st);
    if opcode == 0x38 {
        let sub = read8(st);
        process_sparse_opcode(st, &THREE_BYTE_0F38_MAP, sub);
    } else if opcode == 0x3a {
        let sub = read8(st);
        process_sparse_opcode(st, &THREE_BYTE_0F3A_MAP, sub);
        set_operand_to_imm8(st, 2);
    } else {
        process_encoding(st, &TWO_BYTE_OPCODE_MAP[opcode as usize]);
    }
}

fn decode_fpu(st: &mut DecodeState) {
    let mod_rm = peek8(st);
    let reg = ((mod_rm >> 3) & 7) as usize;
    let escape = match st.op {
        Op::N(i) => i,
        _ => {
            st.invalid = true;
            return;
        }
    };

    let entry = if mod_rm & 0xc0 == 0xc0 {
        &tables::FPU_REG_OPCODE_MAP[escape][reg]
    } else {
        &tables::FPU_MEM_OPCODE_MAP[escape][reg]
    };
    process_encoding(st, entry);
}

fn decode_no_operands(_st: &mut DecodeState) {}

fn decode_reg_rm(st: &mut DecodeState) {
    let mut size = st.final_op_size;
    let reg_list = regs_for_final_op_size(st);
    match st.dec_flags & DEC_REG_RM_SIZE_MASK {
        DEC_REG_RM_2X_SIZE => size *= 2,
        DEC_REG_RM_FAR_SIZE => size += 2,
        DEC_REG_RM_NO_SIZE => size = 0,
        _ => {}
    }

    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, b, reg_list, size, a, reg_list, st.final_op_size);

    if size != st.final_op_size && st.ops[b].kind != SlotKind::Mem {
        st.invalid = true;
    }
}

fn decode_reg_rm_imm(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, b, reg_list, st.final_op_size, a, reg_list, st.final_op_size);
    set_operand_to_imm(st, 2);
}

fn decode_rm_reg_imm8(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, a, reg_list, st.final_op_size, b, reg_list, st.final_op_size);
    set_operand_to_imm8(st, 2);
}

fn decode_rm_reg_cl(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, a, reg_list, st.final_op_size, b, reg_list, st.final_op_size);
    st.ops[2].kind = SlotKind::Reg("cl");
    st.ops[2].size = 1;
}

fn decode_eax_imm(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_eax(st, a);
    set_operand_to_imm(st, b);
}

fn decode_push_pop_seg(st: &mut DecodeState) {
    let offset: i32 = if st.prev_opcode >= 0xa0 { -16 } else { 0 };
    let seg = ["es", "cs", "ss", "ds", "fs", "gs"][((st.prev_opcode >> 3) as i32 + offset) as usize];
    let a = st.a();
    st.ops[a].kind = SlotKind::Reg(seg);
    st.ops[a].size = st.final_op_size;
}

fn decode_op_reg(st: &mut DecodeState) {
    let a = st.a();
    set_operand_to_op_reg(st, a);
}

fn decode_eax_op_reg(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_eax(st, a);
    set_operand_to_op_reg(st, b);
}

fn decode_op_reg_imm(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_op_reg(st, a);
    let size = st.final_op_size;
    let value = if size == 8 {
        read64(st) as i64
    } else {
        read_final_op_size(st)
    };
    st.ops[b].kind = SlotKind::Imm;
    st.ops[b].size = size;
    st.ops[b].immediate = value;
}

fn decode_nop(st: &mut DecodeState) {
    if st.rex_rm1 {
        // REX.B turns 0x90 into xchg with r8.
        st.op = Op::O("xchg");
        let (a, b) = (st.a(), st.b());
        set_operand_to_eax(st, a);
        set_operand_to_op_reg(st, b);
    }
}

fn decode_imm(st: &mut DecodeState) {
    let a = st.a();
    set_operand_to_imm(st, a);
}

fn decode_imm16_imm8(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_imm16(st, a);
    set_operand_to_imm8(st, b);
}

fn decode_edi_dx(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    let size = st.final_op_size;
    set_operand_to_es_edi(st, a, size);
    st.ops[b].kind = SlotKind::Reg("dx");
    st.ops[b].size = 2;
}

fn decode_dx_esi(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    st.ops[a].kind = SlotKind::Reg("dx");
    st.ops[a].size = 2;
    let size = st.final_op_size;
    set_operand_to_ds_esi(st, b, size);
}

fn decode_rel_imm(st: &mut DecodeState) {
    let a = st.a();
    let size = st.op_size;
    let value = read_signed_final_op_size(st);
    st.ops[a].kind = SlotKind::Imm;
    st.ops[a].size = size;
    st.ops[a].immediate = value
        .wrapping_add(st.addr as i64)
        .wrapping_add(st.consumed as i64);
}

fn decode_rel_imm_addr_size(st: &mut DecodeState) {
    decode_rel_imm(st);
    resolve_sized_for_addr_size(st);
}

fn decode_group_rm(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let a = st.a();
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
}

fn decode_group_rm_imm(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
    set_operand_to_imm(st, b);
}

fn decode_group_rm_imm8v(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
    set_operand_to_imm8(st, b);
}

fn decode_group_rm_one(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
    st.ops[b].kind = SlotKind::Imm;
    st.ops[b].size = 1;
    st.ops[b].immediate = 1;
}

fn decode_group_rm_cl(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
    st.ops[b].kind = SlotKind::Reg("cl");
    st.ops[b].size = 1;
}

fn decode_group_f6_f7(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
    if op_is(st.op, "test") {
        set_operand_to_imm(st, b);
    }
    // Only not/neg may take lock.
    if st.result_flags.contains(InstrFlags::LOCK) && !op_is(st.op, "not") && !op_is(st.op, "neg") {
        st.invalid = true;
    }
}

fn decode_group_ff(st: &mut DecodeState) {
    if st.using64 {
        // Jumps, calls and pushes default to 64-bit.
        let rm = peek8(st);
        let reg_field = (rm >> 3) & 7;
        if reg_field == 2 || reg_field == 4 {
            let size = if st.op_prefix { 4 } else { 8 };
            st.final_op_size = size;
            st.op_size = size;
        } else if reg_field == 6 {
            let size = if st.op_prefix { 2 } else { 8 };
            st.final_op_size = size;
            st.op_size = size;
        }
    }
    let reg_list = regs_for_final_op_size(st);
    let a = st.a();
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
    // Far jump and call forms require a memory operand.
    if op_is(st.op, "callf") || op_is(st.op, "jmpf") {
        if st.ops[a].kind != SlotKind::Mem {
            st.invalid = true;
        }
        st.ops[a].size += 2;
    }
    if st.result_flags.contains(InstrFlags::LOCK) && !op_is(st.op, "inc") && !op_is(st.op, "dec") {
        st.invalid = true;
    }
}

fn decode_group_0f00(st: &mut DecodeState) {
    let rm = peek8(st);
    let mod_field = (rm >> 6) & 3;
    let reg_field = (rm >> 3) & 7;
    if (mod_field != 3 && reg_field < 2) || (2..=5).contains(&reg_field) {
        st.final_op_size = 2;
    }
    let reg_list = regs_for_final_op_size(st);
    let a = st.a();
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    st.op = group_operation(st.op, reg_field);
}

fn decode_group_0f01(st: &mut DecodeState) {
    let rm = peek8(st);
    let mod_field = (rm >> 6) & 3;
    let reg_field = ((rm >> 3) & 7) as usize;
    let rm_field = (rm & 7) as usize;

    if mod_field == 3 && reg_field != 4 && reg_field != 6 {
        st.op = match GROUP_0F01_REG_OPERATIONS[reg_field][rm_field] {
            Some(m) => Op::O(m),
            None => Op::None,
        };
        read8(st);
    } else {
        if reg_field < 4 {
            st.final_op_size = if st.using64 { 10 } else { 6 };
        } else if (mod_field != 3 && reg_field == 4) || reg_field == 6 {
            st.final_op_size = 2;
        } else if reg_field == 7 {
            st.final_op_size = 1;
        }
        let reg_list = regs_for_final_op_size(st);
        let a = st.a();
        let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
        st.op = group_operation(st.op, reg_field);
    }
}

fn decode_group_0fae(st: &mut DecodeState) {
    let rm = peek8(st);
    let mod_field = (rm >> 6) & 3;
    let reg_field = ((rm >> 3) & 7) as usize;

    if mod_field == 3 {
        st.op = match st.op {
            Op::N(group) => match GROUP_OPERATIONS[group + 1][reg_field] {
                Some(m) => Op::O(m),
                None => Op::None,
            },
            _ => Op::None,
        };
        read8(st);
    } else {
        if reg_field & 2 == 0 {
            st.final_op_size = 512;
        } else if reg_field & 6 == 2 {
            st.final_op_size = 4;
        } else {
            st.final_op_size = 1;
        }
        let reg_list = regs_for_final_op_size(st);
        let a = st.a();
        let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
        st.op = group_operation(st.op, reg_field);
    }
}

fn decode_0fb8(st: &mut DecodeState) {
    if st.rep != Rep::RepE {
        if st.using64 {
            st.op_size = if st.op_prefix { 4 } else { 8 };
        }
        st.final_op_size = get_final_op_size(st);
        let a = st.a();
        let size = st.final_op_size;
        let value = read_signed_final_op_size(st);
        st.ops[a].kind = SlotKind::Imm;
        st.ops[a].size = size;
        st.ops[a].immediate = value
            .wrapping_add(st.addr as i64)
            .wrapping_add(st.consumed as i64);
    } else {
        decode_reg_rm(st);
    }
}

fn decode_rm_sreg_v(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    let reg_field = decode_rm(st, a, reg_list, st.final_op_size);
    if reg_field >= 6 {
        st.invalid = true;
        return;
    }
    st.ops[b].kind = SlotKind::Reg(["es", "cs", "ss", "ds", "fs", "gs"][reg_field]);
    st.ops[b].size = 2;
    if st.ops[0].kind == SlotKind::Reg("cs") {
        st.invalid = true;
    }
}

fn decode_rm8(st: &mut DecodeState) {
    let reg_list = get_byte_reg_list(st);
    let a = st.a();
    decode_rm(st, a, reg_list, 1);
}

fn decode_rm_v(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let a = st.a();
    decode_rm(st, a, reg_list, st.final_op_size);
}

fn decode_far_imm(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_imm(st, b);
    set_operand_to_imm16(st, a);
}

fn decode_eax_addr(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_eax(st, a);
    set_operand_to_imm_addr(st, b);
    if st.addr_size == 8 {
        st.result_flags |= InstrFlags::ADDR64;
    }
}

fn decode_edi_esi(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    let size = st.final_op_size;
    set_operand_to_es_edi(st, a, size);
    set_operand_to_ds_esi(st, b, size);
}

fn decode_edi_eax(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    let size = st.final_op_size;
    set_operand_to_es_edi(st, a, size);
    set_operand_to_eax(st, b);
}

fn decode_eax_esi(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_eax(st, a);
    let size = st.final_op_size;
    set_operand_to_ds_esi(st, b, size);
}

fn decode_al_ebx_al(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    let base = regs_for_addr_size(st)[3];
    let seg = get_final_segment(st, "ds");
    st.ops[a].kind = SlotKind::Reg("al");
    st.ops[a].size = 1;
    st.ops[b].kind = SlotKind::Mem;
    st.ops[b].components = [Some(base), Some("al")];
    st.ops[b].size = 1;
    st.ops[b].segment = Some(seg);
}

fn decode_eax_imm8(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_eax(st, a);
    set_operand_to_imm8(st, b);
}

fn decode_eax_dx(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    set_operand_to_eax(st, a);
    st.ops[b].kind = SlotKind::Reg("dx");
    st.ops[b].size = 2;
}

fn decode_3dnow(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, b, &MMX_REGS, 8, a, &MMX_REGS, 8);
    let op = read8(st);
    st.op = Op::None;
    if let Ok(i) = SPARSE_3DNOW_OPCODES.binary_search_by_key(&op, |e| e.0) {
        st.op = Op::O(SPARSE_3DNOW_OPCODES[i].1);
    }
}

fn sse_table_entry(st: &mut DecodeState) -> Option<&'static tables::SseEntry> {
    let prefix = decode_sse_prefix(st);
    let rm = peek8(st);
    let mod_field = (rm >> 6) & 3;

    let table_index = match st.op {
        Op::N(i) => i,
        _ => {
            st.invalid = true;
            return None;
        }
    };
    let entry = &SSE_TABLE[table_index];
    let op_entry = if mod_field == 3 {
        &entry.reg[prefix]
    } else {
        &entry.mem[prefix]
    };
    st.op = op_entry.op;
    Some(op_entry)
}

fn decode_sse_table_common(st: &mut DecodeState) {
    let entry = match sse_table_entry(st) {
        Some(e) => e,
        None => return,
    };
    let rm_idx = sse_slot(st, entry.src, 1);
    let reg_idx = sse_slot(st, entry.dst, 0);
    let rm_list = sse_reg_list(st, entry.src);
    let rm_size = sse_size(st, entry.src);
    let reg_list = sse_reg_list(st, entry.dst);
    let reg_size = sse_size(st, entry.dst);
    decode_rm_reg(st, rm_idx, rm_list, rm_size, reg_idx, reg_list, reg_size);

    if st.dec_flags & DEC_INC_OPERATION_FOR_64 != 0 {
        sse_update_operation(st, entry.dst);
        sse_update_operation(st, entry.src);
    }
}

fn decode_sse_table(st: &mut DecodeState) {
    decode_sse_table_common(st);
}

fn decode_sse_table_imm8(st: &mut DecodeState) {
    decode_sse_table_common(st);
    set_operand_to_imm8(st, 2);
}

fn decode_sse_table_mem8(st: &mut DecodeState) {
    decode_sse_table_common(st);
    let (a, b) = (st.a(), st.b());
    if st.ops[a].kind == SlotKind::Mem {
        st.ops[a].size = 1;
    }
    if st.ops[b].kind == SlotKind::Mem {
        st.ops[b].size = 1;
    }
}

fn decode_sse(st: &mut DecodeState) {
    let prefix = decode_sse_prefix(st);
    let rm = peek8(st);
    let mod_field = (rm >> 6) & 3;

    if let Op::Sized(list) = st.op {
        st.op = Op::O(list[prefix]);
    }
    let size = if mod_field == 3 {
        16
    } else {
        get_size_for_sse_type(prefix)
    };
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, b, &tables::XMM_REGS, size, a, &tables::XMM_REGS, 16);
}

fn decode_sse_single(st: &mut DecodeState) {
    let prefix = decode_sse_prefix(st);

    if prefix == 1 || prefix == 2 {
        st.invalid = true;
    } else {
        if let Op::Sized(list) = st.op {
            st.op = Op::O(list[prefix & 1]);
        }
        let (a, b) = (st.a(), st.b());
        decode_rm_reg(st, b, &tables::XMM_REGS, 16, a, &tables::XMM_REGS, 16);
    }
}

fn decode_sse_packed(st: &mut DecodeState) {
    let prefix = decode_sse_prefix(st);

    if prefix == 2 || prefix == 3 {
        st.invalid = true;
    } else {
        if let Op::Sized(list) = st.op {
            st.op = Op::O(list[prefix & 1]);
        }
        let (a, b) = (st.a(), st.b());
        decode_rm_reg(st, b, &tables::XMM_REGS, 16, a, &tables::XMM_REGS, 16);
    }
}

fn decode_mmx(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    if st.op_prefix {
        decode_rm_reg(st, b, &tables::XMM_REGS, 16, a, &tables::XMM_REGS, 16);
    } else {
        decode_rm_reg(st, b, &MMX_REGS, 8, a, &MMX_REGS, 8);
    }
}

fn decode_mmx_sse_only(st: &mut DecodeState) {
    if st.op_prefix {
        let (a, b) = (st.a(), st.b());
        decode_rm_reg(st, b, &tables::XMM_REGS, 16, a, &tables::XMM_REGS, 16);
    } else {
        st.invalid = true;
    }
}

fn decode_mmx_group(st: &mut DecodeState) {
    let group = match st.op {
        Op::N(i) => i,
        _ => {
            st.invalid = true;
            return;
        }
    };
    let (a, b) = (st.a(), st.b());
    if st.op_prefix {
        let reg_field = decode_rm(st, a, &tables::XMM_REGS, 16);
        st.op = match MMX_GROUP_OPERATIONS[group][reg_field].1 {
            Some(m) => Op::O(m),
            None => Op::None,
        };
    } else {
        let reg_field = decode_rm(st, a, &MMX_REGS, 8);
        st.op = match MMX_GROUP_OPERATIONS[group][reg_field].0 {
            Some(m) => Op::O(m),
            None => Op::None,
        };
    }
    set_operand_to_imm8(st, b);
}

fn decode_pinsrw(st: &mut DecodeState) {
    decode_sse_table_common(st);
    set_operand_to_imm8(st, 2);
    let b = st.b();
    if st.ops[b].kind == SlotKind::Mem {
        st.ops[b].size = 2;
    }
}

fn decode_reg_cr(st: &mut DecodeState) {
    if st.final_op_size == 2 {
        st.final_op_size = 4;
    }
    let reg_list = regs_for_final_op_size(st);
    let reg = read8(st);
    if st.result_flags.contains(InstrFlags::LOCK) {
        // Lock acts as an extension bit for cr8.
        st.result_flags.remove(InstrFlags::LOCK);
        st.rex_reg = true;
    }
    let (a, b) = (st.a(), st.b());
    let gpr = if st.rex_rm1 {
        reg_list[(reg & 7) as usize + 8]
    } else {
        reg_list[(reg & 7) as usize]
    };
    st.ops[a].kind = SlotKind::Reg(gpr);
    st.ops[a].size = st.final_op_size;
    let cr_set = match st.op {
        Op::Regs(set) => set,
        _ => {
            st.invalid = true;
            return;
        }
    };
    let cr = if st.rex_reg {
        cr_set[((reg >> 3) & 7) as usize + 8]
    } else {
        cr_set[((reg >> 3) & 7) as usize]
    };
    st.ops[b].kind = SlotKind::Reg(cr);
    st.ops[b].size = st.final_op_size;
    st.op = Op::O("mov");
}

fn decode_mov_sx_zx_8(st: &mut DecodeState) {
    let byte_list = get_byte_reg_list(st);
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, b, byte_list, 1, a, reg_list, st.final_op_size);
}

fn decode_mov_sx_zx_16(st: &mut DecodeState) {
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, b, &REG16, 2, a, reg_list, st.final_op_size);
}

fn decode_mem_fixed(st: &mut DecodeState, size: u16) {
    let a = st.a();
    decode_rm(st, a, &REG32, size);
    if st.ops[a].kind != SlotKind::Mem {
        st.invalid = true;
    }
}

fn decode_mem16(st: &mut DecodeState) {
    decode_mem_fixed(st, 2);
}

fn decode_mem32(st: &mut DecodeState) {
    decode_mem_fixed(st, 4);
}

fn decode_mem64(st: &mut DecodeState) {
    decode_mem_fixed(st, 8);
}

fn decode_mem80(st: &mut DecodeState) {
    decode_mem_fixed(st, 10);
}

fn decode_mem_float_env(st: &mut DecodeState) {
    let size = if st.final_op_size == 2 { 14 } else { 28 };
    decode_mem_fixed(st, size);
}

fn decode_mem_float_save(st: &mut DecodeState) {
    let size = if st.final_op_size == 2 { 94 } else { 108 };
    decode_mem_fixed(st, size);
}

fn decode_fpu_reg(st: &mut DecodeState) {
    let a = st.a();
    decode_rm(st, a, &FPU_REGS, 10);
}

fn decode_fpu_reg_st0(st: &mut DecodeState) {
    let (a, b) = (st.a(), st.b());
    decode_rm(st, a, &FPU_REGS, 10);
    st.ops[b].kind = SlotKind::Reg("st0");
    st.ops[b].size = 10;
}

fn decode_reg_group_no_operands(st: &mut DecodeState) {
    let rm_byte = read8(st);
    st.op = group_operation(st.op, (rm_byte & 7) as usize);
}

fn decode_reg_group_ax(st: &mut DecodeState) {
    let rm_byte = read8(st);
    st.op = group_operation(st.op, (rm_byte & 7) as usize);
    let a = st.a();
    st.ops[a].kind = SlotKind::Reg("ax");
    st.ops[a].size = 2;
}

fn decode_cmpxch8b(st: &mut DecodeState) {
    let rm = peek8(st);
    let reg_field = (rm >> 3) & 7;
    let a = st.a();

    match reg_field {
        1 => {
            if st.final_op_size == 2 {
                st.final_op_size = 4;
            } else if st.final_op_size == 8 {
                st.op = Op::O("cmpxch16b");
            }
            let reg_list = regs_for_final_op_size(st);
            let size = st.final_op_size * 2;
            decode_rm(st, a, reg_list, size);
        }
        6 => {
            st.op = if st.op_prefix {
                Op::O("vmclear")
            } else if st.rep == Rep::RepE {
                Op::O("vmxon")
            } else {
                Op::O("vmptrld")
            };
            decode_rm(st, a, &REG64, 8);
        }
        7 => {
            st.op = Op::O("vmptrst");
            decode_rm(st, a, &REG64, 8);
        }
        _ => st.invalid = true,
    }

    if st.ops[a].kind != SlotKind::Mem {
        st.invalid = true;
    }
}

fn decode_mov_nti(st: &mut DecodeState) {
    if st.final_op_size == 2 {
        st.final_op_size = 4;
    }
    let reg_list = regs_for_final_op_size(st);
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, a, reg_list, st.final_op_size, b, reg_list, st.final_op_size);
    if st.ops[a].kind != SlotKind::Mem {
        st.invalid = true;
    }
}

fn decode_crc32(st: &mut DecodeState) {
    let src_list = regs_for_final_op_size(st);
    let (dest_list, dest_size): (RegList, u16) = if st.final_op_size == 8 {
        (&REG64, 8)
    } else {
        (&REG32, 4)
    };
    let (a, b) = (st.a(), st.b());
    decode_rm_reg(st, b, src_list, st.final_op_size, a, dest_list, dest_size);
}

fn decode_arpl(st: &mut DecodeState) {
    if st.using64 {
        // The arpl encoding is repurposed as movsxd in long mode.
        st.op = Op::O("movsxd");
        let reg_list = regs_for_final_op_size(st);
        let (a, b) = (st.a(), st.b());
        decode_rm_reg(st, b, &REG32, 4, a, reg_list, st.final_op_size);
    } else {
        st.final_op_size = 2;
        let reg_list = regs_for_final_op_size(st);
        let (a, b) = (st.a(), st.b());
        decode_rm_reg(st, a, reg_list, 2, b, reg_list, st.final_op_size);
    }
}

fn process_encoding(st: &mut DecodeState, entry: &Entry) {
    st.op = entry.0;
    let (handler, flags) = entry.1.dispatch();

    st.dec_flags = flags;
    if st.using64 && flags & DEC_INVALID_IN_64BIT != 0 {
        st.invalid = true;
        return;
    }
    if st.using64 && flags & DEC_DEFAULT_TO_64BIT != 0 {
        st.op_size = if st.op_prefix { 2 } else { 8 };
    }
    st.final_op_size = get_final_op_size(st);

    if flags & DEC_FORCE_16BIT != 0 {
        st.final_op_size = 2;
    }

    if flags & DEC_OPERATION_OP_SIZE != 0 {
        resolve_sized_for_op_size(st);
    }

    if flags & DEC_REP != 0 {
        if st.rep != Rep::None {
            st.result_flags |= InstrFlags::REP;
        }
    } else if flags & DEC_REP_COND != 0 {
        if st.rep == Rep::RepNe {
            st.result_flags |= InstrFlags::REPNE;
        } else if st.rep == Rep::RepE {
            st.result_flags |= InstrFlags::REPE;
        }
    }

    handler(st);

    if !matches!(st.op, Op::O(_)) {
        st.invalid = true;
    }

    if st.result_flags.contains(InstrFlags::LOCK) {
        // Lock requires an encoding that allows it, proper semantics and a
        // memory destination.
        if st.dec_flags & DEC_LOCK == 0 {
            st.invalid = true;
        } else if op_is(st.op, "cmp") {
            st.invalid = true;
        } else if st.ops[0].kind != SlotKind::Mem && st.ops[1].kind != SlotKind::Mem {
            st.invalid = true;
        }
    }
}

fn process_sparse_opcode(st: &mut DecodeState, map: &'static [(u8, Entry)], opcode: u8) {
    st.op = Op::None;
    if let Ok(i) = map.binary_search_by_key(&opcode, |e| e.0) {
        process_encoding(st, &map[i].1);
    }
}

fn process_prefixes(st: &mut DecodeState) {
    let mut rex = 0u8;
    let mut addr_prefix = false;

    while !st.invalid {
        let prefix = read8(st);
        if st.invalid {
            break;
        }
        if (0x26..=0x3e).contains(&prefix) && prefix & 7 == 6 {
            st.seg_override = Some(["es", "cs", "ss", "ds"][((prefix >> 3) - 4) as usize]);
        } else if prefix == 0x64 {
            st.seg_override = Some("fs");
        } else if prefix == 0x65 {
            st.seg_override = Some("gs");
        } else if prefix == 0x66 {
            st.op_prefix = true;
            st.result_flags |= InstrFlags::OPSIZE;
        } else if prefix == 0x67 {
            addr_prefix = true;
            st.result_flags |= InstrFlags::ADDRSIZE;
        } else if prefix == 0xf0 {
            st.result_flags |= InstrFlags::LOCK;
        } else if prefix == 0xf2 {
            st.rep = Rep::RepNe;
        } else if prefix == 0xf3 {
            st.rep = Rep::RepE;
        } else if st.using64 && (0x40..=0x4f).contains(&prefix) {
            rex = prefix;
            continue;
        } else {
            // Not a prefix, put the byte back for opcode processing.
            st.pos -= 1;
            st.consumed -= 1;
            break;
        }

        // REX is only honored when it is the last prefix before the opcode.
        rex = 0;
    }

    if st.op_prefix {
        st.op_size = if st.op_size == 2 { 4 } else { 2 };
    }
    if addr_prefix {
        st.addr_size = if st.addr_size == 4 { 2 } else { 4 };
    }

    if rex != 0 {
        st.rex = true;
        st.rex_rm1 = rex & 1 != 0;
        st.rex_rm2 = rex & 2 != 0;
        st.rex_reg = rex & 4 != 0;
        if rex & 8 != 0 {
            st.op_size = 8;
        }
    }
}

fn finish_disassemble(mut st: DecodeState) -> Instruction {
    let length = st.consumed;
    for op in st.ops.iter_mut() {
        if op.rip_relative {
            op.immediate = op
                .immediate
                .wrapping_add(st.addr as i64)
                .wrapping_add(length as i64);
        }
    }
    if st.insufficient && st.orig_len < 15 {
        st.result_flags |= InstrFlags::INSUFFICIENT_LENGTH;
    }

    let operation = if st.invalid {
        None
    } else {
        match st.op {
            Op::O(m) => Some(m),
            _ => None,
        }
    };

    let mut slots: Vec<OperandSlot> = st.ops.to_vec();
    while matches!(slots.last(), Some(s) if s.kind == SlotKind::Empty) {
        slots.pop();
    }
    let operands = slots
        .into_iter()
        .map(|s| match s.kind {
            SlotKind::Imm => Operand::Imm {
                value: s.immediate,
                size: s.size,
            },
            SlotKind::Mem => Operand::Mem {
                components: s.components,
                scale: s.scale,
                displacement: s.immediate,
                size: s.size,
                segment: s.segment,
                rip_relative: s.rip_relative,
            },
            SlotKind::Reg(name) => Operand::Reg { name, size: s.size },
            SlotKind::Empty => Operand::Imm {
                value: s.immediate,
                size: s.size,
            },
        })
        .collect();

    Instruction {
        operation,
        operands,
        flags: st.result_flags,
        segment: st.seg_override,
        length,
        addr_size: st.addr_size,
    }
}

fn disassemble(opcode: &[u8], addr: u64, addr_size: u16, op_size: u16, using64: bool) -> Instruction {
    let mut st = DecodeState::new(opcode, addr, addr_size, op_size, using64);
    process_prefixes(&mut st);
    let byte = read8(&mut st);
    process_encoding(&mut st, &MAIN_OPCODE_MAP[byte as usize]);
    finish_disassemble(st)
}

/// Decode one instruction in 16-bit mode.
pub fn disassemble16(opcode: &[u8], addr: u64) -> Instruction {
    disassemble(opcode, addr, 2, 2, false)
}

/// Decode one instruction in 32-bit mode.
pub fn disassemble32(opcode: &[u8], addr: u64) -> Instruction {
    disassemble(opcode, addr, 4, 4, false)
}

/// Decode one instruction in 64-bit mode.
pub fn disassemble64(opcode: &[u8], addr: u64) -> Instruction {
    disassemble(opcode, addr, 8, 4, true)
}

/// NASM-style size keyword for a memory access width, with trailing space.
pub fn size_name(size: u16) -> &'static str {
    match size {
        1 => "byte ",
        2 => "word ",
        4 => "dword ",
        6 => "fword ",
        8 => "qword ",
        10 => "tword ",
        16 => "oword ",
        _ => "",
    }
}

/// Mask an immediate to its operand size for display.
pub fn mask_to_size(value: i64, size: u16) -> u64 {
    if size >= 8 {
        value as u64
    } else {
        (value as u64) & ((1u64 << (size * 8)) - 1)
    }
}

impl Instruction {
    /// The mnemonic with any lock/rep prefixes prepended.
    pub fn operation_text(&self) -> String {
        let mut text = String::new();
        if self.flags.contains(InstrFlags::LOCK) {
            text.push_str("lock ");
        }
        if self.flags.has_any_rep() {
            text.push_str("rep");
            if self.flags.contains(InstrFlags::REPNE) {
                text.push_str("ne");
            } else if self.flags.contains(InstrFlags::REPE) {
                text.push('e');
            }
            text.push(' ');
        }
        text.push_str(self.operation.unwrap_or("??"));
        text
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operation.is_none() {
            return write!(f, "??");
        }
        write!(f, "{:<7}", self.operation_text())?;
        for (j, op) in self.operands.iter().enumerate() {
            if j != 0 {
                write!(f, ",")?;
            }
            write!(f, " ")?;
            match op {
                Operand::Imm { value, size } => {
                    write!(
                        f,
                        "0x{:0width$x}",
                        mask_to_size(*value, *size),
                        width = (*size as usize) * 2
                    )?;
                }
                Operand::Reg { name, .. } => write!(f, "{name}")?,
                Operand::Mem {
                    components,
                    scale,
                    displacement,
                    size,
                    segment,
                    ..
                } => {
                    let mut plus = false;
                    write!(f, "{}", size_name(*size))?;
                    if self.segment.is_some() || *segment == Some("es") {
                        if let Some(seg) = segment {
                            write!(f, "{seg}:")?;
                        }
                    }
                    write!(f, "[")?;
                    if let Some(base) = components[0] {
                        write!(f, "{base}")?;
                        plus = true;
                    }
                    if let Some(index) = components[1] {
                        if plus {
                            write!(f, "+")?;
                        }
                        write!(f, "{index}")?;
                        if *scale != 1 {
                            write!(f, "*{scale}")?;
                        }
                        plus = true;
                    }
                    let d = *displacement;
                    if d != 0 || (components[0].is_none() && components[1].is_none()) {
                        if plus && (-0x80..0).contains(&d) {
                            write!(f, "-0x{:02x}", -d)?;
                        } else if plus && (1..=0x7f).contains(&d) {
                            write!(f, "+0x{d:02x}")?;
                        } else if self.flags.contains(InstrFlags::ADDR64) {
                            if plus {
                                write!(f, "+")?;
                            }
                            write!(f, "0x{:016x}", d as u64)?;
                        } else {
                            if plus {
                                write!(f, "+")?;
                            }
                            write!(f, "0x{:08x}", (d as u64) & 0xffff_ffff)?;
                        }
                    }
                    write!(f, "]")?;
                }
            }
        }
        Ok(())
    }
}

//! Opcode tables for the x86 decoder.
//!
//! Table layout follows the hardware: a 256-entry primary map, a 256-entry
//! two-byte map, sparse three-byte maps kept sorted for binary search, FPU
//! escape maps split by ModR/M form, ModR/M group tables keyed by the reg
//! field, and the SSE table keyed by prefix and ModR/M mod form.

use super::*;

/// Operation cell of a table entry before group/size/prefix resolution.
#[derive(Debug, Clone, Copy)]
pub(super) enum Op {
    /// No operation; decodes as invalid.
    None,
    /// Final mnemonic.
    O(&'static str),
    /// Mnemonic selected later by operand or address size.
    Sized(&'static [&'static str]),
    /// Index into a group, SSE, FPU or MMX-group table.
    N(usize),
    /// Register set for the control/debug/test move encodings.
    Regs(&'static [&'static str; 16]),
}

#[derive(Clone, Copy)]
pub(super) struct Entry(pub Op, pub Enc);

pub(super) type Handler = fn(&mut DecodeState);

/// Encoding selector: names the operand-decode shape of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Enc {
    Invalid,
    TwoByte,
    Fpu,
    NoOperands,
    OpSize,
    OpSizeDef64,
    OpSizeNo64,
    RegRm8,
    RmReg8,
    RmReg8Lock,
    RegRmV,
    RmRegV,
    RmRegVLock,
    RegRm2xV,
    RegRmImmV,
    RegRmImmSxV,
    RegRm0,
    RegRmF,
    RmRegDef64,
    RmRegImm8V,
    RmRegClV,
    EaxImmByte,
    EaxImmV,
    PushPopSeg,
    OpRegV,
    OpRegVDef64,
    EaxOpRegV,
    OpRegImmByte,
    OpRegImmV,
    Nop,
    ImmVDef64,
    ImmSxVDef64,
    ImmByte,
    Imm16,
    Imm16Imm8,
    EdiDxByteRep,
    EdiDxOpSizeRep,
    DxEsiByteRep,
    DxEsiOpSizeRep,
    RelImmByteDef64,
    RelImmVDef64,
    RelImmByteAddrSizeDef64,
    GroupRmByteLock,
    GroupRm0,
    GroupRmImmByte,
    GroupRmImmByteLock,
    GroupRmImmByteNo64Lock,
    GroupRmImm8V,
    GroupRmImmV,
    GroupRmImmVLock,
    GroupRmImmSxVLock,
    GroupRmOneByte,
    GroupRmOneV,
    GroupRmClByte,
    GroupRmClV,
    GroupF6,
    GroupF7,
    GroupFf,
    Group0f00,
    Group0f01,
    Group0fae,
    Popcnt0fb8,
    RmSregV,
    SregRmV,
    RmByte,
    RmVDef64,
    FarImmNo64,
    EaxAddrByte,
    EaxAddrV,
    AddrEaxByte,
    AddrEaxV,
    EdiEsiByteRep,
    EdiEsiOpSizeRep,
    EsiEdiByteRepC,
    EsiEdiOpSizeRepC,
    EdiEaxByteRep,
    EdiEaxOpSizeRep,
    EaxEsiByteRep,
    EaxEsiOpSizeRep,
    EaxEdiByteRepC,
    EaxEdiOpSizeRepC,
    AlEbxAl,
    EaxImm8Byte,
    EaxImm8V,
    Imm8EaxByte,
    Imm8EaxV,
    EaxDxByte,
    EaxDxV,
    DxEaxByte,
    DxEaxV,
    ThreeDNow,
    SseTable,
    SseTableFlip,
    SseTableImm8,
    SseTableIncOp64,
    SseTableIncOp64Flip,
    SseTableMem8,
    SseTableMem8Flip,
    Sse,
    SseSingle,
    SsePacked,
    Mmx,
    MmxSseOnly,
    MmxGroup,
    Pinsrw,
    RegCr,
    CrReg,
    MovSxZx8,
    MovSxZx16,
    Mem16,
    Mem32,
    Mem64,
    Mem80,
    MemFloatEnv,
    MemFloatSave,
    FpuReg,
    St0FpuReg,
    FpuRegSt0,
    RegGroupNoOperands,
    RegGroupAx,
    Cmpxch8b,
    MovNti,
    Crc32Byte,
    Crc32V,
    Arpl,
}

impl Enc {
    /// Handler function and decode-behaviour flags for this encoding.
    pub(super) fn dispatch(self) -> (Handler, u16) {
        use Enc::*;
        match self {
            Invalid => (invalid_decode, 0),
            TwoByte => (decode_two_byte, 0),
            Fpu => (decode_fpu, 0),
            NoOperands => (decode_no_operands, 0),
            OpSize => (decode_no_operands, DEC_OPERATION_OP_SIZE),
            OpSizeDef64 => (decode_no_operands, DEC_DEFAULT_TO_64BIT | DEC_OPERATION_OP_SIZE),
            OpSizeNo64 => (decode_no_operands, DEC_INVALID_IN_64BIT | DEC_OPERATION_OP_SIZE),
            RegRm8 => (decode_reg_rm, DEC_BYTE),
            RmReg8 => (decode_reg_rm, DEC_BYTE | DEC_FLIP_OPERANDS),
            RmReg8Lock => (decode_reg_rm, DEC_BYTE | DEC_FLIP_OPERANDS | DEC_LOCK),
            RegRmV => (decode_reg_rm, 0),
            RmRegV => (decode_reg_rm, DEC_FLIP_OPERANDS),
            RmRegVLock => (decode_reg_rm, DEC_FLIP_OPERANDS | DEC_LOCK),
            RegRm2xV => (decode_reg_rm, DEC_REG_RM_2X_SIZE),
            RegRmImmV => (decode_reg_rm_imm, 0),
            RegRmImmSxV => (decode_reg_rm_imm, DEC_IMM_SX),
            RegRm0 => (decode_reg_rm, DEC_REG_RM_NO_SIZE),
            RegRmF => (decode_reg_rm, DEC_REG_RM_FAR_SIZE),
            RmRegDef64 => (decode_reg_rm, DEC_FLIP_OPERANDS | DEC_DEFAULT_TO_64BIT),
            RmRegImm8V => (decode_rm_reg_imm8, 0),
            RmRegClV => (decode_rm_reg_cl, 0),
            EaxImmByte => (decode_eax_imm, DEC_BYTE),
            EaxImmV => (decode_eax_imm, 0),
            PushPopSeg => (decode_push_pop_seg, 0),
            OpRegV => (decode_op_reg, 0),
            OpRegVDef64 => (decode_op_reg, DEC_DEFAULT_TO_64BIT),
            EaxOpRegV => (decode_eax_op_reg, 0),
            OpRegImmByte => (decode_op_reg_imm, DEC_BYTE),
            OpRegImmV => (decode_op_reg_imm, 0),
            Nop => (decode_nop, 0),
            ImmVDef64 => (decode_imm, DEC_DEFAULT_TO_64BIT),
            ImmSxVDef64 => (decode_imm, DEC_IMM_SX | DEC_DEFAULT_TO_64BIT),
            ImmByte => (decode_imm, DEC_BYTE),
            Imm16 => (decode_imm, DEC_FORCE_16BIT),
            Imm16Imm8 => (decode_imm16_imm8, 0),
            EdiDxByteRep => (decode_edi_dx, DEC_BYTE | DEC_REP),
            EdiDxOpSizeRep => (decode_edi_dx, DEC_OPERATION_OP_SIZE | DEC_REP),
            DxEsiByteRep => (decode_dx_esi, DEC_BYTE | DEC_REP),
            DxEsiOpSizeRep => (decode_dx_esi, DEC_OPERATION_OP_SIZE | DEC_REP),
            RelImmByteDef64 => (decode_rel_imm, DEC_BYTE | DEC_DEFAULT_TO_64BIT),
            RelImmVDef64 => (decode_rel_imm, DEC_DEFAULT_TO_64BIT),
            RelImmByteAddrSizeDef64 => {
                (decode_rel_imm_addr_size, DEC_BYTE | DEC_DEFAULT_TO_64BIT)
            }
            GroupRmByteLock => (decode_group_rm, DEC_BYTE | DEC_LOCK),
            GroupRm0 => (decode_group_rm, DEC_REG_RM_NO_SIZE),
            GroupRmImmByte => (decode_group_rm_imm, DEC_BYTE),
            GroupRmImmByteLock => (decode_group_rm_imm, DEC_BYTE | DEC_LOCK),
            GroupRmImmByteNo64Lock => {
                (decode_group_rm_imm, DEC_BYTE | DEC_INVALID_IN_64BIT | DEC_LOCK)
            }
            GroupRmImm8V => (decode_group_rm_imm8v, 0),
            GroupRmImmV => (decode_group_rm_imm, 0),
            GroupRmImmVLock => (decode_group_rm_imm, DEC_LOCK),
            GroupRmImmSxVLock => (decode_group_rm_imm, DEC_IMM_SX | DEC_LOCK),
            GroupRmOneByte => (decode_group_rm_one, DEC_BYTE),
            GroupRmOneV => (decode_group_rm_one, 0),
            GroupRmClByte => (decode_group_rm_cl, DEC_BYTE),
            GroupRmClV => (decode_group_rm_cl, 0),
            GroupF6 => (decode_group_f6_f7, DEC_BYTE | DEC_LOCK),
            GroupF7 => (decode_group_f6_f7, DEC_LOCK),
            GroupFf => (decode_group_ff, DEC_LOCK),
            Group0f00 => (decode_group_0f00, 0),
            Group0f01 => (decode_group_0f01, 0),
            Group0fae => (decode_group_0fae, 0),
            Popcnt0fb8 => (decode_0fb8, 0),
            RmSregV => (decode_rm_sreg_v, 0),
            SregRmV => (decode_rm_sreg_v, DEC_FLIP_OPERANDS),
            RmByte => (decode_rm8, 0),
            RmVDef64 => (decode_rm_v, DEC_DEFAULT_TO_64BIT),
            FarImmNo64 => (decode_far_imm, DEC_INVALID_IN_64BIT),
            EaxAddrByte => (decode_eax_addr, DEC_BYTE),
            EaxAddrV => (decode_eax_addr, 0),
            AddrEaxByte => (decode_eax_addr, DEC_BYTE | DEC_FLIP_OPERANDS),
            AddrEaxV => (decode_eax_addr, DEC_FLIP_OPERANDS),
            EdiEsiByteRep => (decode_edi_esi, DEC_BYTE | DEC_REP),
            EdiEsiOpSizeRep => (decode_edi_esi, DEC_OPERATION_OP_SIZE | DEC_REP),
            EsiEdiByteRepC => (decode_edi_esi, DEC_BYTE | DEC_FLIP_OPERANDS | DEC_REP_COND),
            EsiEdiOpSizeRepC => {
                (decode_edi_esi, DEC_FLIP_OPERANDS | DEC_OPERATION_OP_SIZE | DEC_REP_COND)
            }
            EdiEaxByteRep => (decode_edi_eax, DEC_BYTE | DEC_REP),
            EdiEaxOpSizeRep => (decode_edi_eax, DEC_OPERATION_OP_SIZE | DEC_REP),
            EaxEsiByteRep => (decode_eax_esi, DEC_BYTE | DEC_REP),
            EaxEsiOpSizeRep => (decode_eax_esi, DEC_OPERATION_OP_SIZE | DEC_REP),
            EaxEdiByteRepC => (decode_edi_eax, DEC_BYTE | DEC_FLIP_OPERANDS | DEC_REP_COND),
            EaxEdiOpSizeRepC => {
                (decode_edi_eax, DEC_FLIP_OPERANDS | DEC_OPERATION_OP_SIZE | DEC_REP_COND)
            }
            AlEbxAl => (decode_al_ebx_al, 0),
            EaxImm8Byte => (decode_eax_imm8, DEC_BYTE),
            EaxImm8V => (decode_eax_imm8, 0),
            Imm8EaxByte => (decode_eax_imm8, DEC_BYTE | DEC_FLIP_OPERANDS),
            Imm8EaxV => (decode_eax_imm8, DEC_FLIP_OPERANDS),
            EaxDxByte => (decode_eax_dx, DEC_BYTE),
            EaxDxV => (decode_eax_dx, 0),
            DxEaxByte => (decode_eax_dx, DEC_BYTE | DEC_FLIP_OPERANDS),
            DxEaxV => (decode_eax_dx, DEC_FLIP_OPERANDS),
            ThreeDNow => (decode_3dnow, 0),
            SseTable => (decode_sse_table, 0),
            SseTableFlip => (decode_sse_table, DEC_FLIP_OPERANDS),
            SseTableImm8 => (decode_sse_table_imm8, 0),
            SseTableIncOp64 => (decode_sse_table, DEC_INC_OPERATION_FOR_64),
            SseTableIncOp64Flip => {
                (decode_sse_table, DEC_INC_OPERATION_FOR_64 | DEC_FLIP_OPERANDS)
            }
            SseTableMem8 => (decode_sse_table_mem8, 0),
            SseTableMem8Flip => (decode_sse_table_mem8, DEC_FLIP_OPERANDS),
            Sse => (decode_sse, 0),
            SseSingle => (decode_sse_single, 0),
            SsePacked => (decode_sse_packed, 0),
            Mmx => (decode_mmx, 0),
            MmxSseOnly => (decode_mmx_sse_only, 0),
            MmxGroup => (decode_mmx_group, 0),
            Pinsrw => (decode_pinsrw, 0),
            RegCr => (decode_reg_cr, DEC_DEFAULT_TO_64BIT | DEC_LOCK),
            CrReg => (decode_reg_cr, DEC_FLIP_OPERANDS | DEC_DEFAULT_TO_64BIT | DEC_LOCK),
            MovSxZx8 => (decode_mov_sx_zx_8, 0),
            MovSxZx16 => (decode_mov_sx_zx_16, 0),
            Mem16 => (decode_mem16, 0),
            Mem32 => (decode_mem32, 0),
            Mem64 => (decode_mem64, 0),
            Mem80 => (decode_mem80, 0),
            MemFloatEnv => (decode_mem_float_env, 0),
            MemFloatSave => (decode_mem_float_save, 0),
            FpuReg => (decode_fpu_reg, 0),
            St0FpuReg => (decode_fpu_reg_st0, DEC_FLIP_OPERANDS),
            FpuRegSt0 => (decode_fpu_reg_st0, 0),
            RegGroupNoOperands => (decode_reg_group_no_operands, 0),
            RegGroupAx => (decode_reg_group_ax, 0),
            Cmpxch8b => (decode_cmpxch8b, DEC_LOCK),
            MovNti => (decode_mov_nti, 0),
            Crc32Byte => (decode_crc32, DEC_BYTE),
            Crc32V => (decode_crc32, 0),
            Arpl => (decode_arpl, 0),
        }
    }
}

const fn o(m: &'static str, e: Enc) -> Entry {
    Entry(Op::O(m), e)
}

const fn s(list: &'static [&'static str], e: Enc) -> Entry {
    Entry(Op::Sized(list), e)
}

const fn n(i: usize, e: Enc) -> Entry {
    Entry(Op::N(i), e)
}

const fn r(set: &'static [&'static str; 16], e: Enc) -> Entry {
    Entry(Op::Regs(set), e)
}

const fn none() -> Entry {
    Entry(Op::None, Enc::Invalid)
}

pub(super) static REG8: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];
pub(super) static REG8_REX: [&str; 16] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
    "r13b", "r14b", "r15b",
];
pub(super) static REG16: [&str; 16] = [
    "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w", "r13w",
    "r14w", "r15w",
];
pub(super) static REG32: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];
pub(super) static REG64: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];
pub(super) static MMX_REGS: [&str; 16] = [
    "mm0", "mm1", "mm2", "mm3", "mm4", "mm5", "mm6", "mm7", "mm0", "mm1", "mm2", "mm3", "mm4",
    "mm5", "mm6", "mm7",
];
pub(super) static XMM_REGS: [&str; 16] = [
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
    "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
];
pub(super) static FPU_REGS: [&str; 16] = [
    "st0", "st1", "st2", "st3", "st4", "st5", "st6", "st7", "st0", "st1", "st2", "st3", "st4",
    "st5", "st6", "st7",
];
pub(super) static CONTROL_REGS: [&str; 16] = [
    "cr0", "cr1", "cr2", "cr3", "cr4", "cr5", "cr6", "cr7", "cr8", "cr9", "cr10", "cr11", "cr12",
    "cr13", "cr14", "cr15",
];
pub(super) static DEBUG_REGS: [&str; 16] = [
    "dr0", "dr1", "dr2", "dr3", "dr4", "dr5", "dr6", "dr7", "dr8", "dr9", "dr10", "dr11", "dr12",
    "dr13", "dr14", "dr15",
];
pub(super) static TEST_REGS: [&str; 16] = [
    "tr0", "tr1", "tr2", "tr3", "tr4", "tr5", "tr6", "tr7", "tr8", "tr9", "tr10", "tr11", "tr12",
    "tr13", "tr14", "tr15",
];

/// 16-bit ModR/M memory forms: base, index, default segment. Index 8 is the
/// mod 0 / rm 6 absolute form.
pub(super) static RM16_COMPONENTS: [(Option<&str>, Option<&str>, &str); 9] = [
    (Some("bx"), Some("si"), "ds"),
    (Some("bx"), Some("di"), "ds"),
    (Some("bp"), Some("si"), "ss"),
    (Some("bp"), Some("di"), "ss"),
    (Some("si"), None, "ds"),
    (Some("di"), None, "ds"),
    (Some("bp"), None, "ss"),
    (Some("bx"), None, "ds"),
    (None, None, "ds"),
];

pub(super) static MAIN_OPCODE_MAP: [Entry; 256] = [
    o("add", Enc::RmReg8Lock), o("add", Enc::RmRegVLock), o("add", Enc::RegRm8), o("add", Enc::RegRmV), // 0x00
    o("add", Enc::EaxImmByte), o("add", Enc::EaxImmV), o("push", Enc::PushPopSeg), o("pop", Enc::PushPopSeg), // 0x04
    o("or", Enc::RmReg8Lock), o("or", Enc::RmRegVLock), o("or", Enc::RegRm8), o("or", Enc::RegRmV), // 0x08
    o("or", Enc::EaxImmByte), o("or", Enc::EaxImmV), o("push", Enc::PushPopSeg), Entry(Op::None, Enc::TwoByte), // 0x0c
    o("adc", Enc::RmReg8Lock), o("adc", Enc::RmRegVLock), o("adc", Enc::RegRm8), o("adc", Enc::RegRmV), // 0x10
    o("adc", Enc::EaxImmByte), o("adc", Enc::EaxImmV), o("push", Enc::PushPopSeg), o("pop", Enc::PushPopSeg), // 0x14
    o("sbb", Enc::RmReg8Lock), o("sbb", Enc::RmRegVLock), o("sbb", Enc::RegRm8), o("sbb", Enc::RegRmV), // 0x18
    o("sbb", Enc::EaxImmByte), o("sbb", Enc::EaxImmV), o("push", Enc::PushPopSeg), o("pop", Enc::PushPopSeg), // 0x1c
    o("and", Enc::RmReg8Lock), o("and", Enc::RmRegVLock), o("and", Enc::RegRm8), o("and", Enc::RegRmV), // 0x20
    o("and", Enc::EaxImmByte), o("and", Enc::EaxImmV), none(), o("daa", Enc::NoOperands), // 0x24
    o("sub", Enc::RmReg8Lock), o("sub", Enc::RmRegVLock), o("sub", Enc::RegRm8), o("sub", Enc::RegRmV), // 0x28
    o("sub", Enc::EaxImmByte), o("sub", Enc::EaxImmV), none(), o("das", Enc::NoOperands), // 0x2c
    o("xor", Enc::RmReg8Lock), o("xor", Enc::RmRegVLock), o("xor", Enc::RegRm8), o("xor", Enc::RegRmV), // 0x30
    o("xor", Enc::EaxImmByte), o("xor", Enc::EaxImmV), none(), o("aaa", Enc::NoOperands), // 0x34
    o("cmp", Enc::RmReg8), o("cmp", Enc::RmRegV), o("cmp", Enc::RegRm8), o("cmp", Enc::RegRmV), // 0x38
    o("cmp", Enc::EaxImmByte), o("cmp", Enc::EaxImmV), none(), o("aas", Enc::NoOperands), // 0x3c
    o("inc", Enc::OpRegV), o("inc", Enc::OpRegV), o("inc", Enc::OpRegV), o("inc", Enc::OpRegV), // 0x40
    o("inc", Enc::OpRegV), o("inc", Enc::OpRegV), o("inc", Enc::OpRegV), o("inc", Enc::OpRegV), // 0x44
    o("dec", Enc::OpRegV), o("dec", Enc::OpRegV), o("dec", Enc::OpRegV), o("dec", Enc::OpRegV), // 0x48
    o("dec", Enc::OpRegV), o("dec", Enc::OpRegV), o("dec", Enc::OpRegV), o("dec", Enc::OpRegV), // 0x4c
    o("push", Enc::OpRegVDef64), o("push", Enc::OpRegVDef64), o("push", Enc::OpRegVDef64), o("push", Enc::OpRegVDef64), // 0x50
    o("push", Enc::OpRegVDef64), o("push", Enc::OpRegVDef64), o("push", Enc::OpRegVDef64), o("push", Enc::OpRegVDef64), // 0x54
    o("pop", Enc::OpRegVDef64), o("pop", Enc::OpRegVDef64), o("pop", Enc::OpRegVDef64), o("pop", Enc::OpRegVDef64), // 0x58
    o("pop", Enc::OpRegVDef64), o("pop", Enc::OpRegVDef64), o("pop", Enc::OpRegVDef64), o("pop", Enc::OpRegVDef64), // 0x5c
    s(&["pusha", "pushad"], Enc::OpSizeNo64), s(&["popa", "popad"], Enc::OpSizeNo64), o("bound", Enc::RegRm2xV), o("arpl", Enc::Arpl), // 0x60
    none(), none(), none(), none(), // 0x64
    o("push", Enc::ImmVDef64), o("imul", Enc::RegRmImmV), o("push", Enc::ImmSxVDef64), o("imul", Enc::RegRmImmSxV), // 0x68
    o("insb", Enc::EdiDxByteRep), s(&["insw", "insd"], Enc::EdiDxOpSizeRep), o("outsb", Enc::DxEsiByteRep), s(&["outsw", "outsd"], Enc::DxEsiOpSizeRep), // 0x6c
    o("jo", Enc::RelImmByteDef64), o("jno", Enc::RelImmByteDef64), o("jb", Enc::RelImmByteDef64), o("jae", Enc::RelImmByteDef64), // 0x70
    o("je", Enc::RelImmByteDef64), o("jne", Enc::RelImmByteDef64), o("jbe", Enc::RelImmByteDef64), o("ja", Enc::RelImmByteDef64), // 0x74
    o("js", Enc::RelImmByteDef64), o("jns", Enc::RelImmByteDef64), o("jpe", Enc::RelImmByteDef64), o("jpo", Enc::RelImmByteDef64), // 0x78
    o("jl", Enc::RelImmByteDef64), o("jge", Enc::RelImmByteDef64), o("jle", Enc::RelImmByteDef64), o("jg", Enc::RelImmByteDef64), // 0x7c
    n(0, Enc::GroupRmImmByteLock), n(0, Enc::GroupRmImmVLock), n(0, Enc::GroupRmImmByteNo64Lock), n(0, Enc::GroupRmImmSxVLock), // 0x80
    o("test", Enc::RmReg8), o("test", Enc::RmRegV), o("xchg", Enc::RmReg8Lock), o("xchg", Enc::RmRegVLock), // 0x84
    o("mov", Enc::RmReg8), o("mov", Enc::RmRegV), o("mov", Enc::RegRm8), o("mov", Enc::RegRmV), // 0x88
    o("mov", Enc::RmSregV), o("lea", Enc::RegRm0), o("mov", Enc::SregRmV), o("pop", Enc::RmVDef64), // 0x8c
    o("nop", Enc::Nop), o("xchg", Enc::EaxOpRegV), o("xchg", Enc::EaxOpRegV), o("xchg", Enc::EaxOpRegV), // 0x90
    o("xchg", Enc::EaxOpRegV), o("xchg", Enc::EaxOpRegV), o("xchg", Enc::EaxOpRegV), o("xchg", Enc::EaxOpRegV), // 0x94
    s(&["cbw", "cwde", "cdqe"], Enc::OpSize), s(&["cwd", "cdq", "cqo"], Enc::OpSize), o("callf", Enc::FarImmNo64), o("fwait", Enc::NoOperands), // 0x98
    s(&["pushf", "pushfd", "pushfq"], Enc::OpSizeDef64), s(&["popf", "popfd", "popfq"], Enc::OpSizeDef64), o("sahf", Enc::NoOperands), o("lahf", Enc::NoOperands), // 0x9c
    o("mov", Enc::EaxAddrByte), o("mov", Enc::EaxAddrV), o("mov", Enc::AddrEaxByte), o("mov", Enc::AddrEaxV), // 0xa0
    o("movsb", Enc::EdiEsiByteRep), s(&["movsw", "movsd", "movsq"], Enc::EdiEsiOpSizeRep), o("cmpsb", Enc::EsiEdiByteRepC), s(&["cmpsw", "cmpsd", "cmpsq"], Enc::EsiEdiOpSizeRepC), // 0xa4
    o("test", Enc::EaxImmByte), o("test", Enc::EaxImmV), o("stosb", Enc::EdiEaxByteRep), s(&["stosw", "stosd", "stosq"], Enc::EdiEaxOpSizeRep), // 0xa8
    o("lodsb", Enc::EaxEsiByteRep), s(&["lodsw", "lodsd", "lodsq"], Enc::EaxEsiOpSizeRep), o("scasb", Enc::EaxEdiByteRepC), s(&["scasw", "scasd", "scasq"], Enc::EaxEdiOpSizeRepC), // 0xac
    o("mov", Enc::OpRegImmByte), o("mov", Enc::OpRegImmByte), o("mov", Enc::OpRegImmByte), o("mov", Enc::OpRegImmByte), // 0xb0
    o("mov", Enc::OpRegImmByte), o("mov", Enc::OpRegImmByte), o("mov", Enc::OpRegImmByte), o("mov", Enc::OpRegImmByte), // 0xb4
    o("mov", Enc::OpRegImmV), o("mov", Enc::OpRegImmV), o("mov", Enc::OpRegImmV), o("mov", Enc::OpRegImmV), // 0xb8
    o("mov", Enc::OpRegImmV), o("mov", Enc::OpRegImmV), o("mov", Enc::OpRegImmV), o("mov", Enc::OpRegImmV), // 0xbc
    n(1, Enc::GroupRmImmByte), n(1, Enc::GroupRmImm8V), o("retn", Enc::Imm16), o("retn", Enc::NoOperands), // 0xc0
    o("les", Enc::RegRmF), o("lds", Enc::RegRmF), n(2, Enc::GroupRmImmByte), n(2, Enc::GroupRmImmV), // 0xc4
    o("enter", Enc::Imm16Imm8), o("leave", Enc::NoOperands), o("retf", Enc::Imm16), o("retf", Enc::NoOperands), // 0xc8
    o("int3", Enc::NoOperands), o("int", Enc::ImmByte), o("into", Enc::NoOperands), o("iret", Enc::NoOperands), // 0xcc
    n(1, Enc::GroupRmOneByte), n(1, Enc::GroupRmOneV), n(1, Enc::GroupRmClByte), n(1, Enc::GroupRmClV), // 0xd0
    o("aam", Enc::ImmByte), o("aad", Enc::ImmByte), o("salc", Enc::NoOperands), o("xlat", Enc::AlEbxAl), // 0xd4
    n(0, Enc::Fpu), n(1, Enc::Fpu), n(2, Enc::Fpu), n(3, Enc::Fpu), // 0xd8
    n(4, Enc::Fpu), n(5, Enc::Fpu), n(6, Enc::Fpu), n(7, Enc::Fpu), // 0xdc
    o("loopne", Enc::RelImmByteDef64), o("loope", Enc::RelImmByteDef64), o("loop", Enc::RelImmByteDef64), s(&["jcxz", "jecxz", "jrcxz"], Enc::RelImmByteAddrSizeDef64), // 0xe0
    o("in", Enc::EaxImm8Byte), o("in", Enc::EaxImm8V), o("out", Enc::Imm8EaxByte), o("out", Enc::Imm8EaxV), // 0xe4
    o("calln", Enc::RelImmVDef64), o("jmpn", Enc::RelImmVDef64), o("jmpf", Enc::FarImmNo64), o("jmpn", Enc::RelImmByteDef64), // 0xe8
    o("in", Enc::EaxDxByte), o("in", Enc::EaxDxV), o("out", Enc::DxEaxByte), o("out", Enc::DxEaxV), // 0xec
    none(), o("int1", Enc::NoOperands), none(), none(), // 0xf0
    o("hlt", Enc::NoOperands), o("cmc", Enc::NoOperands), n(3, Enc::GroupF6), n(3, Enc::GroupF7), // 0xf4
    o("clc", Enc::NoOperands), o("stc", Enc::NoOperands), o("cli", Enc::NoOperands), o("sti", Enc::NoOperands), // 0xf8
    o("cld", Enc::NoOperands), o("std", Enc::NoOperands), n(4, Enc::GroupRmByteLock), n(5, Enc::GroupFf), // 0xfc
];

pub(super) static TWO_BYTE_OPCODE_MAP: [Entry; 256] = [
    n(6, Enc::Group0f00), n(7, Enc::Group0f01), o("lar", Enc::RegRmV), o("lsl", Enc::RegRmV), // 0x00
    none(), o("syscall", Enc::NoOperands), o("clts", Enc::NoOperands), o("sysret", Enc::NoOperands), // 0x04
    o("invd", Enc::NoOperands), o("wbinvd", Enc::NoOperands), none(), o("ud2", Enc::NoOperands), // 0x08
    none(), n(8, Enc::GroupRm0), o("femms", Enc::NoOperands), n(0, Enc::ThreeDNow), // 0x0c
    n(0, Enc::SseTable), n(0, Enc::SseTableFlip), n(1, Enc::SseTable), n(2, Enc::SseTableFlip), // 0x10
    n(3, Enc::SseTable), n(4, Enc::SseTable), n(5, Enc::SseTable), n(6, Enc::SseTableFlip), // 0x14
    n(9, Enc::GroupRm0), n(10, Enc::GroupRm0), n(10, Enc::GroupRm0), n(10, Enc::GroupRm0), // 0x18
    n(10, Enc::GroupRm0), n(10, Enc::GroupRm0), n(10, Enc::GroupRm0), n(10, Enc::GroupRm0), // 0x1c
    r(&CONTROL_REGS, Enc::RegCr), r(&DEBUG_REGS, Enc::RegCr), r(&CONTROL_REGS, Enc::CrReg), r(&DEBUG_REGS, Enc::CrReg), // 0x20
    r(&TEST_REGS, Enc::RegCr), none(), r(&TEST_REGS, Enc::CrReg), none(), // 0x24
    n(7, Enc::SseTable), n(7, Enc::SseTableFlip), n(8, Enc::SseTable), n(9, Enc::SseTableFlip), // 0x28
    n(10, Enc::SseTable), n(11, Enc::SseTable), n(12, Enc::SseTable), n(13, Enc::SseTable), // 0x2c
    o("wrmsr", Enc::NoOperands), o("rdtsc", Enc::NoOperands), o("rdmsr", Enc::NoOperands), o("rdpmc", Enc::NoOperands), // 0x30
    o("sysenter", Enc::NoOperands), o("sysexit", Enc::NoOperands), none(), o("getsec", Enc::NoOperands), // 0x34
    none(), none(), none(), none(), // 0x38
    none(), none(), none(), none(), // 0x3c
    o("cmovo", Enc::RegRmV), o("cmovno", Enc::RegRmV), o("cmovb", Enc::RegRmV), o("cmovae", Enc::RegRmV), // 0x40
    o("cmove", Enc::RegRmV), o("cmovne", Enc::RegRmV), o("cmovbe", Enc::RegRmV), o("cmova", Enc::RegRmV), // 0x44
    o("cmovs", Enc::RegRmV), o("cmovns", Enc::RegRmV), o("cmovpe", Enc::RegRmV), o("cmovpo", Enc::RegRmV), // 0x48
    o("cmovl", Enc::RegRmV), o("cmovge", Enc::RegRmV), o("cmovle", Enc::RegRmV), o("cmovg", Enc::RegRmV), // 0x4c
    n(14, Enc::SseTable), s(&["sqrtps", "sqrtpd", "sqrtsd", "sqrtss"], Enc::Sse), s(&["rsqrtps", "rsqrtss"], Enc::SseSingle), s(&["rcpps", "rcpss"], Enc::SseSingle), // 0x50
    s(&["andps", "andpd"], Enc::SsePacked), s(&["andnps", "andnpd"], Enc::SsePacked), s(&["orps", "orpd"], Enc::SsePacked), s(&["xorps", "xorpd"], Enc::SsePacked), // 0x54
    s(&["addps", "addpd", "addsd", "addss"], Enc::Sse), s(&["mulps", "mulpd", "mulsd", "mulss"], Enc::Sse), n(15, Enc::SseTable), n(16, Enc::SseTable), // 0x58
    s(&["subps", "subpd", "subsd", "subss"], Enc::Sse), s(&["minps", "minpd", "minsd", "minss"], Enc::Sse), s(&["divps", "divpd", "divsd", "divss"], Enc::Sse), s(&["maxps", "maxpd", "maxsd", "maxss"], Enc::Sse), // 0x5c
    n(17, Enc::SseTable), n(18, Enc::SseTable), n(19, Enc::SseTable), o("packsswb", Enc::Mmx), // 0x60
    o("pcmpgtb", Enc::Mmx), o("pcmpgtw", Enc::Mmx), o("pcmpgtd", Enc::Mmx), o("packuswb", Enc::Mmx), // 0x64
    o("punpckhbw", Enc::Mmx), o("punpckhwd", Enc::Mmx), o("punpckhdq", Enc::Mmx), o("packssdw", Enc::Mmx), // 0x68
    o("punpcklqdq", Enc::MmxSseOnly), o("punpckhqdq", Enc::MmxSseOnly), n(20, Enc::SseTableIncOp64), n(21, Enc::SseTable), // 0x6c
    n(22, Enc::SseTableImm8), n(0, Enc::MmxGroup), n(1, Enc::MmxGroup), n(2, Enc::MmxGroup), // 0x70
    o("pcmpeqb", Enc::Mmx), o("pcmpeqw", Enc::Mmx), o("pcmpeqd", Enc::Mmx), o("emms", Enc::NoOperands), // 0x74
    o("vmread", Enc::RmRegDef64), o("vmwrite", Enc::RmRegDef64), none(), none(), // 0x78
    n(23, Enc::SseTable), n(24, Enc::SseTable), n(25, Enc::SseTableIncOp64Flip), n(21, Enc::SseTableFlip), // 0x7c
    o("jo", Enc::RelImmVDef64), o("jno", Enc::RelImmVDef64), o("jb", Enc::RelImmVDef64), o("jae", Enc::RelImmVDef64), // 0x80
    o("je", Enc::RelImmVDef64), o("jne", Enc::RelImmVDef64), o("jbe", Enc::RelImmVDef64), o("ja", Enc::RelImmVDef64), // 0x84
    o("js", Enc::RelImmVDef64), o("jns", Enc::RelImmVDef64), o("jpe", Enc::RelImmVDef64), o("jpo", Enc::RelImmVDef64), // 0x88
    o("jl", Enc::RelImmVDef64), o("jge", Enc::RelImmVDef64), o("jle", Enc::RelImmVDef64), o("jg", Enc::RelImmVDef64), // 0x8c
    o("seto", Enc::RmByte), o("setno", Enc::RmByte), o("setb", Enc::RmByte), o("setae", Enc::RmByte), // 0x90
    o("sete", Enc::RmByte), o("setne", Enc::RmByte), o("setbe", Enc::RmByte), o("seta", Enc::RmByte), // 0x94
    o("sets", Enc::RmByte), o("setns", Enc::RmByte), o("setpe", Enc::RmByte), o("setpo", Enc::RmByte), // 0x98
    o("setl", Enc::RmByte), o("setge", Enc::RmByte), o("setle", Enc::RmByte), o("setg", Enc::RmByte), // 0x9c
    o("push", Enc::PushPopSeg), o("pop", Enc::PushPopSeg), o("cpuid", Enc::NoOperands), o("bt", Enc::RmRegV), // 0xa0
    o("shld", Enc::RmRegImm8V), o("shld", Enc::RmRegClV), none(), none(), // 0xa4
    o("push", Enc::PushPopSeg), o("pop", Enc::PushPopSeg), o("rsm", Enc::NoOperands), o("bts", Enc::RmRegVLock), // 0xa8
    o("shrd", Enc::RmRegImm8V), o("shrd", Enc::RmRegClV), n(24, Enc::Group0fae), o("imul", Enc::RegRmV), // 0xac
    o("cmpxchg", Enc::RmReg8Lock), o("cmpxchg", Enc::RmRegVLock), o("lss", Enc::RegRmF), o("btr", Enc::RmRegVLock), // 0xb0
    o("lfs", Enc::RegRmF), o("lgs", Enc::RegRmF), o("movzx", Enc::MovSxZx8), o("movzx", Enc::MovSxZx16), // 0xb4
    o("popcnt", Enc::Popcnt0fb8), none(), n(11, Enc::GroupRmImm8V), o("btc", Enc::RmRegVLock), // 0xb8
    o("bsf", Enc::RegRmV), o("bsr", Enc::RegRmV), o("movsx", Enc::MovSxZx8), o("movsx", Enc::MovSxZx16), // 0xbc
    o("xadd", Enc::RmReg8Lock), o("xadd", Enc::RmRegVLock), n(26, Enc::SseTableImm8), o("movnti", Enc::MovNti), // 0xc0
    n(27, Enc::Pinsrw), n(28, Enc::SseTableImm8), n(29, Enc::SseTableImm8), o("cmpxch8b", Enc::Cmpxch8b), // 0xc4
    o("bswap", Enc::OpRegV), o("bswap", Enc::OpRegV), o("bswap", Enc::OpRegV), o("bswap", Enc::OpRegV), // 0xc8
    o("bswap", Enc::OpRegV), o("bswap", Enc::OpRegV), o("bswap", Enc::OpRegV), o("bswap", Enc::OpRegV), // 0xcc
    n(30, Enc::SseTable), o("psrlw", Enc::Mmx), o("psrld", Enc::Mmx), o("psrlq", Enc::Mmx), // 0xd0
    o("paddq", Enc::Mmx), o("pmullw", Enc::Mmx), n(31, Enc::SseTable), n(32, Enc::SseTable), // 0xd4
    o("psubusb", Enc::Mmx), o("psubusw", Enc::Mmx), o("pminub", Enc::Mmx), o("pand", Enc::Mmx), // 0xd8
    o("paddusb", Enc::Mmx), o("paddusw", Enc::Mmx), o("pmaxub", Enc::Mmx), o("pandn", Enc::Mmx), // 0xdc
    o("pavgb", Enc::Mmx), o("psraw", Enc::Mmx), o("psrad", Enc::Mmx), o("pavgw", Enc::Mmx), // 0xe0
    o("pmulhuw", Enc::Mmx), o("pmulhw", Enc::Mmx), n(33, Enc::SseTable), n(34, Enc::SseTableFlip), // 0xe4
    o("psubsb", Enc::Mmx), o("psubsw", Enc::Mmx), o("pminsw", Enc::Mmx), o("por", Enc::Mmx), // 0xe8
    o("paddsb", Enc::Mmx), o("paddsw", Enc::Mmx), o("pmaxsw", Enc::Mmx), o("pxor", Enc::Mmx), // 0xec
    n(35, Enc::SseTable), o("psllw", Enc::Mmx), o("pslld", Enc::Mmx), o("psllq", Enc::Mmx), // 0xf0
    o("pmuludq", Enc::Mmx), o("pmaddwd", Enc::Mmx), o("psadbw", Enc::Mmx), n(36, Enc::SseTable), // 0xf4
    o("psubb", Enc::Mmx), o("psubw", Enc::Mmx), o("psubd", Enc::Mmx), o("psubq", Enc::Mmx), // 0xf8
    o("paddb", Enc::Mmx), o("paddw", Enc::Mmx), o("paddd", Enc::Mmx), o("ud", Enc::NoOperands), // 0xfc
];

pub(super) static THREE_BYTE_0F38_MAP: [(u8, Entry); 48] = [
    (0x00, o("pshufb", Enc::Mmx)), (0x01, o("phaddw", Enc::Mmx)), (0x02, o("phaddd", Enc::Mmx)),
    (0x03, o("phaddsw", Enc::Mmx)), (0x04, o("pmaddubsw", Enc::Mmx)), (0x05, o("phsubw", Enc::Mmx)),
    (0x06, o("phsubd", Enc::Mmx)), (0x07, o("phsubsw", Enc::Mmx)), (0x08, o("psignb", Enc::Mmx)),
    (0x09, o("psignw", Enc::Mmx)), (0x0a, o("psignd", Enc::Mmx)), (0x0b, o("pmulhrsw", Enc::Mmx)),
    (0x10, o("pblendvb", Enc::MmxSseOnly)), (0x14, o("blendvps", Enc::MmxSseOnly)),
    (0x15, o("blendvpd", Enc::MmxSseOnly)), (0x17, o("ptest", Enc::MmxSseOnly)),
    (0x1c, o("pabsb", Enc::Mmx)), (0x1d, o("pabsw", Enc::Mmx)), (0x1e, o("pabsd", Enc::Mmx)),
    (0x20, n(37, Enc::SseTable)), (0x21, n(38, Enc::SseTable)), (0x22, n(39, Enc::SseTable)),
    (0x23, n(40, Enc::SseTable)), (0x24, n(41, Enc::SseTable)), (0x25, n(42, Enc::SseTable)),
    (0x28, o("pmuldq", Enc::MmxSseOnly)), (0x29, o("pcmpeqq", Enc::MmxSseOnly)),
    (0x2a, n(43, Enc::SseTable)), (0x2b, o("packusdw", Enc::MmxSseOnly)),
    (0x30, n(44, Enc::SseTable)), (0x31, n(45, Enc::SseTable)), (0x32, n(46, Enc::SseTable)),
    (0x33, n(47, Enc::SseTable)), (0x34, n(48, Enc::SseTable)), (0x35, n(49, Enc::SseTable)),
    (0x37, o("pcmpgtq", Enc::MmxSseOnly)), (0x38, o("pminsb", Enc::MmxSseOnly)),
    (0x39, o("pminsd", Enc::MmxSseOnly)), (0x3a, o("pminuw", Enc::MmxSseOnly)),
    (0x3b, o("pminud", Enc::MmxSseOnly)), (0x3c, o("pmaxsb", Enc::MmxSseOnly)),
    (0x3d, o("pmaxsd", Enc::MmxSseOnly)), (0x3e, o("pmaxuw", Enc::MmxSseOnly)),
    (0x3f, o("pmaxud", Enc::MmxSseOnly)), (0x40, o("pmulld", Enc::MmxSseOnly)),
    (0x41, o("phminposuw", Enc::MmxSseOnly)), (0xf0, o("crc32", Enc::Crc32Byte)),
    (0xf1, o("crc32", Enc::Crc32V)),
];

pub(super) static THREE_BYTE_0F3A_MAP: [(u8, Entry); 22] = [
    (0x08, o("roundps", Enc::MmxSseOnly)), (0x09, o("roundpd", Enc::MmxSseOnly)),
    (0x0a, n(50, Enc::SseTable)), (0x0b, n(51, Enc::SseTable)),
    (0x0c, o("blendps", Enc::MmxSseOnly)), (0x0d, o("blendpd", Enc::MmxSseOnly)),
    (0x0e, o("pblendw", Enc::MmxSseOnly)), (0x0f, o("palignr", Enc::Mmx)),
    (0x14, n(52, Enc::SseTableMem8Flip)), (0x15, n(53, Enc::SseTable)),
    (0x16, n(54, Enc::SseTableIncOp64Flip)), (0x17, n(55, Enc::SseTableFlip)),
    (0x20, n(56, Enc::SseTableMem8)), (0x21, n(57, Enc::SseTable)),
    (0x22, n(58, Enc::SseTableIncOp64)), (0x40, o("dpps", Enc::MmxSseOnly)),
    (0x41, o("dppd", Enc::MmxSseOnly)), (0x42, o("mpsadbw", Enc::MmxSseOnly)),
    (0x60, o("pcmpestrm", Enc::MmxSseOnly)), (0x61, o("pcmpestri", Enc::MmxSseOnly)),
    (0x62, o("pcmpistrm", Enc::MmxSseOnly)), (0x63, o("pcmpistri", Enc::MmxSseOnly)),
];

pub(super) static FPU_MEM_OPCODE_MAP: [[Entry; 8]; 8] = [
    [ // 0xd8
        o("fadd", Enc::Mem32), o("fmul", Enc::Mem32), o("fcom", Enc::Mem32), o("fcomp", Enc::Mem32),
        o("fsub", Enc::Mem32), o("fsubr", Enc::Mem32), o("fdiv", Enc::Mem32), o("fdivr", Enc::Mem32),
    ],
    [ // 0xd9
        o("fld", Enc::Mem32), none(), o("fst", Enc::Mem32), o("fstp", Enc::Mem32),
        o("fldenv", Enc::MemFloatEnv), o("fldcw", Enc::Mem16), o("fstenv", Enc::MemFloatEnv), o("fstcw", Enc::Mem16),
    ],
    [ // 0xda
        o("fiadd", Enc::Mem32), o("fimul", Enc::Mem32), o("ficom", Enc::Mem32), o("ficomp", Enc::Mem32),
        o("fisub", Enc::Mem32), o("fisubr", Enc::Mem32), o("fidiv", Enc::Mem32), o("fidivr", Enc::Mem32),
    ],
    [ // 0xdb
        o("fild", Enc::Mem32), o("fisttp", Enc::Mem32), o("fist", Enc::Mem32), o("fistp", Enc::Mem32),
        none(), o("fld", Enc::Mem80), none(), o("fstp", Enc::Mem80),
    ],
    [ // 0xdc
        o("fadd", Enc::Mem64), o("fmul", Enc::Mem64), o("fcom", Enc::Mem64), o("fcomp", Enc::Mem64),
        o("fsub", Enc::Mem64), o("fsubr", Enc::Mem64), o("fdiv", Enc::Mem64), o("fdivr", Enc::Mem64),
    ],
    [ // 0xdd
        o("fld", Enc::Mem64), o("fisttp", Enc::Mem64), o("fst", Enc::Mem64), o("fstp", Enc::Mem64),
        o("frstor", Enc::MemFloatSave), none(), o("fsave", Enc::MemFloatSave), o("fstsw", Enc::Mem16),
    ],
    [ // 0xde
        o("fiadd", Enc::Mem16), o("fimul", Enc::Mem16), o("ficom", Enc::Mem16), o("ficomp", Enc::Mem16),
        o("fisub", Enc::Mem16), o("fisubr", Enc::Mem16), o("fidiv", Enc::Mem16), o("fidivr", Enc::Mem16),
    ],
    [ // 0xdf
        o("fild", Enc::Mem16), o("fisttp", Enc::Mem16), o("fist", Enc::Mem16), o("fistp", Enc::Mem16),
        o("fbld", Enc::Mem80), o("fild", Enc::Mem64), o("fbstp", Enc::Mem80), o("fistp", Enc::Mem64),
    ],
];

pub(super) static FPU_REG_OPCODE_MAP: [[Entry; 8]; 8] = [
    [ // 0xd8
        o("fadd", Enc::St0FpuReg), o("fmul", Enc::St0FpuReg), o("fcom", Enc::St0FpuReg), o("fcomp", Enc::St0FpuReg),
        o("fsub", Enc::St0FpuReg), o("fsubr", Enc::St0FpuReg), o("fdiv", Enc::St0FpuReg), o("fdivr", Enc::St0FpuReg),
    ],
    [ // 0xd9
        o("fld", Enc::FpuReg), o("fxch", Enc::St0FpuReg), n(12, Enc::RegGroupNoOperands), none(),
        n(13, Enc::RegGroupNoOperands), n(14, Enc::RegGroupNoOperands), n(15, Enc::RegGroupNoOperands), n(16, Enc::RegGroupNoOperands),
    ],
    [ // 0xda
        o("fcmovb", Enc::St0FpuReg), o("fcmove", Enc::St0FpuReg), o("fcmovbe", Enc::St0FpuReg), o("fcmovu", Enc::St0FpuReg),
        none(), n(17, Enc::RegGroupNoOperands), none(), none(),
    ],
    [ // 0xdb
        o("fcmovnb", Enc::St0FpuReg), o("fcmovne", Enc::St0FpuReg), o("fcmovnbe", Enc::St0FpuReg), o("fcmovnu", Enc::St0FpuReg),
        n(18, Enc::RegGroupNoOperands), o("fucomi", Enc::St0FpuReg), o("fcomi", Enc::St0FpuReg), n(21, Enc::RegGroupNoOperands),
    ],
    [ // 0xdc
        o("fadd", Enc::FpuRegSt0), o("fmul", Enc::FpuRegSt0), none(), none(),
        o("fsubr", Enc::FpuRegSt0), o("fsub", Enc::FpuRegSt0), o("fdivr", Enc::FpuRegSt0), o("fdiv", Enc::FpuRegSt0),
    ],
    [ // 0xdd
        o("ffree", Enc::FpuReg), none(), o("fst", Enc::FpuReg), o("fstp", Enc::FpuReg),
        o("fucom", Enc::St0FpuReg), o("fucomp", Enc::St0FpuReg), none(), n(22, Enc::RegGroupNoOperands),
    ],
    [ // 0xde
        o("faddp", Enc::FpuRegSt0), o("fmulp", Enc::FpuRegSt0), none(), n(19, Enc::RegGroupNoOperands),
        o("fsubrp", Enc::FpuRegSt0), o("fsubp", Enc::FpuRegSt0), o("fdivrp", Enc::FpuRegSt0), o("fdivp", Enc::FpuRegSt0),
    ],
    [ // 0xdf
        o("ffreep", Enc::FpuReg), none(), none(), none(),
        n(20, Enc::RegGroupAx), o("fucomip", Enc::St0FpuReg), o("fcomip", Enc::St0FpuReg), n(23, Enc::RegGroupNoOperands),
    ],
];

pub(super) static GROUP_OPERATIONS: [[Option<&str>; 8]; 26] = [
    [Some("add"), Some("or"), Some("adc"), Some("sbb"), Some("and"), Some("sub"), Some("xor"), Some("cmp")], // Group 0
    [Some("rol"), Some("ror"), Some("rcl"), Some("rcr"), Some("shl"), Some("shr"), Some("shl"), Some("sar")], // Group 1
    [Some("mov"), None, None, None, None, None, None, None], // Group 2
    [Some("test"), Some("test"), Some("not"), Some("neg"), Some("mul"), Some("imul"), Some("div"), Some("idiv")], // Group 3
    [Some("inc"), Some("dec"), None, None, None, None, None, None], // Group 4
    [Some("inc"), Some("dec"), Some("calln"), Some("callf"), Some("jmpn"), Some("jmpf"), Some("push"), None], // Group 5
    [Some("sldt"), Some("str"), Some("lldt"), Some("ltr"), Some("verr"), Some("verw"), None, None], // Group 6
    [Some("sgdt"), Some("sidt"), Some("lgdt"), Some("lidt"), Some("smsw"), None, Some("lmsw"), Some("invlpg")], // Group 7
    [Some("prefetch"), Some("prefetchw"), Some("prefetch"), Some("prefetch"), Some("prefetch"), Some("prefetch"), Some("prefetch"), Some("prefetch")], // Group 8
    [Some("prefetchnta"), Some("prefetcht0"), Some("prefetcht1"), Some("prefetcht2"), Some("mmxnop"), Some("mmxnop"), Some("mmxnop"), Some("mmxnop")], // Group 9
    [Some("mmxnop"), Some("mmxnop"), Some("mmxnop"), Some("mmxnop"), Some("mmxnop"), Some("mmxnop"), Some("mmxnop"), Some("mmxnop")], // Group 10
    [None, None, None, None, Some("bt"), Some("bts"), Some("btr"), Some("btc")], // Group 11
    [Some("fnop"), None, None, None, None, None, None, None], // Group 12
    [Some("fchs"), Some("fabs"), None, None, Some("ftst"), Some("fxam"), None, None], // Group 13
    [Some("fld1"), Some("fldl2t"), Some("fldl2e"), Some("fldpi"), Some("fldlg2"), Some("fldln2"), Some("fldz"), None], // Group 14
    [Some("f2xm1"), Some("fyl2x"), Some("fptan"), Some("fpatan"), Some("fxtract"), Some("fprem1"), Some("fdecstp"), Some("fincstp")], // Group 15
    [Some("fprem"), Some("fyl2xp1"), Some("fsqrt"), Some("fsincos"), Some("frndint"), Some("fscale"), Some("fsin"), Some("fcos")], // Group 16
    [None, Some("fucompp"), None, None, None, None, None, None], // Group 17
    [Some("feni"), Some("fdisi"), Some("fclex"), Some("finit"), Some("fsetpm"), Some("frstpm"), None, None], // Group 18
    [None, Some("fcompp"), None, None, None, None, None, None], // Group 19
    [Some("fstsw"), Some("fstdw"), Some("fstsg"), None, None, None, None, None], // Group 20
    [None, None, None, None, Some("frint2"), None, None, None], // Group 21
    [None, None, None, None, Some("frichop"), None, None, None], // Group 22
    [None, None, None, None, Some("frinear"), None, None, None], // Group 23
    [Some("fxsave"), Some("fxrstor"), Some("ldmxcsr"), Some("stmxcsr"), Some("xsave"), Some("xrstor"), None, Some("clflush")], // Group 24
    [None, None, None, None, None, Some("lfence"), Some("mfence"), Some("sfence")], // Group 25
];

pub(super) static GROUP_0F01_REG_OPERATIONS: [[Option<&str>; 8]; 8] = [
    [None, Some("vmcall"), Some("vmlaunch"), Some("vmresume"), Some("vmxoff"), None, None, None],
    [Some("monitor"), Some("mwait"), None, None, None, None, None, None],
    [Some("xgetbv"), Some("xsetbv"), None, None, None, None, None, None],
    [None, None, None, None, None, None, None, None],
    [None, None, None, None, None, None, None, None],
    [None, None, None, None, None, None, None, None],
    [None, None, None, None, None, None, None, None],
    [Some("swapgs"), Some("rdtscp"), None, None, None, None, None, None],
];

/// `(mmx form, sse form)` per reg field, for the 0f 71/72/73 shift groups.
pub(super) static MMX_GROUP_OPERATIONS: [[(Option<&str>, Option<&str>); 8]; 3] = [
    [ // Group 0
        (None, None), (None, None), (Some("psrlw"), Some("psrlw")), (None, None),
        (Some("psraw"), Some("psraw")), (None, None), (Some("psllw"), Some("psllw")), (None, None),
    ],
    [ // Group 1
        (None, None), (None, None), (Some("psrld"), Some("psrld")), (None, None),
        (Some("psrad"), Some("psrad")), (None, None), (Some("pslld"), Some("pslld")), (None, None),
    ],
    [ // Group 2
        (None, None), (None, None), (Some("psrlq"), Some("psrlq")), (None, Some("psrldq")),
        (None, None), (None, None), (Some("psllq"), Some("psllq")), (None, Some("pslldq")),
    ],
];

pub(super) static SPARSE_3DNOW_OPCODES: [(u8, &str); 26] = [
    (0x0c, "pi2fw"), (0x0d, "pi2fd"), (0x1c, "pf2iw"), (0x1d, "pf2id"), (0x86, "pfrcpv"),
    (0x87, "pfrsqrtv"), (0x8a, "pfnacc"), (0x8e, "pfpnacc"), (0x90, "pfcmpge"), (0x94, "pfmin"),
    (0x96, "pfrcp"), (0x97, "pfrsqrt"), (0x9a, "pfsub"), (0x9e, "pfadd"), (0xa0, "pfcmpgt"),
    (0xa4, "pfmax"), (0xa6, "pfrcpit1"), (0xa7, "pfrsqit1"), (0xaa, "pfsubr"), (0xae, "pfacc"),
    (0xb0, "pfcmpeq"), (0xb4, "pfmul"), (0xb6, "pfrcpit2"), (0xb7, "pmulhrw"), (0xbb, "pswapd"),
    (0xbf, "pavgusb"),
];

/// Operand class inside an SSE table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SseOperand {
    Sse128,
    Sse128Flip,
    Sse64,
    Sse32,
    Sse16,
    Mmx64,
    Mmx32,
    Gpr32Or64,
}

#[derive(Clone, Copy)]
pub(super) struct SseEntry {
    pub op: Op,
    pub dst: SseOperand,
    pub src: SseOperand,
}

/// One SSE table row: cells for the register form and the memory form of
/// ModR/M, each indexed by the effective prefix (none / 66 / f2 / f3).
pub(super) struct SseRow {
    pub reg: [SseEntry; 4],
    pub mem: [SseEntry; 4],
}

use SseOperand::{Gpr32Or64 as GPR, Mmx32 as M32, Mmx64 as M64, Sse128 as S128,
    Sse128Flip as SF, Sse16 as S16, Sse32 as S32, Sse64 as S64};

const fn se(op: Op, dst: SseOperand, src: SseOperand) -> SseEntry {
    SseEntry { op, dst, src }
}

const fn sm(m: &'static str, dst: SseOperand, src: SseOperand) -> SseEntry {
    se(Op::O(m), dst, src)
}

const XX: SseEntry = se(Op::None, S128, S128);

pub(super) static SSE_TABLE: [SseRow; 59] = [
    SseRow { // 0
        reg: [sm("movups", S128, S128), sm("movupd", S128, S128), sm("movsd", S128, S128), sm("movss", S128, S128)],
        mem: [sm("movups", S128, S128), sm("movupd", S128, S128), sm("movsd", S128, S64), sm("movss", S128, S32)],
    },
    SseRow { // 1
        reg: [sm("movhlps", S128, S128), XX, sm("movddup", S128, S128), sm("movsldup", S128, S128)],
        mem: [sm("movlps", S128, S64), sm("movlpd", S128, S64), sm("movddup", S128, S64), sm("movsldup", S128, S128)],
    },
    SseRow { // 2
        reg: [XX, XX, XX, XX],
        mem: [sm("movlps", S128, S64), sm("movlpd", S128, S64), XX, XX],
    },
    SseRow { // 3
        reg: [sm("unpcklps", S128, S128), sm("unpcklpd", S128, S128), XX, XX],
        mem: [sm("unpcklps", S128, S128), sm("unpcklpd", S128, S128), XX, XX],
    },
    SseRow { // 4
        reg: [sm("unpckhps", S128, S128), sm("unpckhpd", S128, S128), XX, XX],
        mem: [sm("unpckhps", S128, S128), sm("unpckhpd", S128, S128), XX, XX],
    },
    SseRow { // 5
        reg: [sm("movlhps", S128, S128), XX, XX, sm("movshdup", S128, S128)],
        mem: [sm("movhps", S128, S64), sm("movhpd", S128, S64), XX, sm("movshdup", S128, S128)],
    },
    SseRow { // 6
        reg: [XX, XX, XX, XX],
        mem: [sm("movhps", S128, S64), sm("movhpd", S128, S64), XX, XX],
    },
    SseRow { // 7
        reg: [sm("movaps", S128, S128), sm("movapd", S128, S128), XX, XX],
        mem: [sm("movaps", S128, S128), sm("movapd", S128, S128), XX, XX],
    },
    SseRow { // 8
        reg: [sm("cvtpi2ps", S128, M64), sm("cvtpi2pd", S128, M64), sm("cvtsi2sd", S128, GPR), sm("cvtsi2ss", S128, GPR)],
        mem: [sm("cvtpi2ps", S128, M64), sm("cvtpi2pd", S128, M64), sm("cvtsi2sd", S128, GPR), sm("cvtsi2ss", S128, GPR)],
    },
    SseRow { // 9
        reg: [XX, XX, XX, XX],
        mem: [sm("movntps", S128, S128), sm("movntpd", S128, S128), sm("movntsd", S128, S64), sm("movntss", S128, S32)],
    },
    SseRow { // 10
        reg: [sm("cvttps2pi", M64, S128), sm("cvttpd2pi", M64, S128), sm("cvttsd2si", GPR, S128), sm("cvttss2si", GPR, S128)],
        mem: [sm("cvttps2pi", M64, S64), sm("cvttpd2pi", M64, S128), sm("cvttsd2si", GPR, S64), sm("cvttss2si", GPR, S32)],
    },
    SseRow { // 11
        reg: [sm("cvtps2pi", M64, S128), sm("cvtpd2pi", M64, S128), sm("cvtsd2si", GPR, S128), sm("cvtss2si", GPR, S128)],
        mem: [sm("cvtps2pi", M64, S64), sm("cvtpd2pi", M64, S128), sm("cvtsd2si", GPR, S64), sm("cvtss2si", GPR, S32)],
    },
    SseRow { // 12
        reg: [sm("ucomiss", S128, S128), sm("ucomisd", S128, S128), XX, XX],
        mem: [sm("ucomiss", S128, S32), sm("ucomisd", S128, S64), XX, XX],
    },
    SseRow { // 13
        reg: [sm("comiss", S128, S128), sm("comisd", S128, S128), XX, XX],
        mem: [sm("comiss", S128, S32), sm("comisd", S128, S64), XX, XX],
    },
    SseRow { // 14
        reg: [sm("movmskps", GPR, S128), sm("movmskpd", GPR, S128), XX, XX],
        mem: [XX, XX, XX, XX],
    },
    SseRow { // 15
        reg: [sm("cvtps2pd", S128, S128), sm("cvtpd2ps", S128, S128), sm("cvtsd2ss", S128, S128), sm("cvtss2sd", S128, S128)],
        mem: [sm("cvtps2pd", S128, S64), sm("cvtpd2ps", S128, S128), sm("cvtsd2ss", S128, S64), sm("cvtss2sd", S128, S32)],
    },
    SseRow { // 16
        reg: [sm("cvtdq2ps", S128, S128), sm("cvtps2dq", S128, S128), XX, sm("cvttps2dq", S128, S128)],
        mem: [sm("cvtdq2ps", S128, S128), sm("cvtps2dq", S128, S128), XX, sm("cvttps2dq", S128, S128)],
    },
    SseRow { // 17
        reg: [sm("punpcklbw", M64, M64), sm("punpcklbw", S128, S128), XX, XX],
        mem: [sm("punpcklbw", M64, M32), sm("punpcklbw", S128, S128), XX, XX],
    },
    SseRow { // 18
        reg: [sm("punpcklwd", M64, M64), sm("punpcklwd", S128, S128), XX, XX],
        mem: [sm("punpcklwd", M64, M32), sm("punpcklwd", S128, S128), XX, XX],
    },
    SseRow { // 19
        reg: [sm("punpckldq", M64, M64), sm("punpckldq", S128, S128), XX, XX],
        mem: [sm("punpckldq", M64, M32), sm("punpckldq", S128, S128), XX, XX],
    },
    SseRow { // 20
        reg: [se(Op::Sized(&["movd", "movq"]), M64, GPR), se(Op::Sized(&["movd", "movq"]), S128, GPR), XX, XX],
        mem: [se(Op::Sized(&["movd", "movq"]), M64, GPR), se(Op::Sized(&["movd", "movq"]), S128, GPR), XX, XX],
    },
    SseRow { // 21
        reg: [sm("movq", M64, M64), sm("movdqa", S128, S128), XX, sm("movdqu", S128, S128)],
        mem: [sm("movq", M64, M64), sm("movdqa", S128, S128), XX, sm("movdqu", S128, S128)],
    },
    SseRow { // 22
        reg: [sm("pshufw", M64, M64), sm("pshufd", S128, S128), sm("pshuflw", S128, S128), sm("pshufhw", S128, S128)],
        mem: [sm("pshufw", M64, M64), sm("pshufd", S128, S128), sm("pshuflw", S128, S128), sm("pshufhw", S128, S128)],
    },
    SseRow { // 23
        reg: [XX, sm("haddpd", S128, S128), sm("haddps", S128, S128), XX],
        mem: [XX, sm("haddpd", S128, S128), sm("haddps", S128, S128), XX],
    },
    SseRow { // 24
        reg: [XX, sm("hsubpd", S128, S128), sm("hsubps", S128, S128), XX],
        mem: [XX, sm("hsubpd", S128, S128), sm("hsubps", S128, S128), XX],
    },
    SseRow { // 25
        reg: [se(Op::Sized(&["movd", "movq"]), M64, GPR), se(Op::Sized(&["movd", "movq"]), S128, GPR), XX, sm("movq", SF, SF)],
        mem: [se(Op::Sized(&["movd", "movq"]), M64, GPR), se(Op::Sized(&["movd", "movq"]), S128, GPR), XX, sm("movq", SF, SF)],
    },
    SseRow { // 26
        reg: [sm("cmpps", S128, S128), sm("cmppd", S128, S128), sm("cmpsd", S128, S128), sm("cmpss", S128, S128)],
        mem: [sm("cmpps", S128, S128), sm("cmppd", S128, S128), sm("cmpsd", S128, S64), sm("cmpss", S128, S32)],
    },
    SseRow { // 27
        reg: [sm("pinsrw", M64, GPR), sm("pinsrw", S128, GPR), XX, XX],
        mem: [sm("pinsrw", M64, GPR), sm("pinsrw", S128, GPR), XX, XX],
    },
    SseRow { // 28
        reg: [sm("pextrw", GPR, M64), sm("pextrw", GPR, S128), XX, XX],
        mem: [sm("pextrw", GPR, M64), sm("pextrw", GPR, S128), XX, XX],
    },
    SseRow { // 29
        reg: [sm("shufps", S128, S128), sm("shufpd", S128, S128), XX, XX],
        mem: [sm("shufps", S128, S128), sm("shufpd", S128, S128), XX, XX],
    },
    SseRow { // 30
        reg: [XX, sm("addsubpd", S128, S128), sm("addsubps", S128, S128), XX],
        mem: [XX, sm("addsubpd", S128, S128), sm("addsubps", S128, S128), XX],
    },
    SseRow { // 31
        reg: [XX, sm("movq", SF, SF), sm("movdq2q", M64, S128), sm("movq2dq", S128, M64)],
        mem: [XX, sm("movq", SF, SF), XX, XX],
    },
    SseRow { // 32
        reg: [sm("pmovmskb", GPR, M64), sm("pmovmskb", GPR, S128), XX, XX],
        mem: [XX, XX, XX, XX],
    },
    SseRow { // 33
        reg: [XX, sm("cvttpd2dq", S128, S128), sm("cvtpd2dq", S128, S128), sm("cvtdq2pd", S128, S128)],
        mem: [XX, sm("cvttpd2dq", S128, S128), sm("cvtpd2dq", S128, S128), sm("cvtdq2pd", S128, S128)],
    },
    SseRow { // 34
        reg: [XX, XX, XX, XX],
        mem: [sm("movntq", M64, M64), sm("movntdq", S128, S128), XX, XX],
    },
    SseRow { // 35
        reg: [XX, XX, XX, XX],
        mem: [XX, XX, sm("lddqu", S128, S128), XX],
    },
    SseRow { // 36
        reg: [sm("maskmovq", M64, M64), sm("maskmovdqu", S128, S128), XX, XX],
        mem: [XX, XX, XX, XX],
    },
    SseRow { // 37
        reg: [XX, sm("pmovsxbw", S128, S128), XX, XX],
        mem: [XX, sm("pmovsxbw", S128, S64), XX, XX],
    },
    SseRow { // 38
        reg: [XX, sm("pmovsxbd", S128, S128), XX, XX],
        mem: [XX, sm("pmovsxbd", S128, S32), XX, XX],
    },
    SseRow { // 39
        reg: [XX, sm("pmovsxbq", S128, S128), XX, XX],
        mem: [XX, sm("pmovsxbq", S128, S16), XX, XX],
    },
    SseRow { // 40
        reg: [XX, sm("pmovsxwd", S128, S128), XX, XX],
        mem: [XX, sm("pmovsxwd", S128, S64), XX, XX],
    },
    SseRow { // 41
        reg: [XX, sm("pmovsxwq", S128, S128), XX, XX],
        mem: [XX, sm("pmovsxwq", S128, S32), XX, XX],
    },
    SseRow { // 42
        reg: [XX, sm("pmovsxdq", S128, S128), XX, XX],
        mem: [XX, sm("pmovsxdq", S128, S64), XX, XX],
    },
    SseRow { // 43
        reg: [XX, XX, XX, XX],
        mem: [XX, sm("movntdqa", S128, S128), XX, XX],
    },
    SseRow { // 44
        reg: [XX, sm("pmovzxbw", S128, S128), XX, XX],
        mem: [XX, sm("pmovzxbw", S128, S64), XX, XX],
    },
    SseRow { // 45
        reg: [XX, sm("pmovzxbd", S128, S128), XX, XX],
        mem: [XX, sm("pmovzxbd", S128, S32), XX, XX],
    },
    SseRow { // 46
        reg: [XX, sm("pmovzxbq", S128, S128), XX, XX],
        mem: [XX, sm("pmovzxbq", S128, S16), XX, XX],
    },
    SseRow { // 47
        reg: [XX, sm("pmovzxwd", S128, S128), XX, XX],
        mem: [XX, sm("pmovzxwd", S128, S64), XX, XX],
    },
    SseRow { // 48
        reg: [XX, sm("pmovzxwq", S128, S128), XX, XX],
        mem: [XX, sm("pmovzxwq", S128, S32), XX, XX],
    },
    SseRow { // 49
        reg: [XX, sm("pmovzxdq", S128, S128), XX, XX],
        mem: [XX, sm("pmovzxdq", S128, S64), XX, XX],
    },
    SseRow { // 50
        reg: [XX, sm("roundss", S128, S128), XX, XX],
        mem: [XX, sm("roundss", S128, S32), XX, XX],
    },
    SseRow { // 51
        reg: [XX, sm("roundsd", S128, S128), XX, XX],
        mem: [XX, sm("roundsd", S128, S64), XX, XX],
    },
    SseRow { // 52
        reg: [XX, sm("pextrb", S128, GPR), XX, XX],
        mem: [XX, sm("pextrb", S128, GPR), XX, XX],
    },
    SseRow { // 53
        reg: [XX, sm("pextrw", GPR, S128), XX, XX],
        mem: [XX, sm("pextrw", S16, S128), XX, XX],
    },
    SseRow { // 54
        reg: [XX, se(Op::Sized(&["pextrd", "pextrq"]), S128, GPR), XX, XX],
        mem: [XX, se(Op::Sized(&["pextrd", "pextrq"]), S128, GPR), XX, XX],
    },
    SseRow { // 55
        reg: [XX, sm("extractps", S128, GPR), XX, XX],
        mem: [XX, sm("extractps", S128, S32), XX, XX],
    },
    SseRow { // 56
        reg: [XX, sm("pinsrb", S128, GPR), XX, XX],
        mem: [XX, sm("pinsrb", S128, GPR), XX, XX],
    },
    SseRow { // 57
        reg: [XX, sm("insertps", S128, S128), XX, XX],
        mem: [XX, sm("insertps", S128, S32), XX, XX],
    },
    SseRow { // 58
        reg: [XX, se(Op::Sized(&["pinsrd", "pinsrq"]), S128, GPR), XX, XX],
        mem: [XX, se(Op::Sized(&["pinsrd", "pinsrq"]), S128, GPR), XX, XX],
    },
];

//! Architecture instruction wrappers: classification, byte patching and
//! styled-text rendering.

use std::collections::BTreeMap;

use burin_asm::{arm, ppc, x86, Arch};
use burin_image::{AddressSpace, Image};

use crate::analysis::RenderOptions;
use crate::text::{InstructionText, Span, Token, TokenColor, TokenKind};

/// Name and PLT flag of a discovered function, snapshotted for rendering.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Current display name.
    pub name: String,
    /// True for PLT trampoline functions.
    pub plt: bool,
}

/// Everything rendering needs to substitute symbolic names.
pub struct RenderContext<'a> {
    /// Known functions keyed by entry address.
    pub functions: &'a BTreeMap<u64, FunctionInfo>,
    /// The image being disassembled.
    pub image: &'a Image,
    /// Display options.
    pub options: &'a RenderOptions,
}

/// The decoded form of an instruction, by architecture.
#[derive(Debug, Clone)]
pub enum Decoded {
    /// x86 in any mode.
    X86(x86::Instruction),
    /// PowerPC.
    Ppc(ppc::Instruction),
    /// ARM or Thumb.
    Arm(arm::Instruction),
}

/// A decoded instruction plus its bytes, address and rendered text.
#[derive(Debug, Clone)]
pub struct DisasmInstr {
    /// The encoded bytes, trimmed to the instruction length.
    pub opcode: Vec<u8>,
    /// Virtual address (with the Thumb bit for Thumb code).
    pub addr: u64,
    /// Architecture-specific decode.
    pub decoded: Decoded,
    /// Effective address size in bytes (x86 only; 4 elsewhere).
    pub addr_size: u16,
    /// Resolved branch or call destination, when computable.
    pub target: Option<u64>,
    /// Imported name when this instruction references a PLT/IAT slot;
    /// filled in during rendering.
    pub plt: Option<String>,
    /// Cached styled text.
    pub text: InstructionText,
}

static X86_CONDITIONAL_BRANCHES: [&str; 20] = [
    "jo", "jno", "jb", "jae", "je", "jne", "jbe", "ja", "js", "jns", "jpe", "jpo", "jl", "jge",
    "jle", "jg", "jcxz", "jecxz", "jrcxz", "loop",
];

static X86_PREFIXES: [u8; 11] = [
    0x26, 0x2e, 0x36, 0x3e, 0x64, 0x65, 0x66, 0x67, 0xf0, 0xf2, 0xf3,
];

fn x86_first_imm(instr: &x86::Instruction) -> Option<i64> {
    match instr.operands.first() {
        Some(x86::Operand::Imm { value, .. }) => Some(*value),
        _ => None,
    }
}

fn arm_first_imm(instr: &arm::Instruction) -> Option<i64> {
    match instr.operands.first() {
        Some(arm::Operand::Imm(value)) => Some(*value),
        _ => None,
    }
}

fn arm_op_matches(operation: &str, names: &[&str], prefixes: &[&str]) -> bool {
    names.contains(&operation) || prefixes.iter().any(|p| operation.starts_with(p))
}

impl DisasmInstr {
    /// Wrap a decoded x86 instruction.
    pub fn x86(opcode: Vec<u8>, addr: u64, instr: x86::Instruction, addr_size: u16) -> Self {
        let op = instr.operation.unwrap_or("");
        let branching = op == "jmpn"
            || op == "calln"
            || op == "callf"
            || X86_CONDITIONAL_BRANCHES.contains(&op);
        let target = if branching {
            x86_first_imm(&instr).map(|v| v as u64)
        } else {
            None
        };
        DisasmInstr {
            opcode,
            addr,
            decoded: Decoded::X86(instr),
            addr_size,
            target,
            plt: None,
            text: InstructionText::default(),
        }
    }

    /// Wrap a decoded PowerPC instruction.
    pub fn ppc(opcode: Vec<u8>, addr: u64, instr: ppc::Instruction) -> Self {
        let target = match (&instr.operation, instr.operands.last()) {
            (Some(op), Some(ppc::Operand::Imm(value))) if op.starts_with('b') => {
                Some(*value as u64)
            }
            _ => None,
        };
        DisasmInstr {
            opcode,
            addr,
            decoded: Decoded::Ppc(instr),
            addr_size: 4,
            target,
            plt: None,
            text: InstructionText::default(),
        }
    }

    /// Wrap a decoded ARM instruction.
    pub fn arm(opcode: Vec<u8>, addr: u64, instr: arm::Instruction) -> Self {
        let target = match &instr.operation {
            Some(op)
                if arm_op_matches(
                    op,
                    &["b", "bx", "bl", "blx"],
                    &["b.", "bx.", "bl.", "blx."],
                ) =>
            {
                arm_first_imm(&instr).map(|v| v as u64)
            }
            _ => None,
        };
        DisasmInstr {
            opcode,
            addr,
            decoded: Decoded::Arm(instr),
            addr_size: 4,
            target,
            plt: None,
            text: InstructionText::default(),
        }
    }

    /// Decode one instruction from the image. Returns `None` when the
    /// image architecture has no decoder.
    pub fn decode(image: &Image, arch: Arch, addr: u64) -> Option<DisasmInstr> {
        match arch {
            Arch::X86 | Arch::X86_64 => {
                let bytes = image.read(addr, 15);
                let (instr, addr_size) = if arch == Arch::X86 {
                    (x86::disassemble32(&bytes, addr), 4)
                } else {
                    (x86::disassemble64(&bytes, addr), 8)
                };
                let len = instr.length.min(bytes.len());
                Some(DisasmInstr::x86(bytes[..len].to_vec(), addr, instr, addr_size))
            }
            Arch::Ppc => {
                let bytes = image.read(addr, 4);
                let instr = if bytes.len() == 4 {
                    let word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    ppc::disassemble(word, addr)
                } else {
                    ppc::Instruction::default()
                };
                Some(DisasmInstr::ppc(bytes, addr, instr))
            }
            Arch::Arm => {
                let bytes = image.read(addr & !1, 4);
                let instr = if bytes.len() == 4 {
                    let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    arm::disassemble(word, addr)
                } else {
                    arm::Instruction::default()
                };
                let len = instr.length.min(bytes.len());
                Some(DisasmInstr::arm(bytes[..len].to_vec(), addr, instr))
            }
            _ => None,
        }
    }

    fn operation(&self) -> Option<&str> {
        match &self.decoded {
            Decoded::X86(i) => i.operation,
            Decoded::Ppc(i) => i.operation.as_deref(),
            Decoded::Arm(i) => i.operation.as_deref(),
        }
    }

    /// Whether the bytes decoded to a recognized instruction.
    pub fn is_valid(&self) -> bool {
        self.operation().is_some()
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        match &self.decoded {
            Decoded::X86(i) => i.length,
            Decoded::Ppc(_) => 4,
            Decoded::Arm(i) => i.length,
        }
    }

    /// True when the instruction has zero length (undecodable at end of
    /// image).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Conditional branch with two successors.
    pub fn is_conditional_branch(&self) -> bool {
        match &self.decoded {
            Decoded::X86(i) => match i.operation {
                Some(op) => X86_CONDITIONAL_BRANCHES.contains(&op),
                None => false,
            },
            Decoded::Ppc(i) => match &i.operation {
                Some(op) => ppc::conditional_branches().iter().any(|b| b == op),
                None => false,
            },
            Decoded::Arm(i) => match &i.operation {
                Some(op) => {
                    (op.starts_with("b.") || op.starts_with("bx.")) && self.target.is_some()
                }
                None => false,
            },
        }
    }

    /// Unconditional intra-function jump or conditional branch.
    pub fn is_local_jump(&self) -> bool {
        match &self.decoded {
            Decoded::X86(i) => i.operation == Some("jmpn") || self.is_conditional_branch(),
            Decoded::Ppc(i) => {
                matches!(i.operation.as_deref(), Some("b") | Some("ba"))
                    || self.is_conditional_branch()
            }
            Decoded::Arm(i) => {
                let direct = matches!(i.operation.as_deref(), Some("b") | Some("bx"))
                    && self.target.is_some();
                direct || self.is_conditional_branch()
            }
        }
    }

    /// Call instruction.
    pub fn is_call(&self) -> bool {
        match &self.decoded {
            Decoded::X86(i) => matches!(i.operation, Some("calln") | Some("callf")),
            Decoded::Ppc(i) => match &i.operation {
                Some(op) => ppc::call_instructions().iter().any(|c| c == op),
                None => false,
            },
            Decoded::Arm(i) => match &i.operation {
                Some(op) => arm_op_matches(op, &["bl", "blx"], &["bl.", "blx."]),
                None => false,
            },
        }
    }

    /// Instruction that terminates a basic block.
    pub fn is_block_ending(&self) -> bool {
        match &self.decoded {
            Decoded::X86(i) => {
                matches!(
                    i.operation,
                    Some("jmpn") | Some("jmpf") | Some("retn") | Some("retf") | Some("hlt")
                ) || self.is_conditional_branch()
            }
            Decoded::Ppc(i) => match &i.operation {
                Some(op) => {
                    op == "trap"
                        || ppc::branch_instructions().iter().any(|b| b == op)
                        || self.is_local_jump()
                }
                None => false,
            },
            Decoded::Arm(i) => {
                if self.is_local_jump() {
                    return true;
                }
                let op = match i.operation.as_deref() {
                    Some(op) => op,
                    None => return false,
                };
                if op == "b" || op == "bx" {
                    return true;
                }
                if op.starts_with("ldm") && i.operands.iter().skip(1).any(|o| o.is_reg("pc")) {
                    return true;
                }
                if op == "ldr" && i.operands.first().map(|o| o.is_reg("pc")) == Some(true) {
                    return true;
                }
                if op == "pop" && i.operands.iter().any(|o| o.is_reg("pc")) {
                    return true;
                }
                false
            }
        }
    }

    // Number of leading prefix bytes on an x86 encoding.
    fn x86_prefix_count(&self) -> usize {
        for (count, &byte) in self.opcode.iter().enumerate() {
            if X86_PREFIXES.contains(&byte) {
                continue;
            }
            if self.addr_size == 8 && (0x40..=0x4f).contains(&byte) {
                continue;
            }
            return count;
        }
        self.opcode.len()
    }

    /// Overwrite the instruction with no-ops.
    pub fn patch_to_nop(&self, image: &Image) {
        match &self.decoded {
            Decoded::X86(_) => {
                image.write(self.addr, &vec![0x90u8; self.opcode.len()]);
            }
            Decoded::Ppc(_) => {
                image.write(self.addr, &[0x60, 0x00, 0x00, 0x00]);
            }
            Decoded::Arm(i) => {
                if self.addr & 1 != 0 {
                    if i.length == 4 {
                        image.write(self.addr & !1, &[0x00, 0x46, 0x00, 0x46]);
                    } else {
                        image.write(self.addr & !1, &[0x00, 0x46]);
                    }
                } else {
                    image.write(self.addr, &[0x00, 0x00, 0xa0, 0xe1]);
                }
            }
        }
    }

    /// Whether [`DisasmInstr::patch_to_always_branch`] applies here.
    pub fn is_patch_branch_allowed(&self) -> bool {
        self.is_conditional_branch()
    }

    /// Rewrite a conditional branch as unconditional, preserving the
    /// displacement.
    pub fn patch_to_always_branch(&self, image: &Image) {
        match &self.decoded {
            Decoded::X86(_) => {
                let pc = self.x86_prefix_count();
                if self.opcode.get(pc) == Some(&0x0f) {
                    // Two-byte branch: pad with nops, then e9 reuses the
                    // original rel32 (same end address, same target).
                    let mut bytes = vec![0x90u8; pc + 1];
                    bytes.push(0xe9);
                    bytes.extend_from_slice(&self.opcode[pc + 2..]);
                    image.write(self.addr, &bytes);
                } else {
                    let mut bytes = vec![0x90u8; pc];
                    bytes.push(0xeb);
                    bytes.extend_from_slice(&self.opcode[pc + 1..]);
                    image.write(self.addr, &bytes);
                }
            }
            Decoded::Ppc(_) => {}
            Decoded::Arm(_) => {
                if self.addr & 1 != 0 {
                    if let Some(op) = image.read_u16_le(self.addr & !1) {
                        let imm8 = op & 0xff;
                        let imm11 = if imm8 & 0x80 != 0 { imm8 as u16 | 0x700 } else { imm8 };
                        image.write_u16_le(self.addr & !1, 0xe000 | imm11);
                    }
                } else if let Some(word) = image.read_u32_le(self.addr) {
                    image.write_u32_le(self.addr, (word & 0x0fff_ffff) | 0xe000_0000);
                }
            }
        }
    }

    /// Flip the branch condition.
    pub fn patch_to_invert_branch(&self, image: &Image) {
        match &self.decoded {
            Decoded::X86(_) => {
                let pc = self.x86_prefix_count();
                let mut bytes = self.opcode.clone();
                if bytes.get(pc) == Some(&0x0f) {
                    if let Some(b) = bytes.get_mut(pc + 1) {
                        *b ^= 1;
                    }
                } else if let Some(b) = bytes.get_mut(pc) {
                    *b ^= 1;
                }
                image.write(self.addr, &bytes);
            }
            Decoded::Ppc(_) => {}
            Decoded::Arm(_) => {
                if self.addr & 1 != 0 {
                    if let Some(op) = image.read_u16_le(self.addr & !1) {
                        image.write_u16_le(self.addr & !1, op ^ (1 << 8));
                    }
                } else if let Some(word) = image.read_u32_le(self.addr) {
                    image.write_u32_le(self.addr, word ^ (1 << 28));
                }
            }
        }
    }

    /// Whether [`DisasmInstr::patch_to_zero_return`] applies here.
    pub fn is_patch_to_zero_return_allowed(&self) -> bool {
        self.is_call()
    }

    /// Replace a call with "return zero" in the architecture's return
    /// register.
    pub fn patch_to_zero_return(&self, image: &Image) {
        match &self.decoded {
            Decoded::X86(_) => {
                if self.opcode.len() < 2 {
                    return;
                }
                let mut bytes = vec![0x31, 0xc0]; // xor eax, eax
                bytes.extend(std::iter::repeat(0x90).take(self.opcode.len() - 2));
                image.write(self.addr, &bytes);
            }
            Decoded::Ppc(_) => {
                // li r3, 0
                image.write(self.addr, &[0x38, 0x60, 0x00, 0x00]);
            }
            Decoded::Arm(i) => {
                if self.addr & 1 != 0 {
                    if i.length == 4 {
                        image.write(self.addr & !1, &[0x00, 0x20, 0x00, 0x46]);
                    } else {
                        image.write(self.addr & !1, &[0x00, 0x20]);
                    }
                } else if let Some(word) = image.read_u32_le(self.addr) {
                    let mut cc = word & 0xf000_0000;
                    if cc == 0xf000_0000 {
                        cc = 0xe000_0000;
                    }
                    image.write_u32_le(self.addr, cc | 0x03a0_0000); // mov r0, #0
                }
            }
        }
    }

    /// Whether [`DisasmInstr::patch_to_fixed_return_value`] applies here.
    pub fn is_patch_to_fixed_return_value_allowed(&self) -> bool {
        match &self.decoded {
            Decoded::X86(_) => self.is_call() && self.opcode.len() >= 5,
            _ => self.is_call(),
        }
    }

    /// Replace a call with "return `value`".
    pub fn patch_to_fixed_return_value(&self, image: &Image, value: u32) {
        match &self.decoded {
            Decoded::X86(_) => {
                if self.opcode.len() < 5 {
                    return;
                }
                let mut bytes = vec![0xb8]; // mov eax, imm32
                bytes.extend_from_slice(&value.to_le_bytes());
                bytes.extend(std::iter::repeat(0x90).take(self.opcode.len() - 5));
                image.write(self.addr, &bytes);
            }
            Decoded::Ppc(_) => {
                // li r3, imm16
                image.write_u32_be(self.addr, 0x3860_0000 | (value & 0xffff));
            }
            Decoded::Arm(i) => {
                if self.addr & 1 != 0 {
                    image.write_u16_le(self.addr & !1, 0x2000 | (value as u16 & 0xff));
                    if i.length == 4 {
                        image.write((self.addr + 2) & !1, &[0x00, 0x46]);
                    }
                } else if let Some(word) = image.read_u32_le(self.addr) {
                    let mut cc = word & 0xf000_0000;
                    if cc == 0xf000_0000 {
                        cc = 0xe000_0000;
                    }
                    // movw r0, imm16
                    image.write_u32_le(
                        self.addr,
                        cc | 0x0300_0000 | ((value << 4) & 0xf0000) | (value & 0xfff),
                    );
                }
            }
        }
    }

    /// Rebuild the cached styled text; returns whether it changed.
    pub fn format_text(&mut self, ctx: &RenderContext<'_>) -> bool {
        let old = std::mem::take(&mut self.text);
        let (line, tokens) = if matches!(self.decoded, Decoded::X86(_)) {
            self.format_x86(ctx)
        } else if matches!(self.decoded, Decoded::Ppc(_)) {
            self.format_ppc(ctx)
        } else {
            self.format_arm(ctx)
        };
        self.text.lines.push(line);
        self.text.tokens.push(tokens);
        old != self.text
    }

    fn format_x86(&mut self, ctx: &RenderContext<'_>) -> (Vec<Span>, Vec<Token>) {
        let mut b = LineBuilder::new();
        if ctx.options.show_address {
            b.colored(&format!("{:08x}   ", self.addr), TokenColor::Address);
        }
        let instr = match &self.decoded {
            Decoded::X86(i) => i.clone(),
            _ => unreachable!(),
        };
        if instr.operation.is_none() {
            b.text("??");
            return b.finish();
        }

        b.text(&format!("{:<7} ", instr.operation_text()));
        let local_jump = self.is_local_jump();

        for (j, operand) in instr.operands.iter().enumerate() {
            if j != 0 {
                b.text(", ");
            }
            match operand {
                x86::Operand::Imm { value, size } => {
                    let masked = x86::mask_to_size(*value, *size);
                    let string = format!("0x{:0width$x}", masked, width = (*size as usize) * 2);
                    if *size == self.addr_size && ctx.functions.contains_key(&masked) {
                        // Pointer to existing function
                        let func = &ctx.functions[&masked];
                        let color = if func.plt {
                            TokenColor::Plt
                        } else {
                            TokenColor::Function
                        };
                        b.ptr(&func.name.clone(), color, masked);
                    } else if *size == self.addr_size
                        && masked >= ctx.image.start()
                        && masked < ctx.image.end()
                        && !local_jump
                    {
                        // Pointer within module
                        let string = ctx.image.symbol_by_addr(masked).unwrap_or(string);
                        b.ptr(&string, TokenColor::Symbol, masked);
                    } else {
                        b.text(&string);
                    }
                }
                x86::Operand::Mem {
                    components,
                    scale,
                    displacement,
                    size,
                    segment,
                    ..
                } => {
                    let mut plus = false;
                    b.text(x86::size_name(*size));
                    if instr.segment.is_some() || *segment == Some("es") {
                        if let Some(seg) = segment {
                            b.text(seg);
                            b.text(":");
                        }
                    }
                    b.text("[");
                    if let Some(base) = components[0] {
                        b.reg(base, 0);
                        b.text(base);
                        plus = true;
                    }
                    if let Some(index) = components[1] {
                        b.reg(index, if plus { 1 } else { 0 });
                        if plus {
                            b.text("+");
                        }
                        b.text(index);
                        if *scale != 1 {
                            b.text(&format!("*{scale}"));
                        }
                        plus = true;
                    }
                    let d = *displacement;
                    if d != 0 || (components[0].is_none() && components[1].is_none()) {
                        if plus && (-0x80..0).contains(&d) {
                            b.text(&format!("-0x{:02x}", -d));
                        } else if plus && (1..=0x7f).contains(&d) {
                            b.text(&format!("+0x{d:02x}"));
                        } else if plus && (-0x8000..0).contains(&d) {
                            b.text(&format!("-0x{:08x}", -d));
                        } else if instr.flags.contains(x86::InstrFlags::ADDR64) {
                            if plus {
                                b.text("+");
                            }
                            let value = d as u64;
                            let string = format!("0x{value:016x}");
                            if let Some(name) = ctx.image.plt_name(value) {
                                // Pointer to PLT entry
                                self.plt = Some(name.clone());
                                let display = ctx.image.decorate_plt_name(&name);
                                b.ptr(&display, TokenColor::Symbol, value);
                            } else if value >= ctx.image.start() && value < ctx.image.end() {
                                let string = ctx.image.symbol_by_addr(value).unwrap_or(string);
                                b.ptr(&string, TokenColor::Symbol, value);
                            } else {
                                b.text(&string);
                            }
                        } else {
                            if plus {
                                b.text("+");
                            }
                            let value = (d as u64) & 0xffff_ffff;
                            let string = format!("0x{value:08x}");
                            if self.addr_size == 4 && ctx.image.plt_name(value).is_some() {
                                // Pointer to PLT entry
                                let name = ctx.image.plt_name(value).unwrap_or_default();
                                self.plt = Some(name.clone());
                                let display = ctx.image.decorate_plt_name(&name);
                                b.ptr(&display, TokenColor::Symbol, value);
                            } else if self.addr_size == 4
                                && value >= ctx.image.start()
                                && value < ctx.image.end()
                            {
                                let string = ctx.image.symbol_by_addr(value).unwrap_or(string);
                                b.ptr(&string, TokenColor::Symbol, value);
                            } else {
                                b.text(&string);
                            }
                        }
                    }
                    b.text("]");
                }
                x86::Operand::Reg { name, .. } => {
                    b.reg(name, 0);
                    b.text(name);
                }
            }
        }
        b.finish()
    }

    fn format_ppc(&mut self, ctx: &RenderContext<'_>) -> (Vec<Span>, Vec<Token>) {
        let mut b = LineBuilder::new();
        if ctx.options.show_address {
            b.colored(&format!("{:08x}   ", self.addr), TokenColor::Address);
        }
        let instr = match &self.decoded {
            Decoded::Ppc(i) => i.clone(),
            _ => unreachable!(),
        };
        let operation = match &instr.operation {
            Some(op) => op.clone(),
            None => {
                b.text("??");
                return b.finish();
            }
        };

        b.text(&format!("{operation:<7} "));
        let local_jump = self.is_local_jump();

        for (j, operand) in instr.operands.iter().enumerate() {
            if j != 0 {
                b.text(", ");
            }
            match operand {
                ppc::Operand::Imm(value) => {
                    self.immediate_with_symbols(&mut b, ctx, *value, local_jump);
                }
                ppc::Operand::Reg(name) => {
                    b.reg(name, 0);
                    b.text(name);
                }
            }
        }
        b.finish()
    }

    fn format_arm(&mut self, ctx: &RenderContext<'_>) -> (Vec<Span>, Vec<Token>) {
        let mut b = LineBuilder::new();
        if ctx.options.show_address {
            b.colored(&format!("{:08x}   ", self.addr), TokenColor::Address);
        }
        let instr = match &self.decoded {
            Decoded::Arm(i) => i.clone(),
            _ => unreachable!(),
        };
        let operation = match &instr.operation {
            Some(op) => op.replace('.', ""),
            None => {
                b.text("??");
                return b.finish();
            }
        };

        b.text(&format!("{operation:<7} "));
        let local_jump = self.is_local_jump();

        for (j, operand) in instr.operands.iter().enumerate() {
            if j != 0 {
                b.text(", ");
            }
            match operand {
                arm::Operand::Shifted(shifted) => {
                    self.arm_shifted(&mut b, shifted, true);
                }
                arm::Operand::Mem(memory) => {
                    b.text("[");
                    for (k, component) in memory.components.iter().enumerate() {
                        if k != 0 {
                            b.text(", ");
                        }
                        match component {
                            arm::MemComponent::Reg(reg) => self.arm_reg(&mut b, reg),
                            arm::MemComponent::Shifted(shifted) => {
                                self.arm_shifted(&mut b, shifted, false)
                            }
                            arm::MemComponent::Imm(value) => {
                                self.immediate_with_symbols(&mut b, ctx, *value, local_jump);
                            }
                        }
                    }
                    b.text("]");
                    if memory.writeback {
                        b.text("!");
                    }
                }
                arm::Operand::Imm(value) => {
                    self.immediate_with_symbols(&mut b, ctx, *value, local_jump);
                }
                arm::Operand::Reg(reg) => self.arm_reg(&mut b, reg),
            }
        }

        // Annotate literal loads with the resolved pool value.
        if instr.operation.as_deref() == Some("ldr") {
            if let Some(arm::Operand::Mem(memory)) = instr.operands.get(1) {
                if let [arm::MemComponent::Imm(addr)] = memory.components[..] {
                    let addr = addr as u64;
                    if addr >= ctx.image.start() && addr + 4 <= ctx.image.end() {
                        b.text(" ; =");
                        if let Some(value) = ctx.image.read_u32_le(addr) {
                            self.immediate_with_symbols(&mut b, ctx, value as i64, local_jump);
                        }
                    }
                }
            }
        }

        b.finish()
    }

    // Shared immediate renderer: substitute function and symbol names when
    // the value lands on one. PLT slot addresses carry their decorated
    // name in the symbol table already.
    fn immediate_with_symbols(
        &self,
        b: &mut LineBuilder,
        ctx: &RenderContext<'_>,
        value: i64,
        local_jump: bool,
    ) {
        let string = if value < 0 {
            format!("-0x{:x}", -value)
        } else {
            format!("0x{value:x}")
        };
        let addr = value as u64;
        if let Some(func) = ctx.functions.get(&addr) {
            let color = if func.plt {
                TokenColor::Plt
            } else {
                TokenColor::Function
            };
            b.ptr(&func.name.clone(), color, addr);
        } else if addr >= ctx.image.start() && addr < ctx.image.end() && !local_jump {
            let string = ctx.image.symbol_by_addr(addr).unwrap_or(string);
            b.ptr(&string, TokenColor::Symbol, addr);
        } else {
            b.text(&string);
        }
    }

    fn arm_reg(&self, b: &mut LineBuilder, reg: &arm::RegOperand) {
        let offset = if reg.negative { 1 } else { 0 };
        b.reg(reg.name, offset);
        if reg.negative {
            b.text("-");
        }
        b.text(reg.name);
        if reg.writeback {
            b.text("!");
        }
    }

    fn arm_shifted(&self, b: &mut LineBuilder, shifted: &arm::ShiftedReg, top_level: bool) {
        self.arm_reg(b, &shifted.base);
        b.text(" ");
        match shifted.amount {
            None => b.text(shifted.shift),
            Some(arm::ShiftAmount::Reg(name)) => {
                b.text(shifted.shift);
                b.text(" ");
                b.reg(name, 0);
                b.text(name);
            }
            Some(arm::ShiftAmount::Imm(amount)) => {
                if top_level {
                    b.text(" ");
                }
                b.text(&format!("{} {}", shifted.shift, amount));
            }
        }
    }
}

// Accumulates one rendered line: spans, tokens and the running column.
struct LineBuilder {
    line: Vec<Span>,
    tokens: Vec<Token>,
    x: usize,
    result: String,
}

impl LineBuilder {
    fn new() -> Self {
        LineBuilder {
            line: Vec::new(),
            tokens: Vec::new(),
            x: 0,
            result: String::new(),
        }
    }

    fn text(&mut self, s: &str) {
        self.result.push_str(s);
    }

    fn flush(&mut self) {
        if !self.result.is_empty() {
            self.x += self.result.len();
            self.line.push(Span {
                text: std::mem::take(&mut self.result),
                color: TokenColor::Text,
            });
        }
    }

    fn colored(&mut self, text: &str, color: TokenColor) {
        self.flush();
        self.line.push(Span {
            text: text.to_string(),
            color,
        });
        self.x += text.len();
    }

    // Colored navigation target with a ptr token.
    fn ptr(&mut self, text: &str, color: TokenColor, addr: u64) {
        self.flush();
        self.tokens.push(Token {
            column: self.x,
            length: text.len(),
            kind: TokenKind::Ptr(addr),
            text: text.to_string(),
        });
        self.line.push(Span {
            text: text.to_string(),
            color,
        });
        self.x += text.len();
    }

    // Register token at the pending cursor position plus `offset`.
    fn reg(&mut self, name: &str, offset: usize) {
        self.tokens.push(Token {
            column: self.x + self.result.len() + offset,
            length: name.len(),
            kind: TokenKind::Reg,
            text: name.to_string(),
        });
    }

    fn finish(mut self) -> (Vec<Span>, Vec<Token>) {
        self.flush();
        (self.line, self.tokens)
    }
}

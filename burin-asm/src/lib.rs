//! Instruction decoders for the burin workbench.
//!
//! Each architecture module exposes a stateless `disassemble*` entry point
//! that turns a byte window (x86) or a fetched word (PowerPC, ARM) into an
//! [`x86::Instruction`], [`ppc::Instruction`] or [`arm::Instruction`]
//! value. Decoding never fails: bytes that do not form a valid instruction
//! produce a record whose operation is `None` and whose length covers the
//! bytes that were consumed before decoding stopped.

#![warn(missing_docs)]

pub mod arm;
pub mod ppc;
pub mod x86;

/// Machine architecture of an executable image.
///
/// Container parsers map their machine fields onto this enum; the analysis
/// engine only disassembles the variants for which a decoder exists
/// ([`Arch::is_disassemblable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[non_exhaustive]
pub enum Arch {
    /// 32-bit x86.
    X86,
    /// 64-bit x86.
    #[strum(serialize = "x86_64")]
    X86_64,
    /// ARM (A32, with Thumb selected by the low address bit).
    Arm,
    /// Thumb-only images (PE machine 0x1c2/0x1c4).
    Thumb,
    /// 64-bit ARM. Parsed but not disassemblable.
    Arm64,
    /// 32- or 64-bit PowerPC, big endian.
    Ppc,
    /// MIPS. Parsed but not disassemblable.
    Mips,
    /// MIPS16. Parsed but not disassemblable.
    Mips16,
    /// SPARC. Parsed but not disassemblable.
    Sparc,
    /// SPARC 32+. Parsed but not disassemblable.
    Sparc32Plus,
    /// SPARC V9. Parsed but not disassemblable.
    SparcV9,
    /// Motorola 68000. Parsed but not disassemblable.
    M68000,
    /// PA-RISC. Parsed but not disassemblable.
    PaRisc,
    /// Alpha. Parsed but not disassemblable.
    Alpha,
    /// Itanium. Parsed but not disassemblable.
    Ia64,
}

impl Arch {
    /// Whether a decoder exists for this architecture.
    pub const fn is_disassemblable(self) -> bool {
        matches!(self, Arch::X86 | Arch::X86_64 | Arch::Arm | Arch::Ppc)
    }
}

//! Architectural register names.

/// Registers addressable by instructions, in register-file order. `R0`-`R11`
/// are the general purpose registers; `Cp`/`Dp`/`Sp`/`Lr` complete the
/// 16-entry file visible to three-operand encodings; the remainder are the
/// special registers reached through implicit operands. The status register
/// is not part of the file and is modelled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    Cp,
    Dp,
    Sp,
    Lr,
    Et,
    Ed,
    Kep,
    Ksp,
    Spc,
    Sed,
    Ssr,
    /// Pseudo-entry for implicit status-register operands; reads and writes
    /// are routed to the thread's SR, not the register file.
    Sr,
}

/// Number of slots in a thread's register file (everything except `Sr`).
pub const REGISTER_FILE_SIZE: usize = 23;

impl Register {
    pub fn from_index(index: u32) -> Option<Register> {
        use Register::*;
        const FILE: [Register; REGISTER_FILE_SIZE] = [
            R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10, R11, Cp, Dp, Sp, Lr, Et, Ed, Kep, Ksp,
            Spc, Sed, Ssr,
        ];
        FILE.get(index as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        use Register::*;
        match self {
            R0 => "r0",
            R1 => "r1",
            R2 => "r2",
            R3 => "r3",
            R4 => "r4",
            R5 => "r5",
            R6 => "r6",
            R7 => "r7",
            R8 => "r8",
            R9 => "r9",
            R10 => "r10",
            R11 => "r11",
            Cp => "cp",
            Dp => "dp",
            Sp => "sp",
            Lr => "lr",
            Et => "et",
            Ed => "ed",
            Kep => "kep",
            Ksp => "ksp",
            Spc => "spc",
            Sed => "sed",
            Ssr => "ssr",
            Sr => "sr",
        }
    }
}

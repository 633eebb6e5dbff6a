//! Operand kinds and the decoded operand array.

/// How an instruction uses an operand slot. Implicit register operands are
/// appended after the explicit ones and share these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    In,
    Out,
    InOut,
    Imm,
}

/// Decoded operand values. Short forms use at most three slots; the long
/// register forms use up to six. Slots holding register operands carry the
/// register-file index; immediate slots carry the (possibly transformed)
/// immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Operands(pub [u32; 6]);

impl Operands {
    pub fn new() -> Self {
        Operands([0; 6])
    }

    pub fn of(values: &[u32]) -> Self {
        let mut ops = [0u32; 6];
        ops[..values.len()].copy_from_slice(values);
        Operands(ops)
    }
}

impl std::ops::Index<usize> for Operands {
    type Output = u32;
    fn index(&self, i: usize) -> &u32 {
        &self.0[i]
    }
}

impl std::ops::IndexMut<usize> for Operands {
    fn index_mut(&mut self, i: usize) -> &mut u32 {
        &mut self.0[i]
    }
}

/// Bit-position immediate table. Short immediates that denote bit counts
/// (shift amounts, sign/zero extension widths, mask sizes) are encoded as an
/// index into this table so that 16, 24 and 32 remain reachable from a
/// 4-bit field.
pub const BITP_VALUES: [u32; 12] = [32, 1, 2, 3, 4, 5, 6, 7, 8, 16, 24, 32];

/// Index encoding `value`, preferring the lowest index.
pub fn bitp_index(value: u32) -> Option<u32> {
    BITP_VALUES.iter().position(|&v| v == value).map(|i| i as u32)
}

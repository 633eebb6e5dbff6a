//! Post-decode operand transform, applied exactly once per decode-cache
//! fill. Pre-scales addressing immediates, resolves pc-relative branch
//! targets (rewriting out-of-range targets to the `Illegal` opcode variants
//! so the execution fast path needs no bounds check) and folds the handful
//! of degenerate encodings into dedicated opcodes.

use xcsim_support::bits::make_mask;

use crate::opcodes::Opcode;
use crate::operands::Operands;

/// `pc` is the instruction's address in decode units; `max_pc` is one past
/// the last valid pc (RAM size in halfwords).
pub fn transform(opcode: &mut Opcode, operands: &mut Operands, pc: u32, max_pc: u32) {
    use Opcode::*;
    let valid = |target: u32| target < max_pc;
    match *opcode {
        Add2rus => {
            if operands[2] == 0 {
                *opcode = AddMov2rus;
            }
        }
        Stw2rus | Ldw2rus | LdawfL2rus | LdawbL2rus => operands[2] <<= 2,
        StwdpRu6 | StwspRu6 | LdwdpRu6 | LdwspRu6 | LdawdpRu6 | LdawspRu6 | LdwcpRu6
        | StwdpLru6 | StwspLru6 | LdwdpLru6 | LdwspLru6 | LdawdpLru6 | LdawspLru6
        | LdwcpLru6 => operands[1] <<= 2,
        ExtdpU6 | EntspU6 | ExtspU6 | RetspU6 | KentspU6 | KrestspU6 | LdawcpU6 | ExtdpLu6
        | EntspLu6 | ExtspLu6 | RetspLu6 | KentspLu6 | KrestspLu6 | LdawcpLu6 | LdwcplU10
        | LdwcplLu10 => operands[0] <<= 2,
        LdapfU10 | LdapbU10 | LdapfLu10 | LdapbLu10 => operands[0] <<= 1,
        Shl2rus => {
            if operands[2] == 32 {
                *opcode = Shl322rus;
            }
        }
        Shr2rus => {
            if operands[2] == 32 {
                *opcode = Shr322rus;
            }
        }
        AshrL2rus => {
            if operands[2] == 32 {
                *opcode = Ashr32L2rus;
            }
        }
        MkmskRus => operands[1] = make_mask(operands[1]),
        BrftRu6 | BrffRu6 | BrbtRu6 | BrbfRu6 | BrftLru6 | BrffLru6 | BrbtLru6 | BrbfLru6 => {
            let step = if matches!(*opcode, BrftRu6 | BrffRu6 | BrbtRu6 | BrbfRu6) { 1 } else { 2 };
            let backward = matches!(*opcode, BrbtRu6 | BrbfRu6 | BrbtLru6 | BrbfLru6);
            let target = if backward {
                pc.wrapping_add(step).wrapping_sub(operands[1])
            } else {
                pc.wrapping_add(step).wrapping_add(operands[1])
            };
            operands[1] = target;
            if !valid(target) {
                *opcode = match *opcode {
                    BrftRu6 => BrftIllegalRu6,
                    BrffRu6 => BrffIllegalRu6,
                    BrbtRu6 => BrbtIllegalRu6,
                    BrbfRu6 => BrbfIllegalRu6,
                    BrftLru6 => BrftIllegalLru6,
                    BrffLru6 => BrffIllegalLru6,
                    BrbtLru6 => BrbtIllegalLru6,
                    _ => BrbfIllegalLru6,
                };
            }
        }
        BrfuU6 | BrbuU6 | BrfuLu6 | BrbuLu6 => {
            let step = if matches!(*opcode, BrfuU6 | BrbuU6) { 1 } else { 2 };
            let backward = matches!(*opcode, BrbuU6 | BrbuLu6);
            let target = if backward {
                pc.wrapping_add(step).wrapping_sub(operands[0])
            } else {
                pc.wrapping_add(step).wrapping_add(operands[0])
            };
            operands[0] = target;
            if !valid(target) {
                *opcode = match *opcode {
                    BrfuU6 => BrfuIllegalU6,
                    BrbuU6 => BrbuIllegalU6,
                    BrfuLu6 => BrfuIllegalLu6,
                    _ => BrbuIllegalLu6,
                };
            }
        }
        BlrfU10 | BlrbU10 | BlrfLu10 | BlrbLu10 => {
            let step = if matches!(*opcode, BlrfU10 | BlrbU10) { 1 } else { 2 };
            let backward = matches!(*opcode, BlrbU10 | BlrbLu10);
            let target = if backward {
                pc.wrapping_add(step).wrapping_sub(operands[0])
            } else {
                pc.wrapping_add(step).wrapping_add(operands[0])
            };
            operands[0] = target;
            if !valid(target) {
                *opcode = match *opcode {
                    BlrfU10 => BlrfIllegalU10,
                    BlrbU10 => BlrbIllegalU10,
                    BlrfLu10 => BlrfIllegalLu10,
                    _ => BlrbIllegalLu10,
                };
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_offsets_are_prescaled() {
        let mut op = Opcode::LdwspRu6;
        let mut ops = Operands::of(&[3, 5]);
        transform(&mut op, &mut ops, 0, 0x1000);
        assert_eq!(op, Opcode::LdwspRu6);
        assert_eq!(ops[1], 20);
    }

    #[test]
    fn mov_folds_from_add_zero() {
        let mut op = Opcode::Add2rus;
        let mut ops = Operands::of(&[1, 2, 0]);
        transform(&mut op, &mut ops, 0, 0x1000);
        assert_eq!(op, Opcode::AddMov2rus);
    }

    #[test]
    fn shift_by_32_rewrites() {
        let mut op = Opcode::Shl2rus;
        let mut ops = Operands::of(&[1, 2, 32]);
        transform(&mut op, &mut ops, 0, 0x1000);
        assert_eq!(op, Opcode::Shl322rus);
    }

    #[test]
    fn branch_targets_resolve_relative_to_pc() {
        let mut op = Opcode::BrfuU6;
        let mut ops = Operands::of(&[4]);
        transform(&mut op, &mut ops, 10, 0x1000);
        assert_eq!(op, Opcode::BrfuU6);
        assert_eq!(ops[0], 15);

        let mut op = Opcode::BrbuU6;
        let mut ops = Operands::of(&[4]);
        transform(&mut op, &mut ops, 10, 0x1000);
        assert_eq!(ops[0], 7);
    }

    #[test]
    fn out_of_range_branches_become_illegal_variants() {
        let mut op = Opcode::BrfuU6;
        let mut ops = Operands::of(&[60]);
        transform(&mut op, &mut ops, 10, 32);
        assert_eq!(op, Opcode::BrfuIllegalU6);

        // Backward past the start wraps to a huge pc, also illegal.
        let mut op = Opcode::BrbtRu6;
        let mut ops = Operands::of(&[0, 60]);
        transform(&mut op, &mut ops, 10, 32);
        assert_eq!(op, Opcode::BrbtIllegalRu6);
    }

    #[test]
    fn mkmsk_immediate_becomes_the_mask() {
        let mut op = Opcode::MkmskRus;
        let mut ops = Operands::of(&[0, 8]);
        transform(&mut op, &mut ops, 0, 0x1000);
        assert_eq!(ops[1], 0xff);
    }
}

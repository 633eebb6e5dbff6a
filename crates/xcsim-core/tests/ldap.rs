//! PC-relative address stability: `ldap` must produce the same absolute
//! address for the same target regardless of where the instruction sits.

mod common;

use common::{reg, run_to_exit, Asm, RAM_BASE};
use xcsim_isa::{Opcode, Register};

#[test]
fn ldap_of_one_target_is_placement_independent() {
    const TARGET_PC: u32 = 10;
    let mut asm = Asm::new();
    // First: ldap then nop.
    asm.inst(Opcode::LdapfU10, &[TARGET_PC - (asm.pc() + 1)]);
    asm.inst(Opcode::Nop0r, &[]);
    asm.inst(Opcode::Add2rus, &[4, 11, 0]);
    // Second: nop then ldap.
    asm.inst(Opcode::Nop0r, &[]);
    asm.inst(Opcode::LdapfU10, &[TARGET_PC - (asm.pc() + 1)]);
    asm.inst(Opcode::Add2rus, &[5, 11, 0]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    assert_eq!(asm.pc(), TARGET_PC);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), reg(&sys, Register::R5));
    assert_eq!(reg(&sys, Register::R4), RAM_BASE + TARGET_PC * 2);
}

#[test]
fn ldap_backward_matches_forward() {
    // Address pc 1 from two later sites with LDAPB.
    let mut asm = Asm::new();
    asm.inst(Opcode::BrfuU6, &[1]);
    let target = asm.pc();
    asm.inst(Opcode::Nop0r, &[]); // the addressed location
    let here = asm.pc();
    asm.inst(Opcode::LdapbU10, &[here + 1 - target]);
    asm.inst(Opcode::Add2rus, &[4, 11, 0]);
    asm.inst(Opcode::Nop0r, &[]);
    let here = asm.pc();
    asm.inst(Opcode::LdapbU10, &[here + 1 - target]);
    asm.inst(Opcode::Add2rus, &[5, 11, 0]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), reg(&sys, Register::R5));
    assert_eq!(reg(&sys, Register::R4), RAM_BASE + target * 2);
}

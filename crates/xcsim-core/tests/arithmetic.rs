//! Arithmetic self-checks: the CRC unit, shift saturation and the long
//! multiply-accumulate forms, executed as guest programs.

mod common;

use common::{reg, run_to_exit, Asm};
use xcsim_isa::{Opcode, Register};

#[test]
fn crc32_instruction_matches_reference_vectors() {
    let mut asm = Asm::new();
    // Reference vector from the architecture validation suite.
    asm.ldc32(4, 55568178);
    asm.ldc32(5, 7880939);
    asm.ldc32(6, 9335255);
    asm.inst(Opcode::CrcL3r, &[4, 5, 6]);
    // A second, independent operand set.
    asm.ldc32(7, 0x034f_46b2);
    asm.ldc32(8, 0x0078_433b);
    asm.ldc32(9, 0x008e_7d17);
    asm.inst(Opcode::CrcL3r, &[7, 8, 9]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), 10352975);
    assert_eq!(reg(&sys, Register::R7), 0x0070_b0b2);
}

#[test]
fn crc8_steps_compose_to_crc32() {
    let mut asm = Asm::new();
    asm.ldc32(4, 55568178); // checksum
    asm.ldc32(5, 7880939); // data, shifted through r5
    asm.ldc32(6, 9335255); // poly
    for _ in 0..4 {
        // crc8 %3, %0, %1, %2 with operands [shifted-out, data, poly, cs].
        asm.inst(Opcode::Crc8L4r, &[7, 5, 6, 4]);
        asm.inst(Opcode::Add2rus, &[5, 7, 0]);
    }
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), 10352975);
}

#[test]
fn shifts_by_32_and_beyond_saturate() {
    let mut asm = Asm::new();
    // r4 = shr(0xffffffff, 32) via register shift.
    asm.inst(Opcode::MkmskRus, &[4, 32]);
    asm.inst(Opcode::LdcLru6, &[2, 32]);
    asm.inst(Opcode::Shr3r, &[4, 4, 2]);
    // r5 = shr(0xffffffff, 0xffffffff).
    asm.inst(Opcode::MkmskRus, &[5, 32]);
    asm.inst(Opcode::MkmskRus, &[3, 32]);
    asm.inst(Opcode::Shr3r, &[5, 5, 3]);
    // r6 = shl(0xffffffff, 32) via the immediate form.
    asm.inst(Opcode::MkmskRus, &[6, 32]);
    asm.inst(Opcode::Shl2rus, &[6, 6, 32]);
    // r7 = ashr(0x80000000, 32).
    asm.inst(Opcode::LdcLru6, &[7, 1]);
    asm.inst(Opcode::LdcLru6, &[2, 31]);
    asm.inst(Opcode::Shl3r, &[7, 7, 2]);
    asm.inst(Opcode::AshrL2rus, &[7, 7, 32]);
    // r8 = ashr(0x7fffffff, 32).
    asm.inst(Opcode::MkmskRus, &[8, 31]);
    asm.inst(Opcode::LdcLru6, &[2, 32]);
    asm.inst(Opcode::AshrL3r, &[8, 8, 2]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), 0);
    assert_eq!(reg(&sys, Register::R5), 0);
    assert_eq!(reg(&sys, Register::R6), 0);
    assert_eq!(reg(&sys, Register::R7), 0xffff_ffff);
    assert_eq!(reg(&sys, Register::R8), 0);
}

#[test]
fn maccs_sign_extends_both_factors() {
    let mut asm = Asm::new();
    // (hi, lo) = (3, 5); maccs with (1, -1) must give (3, 4).
    asm.inst(Opcode::LdcLru6, &[4, 3]);
    asm.inst(Opcode::LdcLru6, &[5, 5]);
    asm.inst(Opcode::LdcLru6, &[6, 1]);
    asm.inst(Opcode::MkmskRus, &[7, 32]); // -1
    asm.inst(Opcode::MaccsL4r, &[4, 6, 7, 5]);
    // (hi, lo) = (3, 0xffffffff); maccs with (0x40, 0x40000001).
    asm.inst(Opcode::LdcLru6, &[8, 3]);
    asm.inst(Opcode::MkmskRus, &[9, 32]);
    asm.inst(Opcode::LdcLru6, &[6, 0x40]);
    asm.ldc32(7, 0x4000_0001);
    asm.inst(Opcode::MaccsL4r, &[8, 6, 7, 9]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), 3);
    assert_eq!(reg(&sys, Register::R5), 4);
    assert_eq!(reg(&sys, Register::R8), 0x14);
    assert_eq!(reg(&sys, Register::R9), 0x3f);
}

#[test]
fn maccu_is_unsigned() {
    let mut asm = Asm::new();
    // (3, 0xffffffff) + 0x40 * 0x40000001 = (0x14, 0x3f).
    asm.inst(Opcode::LdcLru6, &[4, 3]);
    asm.inst(Opcode::MkmskRus, &[5, 32]);
    asm.inst(Opcode::LdcLru6, &[6, 0x40]);
    asm.ldc32(7, 0x4000_0001);
    asm.inst(Opcode::MaccuL4r, &[4, 6, 7, 5]);
    // (4, 5) + 1 * 0xffffffff = (5, 4).
    asm.inst(Opcode::LdcLru6, &[8, 4]);
    asm.inst(Opcode::LdcLru6, &[9, 5]);
    asm.inst(Opcode::LdcLru6, &[6, 1]);
    asm.inst(Opcode::MkmskRus, &[7, 32]);
    asm.inst(Opcode::MaccuL4r, &[8, 6, 7, 9]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), 0x14);
    assert_eq!(reg(&sys, Register::R5), 0x3f);
    assert_eq!(reg(&sys, Register::R8), 5);
    assert_eq!(reg(&sys, Register::R9), 4);
}

/// Install a kernel handler at pc 64 (128-byte aligned for `SETKEP`) that
/// exits with ET as the code, then run `body`.
fn run_trap_case(body: impl FnOnce(&mut Asm)) -> i32 {
    const HANDLER_PC: u32 = 64;
    let mut asm = Asm::new();
    // r11 = &handler; kep = r11.
    asm.inst(Opcode::LdapfU10, &[HANDLER_PC - 1]);
    asm.inst(Opcode::Setkep0r, &[]);
    body(&mut asm);
    while asm.pc() < HANDLER_PC {
        asm.inst(Opcode::Nop0r, &[]);
    }
    assert_eq!(asm.pc(), HANDLER_PC);
    asm.inst(Opcode::Getet0r, &[]);
    asm.inst(Opcode::Add2rus, &[1, 11, 0]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    let (_, code) = run_to_exit(&mut asm);
    code
}

#[test]
fn division_by_zero_traps() {
    let code = run_trap_case(|asm| {
        asm.inst(Opcode::LdcLru6, &[4, 7]);
        asm.inst(Opcode::LdcLru6, &[5, 0]);
        asm.inst(Opcode::DivuL3r, &[6, 4, 5]);
    });
    assert_eq!(code as u32, xcsim_core::et::ARITHMETIC);
}

#[test]
fn signed_division_overflow_traps() {
    let code = run_trap_case(|asm| {
        // 0x80000000 / -1 overflows.
        asm.inst(Opcode::LdcLru6, &[4, 1]);
        asm.inst(Opcode::LdcLru6, &[2, 31]);
        asm.inst(Opcode::Shl3r, &[4, 4, 2]);
        asm.inst(Opcode::MkmskRus, &[5, 32]);
        asm.inst(Opcode::DivsL3r, &[6, 4, 5]);
    });
    assert_eq!(code as u32, xcsim_core::et::ARITHMETIC);
}

#[test]
fn misaligned_load_traps() {
    let code = run_trap_case(|asm| {
        asm.ldc32(4, common::RAM_BASE + 2);
        asm.inst(Opcode::LdcLru6, &[5, 0]);
        asm.inst(Opcode::Ldw3r, &[6, 4, 5]);
    });
    assert_eq!(code as u32, xcsim_core::et::LOAD_STORE);
}

#[test]
fn ecall_traps() {
    let code = run_trap_case(|asm| {
        asm.inst(Opcode::LdcLru6, &[4, 1]);
        asm.inst(Opcode::Ecallt1r, &[4]);
    });
    assert_eq!(code as u32, xcsim_core::et::ECALL);
}

//! Event and interrupt delivery: timers firing into waiting threads, and
//! chanend events catching already-buffered data on enable.

mod common;

use common::{reg, run_to_exit, Asm};
use xcsim_core::{setc, ResourceType, ThreadRef};
use xcsim_isa::{Opcode, Register};

#[test]
fn timer_event_wakes_a_waiting_thread() {
    let mut asm = Asm::new();
    const HANDLER_PC: u32 = 32;
    // r11 = &handler for SETV.
    asm.inst(Opcode::LdapfU10, &[HANDLER_PC - 1]);
    asm.inst(Opcode::GetrRus, &[4, ResourceType::Timer as u32]);
    asm.inst(Opcode::Setv1r, &[4]);
    // r5 = now + 200 reference ticks.
    asm.inst(Opcode::In2r, &[6, 4]);
    asm.inst(Opcode::LdcLru6, &[2, 200]);
    asm.inst(Opcode::Add3r, &[5, 6, 2]);
    asm.inst(Opcode::Setd2r, &[5, 4]);
    asm.inst(Opcode::SetcRu6, &[4, setc::COND_AFTER]);
    asm.inst(Opcode::Eeu1r, &[4]);
    asm.inst(Opcode::Waiteu0r, &[]);
    while asm.pc() < HANDLER_PC {
        asm.inst(Opcode::Nop0r, &[]);
    }
    // Handler: read the timer again (condition already met) and exit.
    asm.inst(Opcode::In2r, &[7, 4]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    let after = reg(&sys, Register::R7);
    let deadline = reg(&sys, Register::R5);
    assert!(after.wrapping_sub(deadline) as i32 >= 0, "woke early: {after:#x} < {deadline:#x}");
    // ED carries the environment vector (defaults to the resource id).
    assert_eq!(reg(&sys, Register::Ed), reg(&sys, Register::R4));
}

#[test]
fn timer_in_without_condition_returns_reference_time() {
    let mut asm = Asm::new();
    asm.inst(Opcode::GetrRus, &[4, ResourceType::Timer as u32]);
    asm.inst(Opcode::In2r, &[5, 4]);
    asm.inst(Opcode::In2r, &[6, 4]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    // Successive reads are non-decreasing.
    assert!(reg(&sys, Register::R6) >= reg(&sys, Register::R5));
}

#[test]
fn timed_wait_advances_thread_time() {
    let mut asm = Asm::new();
    asm.inst(Opcode::GetrRus, &[4, ResourceType::Timer as u32]);
    asm.inst(Opcode::In2r, &[6, 4]);
    asm.inst(Opcode::LdcLru6, &[2, 500]);
    asm.inst(Opcode::Add3r, &[5, 6, 2]);
    asm.inst(Opcode::Setd2r, &[5, 4]);
    asm.inst(Opcode::SetcRu6, &[4, setc::COND_AFTER]);
    // Blocking IN, no events: the wheel wakes the parked thread.
    asm.inst(Opcode::In2r, &[7, 4]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert!(reg(&sys, Register::R7).wrapping_sub(reg(&sys, Register::R5)) as i32 >= 0);
    // Roughly 500 reference ticks of simulated time passed.
    assert!(sys.thread(ThreadRef::new(0, 0)).time >= 500);
}

#[test]
fn chanend_event_enable_catches_buffered_data() {
    let mut asm = Asm::new();
    const HANDLER_PC: u32 = 32;
    asm.inst(Opcode::LdapfU10, &[HANDLER_PC - 1]);
    // Chanend looped back to itself.
    asm.inst(Opcode::GetrRus, &[4, ResourceType::Chanend as u32]);
    asm.inst(Opcode::Setd2r, &[4, 4]);
    asm.inst(Opcode::Setv1r, &[4]);
    // Buffer a token first, then enable events: the enable must notice.
    asm.inst(Opcode::LdcLru6, &[1, 0x42]);
    asm.inst(Opcode::Outt2r, &[1, 4]);
    asm.inst(Opcode::Eeu1r, &[4]);
    asm.inst(Opcode::Waiteu0r, &[]);
    while asm.pc() < HANDLER_PC {
        asm.inst(Opcode::Nop0r, &[]);
    }
    asm.inst(Opcode::Int2r, &[5, 4]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R5), 0x42);
}

#[test]
fn cleared_events_do_not_fire() {
    let mut asm = Asm::new();
    asm.inst(Opcode::GetrRus, &[4, ResourceType::Chanend as u32]);
    asm.inst(Opcode::Setd2r, &[4, 4]);
    // Vector would be needed if the event ever fired.
    asm.inst(Opcode::LdapfU10, &[16]);
    asm.inst(Opcode::Setv1r, &[4]);
    asm.inst(Opcode::Eeu1r, &[4]);
    asm.inst(Opcode::Clre0r, &[]);
    asm.inst(Opcode::LdcLru6, &[1, 0x7]);
    asm.inst(Opcode::Outt2r, &[1, 4]);
    // With events cleared, data just sits in the buffer.
    asm.inst(Opcode::Int2r, &[5, 4]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R5), 0x7);
}

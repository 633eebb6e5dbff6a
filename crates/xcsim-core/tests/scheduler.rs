//! Scheduler-level behaviour: timeouts, deadlock detection, lock fairness
//! and time monotonicity.

mod common;

use common::Asm;
use xcsim_core::{RunResult, ThreadRef};
use xcsim_isa::Opcode;

#[test]
fn global_timeout_stops_a_spinning_program() {
    let mut asm = Asm::new();
    // An empty infinite loop: branch to self.
    asm.inst(Opcode::BrbuU6, &[1]);
    let mut sys = common::single_core_system();
    common::load_program(&mut sys, &asm.words);
    sys.set_timeout(50_000);
    assert_eq!(sys.run(), RunResult::Timeout);
    assert!(sys.latest_time >= 50_000);
}

#[test]
fn blocking_on_an_idle_chanend_reports_no_runnable_threads() {
    let mut asm = Asm::new();
    asm.inst(Opcode::GetrRus, &[4, xcsim_core::ResourceType::Chanend as u32]);
    // Input with nothing inbound parks forever.
    asm.inst(Opcode::Int2r, &[5, 4]);
    let mut sys = common::single_core_system();
    common::load_program(&mut sys, &asm.words);
    assert_eq!(sys.run(), RunResult::NoRunnableThreads);
}

#[test]
fn lock_contention_is_fifo() {
    let mut sys = common::single_core_system();
    let id = sys.alloc_resource(0, 0, xcsim_core::ResourceType::Lock, 0).unwrap();
    let num = id.num() as usize;
    assert!(sys.lock_acquire(0, num, 0).is_some());
    // Two contenders queue in order.
    assert!(sys.lock_acquire(0, num, 1).is_none());
    assert!(sys.lock_acquire(0, num, 2).is_none());
    assert!(sys.lock_release(0, num, 0, 10));
    assert_eq!(sys.cores[0].locks[num].held_by, Some(1));
    assert!(sys.lock_release(0, num, 1, 20));
    assert_eq!(sys.cores[0].locks[num].held_by, Some(2));
    // Releasing a lock someone else holds is rejected.
    assert!(!sys.lock_release(0, num, 7, 30));
    assert!(sys.lock_release(0, num, 2, 40));
    assert_eq!(sys.cores[0].locks[num].held_by, None);
}

#[test]
fn thread_time_is_monotone_across_a_run() {
    let mut asm = Asm::new();
    for _ in 0..50 {
        asm.inst(Opcode::Nop0r, &[]);
    }
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = common::run_to_exit(&mut asm);
    assert_eq!(code, 0);
    let t = sys.thread(ThreadRef::new(0, 0));
    // 54 instructions at 4 cycles each.
    assert!(t.time >= 54 * 4);
    assert!(sys.latest_time >= t.time);
}

#[test]
fn getr_exhaustion_returns_zero() {
    let mut sys = common::single_core_system();
    for _ in 0..xcsim_core::core::NUM_SYNCS {
        assert!(sys.alloc_resource(0, 0, xcsim_core::ResourceType::Sync, 0).is_some());
    }
    assert!(sys.alloc_resource(0, 0, xcsim_core::ResourceType::Sync, 0).is_none());
}

#[test]
fn freed_resources_are_reallocatable() {
    let mut sys = common::single_core_system();
    let id = sys.alloc_resource(0, 0, xcsim_core::ResourceType::Timer, 0).unwrap();
    assert!(sys.free_resource(0, 0, id, 0));
    let id2 = sys.alloc_resource(0, 0, xcsim_core::ResourceType::Timer, 0).unwrap();
    assert_eq!(id.0, id2.0);
}

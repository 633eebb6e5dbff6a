//! Tracer callback interface. The simulator invokes a configured tracer at
//! the architectural visibility points; callbacks are non-blocking and may
//! mutate tracer-local state only.

use xcsim_isa::{Opcode, Operands, Register};
use xcsim_support::Ticks;

use crate::resource::{ResRef, ThreadRef};
use crate::system::SystemState;

#[allow(unused_variables)]
pub trait Tracer {
    /// Called once the system is fully constructed.
    fn attach(&mut self, sys: &SystemState) {}

    fn instruction_begin(
        &mut self,
        sys: &SystemState,
        thread: ThreadRef,
        pc: u32,
        opcode: Opcode,
        operands: &Operands,
    ) {
    }

    fn reg_write(&mut self, reg: Register, value: u32) {}

    fn instruction_end(&mut self) {}

    fn sswitch_read(&mut self, sys: &SystemState, node: usize, ret_dest: u32, reg: u16) {}

    fn sswitch_write(&mut self, sys: &SystemState, node: usize, ret_dest: u32, reg: u16, value: u32) {
    }

    fn sswitch_ack(&mut self, sys: &SystemState, node: usize, dest: u32) {}

    fn sswitch_nack(&mut self, sys: &SystemState, node: usize, dest: u32) {}

    fn exception(
        &mut self,
        sys: &SystemState,
        thread: ThreadRef,
        et: u32,
        ed: u32,
        sed: u32,
        ssr: u32,
        spc: u32,
    ) {
    }

    fn event(&mut self, sys: &SystemState, thread: ThreadRef, res: ResRef, pc: u32, ev: u32) {}

    fn interrupt(
        &mut self,
        sys: &SystemState,
        thread: ThreadRef,
        res: ResRef,
        pc: u32,
        ssr: u32,
        spc: u32,
        sed: u32,
        ed: u32,
    ) {
    }

    fn syscall(&mut self, sys: &SystemState, thread: ThreadRef, name: &str, arg: Option<u32>) {}

    fn timeout(&mut self, sys: &SystemState, time: Ticks) {}

    fn no_runnable_threads(&mut self, sys: &SystemState) {}
}

/// Silent tracer used when nothing is attached.
#[derive(Debug, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {}

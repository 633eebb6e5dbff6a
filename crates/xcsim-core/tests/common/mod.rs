//! Shared test harness: assemble small programs through the encoder, load
//! them into a single-core system and run them to completion.

#![allow(dead_code)]

use xcsim_core::{
    BreakpointKind, Core, NodeKind, RunResult, SystemState, ThreadRef,
};
use xcsim_isa::{encode, IsaVariant, Opcode, Operands, Register};

pub const RAM_BASE: u32 = 0x10000;
pub const RAM_SIZE: u32 = 0x10000;

/// Guest exit syscall number (r0), code in r1.
pub const SYS_EXIT: u32 = xcsim_core::nr::EXIT;

pub fn single_core_system() -> SystemState {
    let mut sys = SystemState::new();
    let node = sys.add_node(NodeKind::Processor, 0);
    sys.add_core(node, Core::new(RAM_BASE, RAM_SIZE, IsaVariant::Xs1B));
    sys
}

/// Tiny assembler over the instruction encoder. Program counters are in
/// decode units from the load address.
#[derive(Default)]
pub struct Asm {
    pub words: Vec<u16>,
}

impl Asm {
    pub fn new() -> Asm {
        Asm::default()
    }

    /// Current pc in decode units.
    pub fn pc(&self) -> u32 {
        self.words.len() as u32
    }

    pub fn inst(&mut self, opcode: Opcode, operands: &[u32]) -> &mut Asm {
        let halfwords = encode(opcode, &Operands::of(operands))
            .unwrap_or_else(|e| panic!("encoding {opcode:?}: {e}"));
        self.words.extend(halfwords);
        self
    }

    /// Unconditional forward branch to `target` (a pc known in advance).
    pub fn bu_to(&mut self, target: u32) -> &mut Asm {
        let pc = self.pc();
        assert!(target > pc, "bu_to is for forward branches");
        if target - pc - 1 <= 63 {
            self.inst(Opcode::BrfuU6, &[target - pc - 1])
        } else {
            self.inst(Opcode::BrfuLu6, &[target - pc - 2])
        }
    }

    /// Load a full 32-bit constant into a register.
    pub fn ldc32(&mut self, reg: u32, value: u32) -> &mut Asm {
        if value <= 0xffff {
            return self.inst(Opcode::LdcLru6, &[reg, value]);
        }
        self.inst(Opcode::LdcLru6, &[reg, value >> 16]);
        self.inst(Opcode::Shl2rus, &[reg, reg, 16]);
        if value & 0xffff != 0 {
            // OR in the low half through r11.
            self.inst(Opcode::LdcLru6, &[11, value & 0xffff]);
            self.inst(Opcode::Or3r, &[reg, reg, 11]);
        }
        self
    }

    /// Exit the simulation with a constant code.
    pub fn exit(&mut self, code: u32, exit_pc: u32) -> &mut Asm {
        self.inst(Opcode::LdcLru6, &[0, SYS_EXIT]);
        self.inst(Opcode::LdcLru6, &[1, code]);
        if self.pc() == exit_pc {
            self
        } else {
            self.bu_to(exit_pc)
        }
    }
}

/// Load `words` at the RAM base and start thread 0 at the first one.
pub fn load_program(sys: &mut SystemState, words: &[u16]) {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for hw in words {
        bytes.extend_from_slice(&hw.to_le_bytes());
    }
    assert!(sys.cores[0].write_block(RAM_BASE, &bytes));
    let tref = ThreadRef::new(0, 0);
    let t = sys.thread_mut(tref);
    t.alloc(0);
    t.in_ssync = false;
    t.pc = 0;
    // A workable stack for call-based tests.
    t.set_reg(Register::Sp, RAM_BASE + RAM_SIZE - 4);
    sys.schedule_thread(tref, 0);
}

/// Install the exit-syscall breakpoint at `pc` (decode units).
pub fn install_exit(sys: &mut SystemState, pc: u32) {
    let address = sys.cores[0].from_pc(pc);
    assert!(sys.cores[0].set_breakpoint(address));
    sys.breakpoint_kinds.insert((0, address), BreakpointKind::Syscall);
}

/// Assemble, load, run; the program must exit through the syscall
/// breakpoint appended after its last instruction.
pub fn run_to_exit(asm: &mut Asm) -> (SystemState, i32) {
    let exit_pc = asm.pc();
    asm.inst(Opcode::Nop0r, &[]);
    let mut sys = single_core_system();
    load_program(&mut sys, &asm.words);
    install_exit(&mut sys, exit_pc);
    sys.syscalls.capture_output = true;
    match sys.run() {
        RunResult::Exit(code) => (sys, code),
        other => panic!("program did not exit: {other:?}"),
    }
}

pub fn reg(sys: &SystemState, r: Register) -> u32 {
    sys.thread(ThreadRef::new(0, 0)).reg(r)
}

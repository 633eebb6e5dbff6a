//! Concrete tracers: a disassembling instruction logger, an opcode
//! histogram, and a fan-out combinator.

use std::collections::HashMap;
use std::io::Write;

use xcsim_isa::{properties, OpKind, Opcode, Operands, Register};
use xcsim_support::{Ticks, CYCLES_PER_TICK};

use crate::resource::{ResRef, ThreadRef};
use crate::system::SystemState;
use crate::trace::Tracer;

/// Render an instruction using its property record's format string.
pub fn disassemble(opcode: Opcode, operands: &Operands) -> String {
    let props = properties(opcode);
    let mut out = String::new();
    let mut chars = props.format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(d) if d.is_ascii_digit() => {
                let i = d.to_digit(10).unwrap() as usize;
                if i >= props.operands.len() {
                    continue;
                }
                match props.operands[i] {
                    OpKind::Imm => out.push_str(&format!("{:#x}", operands[i])),
                    _ => match props.implicit_reg(i) {
                        Some(r) => out.push_str(r.name()),
                        None => match Register::from_index(operands[i]) {
                            Some(r) => out.push_str(r.name()),
                            None => out.push('?'),
                        },
                    },
                }
            }
            _ => out.push('%'),
        }
    }
    out
}

/// Streams one line per instruction with the thread, pc, disassembly and
/// the register writes it performed.
pub struct LoggingTracer {
    out: Box<dyn Write + Send>,
    trace_cycles: bool,
    line: String,
    pending: bool,
}

impl LoggingTracer {
    pub fn new(trace_cycles: bool) -> LoggingTracer {
        LoggingTracer::with_output(Box::new(std::io::stderr()), trace_cycles)
    }

    pub fn with_output(out: Box<dyn Write + Send>, trace_cycles: bool) -> LoggingTracer {
        LoggingTracer { out, trace_cycles, line: String::new(), pending: false }
    }

    fn flush_line(&mut self) {
        if self.pending {
            let _ = writeln!(self.out, "{}", self.line);
            self.line.clear();
            self.pending = false;
        }
    }
}

impl Tracer for LoggingTracer {
    fn instruction_begin(
        &mut self,
        sys: &SystemState,
        thread: ThreadRef,
        pc: u32,
        opcode: Opcode,
        operands: &Operands,
    ) {
        self.flush_line();
        let core = &sys.cores[thread.core as usize];
        let address = core.from_pc(pc);
        self.line = format!(
            "t{}.{} {address:#010x}: {:<28}",
            thread.core,
            thread.num,
            disassemble(opcode, operands)
        );
        if self.trace_cycles {
            let time = sys.thread(thread).time;
            self.line.push_str(&format!(" @{time}"));
        }
        self.pending = true;
    }

    fn reg_write(&mut self, reg: Register, value: u32) {
        self.line.push_str(&format!(" {}={value:#x}", reg.name()));
    }

    fn instruction_end(&mut self) {
        self.flush_line();
    }

    fn exception(
        &mut self,
        _sys: &SystemState,
        thread: ThreadRef,
        et: u32,
        ed: u32,
        _sed: u32,
        _ssr: u32,
        spc: u32,
    ) {
        self.flush_line();
        let _ = writeln!(
            self.out,
            "t{}.{} exception et={et} ed={ed:#x} spc={spc:#x}",
            thread.core, thread.num
        );
    }

    fn event(&mut self, _sys: &SystemState, thread: ThreadRef, res: ResRef, pc: u32, ev: u32) {
        self.flush_line();
        let _ = writeln!(
            self.out,
            "t{}.{} event from {:?}[{}] vector={pc:#x} ev={ev:#x}",
            thread.core, thread.num, res.ty, res.num
        );
    }

    fn interrupt(
        &mut self,
        _sys: &SystemState,
        thread: ThreadRef,
        res: ResRef,
        pc: u32,
        _ssr: u32,
        _spc: u32,
        _sed: u32,
        _ed: u32,
    ) {
        self.flush_line();
        let _ = writeln!(
            self.out,
            "t{}.{} interrupt from {:?}[{}] vector={pc:#x}",
            thread.core, thread.num, res.ty, res.num
        );
    }

    fn syscall(&mut self, _sys: &SystemState, thread: ThreadRef, name: &str, arg: Option<u32>) {
        self.flush_line();
        match arg {
            Some(arg) => {
                let _ = writeln!(self.out, "t{}.{} syscall {name}({arg:#x})", thread.core, thread.num);
            }
            None => {
                let _ = writeln!(self.out, "t{}.{} syscall {name}()", thread.core, thread.num);
            }
        }
    }

    fn sswitch_read(&mut self, _sys: &SystemState, node: usize, ret: u32, reg: u16) {
        self.flush_line();
        let _ = writeln!(self.out, "n{node} sswitch read reg={reg:#x} ret={ret:#x}");
    }

    fn sswitch_write(&mut self, _sys: &SystemState, node: usize, ret: u32, reg: u16, value: u32) {
        self.flush_line();
        let _ =
            writeln!(self.out, "n{node} sswitch write reg={reg:#x} value={value:#x} ret={ret:#x}");
    }

    fn sswitch_ack(&mut self, _sys: &SystemState, node: usize, dest: u32) {
        self.flush_line();
        let _ = writeln!(self.out, "n{node} sswitch ack to {dest:#x}");
    }

    fn sswitch_nack(&mut self, _sys: &SystemState, node: usize, dest: u32) {
        self.flush_line();
        let _ = writeln!(self.out, "n{node} sswitch nack to {dest:#x}");
    }

    fn timeout(&mut self, _sys: &SystemState, time: Ticks) {
        self.flush_line();
        let _ = writeln!(self.out, "timeout at {time} cycles ({} ref ticks)", time / CYCLES_PER_TICK as u64);
    }

    fn no_runnable_threads(&mut self, sys: &SystemState) {
        self.flush_line();
        let mut parked = Vec::new();
        for (c, core) in sys.cores.iter().enumerate() {
            for (n, t) in core.threads.iter().enumerate() {
                if t.in_use && !t.in_ssync {
                    parked.push(format!("t{c}.{n} pc={:#x}", core.from_pc(t.pc)));
                }
            }
        }
        let _ = writeln!(self.out, "no runnable threads: {}", parked.join(", "));
    }
}

/// Counts executed instructions per opcode; dumps a table when dropped.
#[derive(Default)]
pub struct StatsTracer {
    counts: HashMap<&'static str, u64>,
    total: u64,
}

impl StatsTracer {
    pub fn new() -> StatsTracer {
        StatsTracer::default()
    }
}

impl Tracer for StatsTracer {
    fn instruction_begin(
        &mut self,
        _sys: &SystemState,
        _thread: ThreadRef,
        _pc: u32,
        opcode: Opcode,
        _operands: &Operands,
    ) {
        *self.counts.entry(properties(opcode).name).or_insert(0) += 1;
        self.total += 1;
    }
}

impl Drop for StatsTracer {
    fn drop(&mut self) {
        let mut rows: Vec<_> = self.counts.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        let mut out = std::io::stderr().lock();
        let _ = writeln!(out, "instruction counts ({} total):", self.total);
        for (name, count) in rows {
            let _ = writeln!(out, "{count:>12}  {name}");
        }
    }
}

/// Fans every callback out to a list of tracers.
#[derive(Default)]
pub struct DelegatingTracer {
    delegates: Vec<Box<dyn Tracer>>,
}

impl DelegatingTracer {
    pub fn new() -> DelegatingTracer {
        DelegatingTracer::default()
    }

    pub fn add_delegate(&mut self, tracer: Box<dyn Tracer>) {
        self.delegates.push(tracer);
    }
}

impl Tracer for DelegatingTracer {
    fn attach(&mut self, sys: &SystemState) {
        for t in &mut self.delegates {
            t.attach(sys);
        }
    }

    fn instruction_begin(
        &mut self,
        sys: &SystemState,
        thread: ThreadRef,
        pc: u32,
        opcode: Opcode,
        operands: &Operands,
    ) {
        for t in &mut self.delegates {
            t.instruction_begin(sys, thread, pc, opcode, operands);
        }
    }

    fn reg_write(&mut self, reg: Register, value: u32) {
        for t in &mut self.delegates {
            t.reg_write(reg, value);
        }
    }

    fn instruction_end(&mut self) {
        for t in &mut self.delegates {
            t.instruction_end();
        }
    }

    fn sswitch_read(&mut self, sys: &SystemState, node: usize, ret: u32, reg: u16) {
        for t in &mut self.delegates {
            t.sswitch_read(sys, node, ret, reg);
        }
    }

    fn sswitch_write(&mut self, sys: &SystemState, node: usize, ret: u32, reg: u16, value: u32) {
        for t in &mut self.delegates {
            t.sswitch_write(sys, node, ret, reg, value);
        }
    }

    fn sswitch_ack(&mut self, sys: &SystemState, node: usize, dest: u32) {
        for t in &mut self.delegates {
            t.sswitch_ack(sys, node, dest);
        }
    }

    fn sswitch_nack(&mut self, sys: &SystemState, node: usize, dest: u32) {
        for t in &mut self.delegates {
            t.sswitch_nack(sys, node, dest);
        }
    }

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
        for t in &mut self.delegates {
            t.exception(sys, thread, et, ed, sed, ssr, spc);
        }
    }

    fn event(&mut self, sys: &SystemState, thread: ThreadRef, res: ResRef, pc: u32, ev: u32) {
        for t in &mut self.delegates {
            t.event(sys, thread, res, pc, ev);
        }
    }

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
        for t in &mut self.delegates {
            t.interrupt(sys, thread, res, pc, ssr, spc, sed, ed);
        }
    }

    fn syscall(&mut self, sys: &SystemState, thread: ThreadRef, name: &str, arg: Option<u32>) {
        for t in &mut self.delegates {
            t.syscall(sys, thread, name, arg);
        }
    }

    fn timeout(&mut self, sys: &SystemState, time: Ticks) {
        for t in &mut self.delegates {
            t.timeout(sys, time);
        }
    }

    fn no_runnable_threads(&mut self, sys: &SystemState) {
        for t in &mut self.delegates {
            t.no_runnable_threads(sys);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcsim_isa::Operands;

    #[test]
    fn disassembles_register_and_immediate_operands() {
        assert_eq!(disassemble(Opcode::Add3r, &Operands::of(&[0, 1, 2])), "add r0, r1, r2");
        assert_eq!(disassemble(Opcode::LdcRu6, &Operands::of(&[3, 0x2a])), "ldc r3, 0x2a");
        assert_eq!(
            disassemble(Opcode::LdawdpRu6, &Operands::of(&[2, 8])),
            "ldaw r2, dp[0x8]"
        );
    }
}

//! The thread interpreter.
//!
//! Each instruction follows one protocol: read operands into a working
//! array, run the opcode body, then (on the normal path) charge the cycle
//! cost, write back output operands, advance the pc and take any pending
//! event. Exception and pause paths skip writeback; paused instructions
//! re-execute when their resource wakes the thread.

use xcsim_isa::{
    decode, properties, transform, InstFlags, OpKind, Opcode, Operands, Register,
};
use xcsim_support::bits::{bit_reverse, crc32, crc8, make_mask, sign_extend, zero_extend};
use xcsim_support::Ticks;

use crate::chanend::{ChanIn, ChanOut};
use crate::clock::REF_CLOCK_NUM;
use crate::core::CacheEntry;
use crate::endpoint::EndpointRef;
use crate::resource::{ResourceId, ResourceType, ThreadRef, LAST_STD_RES_TYPE};
use crate::syscall::SyscallOutcome;
use crate::system::{BreakpointKind, SystemState};
use crate::thread::StatusReg;

/// Architectural exception types.
pub mod et {
    pub const LINK_ERROR: u32 = 1;
    pub const ILLEGAL_PC: u32 = 2;
    pub const ILLEGAL_INSTRUCTION: u32 = 3;
    pub const ILLEGAL_RESOURCE: u32 = 4;
    pub const LOAD_STORE: u32 = 5;
    pub const ILLEGAL_PS: u32 = 6;
    pub const ARITHMETIC: u32 = 7;
    pub const ECALL: u32 = 8;
}

/// Processor-state identifiers for `GETPS`/`SETPS`.
pub mod ps {
    pub const RAM_BASE: u32 = 0x0b;
    pub const VECTOR_BASE: u32 = 0x10b;
}

/// How one instruction ended.
#[derive(Clone, Copy)]
enum Outcome {
    /// Normal completion; writeback and fall through (possibly to a
    /// redirected `next_pc`).
    Next,
    /// As `Next`, but the trace ends and the thread requeues (taken
    /// backward branches, calls and returns).
    EndTrace,
    /// Thread parked on a resource; no writeback, pc unchanged.
    Deschedule,
    /// `WAITEU`-style: take a pending event or park waiting for one.
    DescheduleOrEvent,
    Exception { et: u32, ed: u32 },
    /// Thread terminated (`FREET`).
    EndThread,
    /// Time sliced out before executing (sync instructions only).
    SwitchThread,
    /// The simulation is over (exit syscall).
    Stop,
}

/// Run one thread until it parks, ends its trace, or the simulation stops.
pub(crate) fn run_thread(sys: &mut SystemState, tref: ThreadRef) {
    let core = tref.core as usize;
    loop {
        let pc = sys.thread(tref).pc;
        let max_pc = sys.cores[core].max_pc();
        if pc >= max_pc {
            let (et, ed) = if pc == sys.cores[core].illegal_pc_thread_pc() {
                (et::ILLEGAL_PC, sys.thread(tref).illegal_pc)
            } else {
                (et::ILLEGAL_PC, sys.cores[core].from_pc(pc))
            };
            raise_exception(sys, tref, et, ed);
            if sys.thread(tref).pc >= max_pc {
                // No usable kernel entry point either: the thread cannot
                // make progress, park it for good.
                return;
            }
            continue;
        }
        let mut entry = sys.cores[core].cache_entry(pc);
        if entry.opcode == Opcode::Decode {
            entry = fill_cache(sys, core, pc);
        }
        match execute(sys, tref, pc, entry) {
            Flow::Continue => {}
            Flow::Requeue => {
                let time = sys.thread(tref).time;
                sys.wake_thread(tref, time);
                return;
            }
            Flow::Return => return,
        }
    }
}

enum Flow {
    Continue,
    Requeue,
    Return,
}

fn fill_cache(sys: &mut SystemState, core: usize, pc: u32) -> CacheEntry {
    let c = &sys.cores[core];
    let address = c.from_pc(pc);
    let entry = if c.is_breakpoint_address(address) {
        CacheEntry { opcode: Opcode::Breakpoint, operands: Operands::new() }
    } else {
        let low = c.load_short(c.physical(address));
        let high = if c.check_pc(pc + 1) {
            Some(c.load_short(c.physical(address) + 2))
        } else {
            None
        };
        let decoded = decode(low, high, c.variant);
        let mut opcode = decoded.opcode;
        let mut operands = decoded.operands;
        // The transform runs exactly once, on cache fill.
        transform(&mut opcode, &mut operands, pc, c.max_pc());
        CacheEntry { opcode, operands }
    };
    sys.cores[core].set_cache_entry(pc, entry);
    entry
}

/// Exception entry: save state, switch to kernel mode and vector through
/// KEP.
fn raise_exception(sys: &mut SystemState, tref: ThreadRef, et_kind: u32, ed: u32) {
    use Register::*;
    let core = tref.core as usize;
    let from_pc = sys.cores[core].from_pc(sys.thread(tref).pc);
    let t = sys.thread_mut(tref);
    let old_sr = t.sr;
    let old_ed = t.reg(Ed);
    t.set_reg(Spc, from_pc);
    t.regs[Ssr.index()] = old_sr.bits();
    t.set_reg(Sed, old_ed);
    t.set_reg(Et, et_kind);
    t.set_reg(Ed, ed);
    let in_kernel = old_sr.contains(StatusReg::INK);
    t.sr.remove(StatusReg::EEBLE);
    t.sr.remove(StatusReg::IEBLE);
    t.sr.insert(StatusReg::INK);
    let kep = t.reg(Kep);
    let vector = kep.wrapping_add(if in_kernel { 64 } else { 0 });
    let (ssr, spc, sed) = (t.regs[Ssr.index()], t.reg(Spc), t.reg(Sed));
    let target = sys.cores[core].to_pc(vector);
    let target_ok = sys.cores[core].check_pc(target) && vector & 1 == 0;
    let illegal_pc_thread_pc = sys.cores[core].illegal_pc_thread_pc();
    let t = sys.thread_mut(tref);
    if target_ok {
        t.pc = target;
    } else {
        t.illegal_pc = vector;
        t.pc = illegal_pc_thread_pc;
    }
    sys.trace(|tr, s| tr.exception(s, tref, et_kind, ed, sed, ssr, spc));
}

/// Thread SR write; newly enabled events are given the chance to fire.
fn set_sr(sys: &mut SystemState, tref: ThreadRef, bits: u32, time: Ticks) {
    let new = StatusReg::from_bits_truncate(bits);
    let old = sys.thread(tref).sr;
    sys.thread_mut(tref).sr = new;
    let enabled = new & !old;
    if enabled.intersects(StatusReg::EEBLE | StatusReg::IEBLE) {
        sys.see_thread_event_enable(tref, time);
    }
}

fn execute(sys: &mut SystemState, tref: ThreadRef, pc: u32, entry: CacheEntry) -> Flow {
    let core = tref.core as usize;
    let opcode = entry.opcode;
    let props = properties(opcode);

    // Sync instructions yield at the time-slice boundary before executing.
    if props.flags.contains(InstFlags::SYNC) && sys.time_slice_expired(sys.thread(tref).time) {
        return Flow::Requeue;
    }

    // Operand read. Explicit register slots hold register-file indices;
    // implicit slots read their architectural register; SR reads its bits.
    let mut vals = [0u32; 6];
    {
        let t = sys.thread(tref);
        for (i, &kind) in props.operands.iter().enumerate() {
            vals[i] = match kind {
                OpKind::Imm => entry.operands[i],
                OpKind::Out => 0,
                OpKind::In | OpKind::InOut => match props.implicit_reg(i) {
                    Some(Register::Sr) => t.sr.bits(),
                    Some(r) => t.reg(r),
                    None => Register::from_index(entry.operands[i]).map_or(0, |r| t.reg(r)),
                },
            };
        }
    }

    if sys.tracing() {
        sys.trace(|tr, s| tr.instruction_begin(s, tref, pc, opcode, &entry.operands));
    }

    let mut next_pc = pc.wrapping_add(props.pc_step());
    let time = sys.thread(tref).time;

    let outcome = if props.flags.contains(InstFlags::UNIMPLEMENTED) {
        Outcome::Exception { et: et::ILLEGAL_INSTRUCTION, ed: 0 }
    } else {
        dispatch(sys, tref, opcode, &mut vals, pc, &mut next_pc, time)
    };

    let cycles = props.cycles as Ticks;
    match outcome {
        Outcome::Next | Outcome::EndTrace => {
            sys.thread_mut(tref).time += cycles;
            // Writeback, then pc, then SR (which may enable events).
            let mut sr_write = None;
            for (i, &kind) in props.operands.iter().enumerate() {
                if !matches!(kind, OpKind::Out | OpKind::InOut) {
                    continue;
                }
                match props.implicit_reg(i) {
                    Some(Register::Sr) => sr_write = Some(vals[i]),
                    Some(r) => {
                        sys.thread_mut(tref).set_reg(r, vals[i]);
                        sys.trace(|tr, _| tr.reg_write(r, vals[i]));
                    }
                    None => {
                        if let Some(r) = Register::from_index(entry.operands[i]) {
                            sys.thread_mut(tref).set_reg(r, vals[i]);
                            sys.trace(|tr, _| tr.reg_write(r, vals[i]));
                        }
                    }
                }
            }
            sys.thread_mut(tref).pc = next_pc;
            let now = sys.thread(tref).time;
            if let Some(bits) = sr_write {
                set_sr(sys, tref, bits, now);
            }
            if props.flags.contains(InstFlags::CAN_EVENT) && sys.has_pending_event(tref) {
                sys.take_pending_event(tref, now);
            }
            sys.trace(|tr, _| tr.instruction_end());
            match outcome {
                Outcome::Next => Flow::Continue,
                _ => Flow::Requeue,
            }
        }
        Outcome::Deschedule => {
            sys.thread_mut(tref).time += cycles;
            sys.trace(|tr, _| tr.instruction_end());
            Flow::Return
        }
        Outcome::DescheduleOrEvent => {
            sys.thread_mut(tref).time += cycles;
            let now = sys.thread(tref).time;
            if sys.has_pending_event(tref) {
                sys.take_pending_event(tref, now);
                sys.trace(|tr, _| tr.instruction_end());
                Flow::Continue
            } else {
                sys.thread_mut(tref).sr.insert(StatusReg::WAITING);
                sys.trace(|tr, _| tr.instruction_end());
                Flow::Return
            }
        }
        Outcome::Exception { et, ed } => {
            sys.thread_mut(tref).time += cycles;
            sys.trace(|tr, _| tr.instruction_end());
            raise_exception(sys, tref, et, ed);
            if sys.time_slice_expired(sys.thread(tref).time) {
                Flow::Requeue
            } else {
                Flow::Continue
            }
        }
        Outcome::EndThread => {
            sys.thread_mut(tref).time += cycles;
            sys.trace(|tr, _| tr.instruction_end());
            Flow::Return
        }
        Outcome::SwitchThread => Flow::Requeue,
        Outcome::Stop => Flow::Return,
    }
}

// ----------------------------------------------------------------------
// Resource lookup helpers. Failed checks surface as ET_ILLEGAL_RESOURCE.

fn local_chanend(sys: &SystemState, core: usize, id: ResourceId) -> Option<EndpointRef> {
    if id.ty() != Some(ResourceType::Chanend) {
        return None;
    }
    let c = &sys.cores[core];
    let node = &sys.nodes[c.node];
    if id.node() & make_mask(node.node_number_bits) != node.id {
        return None;
    }
    if id.num() / 32 != c.core_number {
        return None;
    }
    let num = (id.num() % 32) as usize;
    if !c.chanends[num].res.in_use {
        return None;
    }
    Some(EndpointRef::Chanend { core: core as u16, num: num as u8 })
}

fn local_port(sys: &SystemState, core: usize, id: ResourceId) -> Option<usize> {
    if id.ty() != Some(ResourceType::Port) {
        return None;
    }
    let idx = sys.cores[core].port_index(id.width(), id.num())?;
    if !sys.cores[core].ports[idx].res.in_use {
        return None;
    }
    Some(idx)
}

fn local_thread(sys: &SystemState, core: usize, id: ResourceId) -> Option<usize> {
    if id.ty() != Some(ResourceType::Thread) {
        return None;
    }
    let num = id.num() as usize;
    if num >= sys.cores[core].threads.len() || !sys.cores[core].threads[num].in_use {
        return None;
    }
    Some(num)
}

fn local_sync(sys: &SystemState, core: usize, id: ResourceId) -> Option<usize> {
    if id.ty() != Some(ResourceType::Sync) {
        return None;
    }
    let num = id.num() as usize;
    if num >= sys.cores[core].syncs.len() || !sys.cores[core].syncs[num].res.in_use {
        return None;
    }
    Some(num)
}

fn local_timer(sys: &SystemState, core: usize, id: ResourceId) -> Option<usize> {
    if id.ty() != Some(ResourceType::Timer) {
        return None;
    }
    let num = id.num() as usize;
    if num >= sys.cores[core].timers.len() || !sys.cores[core].timers[num].res.in_use {
        return None;
    }
    Some(num)
}

fn local_lock(sys: &SystemState, core: usize, id: ResourceId) -> Option<usize> {
    if id.ty() != Some(ResourceType::Lock) {
        return None;
    }
    let num = id.num() as usize;
    if num >= sys.cores[core].locks.len() || !sys.cores[core].locks[num].res.in_use {
        return None;
    }
    Some(num)
}

// Memory access helpers; `Err` carries the faulting virtual address.

fn load_word(sys: &SystemState, core: usize, addr: u32) -> Result<u32, u32> {
    let c = &sys.cores[core];
    let phys = c.physical(addr);
    if c.check_addr_word(phys) {
        Ok(c.load_word(phys))
    } else {
        Err(addr)
    }
}

fn load_short(sys: &SystemState, core: usize, addr: u32) -> Result<u32, u32> {
    let c = &sys.cores[core];
    let phys = c.physical(addr);
    if c.check_addr_short(phys) {
        Ok(c.load_short(phys) as u32)
    } else {
        Err(addr)
    }
}

fn load_byte(sys: &SystemState, core: usize, addr: u32) -> Result<u32, u32> {
    let c = &sys.cores[core];
    let phys = c.physical(addr);
    if c.check_addr(phys) {
        Ok(c.load_byte(phys) as u32)
    } else {
        Err(addr)
    }
}

fn store_word(sys: &mut SystemState, core: usize, addr: u32, value: u32) -> Result<(), u32> {
    let c = &mut sys.cores[core];
    let phys = c.physical(addr);
    if c.check_addr_word(phys) {
        c.store_word(phys, value);
        Ok(())
    } else {
        Err(addr)
    }
}

fn store_short(sys: &mut SystemState, core: usize, addr: u32, value: u32) -> Result<(), u32> {
    let c = &mut sys.cores[core];
    let phys = c.physical(addr);
    if c.check_addr_short(phys) {
        c.store_short(phys, value as u16);
        Ok(())
    } else {
        Err(addr)
    }
}

fn store_byte(sys: &mut SystemState, core: usize, addr: u32, value: u32) -> Result<(), u32> {
    let c = &mut sys.cores[core];
    let phys = c.physical(addr);
    if c.check_addr(phys) {
        c.store_byte(phys, value as u8);
        Ok(())
    } else {
        Err(addr)
    }
}

macro_rules! try_load {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(addr) => return Outcome::Exception { et: et::LOAD_STORE, ed: addr },
        }
    };
}

macro_rules! illegal_res {
    ($id:expr) => {
        Outcome::Exception { et: et::ILLEGAL_RESOURCE, ed: $id }
    };
}

#[allow(clippy::too_many_lines)]
fn dispatch(
    sys: &mut SystemState,
    tref: ThreadRef,
    opcode: Opcode,
    vals: &mut [u32; 6],
    pc: u32,
    next_pc: &mut u32,
    time: Ticks,
) -> Outcome {
    use Opcode::*;
    let core = tref.core as usize;
    let thread = tref.num;
    let from_next_pc = |sys: &SystemState, npc: u32| sys.cores[core].from_pc(npc);

    match opcode {
        // --- Arithmetic and logic.
        Add3r | Add2rus => {
            vals[0] = vals[1].wrapping_add(vals[2]);
            Outcome::Next
        }
        AddMov2rus => {
            vals[0] = vals[1];
            Outcome::Next
        }
        Sub3r | Sub2rus => {
            vals[0] = vals[1].wrapping_sub(vals[2]);
            Outcome::Next
        }
        Eq3r | Eq2rus => {
            vals[0] = (vals[1] == vals[2]) as u32;
            Outcome::Next
        }
        Lss3r => {
            vals[0] = ((vals[1] as i32) < vals[2] as i32) as u32;
            Outcome::Next
        }
        Lsu3r => {
            vals[0] = (vals[1] < vals[2]) as u32;
            Outcome::Next
        }
        And3r => {
            vals[0] = vals[1] & vals[2];
            Outcome::Next
        }
        Or3r => {
            vals[0] = vals[1] | vals[2];
            Outcome::Next
        }
        XorL3r => {
            vals[0] = vals[1] ^ vals[2];
            Outcome::Next
        }
        Shl3r => {
            vals[0] = if vals[2] >= 32 { 0 } else { vals[1] << vals[2] };
            Outcome::Next
        }
        Shl2rus => {
            vals[0] = vals[1] << (vals[2] & 31);
            Outcome::Next
        }
        Shl322rus => {
            vals[0] = 0;
            Outcome::Next
        }
        Shr3r => {
            vals[0] = if vals[2] >= 32 { 0 } else { vals[1] >> vals[2] };
            Outcome::Next
        }
        Shr2rus => {
            vals[0] = vals[1] >> (vals[2] & 31);
            Outcome::Next
        }
        Shr322rus => {
            vals[0] = 0;
            Outcome::Next
        }
        AshrL3r => {
            vals[0] = if vals[2] >= 32 {
                ((vals[1] as i32) >> 31) as u32
            } else {
                ((vals[1] as i32) >> vals[2]) as u32
            };
            Outcome::Next
        }
        AshrL2rus => {
            vals[0] = ((vals[1] as i32) >> (vals[2] & 31)) as u32;
            Outcome::Next
        }
        Ashr32L2rus => {
            vals[0] = ((vals[1] as i32) >> 31) as u32;
            Outcome::Next
        }
        MulL3r => {
            vals[0] = vals[1].wrapping_mul(vals[2]);
            Outcome::Next
        }
        DivsL3r => match (vals[1] as i32).checked_div(vals[2] as i32) {
            Some(q) => {
                vals[0] = q as u32;
                Outcome::Next
            }
            None => Outcome::Exception { et: et::ARITHMETIC, ed: 0 },
        },
        DivuL3r => match vals[1].checked_div(vals[2]) {
            Some(q) => {
                vals[0] = q;
                Outcome::Next
            }
            None => Outcome::Exception { et: et::ARITHMETIC, ed: 0 },
        },
        RemsL3r => match (vals[1] as i32).checked_rem(vals[2] as i32) {
            Some(r) => {
                vals[0] = r as u32;
                Outcome::Next
            }
            None => Outcome::Exception { et: et::ARITHMETIC, ed: 0 },
        },
        RemuL3r => match vals[1].checked_rem(vals[2]) {
            Some(r) => {
                vals[0] = r;
                Outcome::Next
            }
            None => Outcome::Exception { et: et::ARITHMETIC, ed: 0 },
        },
        Not2r => {
            vals[0] = !vals[1];
            Outcome::Next
        }
        Neg2r => {
            vals[0] = (vals[1] as i32).wrapping_neg() as u32;
            Outcome::Next
        }
        Sext2r | SextRus => {
            vals[0] = sign_extend(vals[0], vals[1]);
            Outcome::Next
        }
        Zext2r | ZextRus => {
            vals[0] = zero_extend(vals[0], vals[1]);
            Outcome::Next
        }
        Andnot2r => {
            vals[0] &= !vals[1];
            Outcome::Next
        }
        Mkmsk2r => {
            vals[0] = make_mask(vals[1]);
            Outcome::Next
        }
        MkmskRus => {
            // The transform already folded the mask into the immediate.
            vals[0] = vals[1];
            Outcome::Next
        }
        BitrevL2r => {
            vals[0] = bit_reverse(vals[1]);
            Outcome::Next
        }
        ByterevL2r => {
            vals[0] = vals[1].swap_bytes();
            Outcome::Next
        }
        ClzL2r => {
            vals[0] = vals[1].leading_zeros();
            Outcome::Next
        }
        CrcL3r => {
            vals[0] = crc32(vals[0], vals[1], vals[2]);
            Outcome::Next
        }
        Crc8L4r => {
            vals[3] = crc8(vals[3], vals[1] as u8, vals[2]);
            vals[0] = vals[1] >> 8;
            Outcome::Next
        }
        MaccuL4r => {
            let acc = (vals[0] as u64) << 32 | vals[3] as u64;
            let result = acc.wrapping_add(vals[1] as u64 * vals[2] as u64);
            vals[0] = (result >> 32) as u32;
            vals[3] = result as u32;
            Outcome::Next
        }
        MaccsL4r => {
            let acc = ((vals[0] as u64) << 32 | vals[3] as u64) as i64;
            let prod = (vals[1] as i32 as i64).wrapping_mul(vals[2] as i32 as i64);
            let result = acc.wrapping_add(prod) as u64;
            vals[0] = (result >> 32) as u32;
            vals[3] = result as u32;
            Outcome::Next
        }
        LaddL5r => {
            let result = vals[1] as u64 + vals[2] as u64 + (vals[4] & 1) as u64;
            vals[3] = (result >> 32) as u32;
            vals[0] = result as u32;
            Outcome::Next
        }
        LsubL5r => {
            let result =
                (vals[1] as u64).wrapping_sub(vals[2] as u64).wrapping_sub((vals[4] & 1) as u64);
            vals[3] = (result >> 32) as u32;
            vals[0] = result as u32;
            Outcome::Next
        }
        LdivuL5r => {
            if vals[2] == 0 || vals[4] >= vals[2] {
                return Outcome::Exception { et: et::ARITHMETIC, ed: 0 };
            }
            let dividend = (vals[4] as u64) << 32 | vals[1] as u64;
            vals[0] = (dividend / vals[2] as u64) as u32;
            vals[3] = (dividend % vals[2] as u64) as u32;
            Outcome::Next
        }
        LmulL6r => {
            let result =
                vals[1] as u64 * vals[2] as u64 + vals[4] as u64 + vals[5] as u64;
            vals[0] = (result >> 32) as u32;
            vals[3] = result as u32;
            Outcome::Next
        }

        // --- Loads and stores. Addressing immediates are pre-scaled.
        Ldw3r => {
            let addr = vals[1].wrapping_add(vals[2] << 2);
            vals[0] = try_load!(load_word(sys, core, addr));
            Outcome::Next
        }
        Ldw2rus | LdwspRu6 | LdwspLru6 | LdwdpRu6 | LdwdpLru6 | LdwcpRu6 | LdwcpLru6 => {
            let (base, offset) = if opcode == Ldw2rus {
                (vals[1], vals[2])
            } else {
                (vals[2], vals[1])
            };
            let addr = base.wrapping_add(offset);
            vals[0] = try_load!(load_word(sys, core, addr));
            Outcome::Next
        }
        LdwcplU10 | LdwcplLu10 => {
            let addr = vals[2].wrapping_add(vals[0]);
            vals[1] = try_load!(load_word(sys, core, addr));
            Outcome::Next
        }
        Ld16sL3r => {
            let addr = vals[1].wrapping_add(vals[2] << 1);
            vals[0] = sign_extend(try_load!(load_short(sys, core, addr)), 16);
            Outcome::Next
        }
        Ld8uL3r => {
            let addr = vals[1].wrapping_add(vals[2]);
            vals[0] = try_load!(load_byte(sys, core, addr));
            Outcome::Next
        }
        Stw2rus => {
            let addr = vals[1].wrapping_add(vals[2]);
            try_load!(store_word(sys, core, addr, vals[0]));
            Outcome::Next
        }
        StwL3r => {
            let addr = vals[1].wrapping_add(vals[2] << 2);
            try_load!(store_word(sys, core, addr, vals[0]));
            Outcome::Next
        }
        St16L3r => {
            let addr = vals[1].wrapping_add(vals[2] << 1);
            try_load!(store_short(sys, core, addr, vals[0]));
            Outcome::Next
        }
        St8L3r => {
            let addr = vals[1].wrapping_add(vals[2]);
            try_load!(store_byte(sys, core, addr, vals[0]));
            Outcome::Next
        }
        StwspRu6 | StwspLru6 | StwdpRu6 | StwdpLru6 => {
            let addr = vals[2].wrapping_add(vals[1]);
            try_load!(store_word(sys, core, addr, vals[0]));
            Outcome::Next
        }
        LdawfL3r => {
            vals[0] = vals[1].wrapping_add(vals[2] << 2);
            Outcome::Next
        }
        LdawbL3r => {
            vals[0] = vals[1].wrapping_sub(vals[2] << 2);
            Outcome::Next
        }
        Lda16fL3r => {
            vals[0] = vals[1].wrapping_add(vals[2] << 1);
            Outcome::Next
        }
        Lda16bL3r => {
            vals[0] = vals[1].wrapping_sub(vals[2] << 1);
            Outcome::Next
        }
        LdawfL2rus => {
            vals[0] = vals[1].wrapping_add(vals[2]);
            Outcome::Next
        }
        LdawbL2rus => {
            vals[0] = vals[1].wrapping_sub(vals[2]);
            Outcome::Next
        }
        LdawdpRu6 | LdawdpLru6 | LdawspRu6 | LdawspLru6 => {
            vals[0] = vals[2].wrapping_add(vals[1]);
            Outcome::Next
        }
        LdawcpU6 | LdawcpLu6 => {
            vals[1] = vals[2].wrapping_add(vals[0]);
            Outcome::Next
        }
        LdcRu6 | LdcLru6 => {
            vals[0] = vals[1];
            Outcome::Next
        }

        // --- Stack and kernel-stack frames.
        ExtspU6 | ExtspLu6 | ExtdpU6 | ExtdpLu6 => {
            vals[1] = vals[1].wrapping_sub(vals[0]);
            Outcome::Next
        }
        EntspU6 | EntspLu6 => {
            if vals[0] > 0 {
                let addr = vals[1];
                try_load!(store_word(sys, core, addr, vals[2]));
                vals[1] = vals[1].wrapping_sub(vals[0]);
            }
            Outcome::Next
        }
        RetspU6 | RetspLu6 => {
            if vals[0] > 0 {
                let addr = vals[1].wrapping_add(vals[0]);
                let loaded = try_load!(load_word(sys, core, addr));
                vals[1] = addr;
                vals[2] = loaded;
            }
            if vals[2] & 1 != 0 {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: vals[2] };
            }
            let target = sys.cores[core].to_pc(vals[2]);
            if !sys.cores[core].check_pc(target) {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: vals[2] };
            }
            *next_pc = target;
            Outcome::EndTrace
        }
        KrestspU6 | KrestspLu6 => {
            let addr = vals[1].wrapping_add(vals[0]);
            let loaded = try_load!(load_word(sys, core, addr));
            vals[2] = addr;
            vals[1] = loaded;
            Outcome::Next
        }
        KentspU6 | KentspLu6 => {
            let addr = vals[2];
            try_load!(store_word(sys, core, addr, vals[1]));
            vals[1] = vals[2].wrapping_sub(vals[0]);
            Outcome::Next
        }
        Setsp1r | Setdp1r | Setcp1r => {
            vals[1] = vals[0];
            Outcome::Next
        }

        // --- Branches. Targets were resolved by the transform.
        BrftRu6 | BrftLru6 => {
            if vals[0] != 0 {
                *next_pc = vals[1];
            }
            Outcome::Next
        }
        BrffRu6 | BrffLru6 => {
            if vals[0] == 0 {
                *next_pc = vals[1];
            }
            Outcome::Next
        }
        BrbtRu6 | BrbtLru6 => {
            if vals[0] != 0 {
                *next_pc = vals[1];
                return Outcome::EndTrace;
            }
            Outcome::Next
        }
        BrbfRu6 | BrbfLru6 => {
            if vals[0] == 0 {
                *next_pc = vals[1];
                return Outcome::EndTrace;
            }
            Outcome::Next
        }
        BrftIllegalRu6 | BrftIllegalLru6 | BrbtIllegalRu6 | BrbtIllegalLru6 => {
            if vals[0] != 0 {
                let ed = from_next_pc(sys, vals[1]);
                return Outcome::Exception { et: et::ILLEGAL_PC, ed };
            }
            Outcome::Next
        }
        BrffIllegalRu6 | BrffIllegalLru6 | BrbfIllegalRu6 | BrbfIllegalLru6 => {
            if vals[0] == 0 {
                let ed = from_next_pc(sys, vals[1]);
                return Outcome::Exception { et: et::ILLEGAL_PC, ed };
            }
            Outcome::Next
        }
        BrfuU6 | BrfuLu6 => {
            *next_pc = vals[0];
            Outcome::Next
        }
        BrbuU6 | BrbuLu6 => {
            *next_pc = vals[0];
            Outcome::EndTrace
        }
        BrfuIllegalU6 | BrfuIllegalLu6 | BrbuIllegalU6 | BrbuIllegalLu6 => {
            let ed = from_next_pc(sys, vals[0]);
            Outcome::Exception { et: et::ILLEGAL_PC, ed }
        }
        LdapfU10 | LdapfLu10 => {
            vals[1] = from_next_pc(sys, *next_pc).wrapping_add(vals[0]);
            Outcome::Next
        }
        LdapbU10 | LdapbLu10 => {
            vals[1] = from_next_pc(sys, *next_pc).wrapping_sub(vals[0]);
            Outcome::Next
        }
        BlrfU10 | BlrfLu10 => {
            vals[1] = from_next_pc(sys, *next_pc);
            *next_pc = vals[0];
            Outcome::Next
        }
        BlrbU10 | BlrbLu10 => {
            vals[1] = from_next_pc(sys, *next_pc);
            *next_pc = vals[0];
            Outcome::EndTrace
        }
        BlrfIllegalU10 | BlrfIllegalLu10 | BlrbIllegalU10 | BlrbIllegalLu10 => {
            let ed = from_next_pc(sys, vals[0]);
            Outcome::Exception { et: et::ILLEGAL_PC, ed }
        }
        BlacpU10 | BlacpLu10 => {
            let addr = vals[2].wrapping_add(vals[0] << 2);
            let value = try_load!(load_word(sys, core, addr));
            if value & 1 != 0 {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: value };
            }
            let target = sys.cores[core].to_pc(value);
            if !sys.cores[core].check_pc(target) {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: value };
            }
            vals[1] = from_next_pc(sys, *next_pc);
            *next_pc = target;
            Outcome::EndTrace
        }
        Bau1r => {
            if vals[0] & 1 != 0 {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: vals[0] };
            }
            let target = sys.cores[core].to_pc(vals[0]);
            if !sys.cores[core].check_pc(target) {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: vals[0] };
            }
            *next_pc = target;
            Outcome::EndTrace
        }
        Bla1r => {
            if vals[0] & 1 != 0 {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: vals[0] };
            }
            let target = sys.cores[core].to_pc(vals[0]);
            if !sys.cores[core].check_pc(target) {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: vals[0] };
            }
            vals[1] = from_next_pc(sys, *next_pc);
            *next_pc = target;
            Outcome::EndTrace
        }
        Bru1r => {
            let target = next_pc.wrapping_add(vals[0]);
            if !sys.cores[core].check_pc(target) {
                let ed = from_next_pc(sys, target);
                return Outcome::Exception { et: et::ILLEGAL_PC, ed };
            }
            *next_pc = target;
            Outcome::EndTrace
        }

        // --- Status register and kernel state.
        SetsrU6 | SetsrLu6 => {
            vals[1] |= vals[0];
            Outcome::Next
        }
        ClrsrU6 | ClrsrLu6 => {
            vals[1] &= !vals[0];
            Outcome::Next
        }
        GetsrU6 | GetsrLu6 => {
            vals[1] = vals[0] & vals[2];
            Outcome::Next
        }
        Getid0r => {
            vals[0] = ResourceId::local(thread as u32, ResourceType::Thread).0;
            Outcome::Next
        }
        Getet0r | Geted0r | Getkep0r | Getksp0r => {
            vals[0] = vals[1];
            Outcome::Next
        }
        Setkep0r => {
            // KEP is 128-byte aligned.
            vals[0] = vals[1] & !((1 << 7) - 1);
            Outcome::Next
        }
        Kret0r => {
            let spc = vals[0];
            if spc & 1 != 0 {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: spc };
            }
            let target = sys.cores[core].to_pc(spc);
            if !sys.cores[core].check_pc(target) {
                return Outcome::Exception { et: et::ILLEGAL_PC, ed: spc };
            }
            *next_pc = target;
            vals[3] = vals[1];
            let mut sr = StatusReg::from_bits_truncate(vals[2]);
            sr.remove(StatusReg::WAITING);
            vals[4] = sr.bits();
            Outcome::EndTrace
        }
        Ldspc0r | Ldssr0r | Ldsed0r | Ldet0r => {
            let slot = match opcode {
                Ldspc0r => 1,
                Ldssr0r => 2,
                Ldsed0r => 3,
                _ => 4,
            };
            let addr = vals[1].wrapping_add(slot << 2);
            vals[0] = try_load!(load_word(sys, core, addr));
            Outcome::Next
        }
        Stspc0r | Stssr0r | Stsed0r | Stet0r => {
            let slot = match opcode {
                Stspc0r => 1,
                Stssr0r => 2,
                Stsed0r => 3,
                _ => 4,
            };
            let addr = vals[1].wrapping_add(slot << 2);
            try_load!(store_word(sys, core, addr, vals[0]));
            Outcome::Next
        }
        GetpsL2r => match vals[1] {
            ps::RAM_BASE => {
                vals[0] = sys.cores[core].ram_base;
                Outcome::Next
            }
            ps::VECTOR_BASE => {
                vals[0] = sys.cores[core].vector_base;
                Outcome::Next
            }
            _ => Outcome::Exception { et: et::ILLEGAL_PS, ed: vals[1] },
        },
        SetpsL2r => match vals[1] {
            ps::VECTOR_BASE => {
                sys.cores[core].vector_base = vals[0];
                Outcome::Next
            }
            _ => Outcome::Exception { et: et::ILLEGAL_PS, ed: vals[1] },
        },
        Ecallt1r => {
            if vals[0] != 0 {
                return Outcome::Exception { et: et::ECALL, ed: 0 };
            }
            Outcome::Next
        }
        Ecallf1r => {
            if vals[0] == 0 {
                return Outcome::Exception { et: et::ECALL, ed: 0 };
            }
            Outcome::Next
        }
        Clre0r => {
            sys.clear_thread_events(tref);
            let t = sys.thread_mut(tref);
            t.sr.remove(StatusReg::EEBLE);
            t.sr.remove(StatusReg::IEBLE);
            Outcome::Next
        }
        Nop0r => Outcome::Next,

        // --- Resource allocation and thread management.
        GetrRus => {
            if vals[1] > LAST_STD_RES_TYPE {
                vals[0] = 1;
            } else {
                let ty = ResourceType::from_code(vals[1]);
                vals[0] = ty
                    .and_then(|ty| sys.alloc_resource(core, thread, ty, time))
                    .map_or(0, |id| id.0);
            }
            Outcome::Next
        }
        Freer1r => {
            let id = ResourceId(vals[0]);
            if !sys.free_resource(core, thread, id, time) {
                return illegal_res!(vals[0]);
            }
            Outcome::Next
        }
        Getst2r => {
            let id = ResourceId(vals[1]);
            let Some(sync) = local_sync(sys, core, id) else { return illegal_res!(vals[1]) };
            match sys.alloc_thread(core) {
                Some(t) => {
                    sys.cores[core].syncs[sync].children.push(t as u8);
                    sys.cores[core].threads[t].sync = Some(sync as u8);
                    vals[0] = ResourceId::local(t as u32, ResourceType::Thread).0;
                }
                None => vals[0] = 0,
            }
            Outcome::Next
        }
        Tsetr3r => {
            let id = ResourceId(vals[2]);
            let Some(t) = local_thread(sys, core, id) else { return illegal_res!(vals[2]) };
            if let Some(r) = Register::from_index(vals[0]) {
                sys.cores[core].threads[t].set_reg(r, vals[1]);
            }
            Outcome::Next
        }
        TsetmrL2r => {
            let Some(sync) = sys.thread(tref).sync else {
                return illegal_res!(ResourceId::local(thread as u32, ResourceType::Thread).0);
            };
            let master = sys.cores[core].syncs[sync as usize].master;
            if let Some(r) = Register::from_index(vals[0]) {
                sys.cores[core].threads[master as usize].set_reg(r, vals[1]);
            }
            Outcome::Next
        }
        Tinitpc2r => {
            let id = ResourceId(vals[1]);
            let Some(t) = local_thread(sys, core, id) else { return illegal_res!(vals[1]) };
            if !sys.cores[core].threads[t].in_ssync {
                return illegal_res!(vals[1]);
            }
            let value = vals[0];
            if value & 1 == 0 && sys.cores[core].check_pc(sys.cores[core].to_pc(value)) {
                // One short of the entry point: starting the thread steps
                // the pc forward.
                sys.cores[core].threads[t].pc = sys.cores[core].to_pc(value).wrapping_sub(1);
            } else {
                let trap = sys.cores[core].illegal_pc_thread_pc();
                sys.cores[core].threads[t].pc = trap;
                sys.cores[core].threads[t].illegal_pc = value;
            }
            Outcome::Next
        }
        Tinitdp2r | Tinitsp2r | Tinitcp2r | TinitlrL2r => {
            let id = ResourceId(vals[1]);
            let Some(t) = local_thread(sys, core, id) else { return illegal_res!(vals[1]) };
            if !sys.cores[core].threads[t].in_ssync {
                return illegal_res!(vals[1]);
            }
            let reg = match opcode {
                Tinitdp2r => Register::Dp,
                Tinitsp2r => Register::Sp,
                Tinitcp2r => Register::Cp,
                _ => Register::Lr,
            };
            sys.cores[core].threads[t].set_reg(reg, vals[0]);
            Outcome::Next
        }
        Tstart1r => {
            let id = ResourceId(vals[0]);
            let Some(t) = local_thread(sys, core, id) else { return illegal_res!(vals[0]) };
            let target = &sys.cores[core].threads[t];
            if !target.in_ssync || target.sync.is_some() {
                return illegal_res!(vals[0]);
            }
            sys.cores[core].threads[t].in_ssync = false;
            sys.cores[core].threads[t].pc = sys.cores[core].threads[t].pc.wrapping_add(1);
            sys.schedule_thread(ThreadRef::new(core, t), time);
            Outcome::Next
        }
        Msync1r => {
            let id = ResourceId(vals[0]);
            let Some(sync) = local_sync(sys, core, id) else { return illegal_res!(vals[0]) };
            if sys.sync_msync(core, sync, thread, time) {
                Outcome::Next
            } else {
                Outcome::Deschedule
            }
        }
        Mjoin1r => {
            let id = ResourceId(vals[0]);
            let Some(sync) = local_sync(sys, core, id) else { return illegal_res!(vals[0]) };
            if sys.sync_mjoin(core, sync, thread) {
                Outcome::Next
            } else {
                Outcome::Deschedule
            }
        }
        Ssync0r => {
            let Some(sync) = sys.thread(tref).sync else {
                return illegal_res!(ResourceId::local(thread as u32, ResourceType::Thread).0);
            };
            sys.sync_ssync(core, sync as usize, thread, time);
            Outcome::Deschedule
        }
        Freet0r => {
            sys.thread_free(core, thread, time);
            Outcome::EndThread
        }

        // --- Events.
        Setv1r => {
            let id = ResourceId(vals[0]);
            let value = vals[1];
            if value & 1 != 0 || !sys.cores[core].check_pc(sys.cores[core].to_pc(value)) {
                return illegal_res!(vals[0]);
            }
            let target = sys.cores[core].to_pc(value);
            if !sys.eventable_set_vector(core, id, target) {
                return illegal_res!(vals[0]);
            }
            Outcome::Next
        }
        Setev1r => {
            let id = ResourceId(vals[0]);
            if !sys.eventable_set_env(core, id, vals[1]) {
                return illegal_res!(vals[0]);
            }
            Outcome::Next
        }
        Eeu1r => {
            let id = ResourceId(vals[0]);
            if !sys.eventable_enable(core, id, thread, time) {
                return illegal_res!(vals[0]);
            }
            Outcome::Next
        }
        Edu1r => {
            let id = ResourceId(vals[0]);
            if !sys.eventable_disable(core, id) {
                return illegal_res!(vals[0]);
            }
            Outcome::Next
        }
        Eet2r => {
            let id = ResourceId(vals[1]);
            let ok = if vals[0] != 0 {
                sys.eventable_enable(core, id, thread, time)
            } else {
                sys.eventable_disable(core, id)
            };
            if !ok {
                return illegal_res!(vals[1]);
            }
            Outcome::Next
        }
        Eef2r => {
            let id = ResourceId(vals[1]);
            let ok = if vals[0] == 0 {
                sys.eventable_enable(core, id, thread, time)
            } else {
                sys.eventable_disable(core, id)
            };
            if !ok {
                return illegal_res!(vals[1]);
            }
            Outcome::Next
        }
        Waiteu0r => {
            sys.thread_mut(tref).sr.insert(StatusReg::EEBLE);
            sys.see_thread_event_enable(tref, time);
            Outcome::DescheduleOrEvent
        }
        Waitet1r => {
            if vals[0] != 0 {
                sys.thread_mut(tref).sr.insert(StatusReg::EEBLE);
                sys.see_thread_event_enable(tref, time);
                return Outcome::DescheduleOrEvent;
            }
            Outcome::Next
        }
        Waitef1r => {
            if vals[0] == 0 {
                sys.thread_mut(tref).sr.insert(StatusReg::EEBLE);
                sys.see_thread_event_enable(tref, time);
                return Outcome::DescheduleOrEvent;
            }
            Outcome::Next
        }

        // --- Resource configuration.
        SetcRu6 | SetcLru6 | SetcL2r => {
            let id = ResourceId(vals[0]);
            if !sys.set_resource_control(core, thread, id, vals[1], time) {
                return illegal_res!(vals[0]);
            }
            Outcome::Next
        }
        Setd2r => {
            let id = ResourceId(vals[1]);
            let ok = match id.ty() {
                Some(ResourceType::Chanend) => match local_chanend(sys, core, id) {
                    Some(ep) => sys.chanend_setd(ep, vals[0]),
                    None => false,
                },
                Some(ResourceType::Timer) => match local_timer(sys, core, id) {
                    Some(num) => {
                        sys.timer_setd(core, num, vals[0]);
                        true
                    }
                    None => false,
                },
                Some(ResourceType::Port) => match local_port(sys, core, id) {
                    Some(idx) => {
                        sys.port_set_data(core, idx, vals[0], time);
                        true
                    }
                    None => false,
                },
                Some(ResourceType::ClkBlk)
                    if (id.num() as usize) < crate::core::NUM_CLKBLKS
                        && sys.cores[core].clock_blocks[id.num() as usize].res.in_use =>
                {
                    sys.clock_set_data(core, id.num() as usize, vals[0], time)
                }
                _ => false,
            };
            if !ok {
                return illegal_res!(vals[1]);
            }
            Outcome::Next
        }
        SetclkL2r => {
            let target = ResourceId(vals[1]);
            let source = ResourceId(vals[0]);
            let ok = match target.ty() {
                Some(ResourceType::ClkBlk) if (target.num() as usize) < crate::core::NUM_CLKBLKS => {
                    let clk = target.num() as usize;
                    if source.ty() == Some(ResourceType::ClkBlk) && source.num() == REF_CLOCK_NUM {
                        sys.clock_set_source_ref(core, clk, time);
                        true
                    } else {
                        match local_port(sys, core, source) {
                            Some(p) => sys.clock_set_source_port(core, clk, p, time),
                            None => false,
                        }
                    }
                }
                Some(ResourceType::Port) => match local_port(sys, core, target) {
                    Some(p) if source.ty() == Some(ResourceType::ClkBlk) => {
                        let clk = source.num() as usize;
                        if clk == REF_CLOCK_NUM as usize {
                            sys.port_set_clock(core, p, crate::clock::REF_CLOCK, time)
                        } else if clk < crate::core::NUM_CLKBLKS {
                            sys.port_set_clock(core, p, clk, time)
                        } else {
                            false
                        }
                    }
                    _ => false,
                },
                _ => false,
            };
            if !ok {
                return illegal_res!(vals[1]);
            }
            Outcome::Next
        }
        SetrdyL2r => {
            let target = ResourceId(vals[1]);
            let ready = ResourceId(vals[0]);
            let Some(rp) = local_port(sys, core, ready) else { return illegal_res!(vals[0]) };
            let ok = match target.ty() {
                Some(ResourceType::ClkBlk) if (target.num() as usize) < crate::core::NUM_CLKBLKS => {
                    sys.clock_set_ready(core, target.num() as usize, rp, time)
                }
                Some(ResourceType::Port) => match local_port(sys, core, target) {
                    Some(p) => sys.port_set_ready_port(core, p, rp, time),
                    None => false,
                },
                _ => false,
            };
            if !ok {
                return illegal_res!(vals[1]);
            }
            Outcome::Next
        }
        SettwL2r => {
            let id = ResourceId(vals[1]);
            let Some(p) = local_port(sys, core, id) else { return illegal_res!(vals[1]) };
            if !sys.port_set_transfer_width(core, p, vals[0], time) {
                return illegal_res!(vals[1]);
            }
            Outcome::Next
        }

        // --- Generic resource input/output.
        In2r => {
            let id = ResourceId(vals[1]);
            match id.ty() {
                Some(ResourceType::Chanend) => {
                    let Some(ep) = local_chanend(sys, core, id) else {
                        return illegal_res!(vals[1]);
                    };
                    match sys.chanend_in(ep, thread, time) {
                        ChanIn::Value(v) => {
                            vals[0] = v;
                            Outcome::Next
                        }
                        ChanIn::Deschedule => Outcome::Deschedule,
                        ChanIn::Illegal => illegal_res!(vals[1]),
                    }
                }
                Some(ResourceType::Timer) => {
                    let Some(num) = local_timer(sys, core, id) else {
                        return illegal_res!(vals[1]);
                    };
                    match sys.timer_in(core, num, thread, time) {
                        Some(v) => {
                            vals[0] = v;
                            Outcome::Next
                        }
                        None => Outcome::Deschedule,
                    }
                }
                Some(ResourceType::Lock) => {
                    let Some(num) = local_lock(sys, core, id) else {
                        return illegal_res!(vals[1]);
                    };
                    match sys.lock_acquire(core, num, thread) {
                        Some(v) => {
                            vals[0] = v;
                            Outcome::Next
                        }
                        None => Outcome::Deschedule,
                    }
                }
                Some(ResourceType::Port) => {
                    let Some(idx) = local_port(sys, core, id) else {
                        return illegal_res!(vals[1]);
                    };
                    match sys.port_in(core, idx, thread, time) {
                        Some(v) => {
                            vals[0] = v;
                            Outcome::Next
                        }
                        None => Outcome::Deschedule,
                    }
                }
                _ => illegal_res!(vals[1]),
            }
        }
        Out2r => {
            let id = ResourceId(vals[1]);
            match id.ty() {
                Some(ResourceType::Chanend) => {
                    let Some(ep) = local_chanend(sys, core, id) else {
                        return illegal_res!(vals[1]);
                    };
                    match sys.chanend_out(ep, thread, vals[0], time) {
                        ChanOut::Continue => Outcome::Next,
                        ChanOut::Deschedule => Outcome::Deschedule,
                        ChanOut::LinkError => Outcome::Exception {
                            et: et::LINK_ERROR,
                            ed: sys.chanend_getd(ep),
                        },
                    }
                }
                Some(ResourceType::Lock) => {
                    let Some(num) = local_lock(sys, core, id) else {
                        return illegal_res!(vals[1]);
                    };
                    if !sys.lock_release(core, num, thread, time) {
                        return illegal_res!(vals[1]);
                    }
                    Outcome::Next
                }
                Some(ResourceType::Port) => {
                    let Some(idx) = local_port(sys, core, id) else {
                        return illegal_res!(vals[1]);
                    };
                    if sys.port_out(core, idx, thread, vals[0], time) {
                        Outcome::Next
                    } else {
                        Outcome::Deschedule
                    }
                }
                _ => illegal_res!(vals[1]),
            }
        }
        Inshr2r => {
            let id = ResourceId(vals[1]);
            let Some(idx) = local_port(sys, core, id) else { return illegal_res!(vals[1]) };
            match sys.port_in(core, idx, thread, time) {
                Some(v) => {
                    let width = sys.cores[core].ports[idx].transfer_width;
                    vals[0] = ((vals[0] as u64 >> width) as u32)
                        | ((v as u64) << (32 - width)) as u32;
                    Outcome::Next
                }
                None => Outcome::Deschedule,
            }
        }
        Outshr2r => {
            let id = ResourceId(vals[1]);
            let Some(idx) = local_port(sys, core, id) else { return illegal_res!(vals[1]) };
            if sys.port_out(core, idx, thread, vals[0], time) {
                let width = sys.cores[core].ports[idx].transfer_width;
                vals[0] = (vals[0] as u64 >> width) as u32;
                Outcome::Next
            } else {
                Outcome::Deschedule
            }
        }

        // --- Chanend token operations.
        Outt2r => {
            let id = ResourceId(vals[1]);
            let Some(ep) = local_chanend(sys, core, id) else { return illegal_res!(vals[1]) };
            match sys.chanend_outt(ep, thread, vals[0] as u8, time) {
                ChanOut::Continue => Outcome::Next,
                ChanOut::Deschedule => Outcome::Deschedule,
                ChanOut::LinkError => {
                    Outcome::Exception { et: et::LINK_ERROR, ed: sys.chanend_getd(ep) }
                }
            }
        }
        Outct2r | OutctRus => {
            let id = ResourceId(vals[0]);
            let Some(ep) = local_chanend(sys, core, id) else { return illegal_res!(vals[0]) };
            match sys.chanend_outct(ep, thread, vals[1] as u8, time) {
                ChanOut::Continue => Outcome::Next,
                ChanOut::Deschedule => Outcome::Deschedule,
                ChanOut::LinkError => {
                    Outcome::Exception { et: et::LINK_ERROR, ed: sys.chanend_getd(ep) }
                }
            }
        }
        Int2r => {
            let id = ResourceId(vals[1]);
            let Some(ep) = local_chanend(sys, core, id) else { return illegal_res!(vals[1]) };
            match sys.chanend_intoken(ep, thread, time) {
                ChanIn::Value(v) => {
                    vals[0] = v;
                    Outcome::Next
                }
                ChanIn::Deschedule => Outcome::Deschedule,
                ChanIn::Illegal => illegal_res!(vals[1]),
            }
        }
        Inct2r => {
            let id = ResourceId(vals[1]);
            let Some(ep) = local_chanend(sys, core, id) else { return illegal_res!(vals[1]) };
            match sys.chanend_inct(ep, thread, time) {
                ChanIn::Value(v) => {
                    vals[0] = v;
                    Outcome::Next
                }
                ChanIn::Deschedule => Outcome::Deschedule,
                ChanIn::Illegal => illegal_res!(vals[1]),
            }
        }
        Chkct2r | ChkctRus => {
            let id = ResourceId(vals[0]);
            let Some(ep) = local_chanend(sys, core, id) else { return illegal_res!(vals[0]) };
            match sys.chanend_chkct(ep, thread, vals[1], time) {
                ChanIn::Value(_) => Outcome::Next,
                ChanIn::Deschedule => Outcome::Deschedule,
                ChanIn::Illegal => illegal_res!(vals[0]),
            }
        }
        Testct2r => {
            let id = ResourceId(vals[1]);
            let Some(ep) = local_chanend(sys, core, id) else { return illegal_res!(vals[1]) };
            match sys.chanend_testct(ep, thread) {
                Ok(is_ct) => {
                    vals[0] = is_ct as u32;
                    Outcome::Next
                }
                Err(()) => Outcome::Deschedule,
            }
        }
        Testwct2r => {
            let id = ResourceId(vals[1]);
            let Some(ep) = local_chanend(sys, core, id) else { return illegal_res!(vals[1]) };
            match sys.chanend_testwct(ep, thread) {
                Ok(position) => {
                    vals[0] = position;
                    Outcome::Next
                }
                Err(()) => Outcome::Deschedule,
            }
        }

        // --- Port timing.
        Getts2r => {
            let id = ResourceId(vals[1]);
            let Some(idx) = local_port(sys, core, id) else { return illegal_res!(vals[1]) };
            vals[0] = sys.port_get_timestamp(core, idx, time);
            Outcome::Next
        }
        Setpt2r => {
            let id = ResourceId(vals[1]);
            let Some(idx) = local_port(sys, core, id) else { return illegal_res!(vals[1]) };
            sys.port_set_port_time(core, idx, vals[0], time);
            Outcome::Next
        }
        Clrpt1r => {
            let id = ResourceId(vals[0]);
            let Some(idx) = local_port(sys, core, id) else { return illegal_res!(vals[0]) };
            sys.port_clear_port_time(core, idx, time);
            Outcome::Next
        }
        Syncr1r => {
            let id = ResourceId(vals[0]);
            let Some(idx) = local_port(sys, core, id) else { return illegal_res!(vals[0]) };
            if sys.port_sync(core, idx, thread, time) {
                Outcome::Next
            } else {
                Outcome::Deschedule
            }
        }

        // --- Breakpoints and pseudo-opcodes.
        Breakpoint => {
            let address = sys.cores[core].from_pc(pc);
            match sys.breakpoint_kinds.get(&(core, address)).copied() {
                Some(BreakpointKind::Syscall) => match crate::syscall::handle(sys, tref) {
                    SyscallOutcome::Continue => {
                        let lr = sys.thread(tref).reg(Register::Lr);
                        let target = sys.cores[core].to_pc(lr);
                        if lr & 1 != 0 || !sys.cores[core].check_pc(target) {
                            return Outcome::Exception { et: et::ILLEGAL_PC, ed: lr };
                        }
                        *next_pc = target;
                        Outcome::EndTrace
                    }
                    SyscallOutcome::Exit(code) => {
                        sys.exit_code = Some(code);
                        Outcome::Stop
                    }
                },
                Some(BreakpointKind::Exception) => {
                    let code = crate::syscall::report_trap(sys, tref);
                    sys.exit_code = Some(code);
                    Outcome::Stop
                }
                Some(BreakpointKind::User) | None => {
                    Outcome::Exception { et: et::ILLEGAL_INSTRUCTION, ed: 0 }
                }
            }
        }
        IllegalInstruction | Decode | IllegalPc | IllegalPcThread | NoThreads | Syscall
        | Exception => Outcome::Exception { et: et::ILLEGAL_INSTRUCTION, ed: 0 },

        // Unimplemented-flagged opcodes were filtered before dispatch;
        // anything else reaching here decodes but has no defined
        // behaviour.
        _ => Outcome::Exception { et: et::ILLEGAL_INSTRUCTION, ed: 0 },
    }
}

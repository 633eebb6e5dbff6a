//! Boot sequencing: turn a parsed container into a ready system and drive
//! the scheduled entry points.

use std::path::Path;

use xcsim_core::{BreakpointKind, RunResult, SystemState, ThreadRef};

use crate::config::{default_system, system_from_config};
use crate::elf::Elf;
use crate::xe::{Xe, XE_SECTOR_CALL, XE_SECTOR_ELF, XE_SECTOR_GOTO};
use crate::LoaderError;

#[derive(Debug, Clone, Copy)]
struct BootStep {
    core: usize,
    address: u32,
}

pub struct Simulation {
    pub sys: SystemState,
    steps: Vec<BootStep>,
}

fn core_for_target(sys: &SystemState, node: u16, core: u16) -> Result<usize, LoaderError> {
    let node = sys
        .nodes
        .iter()
        .find(|n| n.jtag_index == node as u32)
        .ok_or(LoaderError::UnknownTarget { node, core })?;
    node.cores
        .get(core as usize)
        .copied()
        .ok_or(LoaderError::UnknownTarget { node: node.jtag_index as u16, core })
}

fn load_elf_sector(
    sys: &mut SystemState,
    core: usize,
    data: &[u8],
) -> Result<u32, LoaderError> {
    let elf = Elf::parse(data)?;
    for segment in elf.segments()? {
        if !sys.cores[core].write_block(segment.vaddr, segment.data) {
            return Err(LoaderError::SegmentOutOfRange { address: segment.vaddr });
        }
        // Zero fill past the file contents.
        let bss = segment.memsz as usize - segment.data.len();
        if bss > 0 {
            let zeros = vec![0u8; bss];
            let addr = segment.vaddr.wrapping_add(segment.data.len() as u32);
            if !sys.cores[core].write_block(addr, &zeros) {
                return Err(LoaderError::SegmentOutOfRange { address: addr });
            }
        }
    }
    for (symbol, kind) in [
        ("_DoSyscall", BreakpointKind::Syscall),
        ("_DoException", BreakpointKind::Exception),
    ] {
        if let Some(address) = elf.symbol(symbol)? {
            if sys.cores[core].set_breakpoint(address) {
                sys.breakpoint_kinds.insert((core, address), kind);
            } else {
                tracing::warn!(symbol, address, "breakpoint outside RAM");
            }
        }
    }
    Ok(elf.entry)
}

/// Load every ELF sector and collect the entry schedule from CALL/GOTO
/// sectors. Images with no schedule run the last loaded ELF from its entry
/// point.
fn populate(sys: &mut SystemState, xe: &Xe) -> Result<Vec<BootStep>, LoaderError> {
    let mut entries = Vec::new();
    let mut steps = Vec::new();
    for sector in &xe.sectors {
        match sector.sector_type {
            XE_SECTOR_ELF => {
                let target = sector.target.ok_or(LoaderError::TruncatedImage)?;
                let core = core_for_target(sys, target.node, target.core)?;
                let entry = load_elf_sector(sys, core, &sector.data)?;
                entries.push(BootStep { core, address: entry });
            }
            XE_SECTOR_CALL | XE_SECTOR_GOTO => {
                let target = sector.target.ok_or(LoaderError::TruncatedImage)?;
                let core = core_for_target(sys, target.node, target.core)?;
                steps.push(BootStep { core, address: target.address as u32 });
            }
            _ => {}
        }
    }
    if steps.is_empty() {
        steps.extend(entries.last().copied());
    }
    Ok(steps)
}

impl Simulation {
    /// Load an image from disk.
    pub fn load(path: &Path) -> Result<Simulation, LoaderError> {
        let xe = Xe::read(path)?;
        Simulation::from_xe(&xe)
    }

    pub fn from_xe(xe: &Xe) -> Result<Simulation, LoaderError> {
        let mut sys = match xe.config() {
            Some(sector) => {
                let text = String::from_utf8_lossy(&sector.data).into_owned();
                system_from_config(&text)?
            }
            None => default_system(),
        };
        let steps = populate(&mut sys, xe)?;
        if steps.is_empty() {
            return Err(LoaderError::NothingToRun);
        }
        Ok(Simulation { sys, steps })
    }

    fn start_step(&mut self, step: BootStep) -> Result<(), LoaderError> {
        let sys = &mut self.sys;
        sys.exit_code = None;
        let core = &sys.cores[step.core];
        if !core.is_valid_address(step.address) || step.address & 1 != 0 {
            return Err(LoaderError::SegmentOutOfRange { address: step.address });
        }
        let pc = core.to_pc(step.address);
        let time = sys.latest_time;
        let tref = ThreadRef::new(step.core, 0);
        let t = sys.thread_mut(tref);
        t.alloc(time);
        t.in_ssync = false;
        t.pc = pc;
        sys.schedule_thread(tref, time);
        Ok(())
    }

    /// Run every boot step in order; a non-zero exit, timeout or deadlock
    /// stops the sequence.
    pub fn run(&mut self) -> Result<RunResult, LoaderError> {
        let steps = self.steps.clone();
        let mut result = RunResult::NoRunnableThreads;
        for (index, step) in steps.iter().enumerate() {
            self.start_step(*step)?;
            result = self.sys.run();
            let last = index == steps.len() - 1;
            match result {
                RunResult::Exit(0) if !last => continue,
                _ => break,
            }
        }
        Ok(result)
    }
}

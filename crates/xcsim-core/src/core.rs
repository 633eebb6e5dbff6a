//! A tile: RAM, the per-core resource pools and the decode cache.

use xcsim_isa::{IsaVariant, Opcode, Operands};

use crate::chanend::Chanend;
use crate::clock::ClockBlock;
use crate::lock::Lock;
use crate::port::Port;
use crate::synchroniser::Synchroniser;
use crate::thread::Thread;
use crate::timer::Timer;

pub const NUM_THREADS: usize = 8;
pub const NUM_CHANENDS: usize = 32;
pub const NUM_TIMERS: usize = 16;
pub const NUM_LOCKS: usize = 8;
pub const NUM_SYNCS: usize = 4;
pub const NUM_CLKBLKS: usize = 8;

/// The standard port complement: (width, count).
pub const PORT_SET: [(u32, usize); 5] = [(1, 16), (4, 6), (8, 4), (16, 2), (32, 1)];

/// One decode-cache slot. Slots start as `Decode` and are filled with the
/// decoded, transformed instruction on first execution.
#[derive(Debug, Clone, Copy)]
pub struct CacheEntry {
    pub opcode: Opcode,
    pub operands: Operands,
}

impl Default for CacheEntry {
    fn default() -> CacheEntry {
        CacheEntry { opcode: Opcode::Decode, operands: Operands::new() }
    }
}

#[derive(Debug)]
pub struct Core {
    /// Owning node (index into the system's node table).
    pub node: usize,
    /// Core number within the node.
    pub core_number: u32,
    /// Code reference string from the platform description, if any.
    pub code_reference: String,
    pub variant: IsaVariant,

    pub ram_base: u32,
    ram: Vec<u8>,
    pub vector_base: u32,

    pub threads: Vec<Thread>,
    pub chanends: Vec<Chanend>,
    pub timers: Vec<Timer>,
    pub locks: Vec<Lock>,
    pub syncs: Vec<Synchroniser>,
    pub clock_blocks: Vec<ClockBlock>,
    pub ports: Vec<Port>,

    cache: Vec<CacheEntry>,
    pub breakpoints: std::collections::HashSet<u32>,
}

impl Core {
    /// `ram_size` must be a power of two and `ram_base` a multiple of it;
    /// the loader enforces this before construction.
    pub fn new(ram_base: u32, ram_size: u32, variant: IsaVariant) -> Core {
        debug_assert!(ram_size.is_power_of_two());
        debug_assert!(ram_base % ram_size == 0);
        let mut ports = Vec::new();
        for (width, count) in PORT_SET {
            for num in 0..count {
                ports.push(Port::new(width, num as u32));
            }
        }
        Core {
            node: 0,
            core_number: 0,
            code_reference: String::new(),
            variant,
            ram_base,
            ram: vec![0; ram_size as usize],
            vector_base: 0,
            threads: vec![Thread::default(); NUM_THREADS],
            chanends: vec![Chanend::default(); NUM_CHANENDS],
            timers: vec![Timer::default(); NUM_TIMERS],
            locks: vec![Lock::default(); NUM_LOCKS],
            syncs: vec![Synchroniser::default(); NUM_SYNCS],
            clock_blocks: vec![ClockBlock::default(); NUM_CLKBLKS],
            ports,
            cache: vec![CacheEntry::default(); (ram_size / 2) as usize],
            breakpoints: std::collections::HashSet::new(),
        }
    }

    pub fn ram_size(&self) -> u32 {
        self.ram.len() as u32
    }

    /// One past the last valid pc, in decode units.
    pub fn max_pc(&self) -> u32 {
        self.ram_size() / 2
    }

    /// Sentinel pc for a thread whose initial pc was invalid.
    pub fn illegal_pc_thread_pc(&self) -> u32 {
        self.max_pc()
    }

    pub fn physical(&self, address: u32) -> u32 {
        address.wrapping_sub(self.ram_base)
    }

    pub fn check_addr(&self, phys: u32) -> bool {
        phys < self.ram_size()
    }

    pub fn check_addr_word(&self, phys: u32) -> bool {
        phys & 3 == 0 && self.check_addr(phys)
    }

    pub fn check_addr_short(&self, phys: u32) -> bool {
        phys & 1 == 0 && self.check_addr(phys)
    }

    pub fn is_valid_address(&self, address: u32) -> bool {
        self.check_addr(self.physical(address))
    }

    pub fn to_pc(&self, address: u32) -> u32 {
        self.physical(address) >> 1
    }

    pub fn from_pc(&self, pc: u32) -> u32 {
        self.ram_base.wrapping_add(pc << 1)
    }

    pub fn check_pc(&self, pc: u32) -> bool {
        pc < self.max_pc()
    }

    pub fn load_byte(&self, phys: u32) -> u8 {
        self.ram[phys as usize]
    }

    pub fn load_short(&self, phys: u32) -> u16 {
        let i = phys as usize;
        u16::from_le_bytes([self.ram[i], self.ram[i + 1]])
    }

    pub fn load_word(&self, phys: u32) -> u32 {
        let i = phys as usize;
        u32::from_le_bytes([self.ram[i], self.ram[i + 1], self.ram[i + 2], self.ram[i + 3]])
    }

    pub fn store_byte(&mut self, phys: u32, value: u8) {
        self.ram[phys as usize] = value;
        self.invalidate_cache(phys, 1);
    }

    pub fn store_short(&mut self, phys: u32, value: u16) {
        self.ram[phys as usize..phys as usize + 2].copy_from_slice(&value.to_le_bytes());
        self.invalidate_cache(phys, 2);
    }

    pub fn store_word(&mut self, phys: u32, value: u32) {
        self.ram[phys as usize..phys as usize + 4].copy_from_slice(&value.to_le_bytes());
        self.invalidate_cache(phys, 4);
    }

    /// Bulk load used by the boot sequencer. `address` is virtual.
    pub fn write_block(&mut self, address: u32, data: &[u8]) -> bool {
        let phys = self.physical(address) as usize;
        let Some(end) = phys.checked_add(data.len()) else { return false };
        if end > self.ram.len() {
            return false;
        }
        self.ram[phys..end].copy_from_slice(data);
        self.invalidate_cache(phys as u32, data.len() as u32);
        true
    }

    pub fn read_block(&self, address: u32, len: usize) -> Option<&[u8]> {
        let phys = self.physical(address) as usize;
        let end = phys.checked_add(len)?;
        self.ram.get(phys..end)
    }

    /// A store may overlap the second halfword of a 32-bit instruction, so
    /// invalidation starts one decode slot early.
    fn invalidate_cache(&mut self, phys: u32, len: u32) {
        let first = (phys.saturating_sub(2) >> 1) as usize;
        let last = ((phys + len - 1) >> 1) as usize;
        for slot in first..=last.min(self.cache.len() - 1) {
            self.cache[slot] = CacheEntry::default();
        }
    }

    pub fn cache_entry(&self, pc: u32) -> CacheEntry {
        self.cache[pc as usize]
    }

    pub fn set_cache_entry(&mut self, pc: u32, entry: CacheEntry) {
        self.cache[pc as usize] = entry;
    }

    pub fn set_breakpoint(&mut self, address: u32) -> bool {
        if !self.is_valid_address(address) || address & 1 != 0 {
            return false;
        }
        let pc = self.to_pc(address);
        self.cache[pc as usize] = CacheEntry::default();
        self.breakpoints.insert(address)
    }

    pub fn unset_breakpoint(&mut self, address: u32) {
        if self.breakpoints.remove(&address) {
            let pc = self.to_pc(address);
            self.cache[pc as usize] = CacheEntry::default();
        }
    }

    pub fn is_breakpoint_address(&self, address: u32) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Find the pool index of a port from its resource id.
    pub fn port_index(&self, width: u32, num: u32) -> Option<usize> {
        let mut base = 0usize;
        for (w, count) in PORT_SET {
            if w == width {
                return if (num as usize) < count { Some(base + num as usize) } else { None };
            }
            base += count;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Core {
        Core::new(0x10000, 0x10000, IsaVariant::Xs1B)
    }

    #[test]
    fn address_translation() {
        let c = core();
        assert!(c.is_valid_address(0x10000));
        assert!(c.is_valid_address(0x1fffc));
        assert!(!c.is_valid_address(0x20000));
        assert!(!c.is_valid_address(0xfffc));
        assert_eq!(c.to_pc(0x10004), 2);
        assert_eq!(c.from_pc(2), 0x10004);
    }

    #[test]
    fn stores_invalidate_decode_cache() {
        let mut c = core();
        c.set_cache_entry(4, CacheEntry { opcode: Opcode::Nop0r, operands: Operands::new() });
        c.set_cache_entry(5, CacheEntry { opcode: Opcode::Nop0r, operands: Operands::new() });
        // Store at byte 10 covers decode slots 4 and 5.
        c.store_short(10, 0xffff);
        assert_eq!(c.cache_entry(4).opcode, Opcode::Decode);
        assert_eq!(c.cache_entry(5).opcode, Opcode::Decode);
    }

    #[test]
    fn port_pool_layout() {
        let c = core();
        assert_eq!(c.port_index(1, 0), Some(0));
        assert_eq!(c.port_index(1, 15), Some(15));
        assert_eq!(c.port_index(4, 0), Some(16));
        assert_eq!(c.port_index(32, 0), Some(28));
        assert_eq!(c.port_index(4, 6), None);
        assert_eq!(c.port_index(2, 0), None);
    }
}

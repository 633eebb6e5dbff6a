//! Minimal ELF32 little-endian reader: program headers for segment loads,
//! and the symbol table for the handful of symbols the boot sequencer
//! needs. No relocation or dynamic linking.

use crate::LoaderError;

const PT_LOAD: u32 = 1;
const SHT_SYMTAB: u32 = 2;

pub struct Elf<'a> {
    data: &'a [u8],
    pub entry: u32,
    phoff: usize,
    phentsize: usize,
    phnum: usize,
    shoff: usize,
    shentsize: usize,
    shnum: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub vaddr: u32,
    pub data: &'a [u8],
    pub memsz: u32,
}

fn u16_at(data: &[u8], off: usize) -> Result<u16, LoaderError> {
    data.get(off..off + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(LoaderError::TruncatedElf)
}

fn u32_at(data: &[u8], off: usize) -> Result<u32, LoaderError> {
    data.get(off..off + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
        .ok_or(LoaderError::TruncatedElf)
}

impl<'a> Elf<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Elf<'a>, LoaderError> {
        if data.len() < 52 || &data[..4] != b"\x7fELF" {
            return Err(LoaderError::NotElf);
        }
        // 32-bit, little-endian only.
        if data[4] != 1 || data[5] != 1 {
            return Err(LoaderError::NotElf);
        }
        Ok(Elf {
            data,
            entry: u32_at(data, 24)?,
            phoff: u32_at(data, 28)? as usize,
            shoff: u32_at(data, 32)? as usize,
            phentsize: u16_at(data, 42)? as usize,
            phnum: u16_at(data, 44)? as usize,
            shentsize: u16_at(data, 46)? as usize,
            shnum: u16_at(data, 48)? as usize,
        })
    }

    pub fn segments(&self) -> Result<Vec<Segment<'a>>, LoaderError> {
        let mut out = Vec::new();
        for i in 0..self.phnum {
            let ph = self.phoff + i * self.phentsize;
            if u32_at(self.data, ph)? != PT_LOAD {
                continue;
            }
            let offset = u32_at(self.data, ph + 4)? as usize;
            let vaddr = u32_at(self.data, ph + 8)?;
            let filesz = u32_at(self.data, ph + 16)? as usize;
            let memsz = u32_at(self.data, ph + 20)?;
            let data = self
                .data
                .get(offset..offset + filesz)
                .ok_or(LoaderError::TruncatedElf)?;
            out.push(Segment { vaddr, data, memsz });
        }
        Ok(out)
    }

    fn section(&self, index: usize) -> Result<(u32, usize, usize, usize), LoaderError> {
        let sh = self.shoff + index * self.shentsize;
        let sh_type = u32_at(self.data, sh + 4)?;
        let offset = u32_at(self.data, sh + 16)? as usize;
        let size = u32_at(self.data, sh + 20)? as usize;
        let link = u32_at(self.data, sh + 24)? as usize;
        Ok((sh_type, offset, size, link))
    }

    /// Address of `name` in the symbol table, if present.
    pub fn symbol(&self, name: &str) -> Result<Option<u32>, LoaderError> {
        for i in 0..self.shnum {
            let (sh_type, offset, size, link) = self.section(i)?;
            if sh_type != SHT_SYMTAB {
                continue;
            }
            let (_, str_off, str_size, _) = self.section(link)?;
            let strtab =
                self.data.get(str_off..str_off + str_size).ok_or(LoaderError::TruncatedElf)?;
            let mut sym = offset;
            let end = offset + size;
            while sym + 16 <= end {
                let name_off = u32_at(self.data, sym)? as usize;
                let value = u32_at(self.data, sym + 4)?;
                if let Some(rest) = strtab.get(name_off..) {
                    let sym_name =
                        &rest[..rest.iter().position(|&c| c == 0).unwrap_or(rest.len())];
                    if sym_name == name.as_bytes() {
                        return Ok(Some(value));
                    }
                }
                sym += 16;
            }
        }
        Ok(None)
    }
}

/// Build a small ELF image in memory; test support.
pub fn build_elf(entry: u32, segments: &[(u32, &[u8])], symbols: &[(&str, u32)]) -> Vec<u8> {
    let mut data = vec![0u8; 52];
    data[..4].copy_from_slice(b"\x7fELF");
    data[4] = 1; // 32-bit
    data[5] = 1; // little-endian
    data[6] = 1; // version
    let phoff = data.len();
    let phentsize = 32usize;
    // Reserve program headers.
    data.resize(phoff + segments.len() * phentsize, 0);
    let mut ph_entries = Vec::new();
    for &(vaddr, bytes) in segments {
        let offset = data.len();
        data.extend_from_slice(bytes);
        ph_entries.push((offset, vaddr, bytes.len()));
    }
    for (i, (offset, vaddr, size)) in ph_entries.iter().enumerate() {
        let ph = phoff + i * phentsize;
        data[ph..ph + 4].copy_from_slice(&PT_LOAD.to_le_bytes());
        data[ph + 4..ph + 8].copy_from_slice(&(*offset as u32).to_le_bytes());
        data[ph + 8..ph + 12].copy_from_slice(&vaddr.to_le_bytes());
        data[ph + 16..ph + 20].copy_from_slice(&(*size as u32).to_le_bytes());
        data[ph + 20..ph + 24].copy_from_slice(&(*size as u32).to_le_bytes());
    }
    // String table.
    let mut strtab = vec![0u8];
    let mut name_offsets = Vec::new();
    for (name, _) in symbols {
        name_offsets.push(strtab.len());
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
    }
    let strtab_off = data.len();
    data.extend_from_slice(&strtab);
    // Symbol table.
    let symtab_off = data.len();
    for (i, (_, value)) in symbols.iter().enumerate() {
        let mut sym = [0u8; 16];
        sym[..4].copy_from_slice(&(name_offsets[i] as u32).to_le_bytes());
        sym[4..8].copy_from_slice(&value.to_le_bytes());
        data.extend_from_slice(&sym);
    }
    // Section headers: null, strtab, symtab.
    let shentsize = 40usize;
    let shoff = data.len();
    data.resize(shoff + 3 * shentsize, 0);
    let write_section = |data: &mut Vec<u8>, index: usize, sh_type: u32, offset: usize, size: usize, link: u32| {
        let sh = shoff + index * shentsize;
        data[sh + 4..sh + 8].copy_from_slice(&sh_type.to_le_bytes());
        data[sh + 16..sh + 20].copy_from_slice(&(offset as u32).to_le_bytes());
        data[sh + 20..sh + 24].copy_from_slice(&(size as u32).to_le_bytes());
        data[sh + 24..sh + 28].copy_from_slice(&link.to_le_bytes());
    };
    write_section(&mut data, 1, 3, strtab_off, strtab.len(), 0);
    write_section(&mut data, 2, SHT_SYMTAB, symtab_off, symbols.len() * 16, 1);
    // Fix up the header.
    let header = [
        (24usize, entry),
        (28, phoff as u32),
        (32, shoff as u32),
    ];
    for (off, value) in header {
        data[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }
    data[42..44].copy_from_slice(&(phentsize as u16).to_le_bytes());
    data[44..46].copy_from_slice(&(segments.len() as u16).to_le_bytes());
    data[46..48].copy_from_slice(&(shentsize as u16).to_le_bytes());
    data[48..50].copy_from_slice(&3u16.to_le_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_and_symbols_round_trip() {
        let code = [0x11u8, 0x22, 0x33, 0x44];
        let image = build_elf(
            0x10000,
            &[(0x10000, &code)],
            &[("_start", 0x10000), ("_DoSyscall", 0x10040)],
        );
        let elf = Elf::parse(&image).unwrap();
        assert_eq!(elf.entry, 0x10000);
        let segments = elf.segments().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].vaddr, 0x10000);
        assert_eq!(segments[0].data, &code);
        assert_eq!(elf.symbol("_DoSyscall").unwrap(), Some(0x10040));
        assert_eq!(elf.symbol("_missing").unwrap(), None);
    }
}

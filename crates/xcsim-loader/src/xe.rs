//! XE container reader. The container is a little-endian sector stream:
//! `"XMOS"`, a u16 version, padding, then sectors of
//! `[u16 type][u16 pad][u64 length]` followed (when non-empty) by
//! `[u8 padding][3 bytes pad]` and the payload. ELF, CALL and GOTO sectors
//! carry a `[u16 node][u16 core][u64 address]` prefix.

use std::fs;
use std::path::Path;

use crate::LoaderError;

pub const XE_SECTOR_BINARY: u16 = 1;
pub const XE_SECTOR_ELF: u16 = 2;
pub const XE_SECTOR_CONFIG: u16 = 3;
pub const XE_SECTOR_GOTO: u16 = 5;
pub const XE_SECTOR_CALL: u16 = 6;
pub const XE_SECTOR_XN: u16 = 8;
pub const XE_SECTOR_LAST: u16 = 0x5555;

#[derive(Debug, Clone)]
pub struct Sector {
    pub sector_type: u16,
    /// Node/core/address prefix of ELF, CALL and GOTO sectors.
    pub target: Option<SectorTarget>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct SectorTarget {
    pub node: u16,
    pub core: u16,
    pub address: u64,
}

#[derive(Debug)]
pub struct Xe {
    pub version: u16,
    pub sectors: Vec<Sector>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], LoaderError> {
        let end = self.pos.checked_add(n).ok_or(LoaderError::TruncatedImage)?;
        let slice = self.data.get(self.pos..end).ok_or(LoaderError::TruncatedImage)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, LoaderError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, LoaderError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u64(&mut self) -> Result<u64, LoaderError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    fn skip(&mut self, n: usize) -> Result<(), LoaderError> {
        self.take(n).map(|_| ())
    }
}

impl Xe {
    pub fn read(path: &Path) -> Result<Xe, LoaderError> {
        let data = fs::read(path)?;
        Xe::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Xe, LoaderError> {
        let mut r = Reader { data, pos: 0 };
        if r.take(4)? != b"XMOS" {
            return Err(LoaderError::BadMagic);
        }
        let version = r.u16()?;
        r.skip(2)?;
        let mut sectors = Vec::new();
        loop {
            let sector_type = r.u16()?;
            r.skip(2)?;
            let length = r.u64()?;
            let mut padding = 0u8;
            if length > 0 {
                padding = r.u8()?;
                r.skip(3)?;
            }
            if sector_type == XE_SECTOR_LAST {
                break;
            }
            let payload_len = length
                .checked_sub(4)
                .and_then(|l| l.checked_sub(padding as u64))
                .ok_or(LoaderError::TruncatedImage)? as usize;
            let mut sector_reader = Reader { data: r.data, pos: r.pos };
            let target = match sector_type {
                XE_SECTOR_ELF | XE_SECTOR_CALL | XE_SECTOR_GOTO => Some(SectorTarget {
                    node: sector_reader.u16()?,
                    core: sector_reader.u16()?,
                    address: sector_reader.u64()?,
                }),
                _ => None,
            };
            let body_len = payload_len - (sector_reader.pos - r.pos);
            let data = sector_reader.take(body_len)?.to_vec();
            sectors.push(Sector { sector_type, target, data });
            // Padding bytes trail the payload.
            r.pos = sector_reader.pos + padding as usize;
        }
        Ok(Xe { version, sectors })
    }

    pub fn sector(&self, sector_type: u16) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.sector_type == sector_type)
    }

    pub fn config(&self) -> Option<&Sector> {
        self.sector(XE_SECTOR_CONFIG)
    }

    pub fn xn(&self) -> Option<&Sector> {
        self.sector(XE_SECTOR_XN)
    }
}

/// Build a container in memory; used by tests and tooling.
pub struct XeBuilder {
    data: Vec<u8>,
}

impl Default for XeBuilder {
    fn default() -> Self {
        XeBuilder::new()
    }
}

impl XeBuilder {
    pub fn new() -> XeBuilder {
        let mut data = Vec::new();
        data.extend_from_slice(b"XMOS");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&[0, 0]);
        XeBuilder { data }
    }

    fn sector_header(&mut self, sector_type: u16, payload_len: u64) {
        self.data.extend_from_slice(&sector_type.to_le_bytes());
        self.data.extend_from_slice(&[0, 0]);
        self.data.extend_from_slice(&(payload_len + 4).to_le_bytes());
        self.data.push(0); // padding byte count
        self.data.extend_from_slice(&[0, 0, 0]);
    }

    pub fn sector(&mut self, sector_type: u16, payload: &[u8]) -> &mut Self {
        self.sector_header(sector_type, payload.len() as u64);
        self.data.extend_from_slice(payload);
        self
    }

    pub fn targeted_sector(
        &mut self,
        sector_type: u16,
        node: u16,
        core: u16,
        address: u64,
        payload: &[u8],
    ) -> &mut Self {
        self.sector_header(sector_type, payload.len() as u64 + 12);
        self.data.extend_from_slice(&node.to_le_bytes());
        self.data.extend_from_slice(&core.to_le_bytes());
        self.data.extend_from_slice(&address.to_le_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        let mut data = std::mem::take(&mut self.data);
        data.extend_from_slice(&XE_SECTOR_LAST.to_le_bytes());
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&0u64.to_le_bytes());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_round_trip() {
        let image = XeBuilder::new()
            .sector(XE_SECTOR_CONFIG, b"<Config/>")
            .targeted_sector(XE_SECTOR_GOTO, 0, 0, 0x10000, &[])
            .finish();
        let xe = Xe::parse(&image).unwrap();
        assert_eq!(xe.version, 1);
        assert_eq!(xe.sectors.len(), 2);
        assert_eq!(xe.config().unwrap().data, b"<Config/>");
        let goto = &xe.sectors[1];
        assert_eq!(goto.sector_type, XE_SECTOR_GOTO);
        let target = goto.target.unwrap();
        assert_eq!((target.node, target.core, target.address), (0, 0, 0x10000));
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert!(matches!(Xe::parse(b"ELF!....").unwrap_err(), LoaderError::BadMagic));
    }
}

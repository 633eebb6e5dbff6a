//! Image loading: the XE container reader, a minimal ELF32 loader, the
//! XML configuration/topology reader and the boot sequencer that wires a
//! parsed image into a ready [`xcsim_core::SystemState`].

pub mod boot;
pub mod config;
pub mod elf;
pub mod xe;
pub mod xml;

pub use boot::Simulation;
pub use xe::{Xe, XeBuilder};

/// Fatal loading problems; these surface to the host, unlike per-thread
/// simulation exceptions.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not an XE image (bad magic)")]
    BadMagic,
    #[error("truncated or malformed image")]
    TruncatedImage,
    #[error("sector payload is not an ELF image")]
    NotElf,
    #[error("truncated ELF payload")]
    TruncatedElf,
    #[error("malformed XML at offset {offset}: {message}")]
    Xml { offset: usize, message: String },
    #[error("bad configuration: {0}")]
    Config(String),
    #[error("image targets unknown node {node} core {core}")]
    UnknownTarget { node: u16, core: u16 },
    #[error("segment address {address:#x} outside core RAM")]
    SegmentOutOfRange { address: u32 },
    #[error("image contains nothing to run")]
    NothingToRun,
}

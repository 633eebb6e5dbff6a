//! Resource identifiers and the lifecycle state shared by all allocatable
//! hardware objects.

use xcsim_support::Ticks;

/// Architectural resource type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ResourceType {
    Port = 0,
    Timer = 1,
    Chanend = 2,
    Sync = 3,
    Thread = 4,
    Lock = 5,
    ClkBlk = 6,
    /// Addresses a node's switch; only valid as a chanend destination.
    Config = 12,
}

/// Largest type allocatable through `GETR`.
pub const LAST_STD_RES_TYPE: u32 = ResourceType::ClkBlk as u32;

impl ResourceType {
    pub fn from_code(code: u32) -> Option<ResourceType> {
        use ResourceType::*;
        match code {
            0 => Some(Port),
            1 => Some(Timer),
            2 => Some(Chanend),
            3 => Some(Sync),
            4 => Some(Thread),
            5 => Some(Lock),
            6 => Some(ClkBlk),
            12 => Some(Config),
            _ => None,
        }
    }
}

/// A 32-bit resource identifier: type in bits [7:0], resource number in
/// [15:8], node in [31:16]. Port identifiers carry the port width in the
/// node field instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn new(node: u32, num: u32, ty: ResourceType) -> ResourceId {
        ResourceId((node << 16) | ((num & 0xff) << 8) | ty as u32)
    }

    pub fn local(num: u32, ty: ResourceType) -> ResourceId {
        ResourceId::new(0, num, ty)
    }

    pub fn port(width: u32, num: u32) -> ResourceId {
        ResourceId::new(width, num, ResourceType::Port)
    }

    pub fn ty(self) -> Option<ResourceType> {
        ResourceType::from_code(self.0 & 0xff)
    }

    pub fn num(self) -> u32 {
        (self.0 >> 8) & 0xff
    }

    pub fn node(self) -> u32 {
        self.0 >> 16
    }

    /// Port width for port identifiers.
    pub fn width(self) -> u32 {
        self.0 >> 16
    }
}

impl From<u32> for ResourceId {
    fn from(raw: u32) -> ResourceId {
        ResourceId(raw)
    }
}

/// Lifecycle state common to every resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceState {
    pub in_use: bool,
    /// Owning thread index on the same core. Meaningful only while in use.
    pub owner: u8,
}

/// Event/interrupt state of an eventable resource.
#[derive(Debug, Clone, Default)]
pub struct EventState {
    /// Event vector, in decode units.
    pub vector: u32,
    /// Environment word delivered through ED; defaults to the resource id.
    pub env: u32,
    pub enabled: bool,
    /// Deliver as an interrupt rather than an event.
    pub interrupt: bool,
}

/// `SETC` mode words understood by the resources. The low bits select the
/// group, the remainder the value within it.
pub mod setc {
    pub const INUSE_OFF: u32 = 0x0;
    pub const INUSE_ON: u32 = 0x8;
    pub const COND_FULL: u32 = 0x1;
    pub const COND_AFTER: u32 = 0x9;
    pub const COND_EQ: u32 = 0x11;
    pub const COND_NEQ: u32 = 0x19;
    pub const COND_PINSEQ: u32 = 0x21;
    pub const COND_PINSNEQ: u32 = 0x29;
    pub const IE_MODE_EVENT: u32 = 0x2;
    pub const IE_MODE_INTERRUPT: u32 = 0xa;
    pub const RUN_STOPR: u32 = 0x7;
    pub const RUN_STARTR: u32 = 0xf;
    pub const RUN_CLRBUF: u32 = 0x17;
    pub const MS_SLAVE: u32 = 0x1007;
    pub const MS_MASTER: u32 = 0x100f;
    pub const BUF_NOBUFFERS: u32 = 0x2007;
    pub const BUF_BUFFERS: u32 = 0x200f;
    pub const RDY_NOREADY: u32 = 0x3007;
    pub const RDY_STROBED: u32 = 0x300f;
    pub const RDY_HANDSHAKE: u32 = 0x3017;
    pub const PORT_DATAPORT: u32 = 0x5007;
    pub const PORT_CLOCKPORT: u32 = 0x500f;
    pub const PORT_READYPORT: u32 = 0x5017;
}

/// Condition attached to a port or timer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Condition {
    #[default]
    Full,
    After,
    Eq,
    Neq,
    PinsEq,
    PinsNeq,
}

impl Condition {
    pub fn from_setc(value: u32) -> Option<Condition> {
        match value {
            setc::COND_FULL => Some(Condition::Full),
            setc::COND_AFTER => Some(Condition::After),
            setc::COND_EQ => Some(Condition::Eq),
            setc::COND_NEQ => Some(Condition::Neq),
            setc::COND_PINSEQ => Some(Condition::PinsEq),
            setc::COND_PINSNEQ => Some(Condition::PinsNeq),
            _ => None,
        }
    }
}

/// Global reference to a resource instance, used on the event wheel and in
/// pause back-pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResRef {
    pub core: u16,
    pub ty: ResourceType,
    pub num: u8,
}

impl ResRef {
    pub fn new(core: usize, ty: ResourceType, num: usize) -> ResRef {
        ResRef { core: core as u16, ty, num: num as u8 }
    }
}

/// Global thread reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadRef {
    pub core: u16,
    pub num: u8,
}

impl ThreadRef {
    pub fn new(core: usize, num: usize) -> ThreadRef {
        ThreadRef { core: core as u16, num: num as u8 }
    }
}

/// An entry on the system event wheel: deferred work for a resource at a
/// point in simulated time. Orders by time, ties broken by resource id
/// then insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WheelEntry {
    pub time: Ticks,
    pub res: ResRef,
    pub seq: u64,
}

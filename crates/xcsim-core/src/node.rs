//! Nodes and the inter-node link fabric. Each node owns a switch, a set of
//! xlinks to neighbours and a per-bit direction table used for
//! dimension-order routing of channel traffic.

use crate::resource::{ResourceId, ResourceType};
use crate::endpoint::EndpointRef;
use crate::sswitch::SSwitch;
use crate::system::SystemState;

pub const NUM_DIRECTIONS: usize = 16;

/// An inter-node link endpoint.
#[derive(Debug, Clone, Default)]
pub struct XLink {
    /// Connected neighbour: (node index, remote link number).
    pub dest: Option<(u16, u8)>,
    pub enabled: bool,
    pub five_wire: bool,
    pub network: u8,
    pub direction: u8,
    pub inter_token_delay: u32,
    pub inter_symbol_delay: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Processor,
    Peripheral,
}

#[derive(Debug)]
pub struct Node {
    /// Routing identifier, masked to `node_number_bits`.
    pub id: u32,
    pub node_number_bits: u32,
    /// Outbound direction for each bit of the node id.
    pub directions: [u8; NUM_DIRECTIONS],
    pub xlinks: Vec<XLink>,
    /// Global core indices owned by this node, in core-number order.
    pub cores: Vec<usize>,
    pub kind: NodeKind,
    pub jtag_index: u32,
    pub sswitch: SSwitch,
}

impl Node {
    pub fn new(kind: NodeKind, num_xlinks: usize) -> Node {
        Node {
            id: 0,
            node_number_bits: 16,
            directions: [0; NUM_DIRECTIONS],
            xlinks: vec![XLink::default(); num_xlinks],
            cores: Vec::new(),
            kind,
            jtag_index: 0,
            sswitch: SSwitch::new(),
        }
    }

    /// Direction for routing towards `dest`: that of the most significant
    /// differing id bit.
    pub fn route_direction(&self, dest: u32) -> Option<u8> {
        let diff = (self.id ^ dest) & xcsim_support::bits::make_mask(self.node_number_bits);
        if diff == 0 {
            return None;
        }
        let bit = 31 - diff.leading_zeros();
        Some(self.directions[bit as usize])
    }

    pub fn xlink_for_direction(&self, direction: u8) -> Option<usize> {
        self.xlinks.iter().position(|l| l.enabled && l.direction == direction && l.dest.is_some())
    }
}

impl SystemState {
    /// Follow the switch fabric from `node` to the endpoint a channel
    /// destination id routes to. `None` means the id is unroutable, which
    /// surfaces to the sending thread as a link error.
    pub fn resolve_chanend_dest(&self, node: usize, dest: ResourceId) -> Option<EndpointRef> {
        let mut current = node;
        // The fabric is loop-free in any sane configuration; bound the
        // walk so a misprogrammed direction table cannot hang the
        // simulator.
        for _ in 0..=self.nodes.len() {
            let n = &self.nodes[current];
            if dest.node() & xcsim_support::bits::make_mask(n.node_number_bits) == n.id {
                return match dest.ty() {
                    Some(ResourceType::Config) => Some(EndpointRef::Switch { node: current as u16 }),
                    Some(ResourceType::Chanend) => {
                        let num = dest.num();
                        let core = n.cores.get((num / 32) as usize)?;
                        Some(EndpointRef::Chanend { core: *core as u16, num: (num % 32) as u8 })
                    }
                    _ => None,
                };
            }
            let direction = n.route_direction(dest.node())?;
            let link = n.xlink_for_direction(direction)?;
            let (next, _) = n.xlinks[link].dest?;
            current = next as usize;
        }
        None
    }

    /// Wire two xlinks together, both directions.
    pub fn connect_xlinks(&mut self, node1: usize, link1: usize, node2: usize, link2: usize) {
        self.nodes[node1].xlinks[link1].dest = Some((node2 as u16, link2 as u8));
        self.nodes[node1].xlinks[link1].enabled = true;
        self.nodes[node2].xlinks[link2].dest = Some((node1 as u16, link1 as u8));
        self.nodes[node2].xlinks[link2].enabled = true;
    }
}

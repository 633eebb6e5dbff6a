//! The per-node switch endpoint and its control registers, reached over the
//! channel fabric with a read/write request protocol.

use xcsim_support::bits::make_mask;
use xcsim_support::token::{CT_ACK, CT_END, CT_NACK, CT_PAUSE, CT_READC, CT_WRITEC};
use xcsim_support::{Ticks, Token};

use crate::endpoint::{ClaimResult, EndpointRef, RouteState};
use crate::node::Node;
use crate::resource::{ResourceId, ResourceType};
use crate::system::SystemState;

/// Write request: CT_WRITEC, 3 return-address bytes, 2 register bytes and
/// 4 data bytes (CT_END excluded).
const WRITE_REQUEST_LENGTH: usize = 1 + 3 + 2 + 4;
/// Read request: as above without the data.
const READ_REQUEST_LENGTH: usize = 1 + 3 + 2;

pub mod regs {
    pub const DEVICE_ID3: u16 = 0x03;
    pub const NODE_ID: u16 = 0x05;
    pub const DIMENSION_DIRECTION_0: u16 = 0x0c;
    pub const DIMENSION_DIRECTION_1: u16 = 0x0d;
    pub const SLINK_0: u16 = 0x20;
    pub const XLINK_0: u16 = 0x80;
}

/// A response waiting for its route or for destination buffer space.
#[derive(Debug, Clone)]
pub struct PendingResponse {
    pub dest: ResourceId,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Default)]
pub struct SSwitch {
    pub route: RouteState,
    received: Vec<Token>,
    junk_incoming_tokens: bool,
    /// Responses not yet deliverable; flushed on notifications.
    responses: std::collections::VecDeque<PendingResponse>,
    pub scratch: u32,
}

impl SSwitch {
    /// Switches accept traffic from reset.
    pub fn new() -> SSwitch {
        SSwitch { route: RouteState { junk_incoming: false, ..RouteState::default() }, ..SSwitch::default() }
    }
}

#[derive(Debug, Clone, Copy)]
struct Request {
    write: bool,
    return_node: u16,
    return_num: u8,
    reg: u16,
    data: u32,
}

fn read16_be(tokens: &[Token]) -> u16 {
    (tokens[0].value() as u16) << 8 | tokens[1].value() as u16
}

fn read32_be(tokens: &[Token]) -> u32 {
    (tokens[0].value() as u32) << 24
        | (tokens[1].value() as u32) << 16
        | (tokens[2].value() as u32) << 8
        | tokens[3].value() as u32
}

fn parse_request(received: &[Token]) -> Option<Request> {
    let first = received.first()?;
    if !first.is_control() {
        return None;
    }
    let (write, expected) = match first.value() {
        CT_READC => (false, READ_REQUEST_LENGTH),
        CT_WRITEC => (true, WRITE_REQUEST_LENGTH),
        _ => return None,
    };
    if received.len() != expected || received[1..].iter().any(|t| t.is_control()) {
        return None;
    }
    Some(Request {
        write,
        return_node: read16_be(&received[1..]),
        return_num: received[3].value(),
        reg: read16_be(&received[4..]),
        data: if write { read32_be(&received[6..]) } else { 0 },
    })
}

fn direction_bits(node: &Node) -> u32 {
    if node.node_number_bits == 0 {
        return 0;
    }
    32 - (node.node_number_bits - 1).leading_zeros()
}

fn read_xlink_state(link: &crate::node::XLink) -> u32 {
    let mut value = link.inter_token_delay & 0x7ff;
    value |= (link.inter_symbol_delay & 0x7ff) << 11;
    let connected = link.dest.is_some() as u32;
    value |= connected << 25 | connected << 26;
    value |= (link.five_wire as u32) << 30;
    value |= (link.enabled as u32) << 31;
    value
}

fn write_xlink_state(link: &mut crate::node::XLink, value: u32) {
    link.inter_token_delay = value & 0x7ff;
    link.inter_symbol_delay = (value >> 11) & 0x7ff;
    link.five_wire = value & (1 << 30) != 0;
    link.enabled = value & (1 << 31) != 0;
}

fn read_xlink_direction(node: &Node, link: usize) -> u32 {
    let bits = direction_bits(node);
    let l = &node.xlinks[link];
    ((l.network as u32) & 3) << 4 | ((l.direction as u32) & make_mask(bits + 2)) << 8
}

fn write_xlink_direction(node: &mut Node, link: usize, value: u32) {
    let bits = direction_bits(node);
    let l = &mut node.xlinks[link];
    l.network = ((value >> 4) & 3) as u8;
    l.direction = ((value >> 8) & make_mask(bits + 2)) as u8;
}

/// Each direction register packs four 4-bit per-bit direction codes.
fn read_direction_reg(node: &Node, offset: usize) -> u32 {
    let end = (offset + 4).min(node.node_number_bits as usize);
    let mut value = 0;
    for i in offset..end {
        value |= (node.directions[i] as u32) << ((i - offset) * 4);
    }
    value
}

fn write_direction_reg(node: &mut Node, offset: usize, value: u32) {
    let end = (offset + 4).min(node.node_number_bits as usize);
    for i in offset..end {
        node.directions[i] = ((value >> ((i - offset) * 4)) & 0xf) as u8;
    }
}

/// Register file access; `None` is a NACK.
pub fn read_register(node: &Node, reg: u16) -> Option<u32> {
    use regs::*;
    let num_xlinks = node.xlinks.len() as u16;
    match reg {
        NODE_ID => Some(node.id),
        DEVICE_ID3 => Some(node.sswitch.scratch),
        DIMENSION_DIRECTION_0 | DIMENSION_DIRECTION_1 => {
            Some(read_direction_reg(node, (reg - DIMENSION_DIRECTION_0) as usize * 4))
        }
        _ if reg >= SLINK_0 && reg < SLINK_0 + num_xlinks => {
            Some(read_xlink_direction(node, (reg - SLINK_0) as usize))
        }
        _ if reg >= XLINK_0 && reg < XLINK_0 + num_xlinks => {
            Some(read_xlink_state(&node.xlinks[(reg - XLINK_0) as usize]))
        }
        _ => None,
    }
}

pub fn write_register(node: &mut Node, reg: u16, value: u32) -> bool {
    use regs::*;
    let num_xlinks = node.xlinks.len() as u16;
    match reg {
        NODE_ID => {
            node.id = value & make_mask(node.node_number_bits);
            true
        }
        DEVICE_ID3 => {
            node.sswitch.scratch = value;
            true
        }
        DIMENSION_DIRECTION_0 | DIMENSION_DIRECTION_1 => {
            write_direction_reg(node, (reg - DIMENSION_DIRECTION_0) as usize * 4, value);
            true
        }
        _ if reg >= SLINK_0 && reg < SLINK_0 + num_xlinks => {
            write_xlink_direction(node, (reg - SLINK_0) as usize, value);
            true
        }
        _ if reg >= XLINK_0 && reg < XLINK_0 + num_xlinks => {
            write_xlink_state(&mut node.xlinks[(reg - XLINK_0) as usize], value);
            true
        }
        _ => false,
    }
}

impl SystemState {
    pub(crate) fn sswitch_receive_data_tokens(&mut self, node: usize, values: &[u8]) {
        let sw = &mut self.nodes[node].sswitch;
        if sw.junk_incoming_tokens {
            return;
        }
        if sw.received.len() + values.len() > WRITE_REQUEST_LENGTH {
            sw.junk_incoming_tokens = true;
            return;
        }
        sw.received.extend(values.iter().map(|&v| Token::data(v)));
    }

    pub(crate) fn sswitch_receive_ctrl_token(&mut self, node: usize, value: u8, time: Ticks) {
        if value == CT_END {
            let junked = self.nodes[node].sswitch.junk_incoming_tokens;
            let request =
                if junked { None } else { parse_request(&self.nodes[node].sswitch.received) };
            {
                let sw = &mut self.nodes[node].sswitch;
                sw.received.clear();
                sw.junk_incoming_tokens = false;
            }
            self.ep_release(EndpointRef::Switch { node: node as u16 }, time);
            if let Some(request) = request {
                self.sswitch_handle_request(node, request, time);
            }
            return;
        }
        if value == CT_PAUSE {
            self.ep_release(EndpointRef::Switch { node: node as u16 }, time);
            return;
        }
        let sw = &mut self.nodes[node].sswitch;
        if sw.junk_incoming_tokens {
            return;
        }
        if sw.received.len() == WRITE_REQUEST_LENGTH {
            sw.junk_incoming_tokens = true;
            return;
        }
        sw.received.push(Token::control(value));
    }

    fn sswitch_handle_request(&mut self, node: usize, request: Request, time: Ticks) {
        let dest = ResourceId::new(
            request.return_node as u32,
            request.return_num as u32,
            ResourceType::Chanend,
        );
        let mut tokens = Vec::new();
        if request.write {
            if write_register(&mut self.nodes[node], request.reg, request.data) {
                self.trace(|t, sys| t.sswitch_write(sys, node, dest.0, request.reg, request.data));
                self.trace(|t, sys| t.sswitch_ack(sys, node, dest.0));
                tokens.push(Token::control(CT_ACK));
            } else {
                self.trace(|t, sys| t.sswitch_nack(sys, node, dest.0));
                tokens.push(Token::control(CT_NACK));
            }
        } else {
            self.trace(|t, sys| t.sswitch_read(sys, node, dest.0, request.reg));
            match read_register(&self.nodes[node], request.reg) {
                Some(value) => {
                    self.trace(|t, sys| t.sswitch_ack(sys, node, dest.0));
                    tokens.push(Token::control(CT_ACK));
                    tokens.extend(value.to_be_bytes().map(Token::data));
                }
                None => {
                    self.trace(|t, sys| t.sswitch_nack(sys, node, dest.0));
                    tokens.push(Token::control(CT_NACK));
                }
            }
        }
        tokens.push(Token::control(CT_END));
        self.nodes[node].sswitch.responses.push_back(PendingResponse { dest, tokens });
        self.sswitch_flush_responses(node, time);
    }

    /// Try to deliver parked responses. Invoked after a request and from
    /// route/buffer notifications; responses that still cannot go out stay
    /// queued.
    pub(crate) fn sswitch_flush_responses(&mut self, node: usize, time: Ticks) {
        let me = EndpointRef::Switch { node: node as u16 };
        while let Some(response) = self.nodes[node].sswitch.responses.front().cloned() {
            let Some(dest) = self.resolve_chanend_dest(node, response.dest) else {
                // Unroutable return address: the response is dropped.
                self.nodes[node].sswitch.responses.pop_front();
                continue;
            };
            match self.ep_claim(dest, me) {
                ClaimResult::Pending => return,
                ClaimResult::Opened { junk: true } => {
                    self.nodes[node].sswitch.responses.pop_front();
                    continue;
                }
                ClaimResult::Opened { junk: false } => {}
            }
            if !self.ep_can_accept_tokens(dest, response.tokens.len()) {
                return;
            }
            for token in &response.tokens {
                if token.is_control() {
                    self.ep_receive_ctrl_token(dest, token.value(), time);
                } else {
                    self.ep_receive_data_tokens(dest, &[token.value()], time);
                }
            }
            self.nodes[node].sswitch.responses.pop_front();
        }
    }
}

//! Route state shared by every channel endpoint (chanends and the per-node
//! switches), and the claim/release protocol that serialises packets onto a
//! destination.

use std::collections::VecDeque;

use xcsim_support::Ticks;

use crate::system::SystemState;

/// Global reference to a channel endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointRef {
    Chanend { core: u16, num: u8 },
    Switch { node: u16 },
}

/// Per-endpoint routing state: the active packet source and the queue of
/// prospective sources waiting for the route.
#[derive(Debug, Clone)]
pub struct RouteState {
    /// Drop everything sent here (endpoint not in use).
    pub junk_incoming: bool,
    /// Source of the packet currently being received.
    pub source: Option<EndpointRef>,
    /// Endpoints blocked on this route becoming free.
    pub queue: VecDeque<EndpointRef>,
}

impl Default for RouteState {
    fn default() -> RouteState {
        RouteState { junk_incoming: true, source: None, queue: VecDeque::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    /// Route open. When `junk` is set the packet will be discarded.
    Opened { junk: bool },
    /// Destination busy; the source has been queued and will get
    /// `notify_dest_claimed` when the route frees up.
    Pending,
}

impl SystemState {
    pub(crate) fn route_state_mut(&mut self, ep: EndpointRef) -> &mut RouteState {
        match ep {
            EndpointRef::Chanend { core, num } => {
                &mut self.cores[core as usize].chanends[num as usize].route
            }
            EndpointRef::Switch { node } => &mut self.nodes[node as usize].sswitch.route,
        }
    }

    /// Try to open a route from `src` to `dst`.
    pub(crate) fn ep_claim(&mut self, dst: EndpointRef, src: EndpointRef) -> ClaimResult {
        let route = self.route_state_mut(dst);
        if route.junk_incoming {
            return ClaimResult::Opened { junk: true };
        }
        if route.source == Some(src) {
            return ClaimResult::Opened { junk: false };
        }
        if route.source.is_some() {
            route.queue.push_back(src);
            return ClaimResult::Pending;
        }
        route.source = Some(src);
        ClaimResult::Opened { junk: false }
    }

    /// End the current inbound packet on `ep`; hands the route to the next
    /// queued source, if any.
    pub(crate) fn ep_release(&mut self, ep: EndpointRef, time: Ticks) {
        let route = self.route_state_mut(ep);
        match route.queue.pop_front() {
            None => route.source = None,
            Some(next) => {
                route.source = Some(next);
                self.ep_notify_dest_claimed(next, time);
            }
        }
    }

    pub(crate) fn ep_can_accept_tokens(&mut self, ep: EndpointRef, tokens: usize) -> bool {
        match ep {
            EndpointRef::Chanend { core, num } => {
                self.cores[core as usize].chanends[num as usize].buf.remaining() >= tokens
            }
            // The switch always consumes tokens, junking over-long frames.
            EndpointRef::Switch { .. } => true,
        }
    }

    pub(crate) fn ep_receive_data_tokens(&mut self, ep: EndpointRef, values: &[u8], time: Ticks) {
        match ep {
            EndpointRef::Chanend { .. } => self.chanend_receive_data_tokens(ep, values, time),
            EndpointRef::Switch { node } => self.sswitch_receive_data_tokens(node as usize, values),
        }
    }

    pub(crate) fn ep_receive_ctrl_token(&mut self, ep: EndpointRef, value: u8, time: Ticks) {
        match ep {
            EndpointRef::Chanend { .. } => self.chanend_receive_ctrl_token(ep, value, time),
            EndpointRef::Switch { node } => {
                self.sswitch_receive_ctrl_token(node as usize, value, time)
            }
        }
    }

    /// The destination an endpoint was queued against is now routing from
    /// it.
    pub(crate) fn ep_notify_dest_claimed(&mut self, ep: EndpointRef, time: Ticks) {
        match ep {
            EndpointRef::Chanend { .. } => self.chanend_notify_dest_ready(ep, time),
            EndpointRef::Switch { node } => self.sswitch_flush_responses(node as usize, time),
        }
    }

    /// Buffer space opened up at the endpoint's destination.
    pub(crate) fn ep_notify_dest_can_accept(&mut self, ep: EndpointRef, time: Ticks) {
        match ep {
            EndpointRef::Chanend { .. } => self.chanend_notify_dest_ready(ep, time),
            EndpointRef::Switch { node } => self.sswitch_flush_responses(node as usize, time),
        }
    }
}

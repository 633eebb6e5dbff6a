//! Channel endpoints: routed packet I/O between threads, across cores and
//! across nodes.

use xcsim_support::token::{CT_END, CT_PAUSE};
use xcsim_support::{RingBuffer, Ticks, Token};

use crate::endpoint::{ClaimResult, EndpointRef, RouteState};
use crate::resource::{EventState, ResourceId, ResourceState, ResourceType};
use crate::system::SystemState;
use crate::thread::PauseReason;

pub const CHANEND_BUFFER_SIZE: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct Chanend {
    pub res: ResourceState,
    pub ev: EventState,
    pub route: RouteState,
    /// Destination bound by `SETD`. May be stale unless mid-packet.
    pub dest_id: u32,
    /// Resolved destination for the packet in progress.
    pub dest: Option<EndpointRef>,
    pub buf: RingBuffer<Token, CHANEND_BUFFER_SIZE>,
    /// Thread paused on an output instruction.
    pub paused_out: Option<u8>,
    /// Thread paused on an input instruction.
    pub paused_in: Option<u8>,
    /// The paused input wants a full word, not a single token.
    pub wait_for_word: bool,
    /// Mid-send: a route is open (or being junked) for an outgoing packet.
    pub in_packet: bool,
    /// Rest of the outgoing packet is discarded.
    pub junk_packet: bool,
}

impl Chanend {
    pub fn alloc(&mut self, owner: u8, id: ResourceId) {
        self.res = ResourceState { in_use: true, owner };
        self.ev = EventState { env: id.0, ..EventState::default() };
        self.route.junk_incoming = false;
        self.dest_id = 0;
        self.dest = None;
        self.paused_out = None;
        self.paused_in = None;
        self.wait_for_word = false;
        self.in_packet = false;
        self.junk_packet = false;
    }

    /// Free fails while the endpoint holds undelivered state.
    pub fn try_free(&mut self) -> bool {
        if !self.buf.is_empty() || self.route.source.is_some() || self.in_packet {
            return false;
        }
        self.res.in_use = false;
        self.route.junk_incoming = true;
        true
    }
}

/// Result of a chanend output operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanOut {
    Continue,
    Deschedule,
    /// The bound destination does not route anywhere.
    LinkError,
}

/// Result of a chanend input operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanIn {
    Value(u32),
    Deschedule,
    /// The buffered data did not match the request (control vs data).
    Illegal,
}

enum OpenRoute {
    Opened,
    Pending,
    NoRoute,
}

impl SystemState {
    fn chanend(&self, ep: EndpointRef) -> &Chanend {
        match ep {
            EndpointRef::Chanend { core, num } => {
                &self.cores[core as usize].chanends[num as usize]
            }
            EndpointRef::Switch { .. } => unreachable!("switch is not a chanend"),
        }
    }

    fn chanend_mut(&mut self, ep: EndpointRef) -> &mut Chanend {
        match ep {
            EndpointRef::Chanend { core, num } => {
                &mut self.cores[core as usize].chanends[num as usize]
            }
            EndpointRef::Switch { .. } => unreachable!("switch is not a chanend"),
        }
    }

    fn open_route(&mut self, ep: EndpointRef) -> OpenRoute {
        if self.chanend(ep).in_packet {
            return OpenRoute::Opened;
        }
        let dest_id = ResourceId(self.chanend(ep).dest_id);
        let core = match ep {
            EndpointRef::Chanend { core, .. } => core as usize,
            EndpointRef::Switch { .. } => unreachable!(),
        };
        let node = self.cores[core].node;
        let Some(dest) = self.resolve_chanend_dest(node, dest_id) else {
            return OpenRoute::NoRoute;
        };
        match self.ep_claim(dest, ep) {
            ClaimResult::Pending => OpenRoute::Pending,
            ClaimResult::Opened { junk } => {
                let ce = self.chanend_mut(ep);
                ce.dest = Some(dest);
                ce.junk_packet = junk;
                ce.in_packet = true;
                OpenRoute::Opened
            }
        }
    }

    pub fn chanend_setd(&mut self, ep: EndpointRef, value: u32) -> bool {
        let ty = ResourceId(value).ty();
        if self.chanend(ep).in_packet
            || !matches!(ty, Some(ResourceType::Chanend | ResourceType::Config))
        {
            return false;
        }
        self.chanend_mut(ep).dest_id = value;
        true
    }

    pub fn chanend_getd(&self, ep: EndpointRef) -> u32 {
        self.chanend(ep).dest_id
    }

    pub fn chanend_outt(&mut self, ep: EndpointRef, thread: u8, value: u8, time: Ticks) -> ChanOut {
        match self.open_route(ep) {
            OpenRoute::NoRoute => return ChanOut::LinkError,
            OpenRoute::Pending => {
                self.park_out(ep, thread);
                return ChanOut::Deschedule;
            }
            OpenRoute::Opened => {}
        }
        let ce = self.chanend(ep);
        if ce.junk_packet {
            return ChanOut::Continue;
        }
        let dest = ce.dest.expect("route open without destination");
        if !self.ep_can_accept_tokens(dest, 1) {
            self.park_out(ep, thread);
            return ChanOut::Deschedule;
        }
        self.ep_receive_data_tokens(dest, &[value], time);
        ChanOut::Continue
    }

    pub fn chanend_out(&mut self, ep: EndpointRef, thread: u8, value: u32, time: Ticks) -> ChanOut {
        match self.open_route(ep) {
            OpenRoute::NoRoute => return ChanOut::LinkError,
            OpenRoute::Pending => {
                self.park_out(ep, thread);
                return ChanOut::Deschedule;
            }
            OpenRoute::Opened => {}
        }
        let ce = self.chanend(ep);
        if ce.junk_packet {
            return ChanOut::Continue;
        }
        let dest = ce.dest.expect("route open without destination");
        if !self.ep_can_accept_tokens(dest, 4) {
            self.park_out(ep, thread);
            return ChanOut::Deschedule;
        }
        // Channels are big endian.
        let tokens =
            [(value >> 24) as u8, (value >> 16) as u8, (value >> 8) as u8, value as u8];
        self.ep_receive_data_tokens(dest, &tokens, time);
        ChanOut::Continue
    }

    pub fn chanend_outct(&mut self, ep: EndpointRef, thread: u8, value: u8, time: Ticks) -> ChanOut {
        match self.open_route(ep) {
            OpenRoute::NoRoute => return ChanOut::LinkError,
            OpenRoute::Pending => {
                self.park_out(ep, thread);
                return ChanOut::Deschedule;
            }
            OpenRoute::Opened => {}
        }
        if self.chanend(ep).junk_packet {
            if value == CT_END || value == CT_PAUSE {
                let ce = self.chanend_mut(ep);
                ce.in_packet = false;
                ce.junk_packet = false;
            }
            return ChanOut::Continue;
        }
        let dest = self.chanend(ep).dest.expect("route open without destination");
        if !self.ep_can_accept_tokens(dest, 1) {
            self.park_out(ep, thread);
            return ChanOut::Deschedule;
        }
        self.ep_receive_ctrl_token(dest, value, time);
        if value == CT_END || value == CT_PAUSE {
            let ce = self.chanend_mut(ep);
            ce.in_packet = false;
            ce.dest = None;
        }
        ChanOut::Continue
    }

    fn park_out(&mut self, ep: EndpointRef, thread: u8) {
        let core = match ep {
            EndpointRef::Chanend { core, .. } => core as usize,
            EndpointRef::Switch { .. } => unreachable!(),
        };
        let num = self.chanend_num(ep);
        self.chanend_mut(ep).paused_out = Some(thread);
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(crate::resource::ResRef::new(core, ResourceType::Chanend, num));
    }

    fn chanend_num(&self, ep: EndpointRef) -> usize {
        match ep {
            EndpointRef::Chanend { num, .. } => num as usize,
            EndpointRef::Switch { .. } => unreachable!(),
        }
    }

    /// Token availability check. `Ok(is_ct)` when a token is there;
    /// `Err(())` means the caller parks.
    pub fn chanend_testct(&mut self, ep: EndpointRef, thread: u8) -> Result<bool, ()> {
        self.chanend_update_owner(ep, thread);
        let ce = self.chanend_mut(ep);
        if ce.buf.is_empty() {
            ce.paused_in = Some(thread);
            ce.wait_for_word = false;
            self.park_in(ep, thread);
            return Err(());
        }
        Ok(ce.buf.front().is_control())
    }

    /// Word availability check: the 1-based position of the first control
    /// token within the first word, or 0 when four data tokens are
    /// buffered. `Err(())` means the caller parks.
    pub fn chanend_testwct(&mut self, ep: EndpointRef, thread: u8) -> Result<u32, ()> {
        self.chanend_update_owner(ep, thread);
        let ce = self.chanend_mut(ep);
        let in_window = ce.buf.len().min(4);
        for i in 0..in_window {
            if ce.buf.get(i).is_control() {
                return Ok(i as u32 + 1);
            }
        }
        if ce.buf.len() < 4 {
            ce.paused_in = Some(thread);
            ce.wait_for_word = true;
            self.park_in(ep, thread);
            return Err(());
        }
        Ok(0)
    }

    fn park_in(&mut self, ep: EndpointRef, thread: u8) {
        let (core, num) = match ep {
            EndpointRef::Chanend { core, num } => (core as usize, num as usize),
            EndpointRef::Switch { .. } => unreachable!(),
        };
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(crate::resource::ResRef::new(core, ResourceType::Chanend, num));
    }

    /// Input ops performed by any thread move ownership to it; events are
    /// delivered to the owner.
    fn chanend_update_owner(&mut self, ep: EndpointRef, thread: u8) {
        self.chanend_mut(ep).res.owner = thread;
    }

    fn pop_token(&mut self, ep: EndpointRef, time: Ticks) -> u8 {
        let ce = self.chanend_mut(ep);
        debug_assert!(!ce.buf.is_empty());
        let value = ce.buf.front().value();
        ce.buf.drop_front(1);
        if let Some(src) = ce.route.source {
            self.ep_notify_dest_can_accept(src, time);
        }
        value
    }

    pub fn chanend_intoken(&mut self, ep: EndpointRef, thread: u8, time: Ticks) -> ChanIn {
        match self.chanend_testct(ep, thread) {
            Err(()) => ChanIn::Deschedule,
            Ok(true) => ChanIn::Illegal,
            Ok(false) => ChanIn::Value(self.pop_token(ep, time) as u32),
        }
    }

    pub fn chanend_inct(&mut self, ep: EndpointRef, thread: u8, time: Ticks) -> ChanIn {
        match self.chanend_testct(ep, thread) {
            Err(()) => ChanIn::Deschedule,
            Ok(false) => ChanIn::Illegal,
            Ok(true) => ChanIn::Value(self.pop_token(ep, time) as u32),
        }
    }

    pub fn chanend_chkct(&mut self, ep: EndpointRef, thread: u8, value: u32, time: Ticks) -> ChanIn {
        match self.chanend_testct(ep, thread) {
            Err(()) => ChanIn::Deschedule,
            Ok(is_ct) => {
                if !is_ct || self.chanend(ep).buf.front().value() as u32 != value {
                    return ChanIn::Illegal;
                }
                ChanIn::Value(self.pop_token(ep, time) as u32)
            }
        }
    }

    pub fn chanend_in(&mut self, ep: EndpointRef, thread: u8, time: Ticks) -> ChanIn {
        match self.chanend_testwct(ep, thread) {
            Err(()) => ChanIn::Deschedule,
            Ok(position) if position != 0 => ChanIn::Illegal,
            Ok(_) => {
                let ce = self.chanend_mut(ep);
                let value = (ce.buf.get(0).value() as u32) << 24
                    | (ce.buf.get(1).value() as u32) << 16
                    | (ce.buf.get(2).value() as u32) << 8
                    | ce.buf.get(3).value() as u32;
                ce.buf.drop_front(4);
                if let Some(src) = ce.route.source {
                    self.ep_notify_dest_can_accept(src, time);
                }
                ChanIn::Value(value)
            }
        }
    }

    pub(crate) fn chanend_receive_data_tokens(&mut self, ep: EndpointRef, values: &[u8], time: Ticks) {
        let ce = self.chanend_mut(ep);
        debug_assert!(ce.buf.remaining() >= values.len());
        for &v in values {
            ce.buf.push_back(Token::data(v));
        }
        self.chanend_data_arrived(ep, time);
    }

    pub(crate) fn chanend_receive_ctrl_token(&mut self, ep: EndpointRef, value: u8, time: Ticks) {
        match value {
            CT_END => {
                self.chanend_mut(ep).buf.push_back(Token::control(value));
                self.ep_release(ep, time);
                self.chanend_data_arrived(ep, time);
            }
            CT_PAUSE => self.ep_release(ep, time),
            _ => {
                self.chanend_mut(ep).buf.push_back(Token::control(value));
                self.chanend_data_arrived(ep, time);
            }
        }
    }

    /// After tokens land in the buffer: fire an event or wake a paused
    /// reader.
    fn chanend_data_arrived(&mut self, ep: EndpointRef, time: Ticks) {
        let (core, num) = match ep {
            EndpointRef::Chanend { core, num } => (core as usize, num as usize),
            EndpointRef::Switch { .. } => unreachable!(),
        };
        let ce = &self.cores[core].chanends[num];
        debug_assert!(!ce.buf.is_empty());
        let ev = ce.ev.clone();
        let owner = ce.res.owner;
        if ev.enabled && self.event_deliverable(core, owner, ev.interrupt) {
            let res = crate::resource::ResRef::new(core, ResourceType::Chanend, num);
            self.deliver_event(core, owner, &ev, res, time);
            return;
        }
        let ce = &mut self.cores[core].chanends[num];
        let Some(thread) = ce.paused_in else { return };
        if ce.wait_for_word && ce.buf.len() < 4 {
            return;
        }
        ce.paused_in = None;
        self.wake_thread(crate::resource::ThreadRef::new(core, thread as usize), time);
    }

    /// Our destination claimed us as source, or freed buffer space: resume
    /// the paused writer.
    pub(crate) fn chanend_notify_dest_ready(&mut self, ep: EndpointRef, time: Ticks) {
        let (core, num) = match ep {
            EndpointRef::Chanend { core, num } => (core as usize, num as usize),
            EndpointRef::Switch { .. } => unreachable!(),
        };
        let ce = &mut self.cores[core].chanends[num];
        if let Some(thread) = ce.paused_out.take() {
            self.wake_thread(crate::resource::ThreadRef::new(core, thread as usize), time);
        }
    }

    /// Events newly enabled on the chanend: catch already-buffered data.
    pub(crate) fn chanend_see_event_enable(&mut self, core: usize, num: usize, time: Ticks) {
        let ce = &self.cores[core].chanends[num];
        if ce.buf.is_empty() {
            return;
        }
        let ev = ce.ev.clone();
        let owner = ce.res.owner;
        let res = crate::resource::ResRef::new(core, ResourceType::Chanend, num);
        self.deliver_event(core, owner, &ev, res, time);
    }
}

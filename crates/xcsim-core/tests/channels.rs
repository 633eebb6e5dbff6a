//! Channel endpoint behaviour: token round-trips, route claim/release
//! ordering, word/control token probing, and the switch register protocol.

mod common;

use common::{reg, run_to_exit, Asm};
use pretty_assertions::assert_eq;
use xcsim_core::{
    Core, EndpointRef, NodeKind, ResourceId, ResourceType, SystemState,
};
use xcsim_isa::{IsaVariant, Opcode, Register};
use xcsim_support::token::{CT_ACK, CT_END, CT_NACK, CT_READC, CT_WRITEC};

fn two_core_system() -> SystemState {
    let mut sys = SystemState::new();
    let node = sys.add_node(NodeKind::Processor, 0);
    sys.add_core(node, Core::new(0x10000, 0x10000, IsaVariant::Xs1B));
    let mut second = Core::new(0x10000, 0x10000, IsaVariant::Xs1B);
    second.core_number = 1;
    sys.add_core(node, second);
    sys
}

fn alloc_chanend(sys: &mut SystemState, core: usize) -> (EndpointRef, ResourceId) {
    let id = sys.alloc_resource(core, 0, ResourceType::Chanend, 0).unwrap();
    let ep = EndpointRef::Chanend { core: core as u16, num: (id.num() % 32) as u8 };
    (ep, id)
}

#[test]
fn byte_round_trip_preserves_order_and_control_embedding() {
    let mut sys = two_core_system();
    let (a, a_id) = alloc_chanend(&mut sys, 0);
    let (b, b_id) = alloc_chanend(&mut sys, 1);
    assert!(sys.chanend_setd(a, b_id.0));
    assert!(sys.chanend_setd(b, a_id.0));

    for (i, byte) in [0x12u8, 0x34, 0x56].into_iter().enumerate() {
        let result = sys.chanend_outt(a, 0, byte, i as u64);
        assert_eq!(result, xcsim_core::chanend::ChanOut::Continue);
    }
    let result = sys.chanend_outct(a, 0, CT_END, 3);
    assert_eq!(result, xcsim_core::chanend::ChanOut::Continue);

    for byte in [0x12u32, 0x34, 0x56] {
        match sys.chanend_intoken(b, 0, 10) {
            xcsim_core::chanend::ChanIn::Value(v) => assert_eq!(v, byte),
            other => panic!("expected data token, got {other:?}"),
        }
    }
    // The embedded control token is recoverable, and INT refuses it.
    assert_eq!(sys.chanend_intoken(b, 0, 11), xcsim_core::chanend::ChanIn::Illegal);
    match sys.chanend_inct(b, 0, 12) {
        xcsim_core::chanend::ChanIn::Value(v) => assert_eq!(v, CT_END as u32),
        other => panic!("expected control token, got {other:?}"),
    }
}

#[test]
fn word_output_is_big_endian() {
    let mut sys = two_core_system();
    let (a, _) = alloc_chanend(&mut sys, 0);
    let (b, b_id) = alloc_chanend(&mut sys, 1);
    assert!(sys.chanend_setd(a, b_id.0));
    assert_eq!(sys.chanend_out(a, 0, 0x1122_3344, 0), xcsim_core::chanend::ChanOut::Continue);
    for expected in [0x11u32, 0x22, 0x33, 0x44] {
        match sys.chanend_intoken(b, 0, 1) {
            xcsim_core::chanend::ChanIn::Value(v) => assert_eq!(v, expected),
            other => panic!("{other:?}"),
        }
    }
}

#[test]
fn testwct_reports_first_control_position() {
    let mut sys = two_core_system();
    let (a, _) = alloc_chanend(&mut sys, 0);
    let (b, b_id) = alloc_chanend(&mut sys, 1);
    assert!(sys.chanend_setd(a, b_id.0));

    sys.chanend_outt(a, 0, 0xaa, 0);
    sys.chanend_outct(a, 0, CT_END, 1);
    // One data token then END: position 2.
    assert_eq!(sys.chanend_testwct(b, 0), Ok(2));

    // Drain, then fill a full data word: position 0.
    sys.chanend_intoken(b, 0, 2);
    sys.chanend_inct(b, 0, 3);
    sys.chanend_out(a, 0, 0xdead_beef, 4);
    assert_eq!(sys.chanend_testwct(b, 0), Ok(0));
}

#[test]
fn testwct_parks_without_a_full_word() {
    let mut sys = two_core_system();
    let (a, _) = alloc_chanend(&mut sys, 0);
    let (b, b_id) = alloc_chanend(&mut sys, 1);
    assert!(sys.chanend_setd(a, b_id.0));
    sys.chanend_outt(a, 0, 1, 0);
    sys.chanend_outt(a, 0, 2, 1);
    // Two data tokens, no control token: not decidable yet.
    assert_eq!(sys.chanend_testwct(b, 0), Err(()));
}

#[test]
fn queued_sources_are_served_in_fifo_order() {
    let mut sys = two_core_system();
    let (a, _) = alloc_chanend(&mut sys, 0);
    let (b, _) = alloc_chanend(&mut sys, 0);
    let (c, c_id) = alloc_chanend(&mut sys, 1);
    assert!(sys.chanend_setd(a, c_id.0));
    assert!(sys.chanend_setd(b, c_id.0));

    // A claims the route; B queues.
    assert_eq!(sys.chanend_outt(a, 0, 1, 0), xcsim_core::chanend::ChanOut::Continue);
    assert_eq!(sys.chanend_outt(b, 1, 9, 1), xcsim_core::chanend::ChanOut::Deschedule);

    // Ending A's packet hands the route to B, which retries and delivers.
    sys.chanend_outct(a, 0, CT_END, 2);
    assert_eq!(sys.chanend_outt(b, 1, 9, 3), xcsim_core::chanend::ChanOut::Continue);
    sys.chanend_outct(b, 1, CT_END, 4);

    let mut seen = Vec::new();
    loop {
        match sys.chanend_intoken(c, 0, 10) {
            xcsim_core::chanend::ChanIn::Value(v) => seen.push(v),
            xcsim_core::chanend::ChanIn::Illegal => {
                sys.chanend_inct(c, 0, 10);
                if seen.len() == 2 {
                    break;
                }
            }
            xcsim_core::chanend::ChanIn::Deschedule => break,
        }
    }
    assert_eq!(seen, vec![1, 9]);
}

#[test]
fn claim_is_idempotent_and_release_clears_empty_queue() {
    let mut sys = two_core_system();
    let (a, _) = alloc_chanend(&mut sys, 0);
    let (c, c_id) = alloc_chanend(&mut sys, 1);
    assert!(sys.chanend_setd(a, c_id.0));
    sys.chanend_outt(a, 0, 1, 0);
    let source = match c {
        EndpointRef::Chanend { core, num } => {
            sys.cores[core as usize].chanends[num as usize].route.source
        }
        _ => unreachable!(),
    };
    assert_eq!(source, Some(a));
    // A second token re-claims the open route without queueing.
    sys.chanend_outt(a, 0, 2, 1);
    sys.chanend_outct(a, 0, CT_END, 2);
    let route = match c {
        EndpointRef::Chanend { core, num } => {
            &sys.cores[core as usize].chanends[num as usize].route
        }
        _ => unreachable!(),
    };
    assert!(route.source.is_none());
    assert!(route.queue.is_empty());
}

#[test]
fn out_with_unroutable_dest_is_a_link_error() {
    let mut sys = two_core_system();
    let (a, _) = alloc_chanend(&mut sys, 0);
    // Destination on a node that does not exist.
    let bogus = ResourceId::new(0x7f, 0, ResourceType::Chanend);
    assert!(sys.chanend_setd(a, bogus.0));
    assert_eq!(sys.chanend_outt(a, 0, 1, 0), xcsim_core::chanend::ChanOut::LinkError);
}

#[test]
fn buffer_capacity_limits_are_respected() {
    let mut sys = two_core_system();
    let (a, _) = alloc_chanend(&mut sys, 0);
    let (b, b_id) = alloc_chanend(&mut sys, 1);
    assert!(sys.chanend_setd(a, b_id.0));
    for i in 0..8 {
        assert_eq!(sys.chanend_outt(a, 0, i, i as u64), xcsim_core::chanend::ChanOut::Continue);
    }
    // Ninth token: destination buffer is full, the writer parks.
    assert_eq!(sys.chanend_outt(a, 0, 8, 8), xcsim_core::chanend::ChanOut::Deschedule);
    let (cap, len) = match b {
        EndpointRef::Chanend { core, num } => {
            let ce = &sys.cores[core as usize].chanends[num as usize];
            (ce.buf.capacity(), ce.buf.len())
        }
        _ => unreachable!(),
    };
    assert_eq!((cap, len), (8, 8));
    // Draining one token notifies the writer.
    sys.chanend_intoken(b, 0, 9);
    assert_eq!(sys.chanend_outt(a, 0, 8, 10), xcsim_core::chanend::ChanOut::Continue);
}

// ---------------------------------------------------------------------
// Switch register protocol.

fn send_frame(sys: &mut SystemState, ep: EndpointRef, tokens: &[(bool, u8)]) {
    for &(control, value) in tokens {
        let r = if control {
            sys.chanend_outct(ep, 0, value, 0)
        } else {
            sys.chanend_outt(ep, 0, value, 0)
        };
        assert_eq!(r, xcsim_core::chanend::ChanOut::Continue, "token {value:#x}");
    }
}

fn drain(sys: &mut SystemState, ep: EndpointRef) -> Vec<(bool, u8)> {
    let mut out = Vec::new();
    loop {
        match ep {
            EndpointRef::Chanend { core, num } => {
                let ce = &mut sys.cores[core as usize].chanends[num as usize];
                if ce.buf.is_empty() {
                    break;
                }
                let t = ce.buf.front();
                ce.buf.drop_front(1);
                out.push((t.is_control(), t.value()));
            }
            _ => unreachable!(),
        }
    }
    out
}

#[test]
fn sswitch_scratch_register_write_and_read_back() {
    let mut sys = two_core_system();
    let (a, a_id) = alloc_chanend(&mut sys, 0);
    let config = ResourceId::new(sys.nodes[0].id, 0, ResourceType::Config);
    assert!(sys.chanend_setd(a, config.0));

    let ret_node = (a_id.node() >> 8) as u8;
    let ret_node_lo = a_id.node() as u8;
    let ret_num = a_id.num() as u8;
    const SCRATCH: u16 = 0x03;

    // Write 0xcafe0042 to the scratch register.
    send_frame(
        &mut sys,
        a,
        &[
            (true, CT_WRITEC),
            (false, ret_node),
            (false, ret_node_lo),
            (false, ret_num),
            (false, (SCRATCH >> 8) as u8),
            (false, SCRATCH as u8),
            (false, 0xca),
            (false, 0xfe),
            (false, 0x00),
            (false, 0x42),
            (true, CT_END),
        ],
    );
    assert_eq!(drain(&mut sys, a), vec![(true, CT_ACK), (true, CT_END)]);
    assert_eq!(sys.nodes[0].sswitch.scratch, 0xcafe_0042);

    // Read it back.
    send_frame(
        &mut sys,
        a,
        &[
            (true, CT_READC),
            (false, ret_node),
            (false, ret_node_lo),
            (false, ret_num),
            (false, (SCRATCH >> 8) as u8),
            (false, SCRATCH as u8),
            (true, CT_END),
        ],
    );
    assert_eq!(
        drain(&mut sys, a),
        vec![
            (true, CT_ACK),
            (false, 0xca),
            (false, 0xfe),
            (false, 0x00),
            (false, 0x42),
            (true, CT_END)
        ]
    );
}

#[test]
fn sswitch_nacks_unknown_registers() {
    let mut sys = two_core_system();
    let (a, a_id) = alloc_chanend(&mut sys, 0);
    let config = ResourceId::new(sys.nodes[0].id, 0, ResourceType::Config);
    assert!(sys.chanend_setd(a, config.0));
    send_frame(
        &mut sys,
        a,
        &[
            (true, CT_READC),
            (false, (a_id.node() >> 8) as u8),
            (false, a_id.node() as u8),
            (false, a_id.num() as u8),
            (false, 0x7f),
            (false, 0xff),
            (true, CT_END),
        ],
    );
    assert_eq!(drain(&mut sys, a), vec![(true, CT_NACK), (true, CT_END)]);
}

// ---------------------------------------------------------------------
// A full fork/join exchange as a guest program: the parent forks a child
// over a synchroniser, streams two bytes to it, and the child replies
// with the assembled word.

#[test]
fn forked_threads_exchange_tokens_over_a_channel() {
    const CT_END_VAL: u32 = CT_END as u32;
    let mut asm = Asm::new();
    // pc 0: skip the child body.
    asm.inst(Opcode::BrfuU6, &[8]);
    // Child, pc 1. Its r4 holds the second chanend's id (set by the
    // parent with TSETR before MSYNC).
    assert_eq!(asm.pc(), 1);
    asm.inst(Opcode::Int2r, &[1, 4]);
    asm.inst(Opcode::Int2r, &[2, 4]);
    asm.inst(Opcode::ChkctRus, &[4, CT_END_VAL]);
    asm.inst(Opcode::Shl2rus, &[3, 1, 8]);
    asm.inst(Opcode::Or3r, &[3, 3, 2]);
    asm.inst(Opcode::Out2r, &[3, 4]);
    asm.inst(Opcode::OutctRus, &[4, CT_END_VAL]);
    asm.inst(Opcode::Ssync0r, &[]);
    // Parent, pc 9.
    assert_eq!(asm.pc(), 9);
    asm.inst(Opcode::GetrRus, &[4, ResourceType::Chanend as u32]);
    asm.inst(Opcode::GetrRus, &[5, ResourceType::Chanend as u32]);
    asm.inst(Opcode::Setd2r, &[5, 4]); // dest(r4) = r5
    asm.inst(Opcode::Setd2r, &[4, 5]); // dest(r5) = r4
    asm.inst(Opcode::GetrRus, &[6, ResourceType::Sync as u32]);
    asm.inst(Opcode::Getst2r, &[7, 6]);
    // r11 = &child (pc 1).
    let ldap_pc = asm.pc();
    asm.inst(Opcode::LdapbU10, &[ldap_pc + 1 - 1]);
    asm.inst(Opcode::Tinitpc2r, &[11, 7]);
    asm.inst(Opcode::Tsetr3r, &[4, 5, 7]); // child r4 = our r5
    asm.inst(Opcode::Msync1r, &[6]);
    asm.inst(Opcode::LdcLru6, &[1, 0xa5]);
    asm.inst(Opcode::Outt2r, &[1, 4]);
    asm.inst(Opcode::LdcLru6, &[1, 0x5a]);
    asm.inst(Opcode::Outt2r, &[1, 4]);
    asm.inst(Opcode::OutctRus, &[4, CT_END_VAL]);
    asm.inst(Opcode::In2r, &[2, 4]);
    asm.inst(Opcode::ChkctRus, &[4, CT_END_VAL]);
    asm.inst(Opcode::Mjoin1r, &[6]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = run_to_exit(&mut asm);
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R2), 0xa55a);
}

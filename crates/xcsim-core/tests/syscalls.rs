//! Host syscall scenarios: console output, guest command lines and file
//! round-trips.

mod common;

use common::{reg, Asm, RAM_BASE};
use xcsim_core::{nr, open_flags, BreakpointKind, RunResult, SystemState};
use xcsim_isa::{Opcode, Register};

/// Programs call the syscall stub at pc 1 with BLRB; the stub address is
/// breakpointed as a syscall entry and resumes at the link register.
const STUB_PC: u32 = 1;

fn asm_with_stub() -> Asm {
    let mut asm = Asm::new();
    asm.inst(Opcode::BrfuU6, &[1]); // skip the stub
    assert_eq!(asm.pc(), STUB_PC);
    asm.inst(Opcode::Nop0r, &[]); // breakpointed
    asm
}

/// Call the syscall stub, leaving the result in r0.
fn call_stub(asm: &mut Asm) {
    let pc = asm.pc();
    asm.inst(Opcode::BlrbU10, &[pc + 1 - STUB_PC]);
}

fn finish_and_run(asm: &mut Asm, prepare: impl FnOnce(&mut SystemState)) -> (SystemState, i32) {
    let exit_pc = asm.pc();
    asm.inst(Opcode::Nop0r, &[]);
    let mut sys = common::single_core_system();
    common::load_program(&mut sys, &asm.words);
    common::install_exit(&mut sys, exit_pc);
    let stub_address = sys.cores[0].from_pc(STUB_PC);
    assert!(sys.cores[0].set_breakpoint(stub_address));
    sys.breakpoint_kinds.insert((0, stub_address), BreakpointKind::Syscall);
    sys.syscalls.capture_output = true;
    prepare(&mut sys);
    match sys.run() {
        RunResult::Exit(code) => (sys, code),
        other => panic!("program did not exit: {other:?}"),
    }
}

#[test]
fn hello_world_writes_exactly_twelve_bytes() {
    const DATA: u32 = RAM_BASE + 0x200;
    let mut asm = asm_with_stub();
    asm.inst(Opcode::LdcLru6, &[0, nr::WRITE]);
    asm.inst(Opcode::LdcLru6, &[1, 1]); // stdout
    asm.ldc32(2, DATA);
    asm.inst(Opcode::LdcLru6, &[3, 12]);
    call_stub(&mut asm);
    // r4 = bytes written.
    asm.inst(Opcode::Add2rus, &[4, 0, 0]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    let (sys, code) = finish_and_run(&mut asm, |sys| {
        assert!(sys.cores[0].write_block(DATA, b"Hello world\n"));
    });
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), 12);
    assert_eq!(sys.syscalls.captured, b"Hello world\n");
}

#[test]
fn command_line_is_visible_to_the_guest() {
    const BUF1: u32 = RAM_BASE + 0x300;
    const BUF2: u32 = RAM_BASE + 0x340;
    let mut asm = asm_with_stub();
    // r4 = argc.
    asm.inst(Opcode::LdcLru6, &[0, nr::ARGC]);
    call_stub(&mut asm);
    asm.inst(Opcode::Add2rus, &[4, 0, 0]);
    // argv[1] -> BUF1.
    asm.inst(Opcode::LdcLru6, &[0, nr::ARGV]);
    asm.inst(Opcode::LdcLru6, &[1, 1]);
    asm.ldc32(2, BUF1);
    asm.inst(Opcode::LdcLru6, &[3, 0x40]);
    call_stub(&mut asm);
    // argv[2] -> BUF2.
    asm.inst(Opcode::LdcLru6, &[0, nr::ARGV]);
    asm.inst(Opcode::LdcLru6, &[1, 2]);
    asm.ldc32(2, BUF2);
    asm.inst(Opcode::LdcLru6, &[3, 0x40]);
    call_stub(&mut asm);
    // Exit 1 unless argc == 3.
    asm.inst(Opcode::LdcLru6, &[2, 3]);
    asm.inst(Opcode::Eq3r, &[3, 4, 2]);
    let fail = asm.pc() + 5;
    asm.inst(Opcode::BrffRu6, &[3, fail - asm.pc() - 1]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    assert_eq!(asm.pc(), fail);
    let (sys, code) = finish_and_run(&mut asm, |sys| {
        sys.syscalls.set_cmdline(vec!["prog".into(), "hello".into(), "world".into()]);
    });
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R4), 3);
    let hello = sys.cores[0].read_block(BUF1, 6).unwrap();
    assert_eq!(hello, b"hello\0");
    let world = sys.cores[0].read_block(BUF2, 6).unwrap();
    assert_eq!(world, b"world\0");
}

#[test]
fn wrong_argument_count_exits_one() {
    let mut asm = asm_with_stub();
    asm.inst(Opcode::LdcLru6, &[0, nr::ARGC]);
    call_stub(&mut asm);
    asm.inst(Opcode::Add2rus, &[4, 0, 0]);
    asm.inst(Opcode::LdcLru6, &[2, 3]);
    asm.inst(Opcode::Eq3r, &[3, 4, 2]);
    let fail = asm.pc() + 6;
    asm.inst(Opcode::BrffRu6, &[3, fail - asm.pc() - 1]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);
    asm.bu_to(fail + 4);
    assert_eq!(asm.pc(), fail);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 1]);
    let (_, code) = finish_and_run(&mut asm, |sys| {
        sys.syscalls.set_cmdline(vec!["prog".into()]);
    });
    assert_eq!(code, 1);
}

#[test]
fn file_round_trip_preserves_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let path_str = format!("{}\0", path.display());

    const PATH_BUF: u32 = RAM_BASE + 0x400;
    const PAYLOAD: u32 = RAM_BASE + 0x500;
    const READBACK: u32 = RAM_BASE + 0x540;

    let mut asm = asm_with_stub();
    // fd = open(path, CREAT|WRONLY|TRUNC, 0644)
    asm.inst(Opcode::LdcLru6, &[0, nr::OPEN]);
    asm.ldc32(1, PATH_BUF);
    asm.ldc32(2, open_flags::CREAT | open_flags::WRONLY | open_flags::TRUNC);
    asm.ldc32(3, 0o644);
    call_stub(&mut asm);
    asm.inst(Opcode::Add2rus, &[4, 0, 0]); // r4 = fd
    // write(fd, payload, 4)
    asm.inst(Opcode::LdcLru6, &[0, nr::WRITE]);
    asm.inst(Opcode::Add2rus, &[1, 4, 0]);
    asm.ldc32(2, PAYLOAD);
    asm.inst(Opcode::LdcLru6, &[3, 4]);
    call_stub(&mut asm);
    asm.inst(Opcode::Add2rus, &[5, 0, 0]); // r5 = written
    // close(fd)
    asm.inst(Opcode::LdcLru6, &[0, nr::CLOSE]);
    asm.inst(Opcode::Add2rus, &[1, 4, 0]);
    call_stub(&mut asm);
    // fd = open(path, RDONLY, 0)
    asm.inst(Opcode::LdcLru6, &[0, nr::OPEN]);
    asm.ldc32(1, PATH_BUF);
    asm.inst(Opcode::LdcLru6, &[2, open_flags::RDONLY]);
    asm.inst(Opcode::LdcLru6, &[3, 0]);
    call_stub(&mut asm);
    asm.inst(Opcode::Add2rus, &[4, 0, 0]);
    // read(fd, readback, 4)
    asm.inst(Opcode::LdcLru6, &[0, nr::READ]);
    asm.inst(Opcode::Add2rus, &[1, 4, 0]);
    asm.ldc32(2, READBACK);
    asm.inst(Opcode::LdcLru6, &[3, 4]);
    call_stub(&mut asm);
    asm.inst(Opcode::Add2rus, &[6, 0, 0]); // r6 = read
    // close(fd)
    asm.inst(Opcode::LdcLru6, &[0, nr::CLOSE]);
    asm.inst(Opcode::Add2rus, &[1, 4, 0]);
    call_stub(&mut asm);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);

    let (sys, code) = finish_and_run(&mut asm, |sys| {
        assert!(sys.cores[0].write_block(PATH_BUF, path_str.as_bytes()));
        assert!(sys.cores[0].write_block(PAYLOAD, b"foo\0"));
    });
    assert_eq!(code, 0);
    assert_eq!(reg(&sys, Register::R5), 4);
    assert_eq!(reg(&sys, Register::R6), 4);
    assert_eq!(sys.cores[0].read_block(READBACK, 4).unwrap(), b"foo\0");
    assert_eq!(std::fs::read(&path).unwrap(), b"foo\0");
}

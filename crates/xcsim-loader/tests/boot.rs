//! End-to-end image boot: container, topology, ELF load, syscall
//! breakpoint wiring and exit-code propagation.

use xcsim_core::RunResult;
use xcsim_isa::{encode, Opcode, Operands};
use xcsim_loader::xe::{XE_SECTOR_CONFIG, XE_SECTOR_ELF, XE_SECTOR_GOTO};
use xcsim_loader::{elf::build_elf, Simulation, XeBuilder};

const CONFIG: &str = r#"
    <Config>
      <System>
        <Nodes>
          <Node jtagId="0x2731" number="0">
            <Processor number="0" codeReference="tile[0]">
              <MemoryController><Ram base="0x10000" size="0x10000"/></MemoryController>
            </Processor>
          </Node>
        </Nodes>
      </System>
    </Config>"#;

fn assemble(instructions: &[(Opcode, &[u32])]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (opcode, operands) in instructions {
        for hw in encode(*opcode, &Operands::of(operands)).unwrap() {
            bytes.extend_from_slice(&hw.to_le_bytes());
        }
    }
    bytes
}

/// A program whose entry jumps over the syscall stub and exits with the
/// given code.
fn exit_program(code: u32) -> Vec<u8> {
    assemble(&[
        (Opcode::BrfuU6, &[1]),
        (Opcode::Nop0r, &[]), // _DoSyscall stub at +2 bytes
        (Opcode::LdcLru6, &[0, xcsim_core::nr::EXIT]),
        (Opcode::LdcLru6, &[1, code]),
        (Opcode::BlrbU10, &[6]), // back to the stub
    ])
}

fn build_image(code: u32, with_goto: bool) -> Vec<u8> {
    let program = exit_program(code);
    let elf = build_elf(0x10000, &[(0x10000, &program)], &[("_DoSyscall", 0x10002)]);
    let mut builder = XeBuilder::new();
    builder.sector(XE_SECTOR_CONFIG, CONFIG.as_bytes());
    builder.targeted_sector(XE_SECTOR_ELF, 0, 0, 0x10000, &elf);
    if with_goto {
        builder.targeted_sector(XE_SECTOR_GOTO, 0, 0, 0x10000, &[]);
    }
    builder.finish()
}

#[test]
fn goto_sector_runs_the_image_and_propagates_the_exit_code() {
    let image = build_image(42, true);
    let xe = xcsim_loader::Xe::parse(&image).unwrap();
    let mut simulation = Simulation::from_xe(&xe).unwrap();
    assert_eq!(simulation.run().unwrap(), RunResult::Exit(42));
}

#[test]
fn entry_point_is_used_without_an_explicit_schedule() {
    let image = build_image(0, false);
    let xe = xcsim_loader::Xe::parse(&image).unwrap();
    let mut simulation = Simulation::from_xe(&xe).unwrap();
    assert_eq!(simulation.run().unwrap(), RunResult::Exit(0));
}

#[test]
fn loading_from_disk_matches_in_memory_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.xe");
    std::fs::write(&path, build_image(7, true)).unwrap();
    let mut simulation = Simulation::load(&path).unwrap();
    assert_eq!(simulation.run().unwrap(), RunResult::Exit(7));
}

#[test]
fn segments_outside_ram_are_fatal() {
    let program = exit_program(0);
    let elf = build_elf(0x40000, &[(0x40000, &program)], &[]);
    let mut builder = XeBuilder::new();
    builder.sector(XE_SECTOR_CONFIG, CONFIG.as_bytes());
    builder.targeted_sector(XE_SECTOR_ELF, 0, 0, 0x40000, &elf);
    let image = builder.finish();
    let xe = xcsim_loader::Xe::parse(&image).unwrap();
    assert!(Simulation::from_xe(&xe).is_err());
}

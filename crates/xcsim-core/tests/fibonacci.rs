//! Recursive Fibonacci, first 80 terms: exercises call/return, stack
//! frames, the long-add carry chain and the decode cache, and checks the
//! produced sequence is the real one. Values pass 2^32 at term 48, so the
//! guest accumulates 64-bit pairs with `LADD` and the sequence stays
//! monotone all the way out.

mod common;

use common::{Asm, RAM_BASE};
use xcsim_isa::Opcode;

const COUNT: u32 = 80;
/// Each term is stored as a low/high word pair at `ARRAY + 8 * n`.
const ARRAY: u32 = RAM_BASE + 0x8000;

#[test]
fn recursive_fibonacci_terminates_with_the_right_sequence() {
    let mut asm = Asm::new();
    // pc 0: jump over fibrec to main.
    asm.inst(Opcode::BrfuU6, &[35]);

    // fibrec(n in r0): linear recursion to depth n. Returns
    // (r0, r1) = fib(n) and (r2, r3) = fib(n-1) as low/high pairs, and
    // stores fib(n) into the array on the way back up. r6 holds the array
    // base throughout.
    let fibrec = asm.pc();
    assert_eq!(fibrec, 1);
    asm.inst(Opcode::EntspU6, &[2]); // lr at sp[2], n at sp[1]
    asm.inst(Opcode::StwspRu6, &[0, 1]);
    asm.inst(Opcode::LdcRu6, &[7, 1]);
    asm.inst(Opcode::Eq3r, &[8, 0, 7]);
    let rec = asm.pc() + 12;
    asm.inst(Opcode::BrffRu6, &[8, rec - asm.pc() - 1]);
    // Base case: fib(1) = 1, fib(0) = 0; array[1] = 1.
    asm.inst(Opcode::LdcRu6, &[0, 1]);
    asm.inst(Opcode::LdcRu6, &[1, 0]);
    asm.inst(Opcode::LdcRu6, &[2, 0]);
    asm.inst(Opcode::LdcRu6, &[3, 0]);
    asm.inst(Opcode::LdcRu6, &[7, 2]);
    asm.inst(Opcode::StwL3r, &[0, 6, 7]);
    asm.inst(Opcode::LdcRu6, &[7, 3]);
    asm.inst(Opcode::StwL3r, &[1, 6, 7]);
    asm.inst(Opcode::RetspU6, &[2]);
    assert_eq!(asm.pc(), rec);
    // Recursive case: (a, b) = fibrec(n-1); fib(n) = a + b in 64 bits.
    asm.inst(Opcode::Sub2rus, &[0, 0, 1]);
    let here = asm.pc();
    asm.inst(Opcode::BlrbU10, &[here + 1 - fibrec]);
    asm.inst(Opcode::LdcRu6, &[7, 0]);
    asm.inst(Opcode::LaddL5r, &[8, 0, 2, 9, 7]); // sum.lo in r8, carry in r9
    asm.inst(Opcode::LaddL5r, &[10, 1, 3, 11, 9]); // sum.hi in r10
    asm.inst(Opcode::Add2rus, &[2, 0, 0]); // fib(n-1) moves to (r2, r3)
    asm.inst(Opcode::Add2rus, &[3, 1, 0]);
    asm.inst(Opcode::Add2rus, &[0, 8, 0]); // fib(n) into (r0, r1)
    asm.inst(Opcode::Add2rus, &[1, 10, 0]);
    // array[n] = fib(n): word offsets 2n and 2n+1.
    asm.inst(Opcode::LdwspRu6, &[4, 1]);
    asm.inst(Opcode::Shl2rus, &[7, 4, 1]);
    asm.inst(Opcode::StwL3r, &[0, 6, 7]);
    asm.inst(Opcode::Add2rus, &[7, 7, 1]);
    asm.inst(Opcode::StwL3r, &[1, 6, 7]);
    asm.inst(Opcode::RetspU6, &[2]);

    // main, pc 36.
    assert_eq!(asm.pc(), 36);
    asm.ldc32(6, ARRAY);
    asm.inst(Opcode::LdcLru6, &[0, COUNT]);
    let here = asm.pc();
    asm.inst(Opcode::BlrbU10, &[here + 1 - fibrec]);
    asm.inst(Opcode::LdcLru6, &[0, common::SYS_EXIT]);
    asm.inst(Opcode::LdcLru6, &[1, 0]);

    let (sys, code) = common::run_to_exit(&mut asm);
    assert_eq!(code, 0);

    let mut expected = vec![0u64; COUNT as usize + 1];
    expected[1] = 1;
    for i in 2..=COUNT as usize {
        expected[i] = expected[i - 1] + expected[i - 2];
    }
    // The 32-bit boundary really is inside the run.
    assert!(expected[47] <= u32::MAX as u64);
    assert!(expected[48] > u32::MAX as u64);

    let mut previous = 0u64;
    for i in 1..=COUNT {
        let raw = sys.cores[0].read_block(ARRAY + i * 8, 8).unwrap();
        let value = u64::from_le_bytes(raw.try_into().unwrap());
        assert_eq!(value, expected[i as usize], "fib({i})");
        assert!(value >= previous, "sequence not monotone at {i}");
        previous = value;
    }
    // The sequence opens 1, 1, 2, 3, 5.
    assert_eq!(&expected[1..6], &[1, 1, 2, 3, 5]);
}

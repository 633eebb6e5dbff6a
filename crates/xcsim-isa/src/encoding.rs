//! Instruction encoding and decoding.
//!
//! Instructions are one or two 16-bit halfwords. The top five bits of a
//! halfword select a major opcode; 0b11110 (`PFIX`) is an immediate prefix
//! that extends the following instruction's immediate by 10 bits, and
//! 0b11111 marks a two-halfword long register form whose secondary opcode
//! lives in the second halfword.
//!
//! Register operands of the three-operand forms are packed the
//! architecture's way: the three high parts (each 0..=2) combine into bits
//! [10:6] as `a*9 + b*3 + c` (0..=26), the low parts into bits [5:4], [3:2]
//! and [1:0]. Values 27..=31 of the combined field escape into the
//! two-operand space of the same major.
//!
//! The [`ENCODINGS`] table is the single source of truth; the decoder's
//! lookup tables and the encoder both derive from it, which is what the
//! round-trip property tests lean on.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::opcodes::Opcode;
use crate::operands::{bitp_index, Operands, BITP_VALUES};

/// The two supported instruction set variants. They share the decode table
/// except for a handful of network-configuration long forms that only
/// exist on XS2-A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsaVariant {
    Xs1B,
    Xs2A,
}

pub const PFIX_MAJOR: u16 = 0x1e;
pub const LONG_MAJOR: u16 = 0x1f;

const MAJOR_RU6_BASE: u16 = 0x12;
const MAJOR_U6: u16 = 0x19;
const MAJOR_U10_BASE: u16 = 0x1a;
const MAJOR_MISC: u16 = 0x1d;

/// How an opcode is laid down in the instruction stream.
#[derive(Debug, Clone, Copy)]
enum Enc {
    /// Three registers, combined packing, one per major.
    R3 { major: u16 },
    /// Two registers plus a small immediate, combined packing.
    R2rus { major: u16, bitp: bool },
    /// Two-operand escape slot of a three-operand major. `imm` marks the
    /// second operand as an immediate, `bitp` additionally routes it
    /// through the bit-position table.
    Esc { major: u16, half: u8, imm: bool, bitp: bool },
    /// Register plus 6-bit immediate; `long` variants are PFIX-prefixed.
    Ru6 { major: u16, hi: bool, long: bool },
    /// 6-bit immediate bank.
    U6 { sub: u16, long: bool },
    /// 10-bit immediate pairs.
    U10 { major: u16, hi: bool, long: bool },
    /// One-register bank (major 0x1d, subs 0..=31).
    R1 { sub: u16 },
    /// Zero-register bank (major 0x1d, subs 32..).
    R0 { sub: u16 },
    /// Long form, up to three operands packed in the first halfword;
    /// second halfword = `sub`. `imm`/`bitp` describe the third operand.
    Long3 { sub: u16, imm: bool, bitp: bool },
    /// Long form with a fourth register in the second halfword.
    Long4 { sub: u16 },
    /// Long form with fourth and fifth registers in the second halfword.
    Long5 { sub: u16 },
    /// Long form with three extra registers; the sixth register's top bit
    /// selects between two long majors.
    Long6,
}

const LMAJOR_BANK3: u16 = 0;
const LMAJOR_BANK4: u16 = 1;
const LMAJOR_BANK5: u16 = 2;
const LMAJOR_BANK6: u16 = 3;
const LMAJOR_BANK6_HI: u16 = 4;

/// Long forms that decode only on XS2-A.
const XS2_ONLY: &[Opcode] =
    &[Opcode::GetdL2r, Opcode::TestlclL2r, Opcode::GetnL2r, Opcode::SetnL2r];

#[rustfmt::skip]
static ENCODINGS: &[(Opcode, Enc)] = &[
    // Three-register majors 0x00..=0x09.
    (Opcode::Add3r, Enc::R3 { major: 0x00 }),
    (Opcode::Sub3r, Enc::R3 { major: 0x01 }),
    (Opcode::Eq3r, Enc::R3 { major: 0x02 }),
    (Opcode::Lss3r, Enc::R3 { major: 0x03 }),
    (Opcode::Lsu3r, Enc::R3 { major: 0x04 }),
    (Opcode::And3r, Enc::R3 { major: 0x05 }),
    (Opcode::Or3r, Enc::R3 { major: 0x06 }),
    (Opcode::Shl3r, Enc::R3 { major: 0x07 }),
    (Opcode::Shr3r, Enc::R3 { major: 0x08 }),
    (Opcode::Ldw3r, Enc::R3 { major: 0x09 }),
    // Register-immediate majors 0x0a..=0x11.
    (Opcode::Add2rus, Enc::R2rus { major: 0x0a, bitp: false }),
    (Opcode::Sub2rus, Enc::R2rus { major: 0x0b, bitp: false }),
    (Opcode::Eq2rus, Enc::R2rus { major: 0x0c, bitp: false }),
    (Opcode::Shl2rus, Enc::R2rus { major: 0x0d, bitp: true }),
    (Opcode::Shr2rus, Enc::R2rus { major: 0x0e, bitp: true }),
    (Opcode::Ldw2rus, Enc::R2rus { major: 0x0f, bitp: false }),
    (Opcode::Stw2rus, Enc::R2rus { major: 0x10, bitp: false }),
    (Opcode::Tsetr3r, Enc::R2rus { major: 0x11, bitp: false }),
    // Two-operand escapes.
    (Opcode::Not2r, Enc::Esc { major: 0x00, half: 0, imm: false, bitp: false }),
    (Opcode::Neg2r, Enc::Esc { major: 0x00, half: 1, imm: false, bitp: false }),
    (Opcode::Mkmsk2r, Enc::Esc { major: 0x01, half: 0, imm: false, bitp: false }),
    (Opcode::Getst2r, Enc::Esc { major: 0x01, half: 1, imm: false, bitp: false }),
    (Opcode::Peek2r, Enc::Esc { major: 0x02, half: 0, imm: false, bitp: false }),
    (Opcode::Endin2r, Enc::Esc { major: 0x02, half: 1, imm: false, bitp: false }),
    (Opcode::Testct2r, Enc::Esc { major: 0x03, half: 0, imm: false, bitp: false }),
    (Opcode::Testwct2r, Enc::Esc { major: 0x03, half: 1, imm: false, bitp: false }),
    (Opcode::In2r, Enc::Esc { major: 0x04, half: 0, imm: false, bitp: false }),
    (Opcode::Int2r, Enc::Esc { major: 0x04, half: 1, imm: false, bitp: false }),
    (Opcode::Inct2r, Enc::Esc { major: 0x05, half: 0, imm: false, bitp: false }),
    (Opcode::Getts2r, Enc::Esc { major: 0x05, half: 1, imm: false, bitp: false }),
    (Opcode::Setpsc2r, Enc::Esc { major: 0x06, half: 0, imm: false, bitp: false }),
    (Opcode::Out2r, Enc::Esc { major: 0x06, half: 1, imm: false, bitp: false }),
    (Opcode::Tinitpc2r, Enc::Esc { major: 0x07, half: 0, imm: false, bitp: false }),
    (Opcode::Tinitdp2r, Enc::Esc { major: 0x07, half: 1, imm: false, bitp: false }),
    (Opcode::Tinitsp2r, Enc::Esc { major: 0x08, half: 0, imm: false, bitp: false }),
    (Opcode::Tinitcp2r, Enc::Esc { major: 0x08, half: 1, imm: false, bitp: false }),
    (Opcode::Setd2r, Enc::Esc { major: 0x09, half: 0, imm: false, bitp: false }),
    (Opcode::Outct2r, Enc::Esc { major: 0x09, half: 1, imm: false, bitp: false }),
    (Opcode::Outt2r, Enc::Esc { major: 0x0a, half: 0, imm: false, bitp: false }),
    (Opcode::Chkct2r, Enc::Esc { major: 0x0a, half: 1, imm: false, bitp: false }),
    (Opcode::Eet2r, Enc::Esc { major: 0x0b, half: 0, imm: false, bitp: false }),
    (Opcode::Eef2r, Enc::Esc { major: 0x0b, half: 1, imm: false, bitp: false }),
    (Opcode::Setpt2r, Enc::Esc { major: 0x0c, half: 0, imm: false, bitp: false }),
    (Opcode::Sext2r, Enc::Esc { major: 0x0c, half: 1, imm: false, bitp: false }),
    (Opcode::Zext2r, Enc::Esc { major: 0x0d, half: 0, imm: false, bitp: false }),
    (Opcode::Andnot2r, Enc::Esc { major: 0x0d, half: 1, imm: false, bitp: false }),
    (Opcode::Inshr2r, Enc::Esc { major: 0x0e, half: 0, imm: false, bitp: false }),
    (Opcode::Outshr2r, Enc::Esc { major: 0x0e, half: 1, imm: false, bitp: false }),
    (Opcode::MkmskRus, Enc::Esc { major: 0x0f, half: 0, imm: true, bitp: true }),
    (Opcode::GetrRus, Enc::Esc { major: 0x0f, half: 1, imm: true, bitp: false }),
    (Opcode::OutctRus, Enc::Esc { major: 0x10, half: 0, imm: true, bitp: false }),
    (Opcode::ChkctRus, Enc::Esc { major: 0x10, half: 1, imm: true, bitp: false }),
    (Opcode::SextRus, Enc::Esc { major: 0x11, half: 0, imm: true, bitp: true }),
    (Opcode::ZextRus, Enc::Esc { major: 0x11, half: 1, imm: true, bitp: true }),
    // Register + u6 pairs, short and prefixed.
    (Opcode::LdcRu6, Enc::Ru6 { major: 0x12, hi: false, long: false }),
    (Opcode::LdcLru6, Enc::Ru6 { major: 0x12, hi: false, long: true }),
    (Opcode::LdwspRu6, Enc::Ru6 { major: 0x12, hi: true, long: false }),
    (Opcode::LdwspLru6, Enc::Ru6 { major: 0x12, hi: true, long: true }),
    (Opcode::StwspRu6, Enc::Ru6 { major: 0x13, hi: false, long: false }),
    (Opcode::StwspLru6, Enc::Ru6 { major: 0x13, hi: false, long: true }),
    (Opcode::LdawspRu6, Enc::Ru6 { major: 0x13, hi: true, long: false }),
    (Opcode::LdawspLru6, Enc::Ru6 { major: 0x13, hi: true, long: true }),
    (Opcode::LdwdpRu6, Enc::Ru6 { major: 0x14, hi: false, long: false }),
    (Opcode::LdwdpLru6, Enc::Ru6 { major: 0x14, hi: false, long: true }),
    (Opcode::StwdpRu6, Enc::Ru6 { major: 0x14, hi: true, long: false }),
    (Opcode::StwdpLru6, Enc::Ru6 { major: 0x14, hi: true, long: true }),
    (Opcode::LdawdpRu6, Enc::Ru6 { major: 0x15, hi: false, long: false }),
    (Opcode::LdawdpLru6, Enc::Ru6 { major: 0x15, hi: false, long: true }),
    (Opcode::LdwcpRu6, Enc::Ru6 { major: 0x15, hi: true, long: false }),
    (Opcode::LdwcpLru6, Enc::Ru6 { major: 0x15, hi: true, long: true }),
    (Opcode::SetcRu6, Enc::Ru6 { major: 0x16, hi: false, long: false }),
    (Opcode::SetcLru6, Enc::Ru6 { major: 0x16, hi: false, long: true }),
    (Opcode::BrftRu6, Enc::Ru6 { major: 0x16, hi: true, long: false }),
    (Opcode::BrftLru6, Enc::Ru6 { major: 0x16, hi: true, long: true }),
    (Opcode::BrffRu6, Enc::Ru6 { major: 0x17, hi: false, long: false }),
    (Opcode::BrffLru6, Enc::Ru6 { major: 0x17, hi: false, long: true }),
    (Opcode::BrbtRu6, Enc::Ru6 { major: 0x17, hi: true, long: false }),
    (Opcode::BrbtLru6, Enc::Ru6 { major: 0x17, hi: true, long: true }),
    (Opcode::BrbfRu6, Enc::Ru6 { major: 0x18, hi: false, long: false }),
    (Opcode::BrbfLru6, Enc::Ru6 { major: 0x18, hi: false, long: true }),
    // u6 bank.
    (Opcode::ExtspU6, Enc::U6 { sub: 0, long: false }),
    (Opcode::ExtspLu6, Enc::U6 { sub: 0, long: true }),
    (Opcode::ExtdpU6, Enc::U6 { sub: 1, long: false }),
    (Opcode::ExtdpLu6, Enc::U6 { sub: 1, long: true }),
    (Opcode::EntspU6, Enc::U6 { sub: 2, long: false }),
    (Opcode::EntspLu6, Enc::U6 { sub: 2, long: true }),
    (Opcode::RetspU6, Enc::U6 { sub: 3, long: false }),
    (Opcode::RetspLu6, Enc::U6 { sub: 3, long: true }),
    (Opcode::KrestspU6, Enc::U6 { sub: 4, long: false }),
    (Opcode::KrestspLu6, Enc::U6 { sub: 4, long: true }),
    (Opcode::KentspU6, Enc::U6 { sub: 5, long: false }),
    (Opcode::KentspLu6, Enc::U6 { sub: 5, long: true }),
    (Opcode::BrfuU6, Enc::U6 { sub: 6, long: false }),
    (Opcode::BrfuLu6, Enc::U6 { sub: 6, long: true }),
    (Opcode::BrbuU6, Enc::U6 { sub: 7, long: false }),
    (Opcode::BrbuLu6, Enc::U6 { sub: 7, long: true }),
    (Opcode::LdawcpU6, Enc::U6 { sub: 8, long: false }),
    (Opcode::LdawcpLu6, Enc::U6 { sub: 8, long: true }),
    (Opcode::SetsrU6, Enc::U6 { sub: 9, long: false }),
    (Opcode::SetsrLu6, Enc::U6 { sub: 9, long: true }),
    (Opcode::ClrsrU6, Enc::U6 { sub: 10, long: false }),
    (Opcode::ClrsrLu6, Enc::U6 { sub: 10, long: true }),
    (Opcode::BlatU6, Enc::U6 { sub: 11, long: false }),
    (Opcode::BlatLu6, Enc::U6 { sub: 11, long: true }),
    (Opcode::KcallU6, Enc::U6 { sub: 12, long: false }),
    (Opcode::KcallLu6, Enc::U6 { sub: 12, long: true }),
    (Opcode::GetsrU6, Enc::U6 { sub: 13, long: false }),
    (Opcode::GetsrLu6, Enc::U6 { sub: 13, long: true }),
    // u10 pairs.
    (Opcode::LdapfU10, Enc::U10 { major: 0x1a, hi: false, long: false }),
    (Opcode::LdapfLu10, Enc::U10 { major: 0x1a, hi: false, long: true }),
    (Opcode::LdapbU10, Enc::U10 { major: 0x1a, hi: true, long: false }),
    (Opcode::LdapbLu10, Enc::U10 { major: 0x1a, hi: true, long: true }),
    (Opcode::BlrfU10, Enc::U10 { major: 0x1b, hi: false, long: false }),
    (Opcode::BlrfLu10, Enc::U10 { major: 0x1b, hi: false, long: true }),
    (Opcode::BlrbU10, Enc::U10 { major: 0x1b, hi: true, long: false }),
    (Opcode::BlrbLu10, Enc::U10 { major: 0x1b, hi: true, long: true }),
    (Opcode::LdwcplU10, Enc::U10 { major: 0x1c, hi: false, long: false }),
    (Opcode::LdwcplLu10, Enc::U10 { major: 0x1c, hi: false, long: true }),
    (Opcode::BlacpU10, Enc::U10 { major: 0x1c, hi: true, long: false }),
    (Opcode::BlacpLu10, Enc::U10 { major: 0x1c, hi: true, long: true }),
    // One-register bank.
    (Opcode::Setsp1r, Enc::R1 { sub: 0 }),
    (Opcode::Setdp1r, Enc::R1 { sub: 1 }),
    (Opcode::Setcp1r, Enc::R1 { sub: 2 }),
    (Opcode::Ecallt1r, Enc::R1 { sub: 3 }),
    (Opcode::Ecallf1r, Enc::R1 { sub: 4 }),
    (Opcode::Bau1r, Enc::R1 { sub: 5 }),
    (Opcode::Bla1r, Enc::R1 { sub: 6 }),
    (Opcode::Bru1r, Enc::R1 { sub: 7 }),
    (Opcode::Tstart1r, Enc::R1 { sub: 8 }),
    (Opcode::Dgetreg1r, Enc::R1 { sub: 9 }),
    (Opcode::Kcall1r, Enc::R1 { sub: 10 }),
    (Opcode::Freer1r, Enc::R1 { sub: 11 }),
    (Opcode::Msync1r, Enc::R1 { sub: 12 }),
    (Opcode::Mjoin1r, Enc::R1 { sub: 13 }),
    (Opcode::Setv1r, Enc::R1 { sub: 14 }),
    (Opcode::Setev1r, Enc::R1 { sub: 15 }),
    (Opcode::Edu1r, Enc::R1 { sub: 16 }),
    (Opcode::Eeu1r, Enc::R1 { sub: 17 }),
    (Opcode::Waitet1r, Enc::R1 { sub: 18 }),
    (Opcode::Waitef1r, Enc::R1 { sub: 19 }),
    (Opcode::Syncr1r, Enc::R1 { sub: 20 }),
    (Opcode::Clrpt1r, Enc::R1 { sub: 21 }),
    // Zero-register bank.
    (Opcode::Getid0r, Enc::R0 { sub: 32 }),
    (Opcode::Getet0r, Enc::R0 { sub: 33 }),
    (Opcode::Geted0r, Enc::R0 { sub: 34 }),
    (Opcode::Getkep0r, Enc::R0 { sub: 35 }),
    (Opcode::Getksp0r, Enc::R0 { sub: 36 }),
    (Opcode::Setkep0r, Enc::R0 { sub: 37 }),
    (Opcode::Kret0r, Enc::R0 { sub: 38 }),
    (Opcode::Drestsp0r, Enc::R0 { sub: 39 }),
    (Opcode::Ldspc0r, Enc::R0 { sub: 40 }),
    (Opcode::Ldssr0r, Enc::R0 { sub: 41 }),
    (Opcode::Ldsed0r, Enc::R0 { sub: 42 }),
    (Opcode::Ldet0r, Enc::R0 { sub: 43 }),
    (Opcode::Stspc0r, Enc::R0 { sub: 44 }),
    (Opcode::Stssr0r, Enc::R0 { sub: 45 }),
    (Opcode::Stsed0r, Enc::R0 { sub: 46 }),
    (Opcode::Stet0r, Enc::R0 { sub: 47 }),
    (Opcode::Freet0r, Enc::R0 { sub: 48 }),
    (Opcode::Dcall0r, Enc::R0 { sub: 49 }),
    (Opcode::Dret0r, Enc::R0 { sub: 50 }),
    (Opcode::Dentsp0r, Enc::R0 { sub: 51 }),
    (Opcode::Clre0r, Enc::R0 { sub: 52 }),
    (Opcode::Waiteu0r, Enc::R0 { sub: 53 }),
    (Opcode::Ssync0r, Enc::R0 { sub: 54 }),
    (Opcode::Nop0r, Enc::R0 { sub: 55 }),
    // Long register bank.
    (Opcode::LdawfL3r, Enc::Long3 { sub: 0, imm: false, bitp: false }),
    (Opcode::LdawbL3r, Enc::Long3 { sub: 1, imm: false, bitp: false }),
    (Opcode::Lda16fL3r, Enc::Long3 { sub: 2, imm: false, bitp: false }),
    (Opcode::Lda16bL3r, Enc::Long3 { sub: 3, imm: false, bitp: false }),
    (Opcode::MulL3r, Enc::Long3 { sub: 4, imm: false, bitp: false }),
    (Opcode::DivsL3r, Enc::Long3 { sub: 5, imm: false, bitp: false }),
    (Opcode::DivuL3r, Enc::Long3 { sub: 6, imm: false, bitp: false }),
    (Opcode::RemsL3r, Enc::Long3 { sub: 7, imm: false, bitp: false }),
    (Opcode::RemuL3r, Enc::Long3 { sub: 8, imm: false, bitp: false }),
    (Opcode::XorL3r, Enc::Long3 { sub: 9, imm: false, bitp: false }),
    (Opcode::AshrL3r, Enc::Long3 { sub: 10, imm: false, bitp: false }),
    (Opcode::CrcL3r, Enc::Long3 { sub: 11, imm: false, bitp: false }),
    (Opcode::StwL3r, Enc::Long3 { sub: 12, imm: false, bitp: false }),
    (Opcode::St16L3r, Enc::Long3 { sub: 13, imm: false, bitp: false }),
    (Opcode::St8L3r, Enc::Long3 { sub: 14, imm: false, bitp: false }),
    (Opcode::Ld16sL3r, Enc::Long3 { sub: 15, imm: false, bitp: false }),
    (Opcode::Ld8uL3r, Enc::Long3 { sub: 16, imm: false, bitp: false }),
    (Opcode::TsetmrL2r, Enc::Long3 { sub: 17, imm: false, bitp: false }),
    (Opcode::LdawfL2rus, Enc::Long3 { sub: 18, imm: true, bitp: false }),
    (Opcode::LdawbL2rus, Enc::Long3 { sub: 19, imm: true, bitp: false }),
    (Opcode::AshrL2rus, Enc::Long3 { sub: 20, imm: true, bitp: true }),
    (Opcode::InpwL2rus, Enc::Long3 { sub: 21, imm: true, bitp: false }),
    (Opcode::OutpwL2rus, Enc::Long3 { sub: 22, imm: true, bitp: false }),
    (Opcode::BitrevL2r, Enc::Long3 { sub: 23, imm: false, bitp: false }),
    (Opcode::ByterevL2r, Enc::Long3 { sub: 24, imm: false, bitp: false }),
    (Opcode::ClzL2r, Enc::Long3 { sub: 25, imm: false, bitp: false }),
    (Opcode::GetdL2r, Enc::Long3 { sub: 26, imm: false, bitp: false }),
    (Opcode::TestlclL2r, Enc::Long3 { sub: 27, imm: false, bitp: false }),
    (Opcode::GetnL2r, Enc::Long3 { sub: 28, imm: false, bitp: false }),
    (Opcode::GetpsL2r, Enc::Long3 { sub: 29, imm: false, bitp: false }),
    (Opcode::TinitlrL2r, Enc::Long3 { sub: 30, imm: false, bitp: false }),
    (Opcode::SetnL2r, Enc::Long3 { sub: 31, imm: false, bitp: false }),
    (Opcode::SetpsL2r, Enc::Long3 { sub: 32, imm: false, bitp: false }),
    (Opcode::SetclkL2r, Enc::Long3 { sub: 33, imm: false, bitp: false }),
    (Opcode::SettwL2r, Enc::Long3 { sub: 34, imm: false, bitp: false }),
    (Opcode::SetrdyL2r, Enc::Long3 { sub: 35, imm: false, bitp: false }),
    (Opcode::SetcL2r, Enc::Long3 { sub: 36, imm: false, bitp: false }),
    (Opcode::MaccuL4r, Enc::Long4 { sub: 0 }),
    (Opcode::MaccsL4r, Enc::Long4 { sub: 1 }),
    (Opcode::Crc8L4r, Enc::Long4 { sub: 2 }),
    (Opcode::LaddL5r, Enc::Long5 { sub: 0 }),
    (Opcode::LsubL5r, Enc::Long5 { sub: 1 }),
    (Opcode::LdivuL5r, Enc::Long5 { sub: 2 }),
    (Opcode::LmulL6r, Enc::Long6),
];

/// Result of decoding one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub opcode: Opcode,
    pub operands: Operands,
    /// Length in halfwords (1 or 2).
    pub halfwords: u32,
}

struct Tables {
    r3: [Option<Opcode>; 32],
    r2rus: [Option<(Opcode, bool)>; 32],
    esc: [[Option<(Opcode, bool, bool)>; 2]; 32],
    ru6: [[Option<Opcode>; 2]; 32],
    u6: [Option<Opcode>; 64],
    u10: [[Option<Opcode>; 2]; 32],
    r1: [Option<Opcode>; 32],
    r0: [Option<Opcode>; 96],
    long3: Vec<Option<(Opcode, bool, bool)>>,
    long4: Vec<Option<Opcode>>,
    long5: Vec<Option<Opcode>>,
    long6: Option<Opcode>,
    /// Short immediate-form opcode to its PFIX-extended partner.
    to_long: HashMap<Opcode, Opcode>,
}

impl Tables {
    fn build(variant: IsaVariant) -> Tables {
        let mut t = Tables {
            r3: [None; 32],
            r2rus: [None; 32],
            esc: [[None; 2]; 32],
            ru6: [[None; 2]; 32],
            u6: [None; 64],
            u10: [[None; 2]; 32],
            r1: [None; 32],
            r0: [None; 96],
            long3: vec![None; 64],
            long4: vec![None; 8],
            long5: vec![None; 8],
            long6: None,
            to_long: HashMap::new(),
        };
        let mut short_ru6: HashMap<(u16, bool), Opcode> = HashMap::new();
        let mut short_u6: HashMap<u16, Opcode> = HashMap::new();
        let mut short_u10: HashMap<(u16, bool), Opcode> = HashMap::new();
        for &(op, enc) in ENCODINGS {
            if variant == IsaVariant::Xs1B && XS2_ONLY.contains(&op) {
                continue;
            }
            match enc {
                Enc::R3 { major } => t.r3[major as usize] = Some(op),
                Enc::R2rus { major, bitp } => t.r2rus[major as usize] = Some((op, bitp)),
                Enc::Esc { major, half, imm, bitp } => {
                    t.esc[major as usize][half as usize] = Some((op, imm, bitp));
                }
                Enc::Ru6 { major, hi, long } => {
                    if long {
                        if let Some(&s) = short_ru6.get(&(major, hi)) {
                            t.to_long.insert(s, op);
                        }
                    } else {
                        t.ru6[major as usize][hi as usize] = Some(op);
                        short_ru6.insert((major, hi), op);
                    }
                }
                Enc::U6 { sub, long } => {
                    if long {
                        if let Some(&s) = short_u6.get(&sub) {
                            t.to_long.insert(s, op);
                        }
                    } else {
                        t.u6[sub as usize] = Some(op);
                        short_u6.insert(sub, op);
                    }
                }
                Enc::U10 { major, hi, long } => {
                    if long {
                        if let Some(&s) = short_u10.get(&(major, hi)) {
                            t.to_long.insert(s, op);
                        }
                    } else {
                        t.u10[(major - MAJOR_U10_BASE) as usize][hi as usize] = Some(op);
                        short_u10.insert((major, hi), op);
                    }
                }
                Enc::R1 { sub } => t.r1[sub as usize] = Some(op),
                Enc::R0 { sub } => t.r0[sub as usize] = Some(op),
                Enc::Long3 { sub, imm, bitp } => t.long3[sub as usize] = Some((op, imm, bitp)),
                Enc::Long4 { sub } => t.long4[sub as usize] = Some(op),
                Enc::Long5 { sub } => t.long5[sub as usize] = Some(op),
                Enc::Long6 => t.long6 = Some(op),
            }
        }
        t
    }
}

fn tables(variant: IsaVariant) -> &'static Tables {
    static XS1B: OnceLock<Tables> = OnceLock::new();
    static XS2A: OnceLock<Tables> = OnceLock::new();
    match variant {
        IsaVariant::Xs1B => XS1B.get_or_init(|| Tables::build(IsaVariant::Xs1B)),
        IsaVariant::Xs2A => XS2A.get_or_init(|| Tables::build(IsaVariant::Xs2A)),
    }
}

fn encodings_of(op: Opcode) -> Option<Enc> {
    static INDEX: OnceLock<HashMap<Opcode, Enc>> = OnceLock::new();
    INDEX
        .get_or_init(|| ENCODINGS.iter().map(|&(op, enc)| (op, enc)).collect())
        .get(&op)
        .copied()
}

fn pack3(a: u32, b: u32, c: u32) -> u16 {
    debug_assert!(a < 12 && b < 12 && c < 12);
    let combined = (a >> 2) * 9 + (b >> 2) * 3 + (c >> 2);
    ((combined << 6) | ((a & 3) << 4) | ((b & 3) << 2) | (c & 3)) as u16
}

fn unpack3(field: u16) -> Option<(u32, u32, u32)> {
    let field = field as u32;
    let combined = (field >> 6) & 0x1f;
    if combined > 26 {
        return None;
    }
    let a = (combined / 9) << 2 | ((field >> 4) & 3);
    let b = ((combined % 9) / 3) << 2 | ((field >> 2) & 3);
    let c = (combined % 3) << 2 | (field & 3);
    Some((a, b, c))
}

/// Escape-slot index: `combined - 27` selects a 64-value page.
fn pack_escape(half: u8, a: u32, b: u32) -> u16 {
    let index = half as u32 * 144 + a * 12 + b;
    let page = index / 64;
    let low = index % 64;
    (((27 + page) << 6) | low) as u16
}

fn unpack_escape(field: u16) -> Option<(u8, u32, u32)> {
    let field = field as u32;
    let combined = (field >> 6) & 0x1f;
    debug_assert!(combined >= 27);
    let index = (combined - 27) * 64 + (field & 0x3f);
    if index >= 288 {
        return None;
    }
    let (half, pair) = if index < 144 { (0, index) } else { (1, index - 144) };
    Some((half, pair / 12, pair % 12))
}

fn illegal() -> Decoded {
    Decoded { opcode: Opcode::IllegalInstruction, operands: Operands::new(), halfwords: 1 }
}

fn decode_bitp(index: u32) -> u32 {
    BITP_VALUES[index as usize]
}

/// Decode the instruction at `low` (with `high` the following halfword, if
/// any). Undecodable words yield `ILLEGAL_INSTRUCTION`; a PFIX or long
/// marker with no following halfword does too.
pub fn decode(low: u16, high: Option<u16>, variant: IsaVariant) -> Decoded {
    let major = low >> 11;
    match major {
        PFIX_MAJOR => {
            if low & (1 << 10) != 0 {
                return illegal();
            }
            let Some(high) = high else { return illegal() };
            decode_prefixed(low & 0x3ff, high, variant)
        }
        LONG_MAJOR => {
            let Some(high) = high else { return illegal() };
            decode_long(low & 0x7ff, high, variant)
        }
        _ => decode_short(low, variant),
    }
}

fn decode_short(low: u16, variant: IsaVariant) -> Decoded {
    let t = tables(variant);
    let major = (low >> 11) as usize;
    let field = low & 0x7ff;
    let done = |opcode, operands| Decoded { opcode, operands, halfwords: 1 };
    match major as u16 {
        0x00..=0x11 => {
            if (field >> 6) & 0x1f <= 26 {
                let Some((a, b, c)) = unpack3(field) else { return illegal() };
                if let Some(op) = t.r3[major] {
                    return done(op, Operands::of(&[a, b, c]));
                }
                if let Some((op, bitp)) = t.r2rus[major] {
                    let imm = if bitp { decode_bitp(c) } else { c };
                    return done(op, Operands::of(&[a, b, imm]));
                }
                illegal()
            } else {
                let Some((half, a, b)) = unpack_escape(field) else { return illegal() };
                let Some((op, imm, bitp)) = t.esc[major][half as usize] else {
                    return illegal();
                };
                let b = if imm && bitp { decode_bitp(b) } else { b };
                done(op, Operands::of(&[a, b]))
            }
        }
        MAJOR_RU6_BASE..=0x18 => {
            let hi = (field >> 10) & 1 == 1;
            let reg = ((field >> 6) & 0xf) as u32;
            let imm = (field & 0x3f) as u32;
            if reg >= 12 {
                return illegal();
            }
            match t.ru6[major][hi as usize] {
                Some(op) => done(op, Operands::of(&[reg, imm])),
                None => illegal(),
            }
        }
        MAJOR_U6 => {
            let sub = (field >> 6) as usize;
            let imm = (field & 0x3f) as u32;
            match t.u6[sub] {
                Some(op) => done(op, Operands::of(&[imm])),
                None => illegal(),
            }
        }
        MAJOR_U10_BASE..=0x1c => {
            let hi = (field >> 10) & 1 == 1;
            let imm = (field & 0x3ff) as u32;
            match t.u10[major - MAJOR_U10_BASE as usize][hi as usize] {
                Some(op) => done(op, Operands::of(&[imm])),
                None => illegal(),
            }
        }
        MAJOR_MISC => {
            let sub = ((field >> 4) & 0x7f) as usize;
            let opfield = (field & 0xf) as u32;
            if sub < 32 {
                match t.r1.get(sub).copied().flatten() {
                    Some(op) if opfield < 12 => done(op, Operands::of(&[opfield])),
                    _ => illegal(),
                }
            } else {
                match t.r0.get(sub).copied().flatten() {
                    Some(op) if opfield == 0 => done(op, Operands::new()),
                    _ => illegal(),
                }
            }
        }
        _ => illegal(),
    }
}

fn decode_prefixed(prefix: u16, high: u16, variant: IsaVariant) -> Decoded {
    let t = tables(variant);
    let inner = decode_short(high, variant);
    let Some(&long_op) = t.to_long.get(&inner.opcode) else { return illegal() };
    let mut operands = inner.operands;
    // The prefix extends the immediate operand, which is the last (and for
    // u6/u10 forms the only) decoded slot.
    let enc = encodings_of(long_op);
    let (imm_slot, width) = match enc {
        Some(Enc::Ru6 { .. }) => (1, 6),
        Some(Enc::U6 { .. }) => (0, 6),
        Some(Enc::U10 { .. }) => (0, 10),
        _ => return illegal(),
    };
    operands[imm_slot] |= (prefix as u32) << width;
    Decoded { opcode: long_op, operands, halfwords: 2 }
}

fn decode_long(field1: u16, high: u16, variant: IsaVariant) -> Decoded {
    let t = tables(variant);
    let lmajor = high >> 11;
    let field2 = (high & 0x7ff) as u32;
    let done = |opcode, operands| Decoded { opcode, operands, halfwords: 2 };
    match lmajor {
        LMAJOR_BANK3 => {
            let Some((a, b, c)) = unpack3(field1) else { return illegal() };
            let Some(&entry) = t.long3.get(field2 as usize) else { return illegal() };
            let Some((op, imm, bitp)) = entry else { return illegal() };
            let c = if imm && bitp { decode_bitp(c) } else { c };
            done(op, Operands::of(&[a, b, c]))
        }
        LMAJOR_BANK4 => {
            let Some((a, b, c)) = unpack3(field1) else { return illegal() };
            let op3 = field2 >> 7;
            let sub = (field2 & 0x7f) as usize;
            if op3 >= 12 {
                return illegal();
            }
            match t.long4.get(sub).copied().flatten() {
                Some(op) => done(op, Operands::of(&[a, b, c, op3])),
                None => illegal(),
            }
        }
        LMAJOR_BANK5 => {
            let Some((a, b, c)) = unpack3(field1) else { return illegal() };
            let op3 = field2 >> 7;
            let op4 = (field2 >> 3) & 0xf;
            let sub = (field2 & 0x7) as usize;
            if op3 >= 12 || op4 >= 12 {
                return illegal();
            }
            match t.long5.get(sub).copied().flatten() {
                Some(op) => done(op, Operands::of(&[a, b, c, op3, op4])),
                None => illegal(),
            }
        }
        LMAJOR_BANK6 | LMAJOR_BANK6_HI => {
            let Some((a, b, c)) = unpack3(field1) else { return illegal() };
            let op3 = field2 >> 7;
            let op4 = (field2 >> 3) & 0xf;
            let op5 = (field2 & 0x7) | if lmajor == LMAJOR_BANK6_HI { 8 } else { 0 };
            if op3 >= 12 || op4 >= 12 || op5 >= 12 {
                return illegal();
            }
            match t.long6 {
                Some(op) => done(op, Operands::of(&[a, b, c, op3, op4, op5])),
                None => illegal(),
            }
        }
        _ => illegal(),
    }
}

/// Errors from [`encode`]. Only used by tests and tooling; the simulator
/// itself never encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The opcode has no direct encoding (pseudo or transform-produced).
    NotEncodable(Opcode),
    /// An operand is outside the encodable range for this form.
    OperandRange { slot: usize, value: u32 },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::NotEncodable(op) => write!(f, "opcode {op:?} has no encoding"),
            EncodeError::OperandRange { slot, value } => {
                write!(f, "operand {slot} value {value:#x} out of range")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

fn reg_field(slot: usize, value: u32) -> Result<u32, EncodeError> {
    if value < 12 {
        Ok(value)
    } else {
        Err(EncodeError::OperandRange { slot, value })
    }
}

fn imm_field(slot: usize, value: u32, bitp: bool) -> Result<u32, EncodeError> {
    if bitp {
        bitp_index(value).ok_or(EncodeError::OperandRange { slot, value })
    } else if value < 12 {
        Ok(value)
    } else {
        Err(EncodeError::OperandRange { slot, value })
    }
}

fn check_imm(slot: usize, value: u32, bits: u32) -> Result<u32, EncodeError> {
    if value < (1 << bits) {
        Ok(value)
    } else {
        Err(EncodeError::OperandRange { slot, value })
    }
}

/// Encode an instruction into one or two halfwords. Inverse of [`decode`]
/// on every encodable opcode.
pub fn encode(op: Opcode, operands: &Operands) -> Result<Vec<u16>, EncodeError> {
    let enc = encodings_of(op).ok_or(EncodeError::NotEncodable(op))?;
    let ops = &operands.0;
    match enc {
        Enc::R3 { major } => {
            let a = reg_field(0, ops[0])?;
            let b = reg_field(1, ops[1])?;
            let c = reg_field(2, ops[2])?;
            Ok(vec![major << 11 | pack3(a, b, c)])
        }
        Enc::R2rus { major, bitp } => {
            let a = reg_field(0, ops[0])?;
            let b = reg_field(1, ops[1])?;
            let c = imm_field(2, ops[2], bitp)?;
            Ok(vec![major << 11 | pack3(a, b, c)])
        }
        Enc::Esc { major, half, imm, bitp } => {
            let a = reg_field(0, ops[0])?;
            let b = if imm { imm_field(1, ops[1], bitp)? } else { reg_field(1, ops[1])? };
            Ok(vec![major << 11 | pack_escape(half, a, b)])
        }
        Enc::Ru6 { major, hi, long } => {
            let reg = reg_field(0, ops[0])?;
            let imm = check_imm(1, ops[1], if long { 16 } else { 6 })?;
            let base = major << 11 | (hi as u16) << 10 | (reg as u16) << 6 | (imm & 0x3f) as u16;
            if long {
                Ok(vec![PFIX_MAJOR << 11 | (imm >> 6) as u16, base])
            } else {
                Ok(vec![base])
            }
        }
        Enc::U6 { sub, long } => {
            let imm = check_imm(0, ops[0], if long { 16 } else { 6 })?;
            let base = MAJOR_U6 << 11 | sub << 6 | (imm & 0x3f) as u16;
            if long {
                Ok(vec![PFIX_MAJOR << 11 | (imm >> 6) as u16, base])
            } else {
                Ok(vec![base])
            }
        }
        Enc::U10 { major, hi, long } => {
            let imm = check_imm(0, ops[0], if long { 20 } else { 10 })?;
            let base = major << 11 | (hi as u16) << 10 | (imm & 0x3ff) as u16;
            if long {
                Ok(vec![PFIX_MAJOR << 11 | (imm >> 10) as u16, base])
            } else {
                Ok(vec![base])
            }
        }
        Enc::R1 { sub } => {
            let a = reg_field(0, ops[0])?;
            Ok(vec![MAJOR_MISC << 11 | sub << 4 | a as u16])
        }
        Enc::R0 { sub } => Ok(vec![MAJOR_MISC << 11 | sub << 4]),
        Enc::Long3 { sub, imm, bitp } => {
            let a = reg_field(0, ops[0])?;
            let b = reg_field(1, ops[1])?;
            let c = if imm { imm_field(2, ops[2], bitp)? } else { reg_field(2, ops[2])? };
            Ok(vec![LONG_MAJOR << 11 | pack3(a, b, c), LMAJOR_BANK3 << 11 | sub])
        }
        Enc::Long4 { sub } => {
            let a = reg_field(0, ops[0])?;
            let b = reg_field(1, ops[1])?;
            let c = reg_field(2, ops[2])?;
            let d = reg_field(3, ops[3])?;
            Ok(vec![
                LONG_MAJOR << 11 | pack3(a, b, c),
                LMAJOR_BANK4 << 11 | (d as u16) << 7 | sub,
            ])
        }
        Enc::Long5 { sub } => {
            let a = reg_field(0, ops[0])?;
            let b = reg_field(1, ops[1])?;
            let c = reg_field(2, ops[2])?;
            let d = reg_field(3, ops[3])?;
            let e = reg_field(4, ops[4])?;
            Ok(vec![
                LONG_MAJOR << 11 | pack3(a, b, c),
                LMAJOR_BANK5 << 11 | (d as u16) << 7 | (e as u16) << 3 | sub,
            ])
        }
        Enc::Long6 => {
            let a = reg_field(0, ops[0])?;
            let b = reg_field(1, ops[1])?;
            let c = reg_field(2, ops[2])?;
            let d = reg_field(3, ops[3])?;
            let e = reg_field(4, ops[4])?;
            let f = reg_field(5, ops[5])?;
            let lmajor = if f >= 8 { LMAJOR_BANK6_HI } else { LMAJOR_BANK6 };
            Ok(vec![
                LONG_MAJOR << 11 | pack3(a, b, c),
                lmajor << 11 | (d as u16) << 7 | (e as u16) << 3 | (f & 7) as u16,
            ])
        }
    }
}

/// True when `op` has a direct encoding (pseudo-opcodes and
/// transform-produced variants do not).
pub fn is_encodable(op: Opcode, variant: IsaVariant) -> bool {
    if variant == IsaVariant::Xs1B && XS2_ONLY.contains(&op) {
        return false;
    }
    encodings_of(op).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack3_round_trips() {
        for a in 0..12 {
            for b in 0..12 {
                for c in 0..12 {
                    let field = pack3(a, b, c);
                    assert!(field >> 6 <= 26);
                    assert_eq!(unpack3(field), Some((a, b, c)));
                }
            }
        }
    }

    #[test]
    fn escape_round_trips() {
        for half in 0..2u8 {
            for a in 0..12 {
                for b in 0..12 {
                    let field = pack_escape(half, a, b);
                    assert!((field >> 6) & 0x1f >= 27);
                    assert_eq!(unpack_escape(field), Some((half, a, b)));
                }
            }
        }
    }

    #[test]
    fn short_add_decodes() {
        let hw = encode(Opcode::Add3r, &Operands::of(&[1, 2, 3])).unwrap();
        assert_eq!(hw.len(), 1);
        let d = decode(hw[0], None, IsaVariant::Xs1B);
        assert_eq!(d.opcode, Opcode::Add3r);
        assert_eq!(d.operands, Operands::of(&[1, 2, 3]));
        assert_eq!(d.halfwords, 1);
    }

    #[test]
    fn prefixed_immediates_extend_by_ten_bits() {
        let hw = encode(Opcode::LdcLru6, &Operands::of(&[5, 0x1234])).unwrap();
        assert_eq!(hw.len(), 2);
        assert_eq!(hw[0] >> 11, PFIX_MAJOR);
        let d = decode(hw[0], Some(hw[1]), IsaVariant::Xs1B);
        assert_eq!(d.opcode, Opcode::LdcLru6);
        assert_eq!(d.operands, Operands::of(&[5, 0x1234]));
        assert_eq!(d.halfwords, 2);
    }

    #[test]
    fn bitp_immediates_reach_32() {
        let hw = encode(Opcode::Shl2rus, &Operands::of(&[0, 1, 32])).unwrap();
        let d = decode(hw[0], None, IsaVariant::Xs1B);
        assert_eq!(d.opcode, Opcode::Shl2rus);
        assert_eq!(d.operands[2], 32);
        assert!(encode(Opcode::Shl2rus, &Operands::of(&[0, 1, 9])).is_err());
    }

    #[test]
    fn xs2_only_long_forms_are_reserved_on_xs1b() {
        let hw = encode(Opcode::GetdL2r, &Operands::of(&[0, 1, 0])).unwrap();
        let xs1 = decode(hw[0], Some(hw[1]), IsaVariant::Xs1B);
        assert_eq!(xs1.opcode, Opcode::IllegalInstruction);
        let xs2 = decode(hw[0], Some(hw[1]), IsaVariant::Xs2A);
        assert_eq!(xs2.opcode, Opcode::GetdL2r);
    }

    #[test]
    fn truncated_prefix_is_illegal() {
        let hw = encode(Opcode::LdcLru6, &Operands::of(&[5, 0x1234])).unwrap();
        assert_eq!(decode(hw[0], None, IsaVariant::Xs1B).opcode, Opcode::IllegalInstruction);
    }

    #[test]
    fn six_register_form_round_trips() {
        let ops = Operands::of(&[0, 1, 2, 3, 4, 11]);
        let hw = encode(Opcode::LmulL6r, &ops).unwrap();
        let d = decode(hw[0], Some(hw[1]), IsaVariant::Xs1B);
        assert_eq!(d.opcode, Opcode::LmulL6r);
        assert_eq!(d.operands, ops);
    }
}

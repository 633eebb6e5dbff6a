//! The instruction table. One entry per opcode: encoding size, cycle cost,
//! operand kinds (explicit first, implicit register operands appended),
//! flags and the assembly format string used by the disassembling tracer.
//!
//! Variants ending in `Illegal*` are produced by the operand transform when
//! a pre-resolved branch target falls outside RAM; they never decode
//! directly. Variants such as `AddMov2rus` and `Shl322rus` are transform
//! rewrites of their base encodings. The trailing pseudo-opcodes never
//! appear in instruction memory: they seed decode caches and mark
//! breakpointed or trapping addresses.

use crate::operands::OpKind;
use crate::registers::Register;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InstFlags: u8 {
        /// Checks the time slice before executing; the scheduler may switch
        /// threads instead.
        const SYNC = 1 << 0;
        /// May take a pending event after writeback.
        const CAN_EVENT = 1 << 1;
        /// Decodes but traps as an illegal instruction when executed.
        const UNIMPLEMENTED = 1 << 2;
        /// Handled outside the uniform dispatch path.
        const CUSTOM = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstructionProperties {
    pub name: &'static str,
    /// Encoded size in bytes: 2, 4, or 0 for pseudo-opcodes.
    pub size: u8,
    pub cycles: u8,
    /// Operand kinds, explicit operands first.
    pub operands: &'static [OpKind],
    /// Registers backing the trailing implicit operands.
    pub implicit: &'static [Register],
    pub flags: InstFlags,
    /// Assembly format; `%n` substitutes operand `n`.
    pub format: &'static str,
}

impl InstructionProperties {
    pub fn num_explicit(&self) -> usize {
        self.operands.len() - self.implicit.len()
    }

    /// Register backing operand slot `i`, if it is implicit.
    pub fn implicit_reg(&self, i: usize) -> Option<Register> {
        i.checked_sub(self.num_explicit()).map(|j| self.implicit[j])
    }

    /// Thread pc advance in decode units.
    pub fn pc_step(&self) -> u32 {
        self.size as u32 / 2
    }
}

use OpKind::{Imm, In, InOut, Out};
use Register::*;

const N: InstFlags = InstFlags::empty();
const S: InstFlags = InstFlags::SYNC;
const SE: InstFlags = InstFlags::SYNC.union(InstFlags::CAN_EVENT);
const U: InstFlags = InstFlags::UNIMPLEMENTED;
const C: InstFlags = InstFlags::CUSTOM;

macro_rules! instruction_set {
    ($($variant:ident: ($name:literal, $size:literal, $cycles:literal,
        [$($k:expr),* $(,)?], [$($r:expr),* $(,)?], $flags:expr, $fmt:literal)),* $(,)?) => {
        /// Every opcode in the dispatch table.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum Opcode { $($variant),* }

        pub const OPCODE_COUNT: usize = Opcode::ALL.len();

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant),*];
        }

        static PROPERTIES: &[InstructionProperties] = &[
            $(InstructionProperties {
                name: $name,
                size: $size,
                cycles: $cycles,
                operands: &[$($k),*],
                implicit: &[$($r),*],
                flags: $flags,
                format: $fmt,
            }),*
        ];
    }
}

/// Property record for an opcode.
pub fn properties(op: Opcode) -> &'static InstructionProperties {
    &PROPERTIES[op as usize]
}

instruction_set! {
    // 16-bit three-register forms.
    Add3r: ("add_3r", 2, 4, [Out, In, In], [], N, "add %0, %1, %2"),
    Sub3r: ("sub_3r", 2, 4, [Out, In, In], [], N, "sub %0, %1, %2"),
    Eq3r: ("eq_3r", 2, 4, [Out, In, In], [], N, "eq %0, %1, %2"),
    Lss3r: ("lss_3r", 2, 4, [Out, In, In], [], N, "lss %0, %1, %2"),
    Lsu3r: ("lsu_3r", 2, 4, [Out, In, In], [], N, "lsu %0, %1, %2"),
    And3r: ("and_3r", 2, 4, [Out, In, In], [], N, "and %0, %1, %2"),
    Or3r: ("or_3r", 2, 4, [Out, In, In], [], N, "or %0, %1, %2"),
    Shl3r: ("shl_3r", 2, 4, [Out, In, In], [], N, "shl %0, %1, %2"),
    Shr3r: ("shr_3r", 2, 4, [Out, In, In], [], N, "shr %0, %1, %2"),
    Ldw3r: ("ldw_3r", 2, 4, [Out, In, In], [], N, "ldw %0, %1[%2]"),

    // 16-bit two-register-plus-immediate forms.
    Add2rus: ("add_2rus", 2, 4, [Out, In, Imm], [], N, "add %0, %1, %2"),
    AddMov2rus: ("mov_2rus", 2, 4, [Out, In, Imm], [], N, "mov %0, %1"),
    Sub2rus: ("sub_2rus", 2, 4, [Out, In, Imm], [], N, "sub %0, %1, %2"),
    Eq2rus: ("eq_2rus", 2, 4, [Out, In, Imm], [], N, "eq %0, %1, %2"),
    Shl2rus: ("shl_2rus", 2, 4, [Out, In, Imm], [], N, "shl %0, %1, %2"),
    Shl322rus: ("shl32_2rus", 2, 4, [Out, In, Imm], [], N, "shl %0, %1, 32"),
    Shr2rus: ("shr_2rus", 2, 4, [Out, In, Imm], [], N, "shr %0, %1, %2"),
    Shr322rus: ("shr32_2rus", 2, 4, [Out, In, Imm], [], N, "shr %0, %1, 32"),
    Ldw2rus: ("ldw_2rus", 2, 4, [Out, In, Imm], [], N, "ldw %0, %1[%2]"),
    Stw2rus: ("stw_2rus", 2, 4, [In, In, Imm], [], N, "stw %0, %1[%2]"),
    Tsetr3r: ("set_t_3r", 2, 4, [Imm, In, In], [], N, "set t[%2]:r%0, %1"),

    // 16-bit register-plus-u6 forms and their prefixed variants.
    LdcRu6: ("ldc_ru6", 2, 4, [Out, Imm], [], N, "ldc %0, %1"),
    LdcLru6: ("ldc_lru6", 4, 4, [Out, Imm], [], N, "ldc %0, %1"),
    LdwspRu6: ("ldwsp_ru6", 2, 4, [Out, Imm, In], [Sp], N, "ldw %0, sp[%1]"),
    LdwspLru6: ("ldwsp_lru6", 4, 4, [Out, Imm, In], [Sp], N, "ldw %0, sp[%1]"),
    StwspRu6: ("stwsp_ru6", 2, 4, [In, Imm, In], [Sp], N, "stw %0, sp[%1]"),
    StwspLru6: ("stwsp_lru6", 4, 4, [In, Imm, In], [Sp], N, "stw %0, sp[%1]"),
    LdawspRu6: ("ldawsp_ru6", 2, 4, [Out, Imm, In], [Sp], N, "ldaw %0, sp[%1]"),
    LdawspLru6: ("ldawsp_lru6", 4, 4, [Out, Imm, In], [Sp], N, "ldaw %0, sp[%1]"),
    LdwdpRu6: ("ldwdp_ru6", 2, 4, [Out, Imm, In], [Dp], N, "ldw %0, dp[%1]"),
    LdwdpLru6: ("ldwdp_lru6", 4, 4, [Out, Imm, In], [Dp], N, "ldw %0, dp[%1]"),
    StwdpRu6: ("stwdp_ru6", 2, 4, [In, Imm, In], [Dp], N, "stw %0, dp[%1]"),
    StwdpLru6: ("stwdp_lru6", 4, 4, [In, Imm, In], [Dp], N, "stw %0, dp[%1]"),
    LdawdpRu6: ("ldawdp_ru6", 2, 4, [Out, Imm, In], [Dp], N, "ldaw %0, dp[%1]"),
    LdawdpLru6: ("ldawdp_lru6", 4, 4, [Out, Imm, In], [Dp], N, "ldaw %0, dp[%1]"),
    LdwcpRu6: ("ldwcp_ru6", 2, 4, [Out, Imm, In], [Cp], N, "ldw %0, cp[%1]"),
    LdwcpLru6: ("ldwcp_lru6", 4, 4, [Out, Imm, In], [Cp], N, "ldw %0, cp[%1]"),
    SetcRu6: ("setc_ru6", 2, 4, [In, Imm], [], SE, "setc res[%0], %1"),
    SetcLru6: ("setc_lru6", 4, 4, [In, Imm], [], SE, "setc res[%0], %1"),
    BrftRu6: ("bt_ru6", 2, 4, [In, Imm], [], N, "bt %0, %1"),
    BrftLru6: ("bt_lru6", 4, 4, [In, Imm], [], N, "bt %0, %1"),
    BrftIllegalRu6: ("bt_ru6", 2, 4, [In, Imm], [], N, "bt %0, %1"),
    BrftIllegalLru6: ("bt_lru6", 4, 4, [In, Imm], [], N, "bt %0, %1"),
    BrbtRu6: ("bt_ru6", 2, 4, [In, Imm], [], N, "bt %0, -%1"),
    BrbtLru6: ("bt_lru6", 4, 4, [In, Imm], [], N, "bt %0, -%1"),
    BrbtIllegalRu6: ("bt_ru6", 2, 4, [In, Imm], [], N, "bt %0, -%1"),
    BrbtIllegalLru6: ("bt_lru6", 4, 4, [In, Imm], [], N, "bt %0, -%1"),
    BrffRu6: ("bf_ru6", 2, 4, [In, Imm], [], N, "bf %0, %1"),
    BrffLru6: ("bf_lru6", 4, 4, [In, Imm], [], N, "bf %0, %1"),
    BrffIllegalRu6: ("bf_ru6", 2, 4, [In, Imm], [], N, "bf %0, %1"),
    BrffIllegalLru6: ("bf_lru6", 4, 4, [In, Imm], [], N, "bf %0, %1"),
    BrbfRu6: ("bf_ru6", 2, 4, [In, Imm], [], N, "bf %0, -%1"),
    BrbfLru6: ("bf_lru6", 4, 4, [In, Imm], [], N, "bf %0, -%1"),
    BrbfIllegalRu6: ("bf_ru6", 2, 4, [In, Imm], [], N, "bf %0, -%1"),
    BrbfIllegalLru6: ("bf_lru6", 4, 4, [In, Imm], [], N, "bf %0, -%1"),

    // u6 immediate forms.
    ExtspU6: ("extsp_u6", 2, 4, [Imm, InOut], [Sp], N, "extsp %0"),
    ExtspLu6: ("extsp_lu6", 4, 4, [Imm, InOut], [Sp], N, "extsp %0"),
    ExtdpU6: ("extdp_u6", 2, 4, [Imm, InOut], [Dp], N, "extdp %0"),
    ExtdpLu6: ("extdp_lu6", 4, 4, [Imm, InOut], [Dp], N, "extdp %0"),
    EntspU6: ("entsp_u6", 2, 4, [Imm, InOut, In], [Sp, Lr], N, "entsp %0"),
    EntspLu6: ("entsp_lu6", 4, 4, [Imm, InOut, In], [Sp, Lr], N, "entsp %0"),
    RetspU6: ("retsp_u6", 2, 8, [Imm, InOut, InOut], [Sp, Lr], N, "retsp %0"),
    RetspLu6: ("retsp_lu6", 4, 8, [Imm, InOut, InOut], [Sp, Lr], N, "retsp %0"),
    KrestspU6: ("krestsp_u6", 2, 4, [Imm, InOut, Out], [Sp, Ksp], N, "krestsp %0"),
    KrestspLu6: ("krestsp_lu6", 4, 4, [Imm, InOut, Out], [Sp, Ksp], N, "krestsp %0"),
    KentspU6: ("kentsp_u6", 2, 4, [Imm, InOut, In], [Sp, Ksp], N, "kentsp %0"),
    KentspLu6: ("kentsp_lu6", 4, 4, [Imm, InOut, In], [Sp, Ksp], N, "kentsp %0"),
    BrfuU6: ("bu_u6", 2, 4, [Imm], [], N, "bu %0"),
    BrfuLu6: ("bu_lu6", 4, 4, [Imm], [], N, "bu %0"),
    BrfuIllegalU6: ("bu_u6", 2, 4, [Imm], [], N, "bu %0"),
    BrfuIllegalLu6: ("bu_lu6", 4, 4, [Imm], [], N, "bu %0"),
    BrbuU6: ("bu_u6", 2, 4, [Imm], [], N, "bu -%0"),
    BrbuLu6: ("bu_lu6", 4, 4, [Imm], [], N, "bu -%0"),
    BrbuIllegalU6: ("bu_u6", 2, 4, [Imm], [], N, "bu -%0"),
    BrbuIllegalLu6: ("bu_lu6", 4, 4, [Imm], [], N, "bu -%0"),
    LdawcpU6: ("ldawcp_u6", 2, 4, [Imm, Out, In], [R11, Cp], N, "ldaw r11, cp[%0]"),
    LdawcpLu6: ("ldawcp_lu6", 4, 4, [Imm, Out, In], [R11, Cp], N, "ldaw r11, cp[%0]"),
    SetsrU6: ("setsr_u6", 2, 4, [Imm, InOut], [Sr], S, "setsr %0"),
    SetsrLu6: ("setsr_lu6", 4, 4, [Imm, InOut], [Sr], S, "setsr %0"),
    ClrsrU6: ("clrsr_u6", 2, 4, [Imm, InOut], [Sr], S, "clrsr %0"),
    ClrsrLu6: ("clrsr_lu6", 4, 4, [Imm, InOut], [Sr], S, "clrsr %0"),
    BlatU6: ("blat_u6", 2, 4, [Imm, In], [R11], U, "blat %0"),
    BlatLu6: ("blat_lu6", 4, 4, [Imm, In], [R11], U, "blat %0"),
    KcallU6: ("kcall_u6", 2, 4, [Imm], [], U, "kcall %0"),
    KcallLu6: ("kcall_lu6", 4, 4, [Imm], [], U, "kcall %0"),
    GetsrU6: ("getsr_u6", 2, 4, [Imm, Out, In], [R11, Sr], N, "getsr r11, %0"),
    GetsrLu6: ("getsr_lu6", 4, 4, [Imm, Out, In], [R11, Sr], N, "getsr r11, %0"),

    // u10 immediate forms.
    LdapfU10: ("ldapf_u10", 2, 4, [Imm, Out], [R11], N, "ldap r11, %0"),
    LdapfLu10: ("ldapf_lu10", 4, 4, [Imm, Out], [R11], N, "ldap r11, %0"),
    LdapbU10: ("ldapb_u10", 2, 4, [Imm, Out], [R11], N, "ldap r11, -%0"),
    LdapbLu10: ("ldapb_lu10", 4, 4, [Imm, Out], [R11], N, "ldap r11, -%0"),
    BlrfU10: ("bl_u10", 2, 4, [Imm, Out], [Lr], N, "bl %0"),
    BlrfLu10: ("bl_lu10", 4, 4, [Imm, Out], [Lr], N, "bl %0"),
    BlrfIllegalU10: ("bl_u10", 2, 4, [Imm, Out], [Lr], N, "bl %0"),
    BlrfIllegalLu10: ("bl_lu10", 4, 4, [Imm, Out], [Lr], N, "bl %0"),
    BlrbU10: ("bl_u10", 2, 4, [Imm, Out], [Lr], N, "bl -%0"),
    BlrbLu10: ("bl_lu10", 4, 4, [Imm, Out], [Lr], N, "bl -%0"),
    BlrbIllegalU10: ("bl_u10", 2, 4, [Imm, Out], [Lr], N, "bl -%0"),
    BlrbIllegalLu10: ("bl_lu10", 4, 4, [Imm, Out], [Lr], N, "bl -%0"),
    LdwcplU10: ("ldwcpl_u10", 2, 4, [Imm, Out, In], [R11, Cp], N, "ldw r11, cp[%0]"),
    LdwcplLu10: ("ldwcpl_lu10", 4, 4, [Imm, Out, In], [R11, Cp], N, "ldw r11, cp[%0]"),
    BlacpU10: ("blacp_u10", 2, 4, [Imm, Out, In], [Lr, Cp], N, "bla cp[%0]"),
    BlacpLu10: ("blacp_lu10", 4, 4, [Imm, Out, In], [Lr, Cp], N, "bla cp[%0]"),

    // Two-register short forms.
    Not2r: ("not_2r", 2, 4, [Out, In], [], N, "not %0, %1"),
    Neg2r: ("neg_2r", 2, 4, [Out, In], [], N, "neg %0, %1"),
    Mkmsk2r: ("mkmsk_2r", 2, 4, [Out, In], [], N, "mkmsk %0, %1"),
    Getst2r: ("getst_2r", 2, 4, [Out, In], [], N, "getst %0, res[%1]"),
    Peek2r: ("peek_2r", 2, 4, [Out, In], [], U, "peek %0, res[%1]"),
    Endin2r: ("endin_2r", 2, 4, [Out, In], [], U, "endin %0, res[%1]"),
    Testct2r: ("testct_2r", 2, 4, [Out, In], [], N, "testct %0, res[%1]"),
    Testwct2r: ("testwct_2r", 2, 4, [Out, In], [], N, "testwct %0, res[%1]"),
    In2r: ("in_2r", 2, 4, [Out, In], [], S, "in %0, res[%1]"),
    Int2r: ("int_2r", 2, 4, [Out, In], [], N, "int %0, res[%1]"),
    Inct2r: ("inct_2r", 2, 4, [Out, In], [], N, "inct %0, res[%1]"),
    Getts2r: ("getts_2r", 2, 4, [Out, In], [], S, "getts %0, res[%1]"),
    Setpsc2r: ("setpsc_2r", 2, 4, [In, In], [], U, "setpsc res[%0], %1"),
    Out2r: ("out_2r", 2, 4, [In, In], [], SE, "out %0, res[%1]"),
    Tinitpc2r: ("tinitpc_2r", 2, 4, [In, In], [], N, "init t[%1]:pc, %0"),
    Tinitdp2r: ("tinitdp_2r", 2, 4, [In, In], [], N, "init t[%1]:dp, %0"),
    Tinitsp2r: ("tinitsp_2r", 2, 4, [In, In], [], N, "init t[%1]:sp, %0"),
    Tinitcp2r: ("tinitcp_2r", 2, 4, [In, In], [], N, "init t[%1]:cp, %0"),
    Setd2r: ("setd_2r", 2, 4, [In, In], [], S, "setd res[%1], %0"),
    Outct2r: ("outct_2r", 2, 4, [In, In], [], SE, "outct res[%0], %1"),
    Outt2r: ("outt_2r", 2, 4, [In, In], [], SE, "outt res[%1], %0"),
    Chkct2r: ("chkct_2r", 2, 4, [In, In], [], N, "chkct res[%0], %1"),
    Eet2r: ("eet_2r", 2, 4, [In, In], [], SE, "eet res[%1], %0"),
    Eef2r: ("eef_2r", 2, 4, [In, In], [], SE, "eef res[%1], %0"),
    Setpt2r: ("setpt_2r", 2, 4, [In, In], [], S, "setpt res[%1], %0"),
    Sext2r: ("sext_2r", 2, 4, [InOut, In], [], N, "sext %0, %1"),
    Zext2r: ("zext_2r", 2, 4, [InOut, In], [], N, "zext %0, %1"),
    Andnot2r: ("andnot_2r", 2, 4, [InOut, In], [], N, "andnot %0, %1"),
    Inshr2r: ("inshr_2r", 2, 4, [InOut, In], [], S, "inshr %0, res[%1]"),
    Outshr2r: ("outshr_2r", 2, 4, [InOut, In], [], S, "outshr res[%1], %0"),

    // Register-plus-small-immediate short forms.
    MkmskRus: ("mkmsk_rus", 2, 4, [Out, Imm], [], N, "mkmsk %0, %1"),
    GetrRus: ("getr_rus", 2, 4, [Out, Imm], [], N, "getr %0, %1"),
    OutctRus: ("outct_rus", 2, 4, [In, Imm], [], SE, "outct res[%0], %1"),
    ChkctRus: ("chkct_rus", 2, 4, [In, Imm], [], N, "chkct res[%0], %1"),
    SextRus: ("sext_rus", 2, 4, [InOut, Imm], [], N, "sext %0, %1"),
    ZextRus: ("zext_rus", 2, 4, [InOut, Imm], [], N, "zext %0, %1"),

    // One-register short forms.
    Setsp1r: ("setsp_1r", 2, 4, [In, Out], [Sp], N, "set sp, %0"),
    Setdp1r: ("setdp_1r", 2, 4, [In, Out], [Dp], N, "set dp, %0"),
    Setcp1r: ("setcp_1r", 2, 4, [In, Out], [Cp], N, "set cp, %0"),
    Ecallt1r: ("ecallt_1r", 2, 4, [In], [], N, "ecallt %0"),
    Ecallf1r: ("ecallf_1r", 2, 4, [In], [], N, "ecallf %0"),
    Bau1r: ("bau_1r", 2, 4, [In], [], N, "bau %0"),
    Bla1r: ("bla_1r", 2, 4, [In, Out], [Lr], N, "bla %0"),
    Bru1r: ("bru_1r", 2, 4, [In], [], N, "bru %0"),
    Tstart1r: ("tstart_1r", 2, 4, [In], [], N, "start t[%0]"),
    Dgetreg1r: ("dgetreg_1r", 2, 4, [Out], [], U, "dgetreg %0"),
    Kcall1r: ("kcall_1r", 2, 4, [In], [], U, "kcall %0"),
    Freer1r: ("freer_1r", 2, 4, [In], [], N, "freer res[%0]"),
    Msync1r: ("msync_1r", 2, 4, [In], [], N, "msync res[%0]"),
    Mjoin1r: ("mjoin_1r", 2, 4, [In], [], N, "mjoin res[%0]"),
    Setv1r: ("setv_1r", 2, 4, [In, In], [R11], S, "setv res[%0], r11"),
    Setev1r: ("setev_1r", 2, 4, [In, In], [R11], S, "setev res[%0], r11"),
    Edu1r: ("edu_1r", 2, 4, [In], [], S, "edu res[%0]"),
    Eeu1r: ("eeu_1r", 2, 4, [In], [], SE, "eeu res[%0]"),
    Waitet1r: ("waitet_1r", 2, 4, [In], [], SE, "waitet %0"),
    Waitef1r: ("waitef_1r", 2, 4, [In], [], SE, "waitef %0"),
    Syncr1r: ("syncr_1r", 2, 4, [In], [], S, "syncr res[%0]"),
    Clrpt1r: ("clrpt_1r", 2, 4, [In], [], S, "clrpt res[%0]"),

    // Zero-register short forms.
    Getid0r: ("getid_0r", 2, 4, [Out], [R11], N, "get r11, id"),
    Getet0r: ("getet_0r", 2, 4, [Out, In], [R11, Et], N, "get r11, et"),
    Geted0r: ("geted_0r", 2, 4, [Out, In], [R11, Ed], N, "get r11, ed"),
    Getkep0r: ("getkep_0r", 2, 4, [Out, In], [R11, Kep], N, "get r11, kep"),
    Getksp0r: ("getksp_0r", 2, 4, [Out, In], [R11, Ksp], N, "get r11, ksp"),
    Setkep0r: ("setkep_0r", 2, 4, [Out, In], [Kep, R11], N, "set kep, r11"),
    Kret0r: ("kret_0r", 2, 4, [In, In, In, Out, Out], [Spc, Sed, Ssr, Ed, Sr], S, "kret"),
    Drestsp0r: ("drestsp_0r", 2, 4, [], [], U, "drestsp"),
    Ldspc0r: ("ldspc_0r", 2, 4, [Out, In], [Spc, Sp], N, "ldw spc, sp[1]"),
    Ldssr0r: ("ldssr_0r", 2, 4, [Out, In], [Ssr, Sp], N, "ldw ssr, sp[2]"),
    Ldsed0r: ("ldsed_0r", 2, 4, [Out, In], [Sed, Sp], N, "ldw sed, sp[3]"),
    Ldet0r: ("ldet_0r", 2, 4, [Out, In], [Et, Sp], N, "ldw et, sp[4]"),
    Stspc0r: ("stspc_0r", 2, 4, [In, In], [Spc, Sp], N, "stw spc, sp[1]"),
    Stssr0r: ("stssr_0r", 2, 4, [In, In], [Ssr, Sp], N, "stw ssr, sp[2]"),
    Stsed0r: ("stsed_0r", 2, 4, [In, In], [Sed, Sp], N, "stw sed, sp[3]"),
    Stet0r: ("stet_0r", 2, 4, [In, In], [Et, Sp], N, "stw et, sp[4]"),
    Freet0r: ("freet_0r", 2, 4, [], [], C, "freet"),
    Dcall0r: ("dcall_0r", 2, 4, [], [], U, "dcall"),
    Dret0r: ("dret_0r", 2, 4, [], [], U, "dret"),
    Dentsp0r: ("dentsp_0r", 2, 4, [], [], U, "dentsp"),
    Clre0r: ("clre_0r", 2, 4, [], [], S, "clre"),
    Waiteu0r: ("waiteu_0r", 2, 4, [], [], SE, "waiteu"),
    Ssync0r: ("ssync_0r", 2, 4, [], [], C, "ssync"),
    Nop0r: ("nop_0r", 2, 4, [], [], N, "nop"),

    // Long three-register forms.
    LdawfL3r: ("ldawf_l3r", 4, 4, [Out, In, In], [], N, "ldaw %0, %1[%2]"),
    LdawbL3r: ("ldawb_l3r", 4, 4, [Out, In, In], [], N, "ldaw %0, %1[-%2]"),
    Lda16fL3r: ("lda16f_l3r", 4, 4, [Out, In, In], [], N, "lda16 %0, %1[%2]"),
    Lda16bL3r: ("lda16b_l3r", 4, 4, [Out, In, In], [], N, "lda16 %0, %1[-%2]"),
    MulL3r: ("mul_l3r", 4, 4, [Out, In, In], [], N, "mul %0, %1, %2"),
    DivsL3r: ("divs_l3r", 4, 32, [Out, In, In], [], N, "divs %0, %1, %2"),
    DivuL3r: ("divu_l3r", 4, 32, [Out, In, In], [], N, "divu %0, %1, %2"),
    RemsL3r: ("rems_l3r", 4, 32, [Out, In, In], [], N, "rems %0, %1, %2"),
    RemuL3r: ("remu_l3r", 4, 32, [Out, In, In], [], N, "remu %0, %1, %2"),
    XorL3r: ("xor_l3r", 4, 4, [Out, In, In], [], N, "xor %0, %1, %2"),
    AshrL3r: ("ashr_l3r", 4, 4, [Out, In, In], [], N, "ashr %0, %1, %2"),
    CrcL3r: ("crc32_l3r", 4, 4, [InOut, In, In], [], N, "crc32 %0, %1, %2"),
    StwL3r: ("stw_l3r", 4, 4, [In, In, In], [], N, "stw %0, %1[%2]"),
    St16L3r: ("st16_l3r", 4, 4, [In, In, In], [], N, "st16 %0, %1[%2]"),
    St8L3r: ("st8_l3r", 4, 4, [In, In, In], [], N, "st8 %0, %1[%2]"),
    Ld16sL3r: ("ld16s_l3r", 4, 4, [Out, In, In], [], N, "ld16s %0, %1[%2]"),
    Ld8uL3r: ("ld8u_l3r", 4, 4, [Out, In, In], [], N, "ld8u %0, %1[%2]"),
    TsetmrL2r: ("tsetmr_l2r", 4, 4, [Imm, In], [], N, "tsetmr r%0, %1"),

    // Long register-plus-immediate forms.
    LdawfL2rus: ("ldawf_l2rus", 4, 4, [Out, In, Imm], [], N, "ldaw %0, %1[%2]"),
    LdawbL2rus: ("ldawb_l2rus", 4, 4, [Out, In, Imm], [], N, "ldaw %0, %1[-%2]"),
    AshrL2rus: ("ashr_l2rus", 4, 4, [Out, In, Imm], [], N, "ashr %0, %1, %2"),
    Ashr32L2rus: ("ashr32_l2rus", 4, 4, [Out, In, Imm], [], N, "ashr %0, %1, 32"),
    InpwL2rus: ("inpw_l2rus", 4, 4, [Out, In, Imm], [], U, "inpw %0, res[%1], %2"),
    OutpwL2rus: ("outpw_l2rus", 4, 4, [In, In, Imm], [], U, "outpw res[%1], %0, %2"),

    // Long two-register forms.
    BitrevL2r: ("bitrev_l2r", 4, 4, [Out, In], [], N, "bitrev %0, %1"),
    ByterevL2r: ("byterev_l2r", 4, 4, [Out, In], [], N, "byterev %0, %1"),
    ClzL2r: ("clz_l2r", 4, 4, [Out, In], [], N, "clz %0, %1"),
    GetdL2r: ("getd_l2r", 4, 4, [Out, In], [], U, "getd %0, res[%1]"),
    TestlclL2r: ("testlcl_l2r", 4, 4, [Out, In], [], U, "testlcl %0, res[%1]"),
    GetnL2r: ("getn_l2r", 4, 4, [Out, In], [], U, "getn %0, res[%1]"),
    GetpsL2r: ("getps_l2r", 4, 4, [Out, In], [], N, "get %0, ps[%1]"),
    TinitlrL2r: ("tinitlr_l2r", 4, 4, [In, In], [], N, "init t[%1]:lr, %0"),
    SetnL2r: ("setn_l2r", 4, 4, [In, In], [], U, "setn res[%1], %0"),
    SetpsL2r: ("setps_l2r", 4, 4, [In, In], [], N, "set %0, ps[%1]"),
    SetclkL2r: ("setclk_l2r", 4, 4, [In, In], [], S, "setclk res[%1], %0"),
    SettwL2r: ("settw_l2r", 4, 4, [In, In], [], S, "settw res[%1], %0"),
    SetrdyL2r: ("setrdy_l2r", 4, 4, [In, In], [], S, "setrdy res[%1], %0"),
    SetcL2r: ("setc_l2r", 4, 4, [In, In], [], SE, "setc res[%0], %1"),

    // Long four/five/six-register forms.
    MaccuL4r: ("maccu_l4r", 4, 4, [InOut, In, In, InOut], [], N, "maccu %0, %3, %1, %2"),
    MaccsL4r: ("maccs_l4r", 4, 4, [InOut, In, In, InOut], [], N, "maccs %0, %3, %1, %2"),
    Crc8L4r: ("crc8_l4r", 4, 4, [Out, In, In, InOut], [], N, "crc8 %3, %0, %1, %2"),
    LaddL5r: ("ladd_l5r", 4, 4, [Out, In, In, Out, In], [], N, "ladd %3, %0, %1, %2, %4"),
    LsubL5r: ("lsub_l5r", 4, 4, [Out, In, In, Out, In], [], N, "lsub %3, %0, %1, %2, %4"),
    LdivuL5r: ("ldivu_l5r", 4, 32, [Out, In, In, Out, In], [], N, "ldivu %0, %3, %4, %1, %2"),
    LmulL6r: ("lmul_l6r", 4, 4, [Out, In, In, Out, In, In], [], N, "lmul %0, %3, %1, %2, %4, %5"),

    // Pseudo-opcodes: decode-cache seed, trap markers and breakpoints.
    Decode: ("decode", 0, 0, [], [], C, ""),
    IllegalPc: ("illegal_pc", 0, 0, [], [], C, ""),
    IllegalPcThread: ("illegal_pc_thread", 0, 0, [], [], C, ""),
    IllegalInstruction: ("illegal_instruction", 0, 0, [], [], C, ""),
    NoThreads: ("no_threads", 0, 0, [], [], C, ""),
    Syscall: ("syscall", 0, 0, [], [], C, ""),
    Exception: ("exception", 0, 0, [], [], C, ""),
    Breakpoint: ("breakpoint", 0, 0, [], [], C, ""),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_align_with_opcodes() {
        assert_eq!(PROPERTIES.len(), OPCODE_COUNT);
        assert_eq!(properties(Opcode::Add3r).name, "add_3r");
        assert_eq!(properties(Opcode::Breakpoint).name, "breakpoint");
    }

    #[test]
    fn implicit_operands_trail_explicit() {
        for &op in Opcode::ALL {
            let props = properties(op);
            assert!(
                props.implicit.len() <= props.operands.len(),
                "{}: more implicit registers than operand slots",
                props.name
            );
            // Implicit operands are never immediates.
            for i in props.num_explicit()..props.operands.len() {
                assert_ne!(props.operands[i], OpKind::Imm, "{}", props.name);
            }
        }
    }

    #[test]
    fn cycle_costs() {
        assert_eq!(properties(Opcode::Add3r).cycles, 4);
        assert_eq!(properties(Opcode::DivsL3r).cycles, 32);
        assert_eq!(properties(Opcode::LdivuL5r).cycles, 32);
        assert_eq!(properties(Opcode::RetspU6).cycles, 8);
    }
}

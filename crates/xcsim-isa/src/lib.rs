//! Instruction set definition for the XS1/XS2 architecture: the opcode
//! enumeration, per-opcode property records, the 16/32-bit decoder and its
//! inverse (used by tests and the tracer), and the post-decode operand
//! transform.
//!
//! The original toolchain generated its dispatch table at build time from a
//! declarative description; here that description is reified as data (see
//! [`properties`]) and the interpreter dispatches with an ordinary `match`.

pub mod encoding;
pub mod opcodes;
pub mod operands;
pub mod registers;
pub mod transform;

pub use encoding::{decode, encode, is_encodable, Decoded, EncodeError, IsaVariant};
pub use opcodes::{properties, InstFlags, InstructionProperties, Opcode, OPCODE_COUNT};
pub use operands::{OpKind, Operands, BITP_VALUES};
pub use registers::{Register, REGISTER_FILE_SIZE};
pub use transform::transform;

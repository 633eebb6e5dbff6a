//! Primitive value types shared across the simulator: simulated time,
//! channel tokens, the chanend ring buffer, bit manipulation helpers and
//! the pin-value signal model.

pub mod bits;
pub mod ring_buffer;
pub mod signal;
pub mod ticks;
pub mod token;

pub use ring_buffer::RingBuffer;
pub use signal::{Edge, EdgeKind, Signal};
pub use ticks::{Ticks, CYCLES_PER_TICK};
pub use token::{ControlToken, Token};

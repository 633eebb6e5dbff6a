//! Value change dump output for port pins (IEEE 1364, 100 ps timescale).

use std::collections::HashMap;
use std::io::Write;

use xcsim_support::{Ticks, CYCLES_PER_TICK};

use crate::system::SystemState;

struct Wire {
    identifier: String,
    width: u32,
}

pub struct WaveformTracer {
    out: Box<dyn Write + Send>,
    wires: HashMap<(usize, usize), Wire>,
    order: Vec<(usize, usize)>,
    finalized: bool,
    current_time: u64,
}

/// Compact identifiers from the printable range, base `'!'..='~'`.
fn make_identifier(mut index: usize) -> String {
    let offset = b'!';
    let base = (b'~' - b'!' + 1) as usize;
    let mut id = String::new();
    if index == 0 {
        id.push(offset as char);
        return id;
    }
    while index > 0 {
        id.push((offset + (index % base) as u8) as char);
        index /= base;
    }
    id
}

impl WaveformTracer {
    pub fn new(out: Box<dyn Write + Send>) -> WaveformTracer {
        WaveformTracer {
            out,
            wires: HashMap::new(),
            order: Vec::new(),
            finalized: false,
            current_time: 0,
        }
    }

    /// Register a port before `finalize`.
    pub fn add_port(&mut self, core: usize, port: usize, width: u32) {
        debug_assert!(!self.finalized);
        let identifier = make_identifier(self.wires.len());
        self.wires.insert((core, port), Wire { identifier, width });
        self.order.push((core, port));
    }

    /// Emit the declaration section and the initial zero dump.
    pub fn finalize(&mut self, port_name: impl Fn(usize, usize) -> String) {
        debug_assert!(!self.finalized);
        self.finalized = true;
        let _ = writeln!(self.out, "$version\n  xcsim\n$end");
        let _ = writeln!(self.out, "$timescale\n  100 ps\n$end");
        for key in &self.order {
            let wire = &self.wires[key];
            let _ = writeln!(
                self.out,
                "$var\n  wire {} {} {}\n$end",
                wire.width,
                wire.identifier,
                port_name(key.0, key.1)
            );
        }
        let _ = writeln!(self.out, "$enddefinitions $end");
        let _ = writeln!(self.out, "$dumpvars");
        let order = std::mem::take(&mut self.order);
        for key in &order {
            self.dump_value(*key, 0);
        }
        self.order = order;
        let _ = writeln!(self.out, "$end");
    }

    fn dump_value(&mut self, key: (usize, usize), value: u32) {
        let Some(wire) = self.wires.get(&key) else { return };
        if wire.width == 1 {
            // Scalar dumps take no space between value and identifier.
            let _ = writeln!(self.out, "{}{}", value & 1, wire.identifier);
        } else {
            // Vector values appear in their shortest binary form.
            let _ = writeln!(self.out, "b{value:b} {}", wire.identifier);
        }
    }

    pub fn record(&mut self, core: usize, port: usize, value: u32, time: Ticks) {
        if !self.finalized || !self.wires.contains_key(&(core, port)) {
            return;
        }
        let translated = time * (100 / CYCLES_PER_TICK as u64);
        if translated != self.current_time {
            let _ = writeln!(self.out, "#{translated}");
            self.current_time = translated;
        }
        self.dump_value((core, port), value);
    }
}

impl SystemState {
    /// Port pin change hook.
    pub(crate) fn note_pins_change(&mut self, core: usize, port: usize, value: u32, time: Ticks) {
        if let Some(w) = &mut self.waveform {
            w.record(core, port, value, time);
        }
    }

    /// Attach a waveform tracer watching every port of every core.
    pub fn attach_waveform(&mut self, out: Box<dyn Write + Send>) {
        let mut tracer = WaveformTracer::new(out);
        let mut names = HashMap::new();
        for (c, core) in self.cores.iter_mut().enumerate() {
            for (p, port) in core.ports.iter_mut().enumerate() {
                port.watched = true;
                tracer.add_port(c, p, port.width);
                names.insert((c, p), format!("core{}_{}bit_{}", c, port.width, port.num));
            }
        }
        tracer.finalize(|c, p| names[&(c, p)].clone());
        self.waveform = Some(tracer);
    }
}

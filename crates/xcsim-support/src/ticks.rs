//! Simulated time.

/// Simulated time in processor cycles.
pub type Ticks = u64;

/// Processor cycles per reference-clock tick. The reference clock runs at
/// 100MHz, so the modelled core frequency is `CYCLES_PER_TICK * 100` MHz.
pub const CYCLES_PER_TICK: u32 = 4;

/// Reference-clock value visible to timers, truncated to the 32-bit
/// architectural counter.
pub fn reference_time(time: Ticks) -> u32 {
    (time / CYCLES_PER_TICK as u64) as u32
}

/// Earliest time at or after `now` whose reference counter equals `value`.
/// The architectural counter wraps at 32 bits, so a match always exists.
pub fn time_of_reference(now: Ticks, value: u32) -> Ticks {
    let period = (1u64 << 32) * CYCLES_PER_TICK as u64;
    let base = now - (now % period);
    let candidate = base + value as u64 * CYCLES_PER_TICK as u64;
    if candidate >= now {
        candidate
    } else {
        candidate + period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_counter_scales_by_cycles_per_tick() {
        assert_eq!(reference_time(0), 0);
        assert_eq!(reference_time(CYCLES_PER_TICK as u64), 1);
        assert_eq!(reference_time(10 * CYCLES_PER_TICK as u64), 10);
    }

    #[test]
    fn time_of_reference_is_forward_and_matches() {
        let now = 1234 * CYCLES_PER_TICK as u64 + 1;
        let t = time_of_reference(now, 2000);
        assert!(t >= now);
        assert_eq!(reference_time(t), 2000);

        // A counter value already in the past resolves to the next wrap.
        let t = time_of_reference(now, 100);
        assert!(t >= now);
        assert_eq!(reference_time(t), 100);
    }
}

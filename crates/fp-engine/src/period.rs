//! Note-to-period conversion for the NTSC chip timers.
//!
//! A channel timer of period `p` clocked by the CPU and divided by the
//! channel's sequencer length `d` plays at `CPU_CLOCK / (d * (p + 1))` Hz,
//! so `p = CPU_CLOCK / (d * f) - 1`.

use crate::apu::CPU_CLOCK_NTSC;

/// Note value of A4 (440 Hz), with C0 = 1.
const A4_NOTE: i32 = 58;

/// Frequency of a musical note value in Hz (12-TET, A4 = 440 Hz).
pub fn note_frequency(value: u8) -> f64 {
    440.0 * libm::pow(2.0, (value as i32 - A4_NOTE) as f64 / 12.0)
}

/// Timer period for `value` on a channel whose sequencer divides by `divider`.
///
/// Returns 0 for an empty note; clamps to `max_period` (the register width).
pub fn note_to_period(value: u8, divider: u32, max_period: u16) -> u16 {
    if value == 0 || divider == 0 {
        return 0;
    }
    let period = CPU_CLOCK_NTSC / (divider as f64 * note_frequency(value)) - 1.0;
    libm::round(period).clamp(0.0, max_period as f64) as u16
}

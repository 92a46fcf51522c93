//! Software 2A03 + VRC6 emulation core.
//!
//! A compact register-level model of the NES sound hardware, enough to
//! render tracker output faithfully: two pulses, triangle, noise and the
//! delta-modulation channel on the 2A03 plus the VRC6 pulses and saw.
//! Envelopes, sweeps and length counters are not modelled; the engine
//! always drives constant volume with the length counter halted.
//!
//! Channel timers run in CPU cycles. Each output sample advances every
//! channel by the number of CPU cycles it spans, then point-samples the
//! channel outputs through the non-linear 2A03 mixer.

use alloc::vec::Vec;

use crate::apu::{Apu, ApuExpansion, DmcReadFn};

/// Integer CPU clock, for exact cycle accounting.
const CPU_CLOCK: u64 = 1_789_773;

/// Frame rate as a ratio: 60.0988 Hz = 600_988 / 10_000.
const FRAME_RATE_NUM: u64 = 600_988;
const FRAME_RATE_DEN: u64 = 10_000;

const PULSE_DUTY: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

const TRIANGLE_SEQ: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, //
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];

const NOISE_PERIODS: [u32; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

const DMC_RATES: [u32; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// VRC6 output relative to the 2A03 mixer, per unit of channel output.
const VRC6_GAIN: f32 = 0.0086;

/// Full-scale mix -> i16.
const OUTPUT_SCALE: f32 = 30_000.0;

const DC_BLOCK_POLE: f32 = 0.995;

/// Countdown timer clocked in CPU cycles.
#[derive(Clone, Copy, Debug, Default)]
struct Timer {
    /// Cycles per expiry; 0 = stopped
    period: u32,
    counter: u32,
}

impl Timer {
    /// Run for `cycles`, returning how many times the timer expired.
    fn run(&mut self, mut cycles: u32) -> u32 {
        if self.period == 0 {
            return 0;
        }
        if self.counter == 0 || self.counter > self.period {
            self.counter = self.period;
        }
        let mut expired = 0;
        while cycles >= self.counter {
            cycles -= self.counter;
            self.counter = self.period;
            expired += 1;
        }
        self.counter -= cycles;
        expired
    }
}

#[derive(Clone, Debug, Default)]
struct Pulse {
    duty: u8,
    volume: u8,
    period: u16,
    step: u8,
    timer: Timer,
}

impl Pulse {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => {
                self.duty = value >> 6;
                self.volume = value & 0x0F;
            }
            2 => self.period = (self.period & 0x700) | value as u16,
            3 => {
                self.period = (self.period & 0xFF) | ((value as u16 & 0x07) << 8);
                self.step = 0;
            }
            _ => {}
        }
        // Periods below 8 are silenced by the sweep unit.
        self.timer.period = if self.period < 8 { 0 } else { 2 * (self.period as u32 + 1) };
    }

    fn clock(&mut self, cycles: u32) {
        let steps = self.timer.run(cycles);
        self.step = ((self.step as u32 + steps) % 8) as u8;
    }

    fn output(&self, enabled: bool) -> u8 {
        if enabled && self.timer.period != 0 && PULSE_DUTY[self.duty as usize][self.step as usize] != 0 {
            self.volume
        } else {
            0
        }
    }
}

#[derive(Clone, Debug)]
struct Triangle {
    running: bool,
    period: u16,
    step: u8,
    timer: Timer,
}

impl Default for Triangle {
    fn default() -> Self {
        // Park on a zero step so an untouched triangle is silent.
        Self { running: false, period: 0, step: 15, timer: Timer::default() }
    }
}

impl Triangle {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => self.running = value & 0x7F != 0,
            2 => self.period = (self.period & 0x700) | value as u16,
            3 => self.period = (self.period & 0xFF) | ((value as u16 & 0x07) << 8),
            _ => {}
        }
    }

    fn clock(&mut self, cycles: u32, enabled: bool) {
        // A halted or ultrasonic triangle holds its current step.
        self.timer.period = if enabled && self.running && self.period >= 2 {
            self.period as u32 + 1
        } else {
            0
        };
        let steps = self.timer.run(cycles);
        self.step = ((self.step as u32 + steps) % 32) as u8;
    }

    fn output(&self) -> u8 {
        TRIANGLE_SEQ[self.step as usize]
    }
}

#[derive(Clone, Debug)]
struct Noise {
    volume: u8,
    short_mode: bool,
    lfsr: u16,
    timer: Timer,
}

impl Default for Noise {
    fn default() -> Self {
        Self { volume: 0, short_mode: false, lfsr: 1, timer: Timer::default() }
    }
}

impl Noise {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => self.volume = value & 0x0F,
            2 => {
                self.short_mode = value & 0x80 != 0;
                self.timer.period = NOISE_PERIODS[(value & 0x0F) as usize];
            }
            _ => {}
        }
    }

    fn clock(&mut self, cycles: u32) {
        let tap = if self.short_mode { 6 } else { 1 };
        for _ in 0..self.timer.run(cycles) {
            let feedback = (self.lfsr ^ (self.lfsr >> tap)) & 1;
            self.lfsr = (self.lfsr >> 1) | (feedback << 14);
        }
    }

    fn output(&self, enabled: bool) -> u8 {
        if enabled && self.lfsr & 1 == 0 {
            self.volume
        } else {
            0
        }
    }
}

#[derive(Clone, Default)]
struct Dmc {
    read: Option<DmcReadFn>,
    looping: bool,
    level: u8,
    sample_addr: u16,
    sample_len: u16,
    current_addr: u16,
    bytes_left: u16,
    shift: u8,
    bits_left: u8,
    silent: bool,
    timer: Timer,
}

impl Dmc {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => {
                self.looping = value & 0x40 != 0;
                self.timer.period = DMC_RATES[(value & 0x0F) as usize];
            }
            1 => self.level = value & 0x7F,
            2 => self.sample_addr = 0xC000 + value as u16 * 64,
            3 => self.sample_len = value as u16 * 16 + 1,
            _ => {}
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.bytes_left = 0;
        } else if self.bytes_left == 0 {
            self.restart();
        }
    }

    fn restart(&mut self) {
        self.current_addr = self.sample_addr;
        self.bytes_left = self.sample_len;
    }

    fn fetch(&mut self) -> Option<u8> {
        if self.bytes_left == 0 {
            return None;
        }
        let byte = self.read.as_ref().map_or(0, |read| read(self.current_addr));
        self.current_addr = if self.current_addr == 0xFFFF { 0x8000 } else { self.current_addr + 1 };
        self.bytes_left -= 1;
        if self.bytes_left == 0 && self.looping {
            self.restart();
        }
        Some(byte)
    }

    fn clock(&mut self, cycles: u32) {
        for _ in 0..self.timer.run(cycles) {
            if self.bits_left == 0 {
                self.bits_left = 8;
                match self.fetch() {
                    Some(byte) => {
                        self.shift = byte;
                        self.silent = false;
                    }
                    None => self.silent = true,
                }
            }
            if !self.silent {
                if self.shift & 1 != 0 {
                    if self.level <= 125 {
                        self.level += 2;
                    }
                } else if self.level >= 2 {
                    self.level -= 2;
                }
            }
            self.shift >>= 1;
            self.bits_left -= 1;
        }
    }

    fn is_active(&self) -> bool {
        self.bytes_left > 0
    }
}

#[derive(Clone, Debug, Default)]
struct Vrc6Pulse {
    duty: u8,
    volume: u8,
    digitized: bool,
    enabled: bool,
    period: u16,
    step: u8,
    timer: Timer,
}

impl Vrc6Pulse {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => {
                self.digitized = value & 0x80 != 0;
                self.duty = (value >> 4) & 0x07;
                self.volume = value & 0x0F;
            }
            1 => self.period = (self.period & 0xF00) | value as u16,
            2 => {
                self.period = (self.period & 0xFF) | ((value as u16 & 0x0F) << 8);
                self.enabled = value & 0x80 != 0;
                if !self.enabled {
                    self.step = 0;
                }
            }
            _ => {}
        }
        self.timer.period = if self.enabled { self.period as u32 + 1 } else { 0 };
    }

    fn clock(&mut self, cycles: u32) {
        let steps = self.timer.run(cycles);
        self.step = ((self.step as u32 + steps) % 16) as u8;
    }

    fn output(&self) -> u8 {
        if self.enabled && (self.digitized || self.step <= self.duty) {
            self.volume
        } else {
            0
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Vrc6Saw {
    rate: u8,
    enabled: bool,
    period: u16,
    step: u8,
    accumulator: u8,
    timer: Timer,
}

impl Vrc6Saw {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => self.rate = value & 0x3F,
            1 => self.period = (self.period & 0xF00) | value as u16,
            2 => {
                self.period = (self.period & 0xFF) | ((value as u16 & 0x0F) << 8);
                self.enabled = value & 0x80 != 0;
                if !self.enabled {
                    self.step = 0;
                    self.accumulator = 0;
                }
            }
            _ => {}
        }
        self.timer.period = if self.enabled { self.period as u32 + 1 } else { 0 };
    }

    fn clock(&mut self, cycles: u32) {
        for _ in 0..self.timer.run(cycles) {
            self.step += 1;
            if self.step == 14 {
                self.step = 0;
                self.accumulator = 0;
            } else if self.step % 2 == 0 {
                self.accumulator = self.accumulator.wrapping_add(self.rate);
            }
        }
    }

    fn output(&self) -> u8 {
        self.accumulator >> 3
    }
}

/// One-pole high-pass removing the mixer's DC offset.
#[derive(Clone, Copy, Debug, Default)]
struct DcBlock {
    last_in: f32,
    last_out: f32,
}

impl DcBlock {
    fn process(&mut self, x: f32) -> f32 {
        let y = x - self.last_in + DC_BLOCK_POLE * self.last_out;
        self.last_in = x;
        self.last_out = y;
        y
    }
}

/// Software emulation of the 2A03 APU with optional VRC6 expansion.
pub struct SoftApu {
    sample_rate: u32,
    expansion: ApuExpansion,
    /// $4015 channel enable bits
    status: u8,
    pulse: [Pulse; 2],
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    vrc6_pulse: [Vrc6Pulse; 2],
    saw: Vrc6Saw,
    dc: DcBlock,
    /// Fractional samples carried between frames, in units of 1/FRAME_RATE_NUM
    frame_acc: u64,
    /// Fractional CPU cycles carried between samples, in units of 1/sample_rate
    cycle_acc: u64,
    buffer: Vec<i16>,
    read_pos: usize,
}

impl SoftApu {
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100,
            expansion: ApuExpansion::None,
            status: 0,
            pulse: Default::default(),
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc: Dmc::default(),
            vrc6_pulse: Default::default(),
            saw: Vrc6Saw::default(),
            dc: DcBlock::default(),
            frame_acc: 0,
            cycle_acc: 0,
            buffer: Vec::new(),
            read_pos: 0,
        }
    }

    /// Largest number of samples a single frame can produce.
    pub fn max_samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * FRAME_RATE_DEN).div_ceil(FRAME_RATE_NUM) as usize
    }

    pub fn expansion(&self) -> ApuExpansion {
        self.expansion
    }

    fn mix(&mut self) -> i16 {
        let pulse1 = self.pulse[0].output(self.status & 0x01 != 0) as f32;
        let pulse2 = self.pulse[1].output(self.status & 0x02 != 0) as f32;
        let triangle = self.triangle.output() as f32;
        let noise = self.noise.output(self.status & 0x08 != 0) as f32;
        let dmc = self.dmc.level as f32;

        let pulse_out = if pulse1 + pulse2 == 0.0 {
            0.0
        } else {
            95.88 / (8128.0 / (pulse1 + pulse2) + 100.0)
        };
        let tnd = triangle / 8227.0 + noise / 12241.0 + dmc / 22638.0;
        let tnd_out = if tnd == 0.0 { 0.0 } else { 159.79 / (1.0 / tnd + 100.0) };

        let vrc6_out = if self.expansion == ApuExpansion::Vrc6 {
            let sum = self.vrc6_pulse[0].output() as f32
                + self.vrc6_pulse[1].output() as f32
                + self.saw.output() as f32;
            sum * VRC6_GAIN
        } else {
            0.0
        };

        let y = self.dc.process(pulse_out + tnd_out + vrc6_out);
        (y * OUTPUT_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    fn clock(&mut self, cycles: u32) {
        self.pulse[0].clock(cycles);
        self.pulse[1].clock(cycles);
        self.triangle.clock(cycles, self.status & 0x04 != 0);
        self.noise.clock(cycles);
        self.dmc.clock(cycles);
        if self.expansion == ApuExpansion::Vrc6 {
            self.vrc6_pulse[0].clock(cycles);
            self.vrc6_pulse[1].clock(cycles);
            self.saw.clock(cycles);
        }
    }
}

impl Default for SoftApu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu for SoftApu {
    fn init(&mut self, sample_rate: u32, dmc_read: DmcReadFn) {
        self.sample_rate = sample_rate.max(1);
        self.dmc.read = Some(dmc_read);
        // Room for an unread frame plus the next one.
        let capacity = 2 * self.max_samples_per_frame();
        self.buffer = Vec::with_capacity(capacity);
        self.read_pos = 0;
    }

    fn reset(&mut self, expansion: ApuExpansion) {
        let read = self.dmc.read.take();
        self.expansion = expansion;
        self.pulse = Default::default();
        self.triangle = Triangle::default();
        self.noise = Noise::default();
        self.dmc = Dmc { read, ..Dmc::default() };
        self.vrc6_pulse = Default::default();
        self.saw = Vrc6Saw::default();
        self.dc = DcBlock::default();
        // Tone channels start enabled; DMC waits for an explicit start.
        self.status = 0x0F;
        self.frame_acc = 0;
        self.cycle_acc = 0;
        self.buffer.clear();
        self.read_pos = 0;
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000..=0x4003 => self.pulse[0].write(addr - 0x4000, value),
            0x4004..=0x4007 => self.pulse[1].write(addr - 0x4004, value),
            0x4008..=0x400B => self.triangle.write(addr - 0x4008, value),
            0x400C..=0x400F => self.noise.write(addr - 0x400C, value),
            0x4010..=0x4013 => self.dmc.write(addr - 0x4010, value),
            0x4015 => {
                self.status = value & 0x1F;
                self.dmc.set_enabled(value & 0x10 != 0);
            }
            0x9000..=0x9002 | 0xA000..=0xA002 | 0xB000..=0xB002
                if self.expansion == ApuExpansion::Vrc6 =>
            {
                let reg = addr & 0x0003;
                match addr & 0xF000 {
                    0x9000 => self.vrc6_pulse[0].write(reg, value),
                    0xA000 => self.vrc6_pulse[1].write(reg, value),
                    _ => self.saw.write(reg, value),
                }
            }
            _ => {}
        }
    }

    fn end_frame(&mut self) {
        self.buffer.drain(..self.read_pos);
        self.read_pos = 0;

        let rate = self.sample_rate as u64;
        self.frame_acc += rate * FRAME_RATE_DEN;
        let count = self.frame_acc / FRAME_RATE_NUM;
        self.frame_acc %= FRAME_RATE_NUM;

        for _ in 0..count {
            self.cycle_acc += CPU_CLOCK;
            let cycles = (self.cycle_acc / rate) as u32;
            self.cycle_acc %= rate;

            self.clock(cycles);
            let sample = self.mix();
            self.buffer.push(sample);
        }

        if !self.dmc.is_active() {
            self.status &= !0x10;
        }
    }

    fn samples_available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    fn read_samples(&mut self, dest: &mut [i16]) -> usize {
        let count = dest.len().min(self.samples_available());
        dest[..count].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + count]);
        self.read_pos += count;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec;
    use core::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

    fn apu(expansion: ApuExpansion) -> SoftApu {
        let mut apu = SoftApu::new();
        apu.init(44_100, Arc::new(|_: u16| 0u8));
        apu.reset(expansion);
        apu
    }

    fn render_frame(apu: &mut SoftApu) -> Vec<i16> {
        apu.end_frame();
        let mut out = vec![0; apu.samples_available()];
        let n = apu.read_samples(&mut out);
        out.truncate(n);
        out
    }

    #[test]
    fn frame_sizes_alternate_around_the_frame_rate() {
        let mut apu = apu(ApuExpansion::None);
        let sizes: Vec<usize> = (0..10).map(|_| render_frame(&mut apu).len()).collect();
        assert_eq!(sizes, [733, 734, 734, 734, 733, 734, 734, 734, 734, 733]);
        assert_eq!(apu.max_samples_per_frame(), 734);
    }

    #[test]
    fn untouched_core_is_silent() {
        let mut apu = apu(ApuExpansion::Vrc6);
        for _ in 0..4 {
            assert!(render_frame(&mut apu).iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn pulse_note_produces_sound() {
        let mut apu = apu(ApuExpansion::None);
        apu.write_register(0x4000, 0xBF);
        apu.write_register(0x4002, 0xFD);
        apu.write_register(0x4003, 0xF8);
        let frame = render_frame(&mut apu);
        assert!(frame.iter().any(|&s| s.unsigned_abs() > 1000));
    }

    #[test]
    fn vrc6_writes_ignored_without_expansion() {
        let mut apu = apu(ApuExpansion::None);
        apu.write_register(0x9000, 0x7F);
        apu.write_register(0x9001, 0xFD);
        apu.write_register(0x9002, 0x80);
        assert!(render_frame(&mut apu).iter().all(|&s| s == 0));

        let mut apu = self::apu(ApuExpansion::Vrc6);
        apu.write_register(0x9000, 0x7F);
        apu.write_register(0x9001, 0xFD);
        apu.write_register(0x9002, 0x80);
        assert!(render_frame(&mut apu).iter().any(|&s| s != 0));
    }

    #[test]
    fn dmc_fetches_sample_bytes_through_callback() {
        let reads = Arc::new(AtomicUsize::new(0));
        let first = Arc::new(AtomicU16::new(0));
        let (r, f) = (reads.clone(), first.clone());

        let mut apu = SoftApu::new();
        apu.init(
            44_100,
            Arc::new(move |addr: u16| {
                if r.fetch_add(1, Ordering::Relaxed) == 0 {
                    f.store(addr, Ordering::Relaxed);
                }
                0xFF
            }),
        );
        apu.reset(ApuExpansion::None);

        apu.write_register(0x4010, 0x0F);
        apu.write_register(0x4012, 0x01);
        apu.write_register(0x4013, 0x01);
        apu.write_register(0x4015, 0x1F);
        let frame = render_frame(&mut apu);

        // Length register 1 = 17 bytes, address register 1 = $C040.
        assert_eq!(reads.load(Ordering::Relaxed), 17);
        assert_eq!(first.load(Ordering::Relaxed), 0xC040);
        assert!(frame.iter().any(|&s| s != 0));
    }

    #[test]
    fn read_samples_is_bounded_by_destination_and_availability() {
        let mut apu = apu(ApuExpansion::None);
        apu.end_frame();
        assert_eq!(apu.samples_available(), 733);

        let mut small = [0i16; 100];
        assert_eq!(apu.read_samples(&mut small), 100);
        assert_eq!(apu.samples_available(), 633);

        let mut big = [0i16; 1000];
        assert_eq!(apu.read_samples(&mut big), 633);
        assert_eq!(apu.read_samples(&mut big), 0);
    }

    #[test]
    fn timer_counts_expiries_across_calls() {
        let mut timer = Timer { period: 10, counter: 0 };
        assert_eq!(timer.run(25), 2);
        assert_eq!(timer.run(5), 1);
        assert_eq!(timer.run(9), 0);
        assert_eq!(timer.run(1), 1);
    }
}

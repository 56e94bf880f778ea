//! Synthesized fallback tone: a short sine burst with a fast attack and an
//! exponential decay, as 16-bit mono samples.

use core::f32::consts::TAU;
use core::time::Duration;

pub const FREQUENCY: f32 = 880.0;
pub const LENGTH: Duration = Duration::from_millis(300);
pub const SAMPLE_RATE: u32 = 22_050;

const AMPLITUDE: f32 = 0.3;
const ATTACK_SECS: f32 = 0.01;
const DECAY_RATE: f32 = 12.0;

pub fn synthesize(frequency: f32, length: Duration, sample_rate: u32) -> Vec<i16> {
    let rate = sample_rate as f32;
    let total = (length.as_secs_f32() * rate) as usize;

    (0..total)
        .map(|i| {
            let t = i as f32 / rate;
            let envelope = if t < ATTACK_SECS {
                t / ATTACK_SECS
            } else {
                (-(t - ATTACK_SECS) * DECAY_RATE).exp()
            };
            let sample = (TAU * frequency * t).sin() * envelope * AMPLITUDE;
            (sample * f32::from(i16::MAX)) as i16
        })
        .collect()
}

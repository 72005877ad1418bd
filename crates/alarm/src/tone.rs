//! Alarm pattern synthesis
//!
//! Pure sample generation for the three-beep alert pattern. Playback lives
//! in the output module; everything here is testable without a device.

use std::f32::consts::PI;

/// Offsets of the three beeps from the start of the pattern, in ms.
pub const BEEP_OFFSETS_MS: [u64; 3] = [0, 500, 1000];

/// Duration of a single tone, in ms.
pub const TONE_MS: u64 = 400;

/// Attack window: gain ramps linearly from 0 to [`PEAK_GAIN`] over this time.
pub const ATTACK_MS: u64 = 50;

/// Gain reached at the end of the attack ramp.
pub const PEAK_GAIN: f32 = 0.5;

/// Gain the exponential decay approaches by the end of the tone.
pub const FLOOR_GAIN: f32 = 0.01;

/// Frequency of the `index`-th beep: alternating 800/1000 Hz for attention.
pub fn beep_frequency(index: usize) -> f32 {
    if index % 2 == 0 {
        800.0
    } else {
        1000.0
    }
}

/// Total pattern length in ms (last beep offset plus one tone).
pub fn pattern_ms() -> u64 {
    BEEP_OFFSETS_MS[BEEP_OFFSETS_MS.len() - 1] + TONE_MS
}

/// Envelope gain at `t` seconds into a tone: linear attack to [`PEAK_GAIN`]
/// over the first 50 ms, then exponential decay toward [`FLOOR_GAIN`] over
/// the remaining 350 ms.
pub fn envelope(t: f32) -> f32 {
    let attack = ATTACK_MS as f32 / 1000.0;
    let total = TONE_MS as f32 / 1000.0;

    if t < 0.0 || t >= total {
        0.0
    } else if t < attack {
        PEAK_GAIN * t / attack
    } else {
        let progress = (t - attack) / (total - attack);
        PEAK_GAIN * (FLOOR_GAIN / PEAK_GAIN).powf(progress)
    }
}

/// Render one enveloped sine tone at `freq` Hz as mono f32 samples.
pub fn tone_samples(freq: f32, sample_rate: u32) -> Vec<f32> {
    let total = (sample_rate as u64 * TONE_MS / 1000) as usize;
    (0..total)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            envelope(t) * (2.0 * PI * freq * t).sin()
        })
        .collect()
}

/// Render the full three-beep pattern as mono f32 samples.
pub fn pattern_samples(sample_rate: u32) -> Vec<f32> {
    let mut samples = vec![0.0; (sample_rate as u64 * pattern_ms() / 1000) as usize];

    for (index, offset_ms) in BEEP_OFFSETS_MS.iter().enumerate() {
        let start = (sample_rate as u64 * offset_ms / 1000) as usize;
        for (i, sample) in tone_samples(beep_frequency(index), sample_rate)
            .into_iter()
            .enumerate()
        {
            samples[start + i] += sample;
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48000;

    fn ms_to_sample(ms: u64) -> usize {
        (RATE as u64 * ms / 1000) as usize
    }

    #[test]
    fn test_three_beeps_at_expected_offsets() {
        assert_eq!(BEEP_OFFSETS_MS, [0, 500, 1000]);
    }

    #[test]
    fn test_alternating_frequencies() {
        assert_eq!(beep_frequency(0), 800.0);
        assert_eq!(beep_frequency(1), 1000.0);
        assert_eq!(beep_frequency(2), 800.0);
    }

    #[test]
    fn test_envelope_shape() {
        // Silent at onset, peak at the end of the attack ramp
        assert_eq!(envelope(0.0), 0.0);
        assert!((envelope(0.025) - 0.25).abs() < 1e-3);
        assert!((envelope(0.05) - PEAK_GAIN).abs() < 1e-3);

        // Monotone decay after the attack
        assert!(envelope(0.1) < envelope(0.06));
        assert!(envelope(0.3) < envelope(0.1));

        // Near the floor by the end of the tone, silent after
        assert!(envelope(0.399) <= FLOOR_GAIN * 1.1);
        assert_eq!(envelope(0.4), 0.0);
    }

    #[test]
    fn test_tone_length_and_bounds() {
        let samples = tone_samples(800.0, RATE);
        assert_eq!(samples.len(), ms_to_sample(TONE_MS));
        assert!(samples.iter().all(|s| s.abs() <= PEAK_GAIN + 1e-6));
    }

    #[test]
    fn test_pattern_length() {
        let samples = pattern_samples(RATE);
        assert_eq!(samples.len(), ms_to_sample(1400));
    }

    #[test]
    fn test_pattern_beeps_and_gaps() {
        let samples = pattern_samples(RATE);

        let energy = |from_ms: u64, to_ms: u64| -> f32 {
            samples[ms_to_sample(from_ms)..ms_to_sample(to_ms)]
                .iter()
                .map(|s| s * s)
                .sum()
        };

        // Audible during each beep window
        assert!(energy(10, 390) > 0.0);
        assert!(energy(510, 890) > 0.0);
        assert!(energy(1010, 1390) > 0.0);

        // Silent in the gaps between beeps
        assert_eq!(energy(405, 495), 0.0);
        assert_eq!(energy(905, 995), 0.0);
    }
}

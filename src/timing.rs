// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Keystroke timing
//!
//! Maps the character just typed to the pause before the next one: a jittered base delay,
//! longer after newlines and punctuation, divided by the speed multiplier.

use rand::Rng;
use std::time::Duration;

pub const BASE_DELAY_MS: f64 = 80.0;
pub const RANDOM_DELAY_RANGE_MS: f64 = 80.0;
pub const NEWLINE_PAUSE_MS: f64 = 350.0;
pub const PUNCTUATION_PAUSE_MS: f64 = 120.0;
pub const PAUSE_CHARS: &str = ".;{}() ";

pub const LIVE_FLOOR_MS: f64 = 10.0;
pub const PLAIN_FLOOR_MS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingMode {
    /// Persona-driven typing with typos.
    #[default]
    Persona,
    /// Clean typing with a coarser delay floor.
    Plain,
}

impl TimingMode {
    pub fn floor_ms(&self) -> f64 {
        match self {
            TimingMode::Persona => LIVE_FLOOR_MS,
            TimingMode::Plain => PLAIN_FLOOR_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseClass {
    Regular,
    Punctuation,
    Newline,
}

pub fn classify(c: char) -> PauseClass {
    if c == '\n' {
        PauseClass::Newline
    } else if PAUSE_CHARS.contains(c) {
        PauseClass::Punctuation
    } else {
        PauseClass::Regular
    }
}

/// Delay for a given uniform `sample` in `[0, 1)`.
///
/// `speed` must be positive; callers validate it through `TypingConfig::with_speed`.
pub fn delay_from_sample(c: char, speed: f64, sample: f64, mode: TimingMode) -> Duration {
    let jitter = sample.clamp(0.0, 1.0) * RANDOM_DELAY_RANGE_MS - RANDOM_DELAY_RANGE_MS / 2.0;
    let pause = match classify(c) {
        PauseClass::Regular => 0.0,
        PauseClass::Punctuation => PUNCTUATION_PAUSE_MS,
        PauseClass::Newline => NEWLINE_PAUSE_MS,
    };

    let ms = (BASE_DELAY_MS + jitter + pause) / speed;
    from_ms(ms.max(mode.floor_ms()))
}

pub fn delay<R: Rng + ?Sized>(c: char, speed: f64, mode: TimingMode, rng: &mut R) -> Duration {
    delay_from_sample(c, speed, rng.random::<f64>(), mode)
}

/// Scale a fixed persona delay by the speed multiplier.
pub fn scaled(ms: u64, speed: f64) -> Duration {
    from_ms(ms as f64 / speed)
}

fn from_ms(ms: f64) -> Duration {
    Duration::from_nanos((ms.max(0.0) * 1_000_000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ms(d: Duration) -> f64 {
        d.as_secs_f64() * 1000.0
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify('\n'), PauseClass::Newline);
        assert_eq!(classify(';'), PauseClass::Punctuation);
        assert_eq!(classify(' '), PauseClass::Punctuation);
        assert_eq!(classify('a'), PauseClass::Regular);
        assert_eq!(classify(','), PauseClass::Regular);
    }

    #[test]
    fn test_delay_range_for_regular_char() {
        let low = delay_from_sample('a', 1.0, 0.0, TimingMode::Persona);
        let mid = delay_from_sample('a', 1.0, 0.5, TimingMode::Persona);
        assert!((ms(low) - 40.0).abs() < 1e-6);
        assert!((ms(mid) - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_newline_and_punctuation_pauses() {
        let newline = delay_from_sample('\n', 1.0, 0.5, TimingMode::Persona);
        let punct = delay_from_sample('{', 1.0, 0.5, TimingMode::Persona);
        assert!((ms(newline) - 430.0).abs() < 1e-6);
        assert!((ms(punct) - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_delay_scales_inversely_with_speed() {
        let slow = delay_from_sample('x', 0.5, 0.5, TimingMode::Persona);
        let fast = delay_from_sample('x', 2.0, 0.5, TimingMode::Persona);
        assert!((ms(slow) - 160.0).abs() < 1e-6);
        assert!((ms(fast) - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_floor_holds_at_extreme_speed() {
        for c in ['a', '\n', ';', ' '] {
            let live = delay_from_sample(c, 1000.0, 0.0, TimingMode::Persona);
            let plain = delay_from_sample(c, 1000.0, 0.0, TimingMode::Plain);
            assert!(ms(live) >= LIVE_FLOOR_MS - 1e-9);
            assert!(ms(plain) >= PLAIN_FLOOR_MS - 1e-9);
        }
    }

    #[test]
    fn test_random_delay_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let d = ms(delay('q', 1.0, TimingMode::Persona, &mut rng));
            assert!((40.0..=120.0).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn test_scaled() {
        assert!((ms(scaled(180, 1.0)) - 180.0).abs() < 1e-6);
        assert!((ms(scaled(120, 2.0)) - 60.0).abs() < 1e-6);
    }
}

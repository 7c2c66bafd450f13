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

//! Typo decisions
//!
//! A typo is a wrong keystroke that gets noticed, deleted and replaced with the intended
//! character. The persona decides how often that happens and how long each phase takes.

use rand::Rng;
use std::time::Duration;

use crate::timing;
use crate::types::TypingConfig;

pub const TYPO_PLACEHOLDER: char = 'X';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    Clean,
    Typo,
}

pub fn decide<R: Rng + ?Sized>(typo_chance: f64, rng: &mut R) -> Keystroke {
    let chance = if typo_chance.is_nan() {
        0.0
    } else {
        typo_chance.clamp(0.0, 1.0)
    };
    if rng.random::<f64>() < chance {
        Keystroke::Typo
    } else {
        Keystroke::Clean
    }
}

/// Pause between the wrong keystroke and deleting it.
pub fn realization_delay(config: &TypingConfig) -> Duration {
    timing::scaled(config.persona.typo_realization_delay_ms, config.speed)
}

/// Pause between deleting the wrong keystroke and typing the right one.
pub fn correction_delay(config: &TypingConfig) -> Duration {
    timing::scaled(config.persona.typo_correction_delay_ms, config.speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_zero_chance_never_typos() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..1000).all(|_| decide(0.0, &mut rng) == Keystroke::Clean));
    }

    #[test]
    fn test_full_chance_always_typos() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!((0..1000).all(|_| decide(1.0, &mut rng) == Keystroke::Typo));
        assert!((0..100).all(|_| decide(7.5, &mut rng) == Keystroke::Typo));
    }

    #[test]
    fn test_chance_is_roughly_respected() {
        let mut rng = StdRng::seed_from_u64(3);
        let typos = (0..10_000)
            .filter(|_| decide(0.25, &mut rng) == Keystroke::Typo)
            .count();
        assert!((2_000..3_000).contains(&typos), "got {typos} typos");
    }

    #[test]
    fn test_phase_delays_follow_persona_and_speed() {
        let config = TypingConfig::for_persona(persona::lookup("regular").unwrap())
            .with_speed(2.0)
            .unwrap();
        assert_eq!(realization_delay(&config), Duration::from_millis(90));
        assert_eq!(correction_delay(&config), Duration::from_millis(60));
    }
}

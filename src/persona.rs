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

//! Built-in typing personas

use crate::error::{Result, TyperError};
use crate::types::PersonaProfile;

const PERSONAS: [PersonaProfile; 4] = [
    PersonaProfile {
        name: "junior",
        display_name: "Junior Developer",
        description: "New to coding, makes more mistakes and types a bit slower",
        typo_chance: 0.05,
        speed_multiplier: 0.8,
        typo_realization_delay_ms: 250,
        typo_correction_delay_ms: 200,
    },
    PersonaProfile {
        name: "regular",
        display_name: "Regular Developer",
        description: "Balanced typing speed and accuracy",
        typo_chance: 0.03,
        speed_multiplier: 1.0,
        typo_realization_delay_ms: 180,
        typo_correction_delay_ms: 120,
    },
    PersonaProfile {
        name: "senior",
        display_name: "Senior Developer",
        description: "Types faster with fewer mistakes",
        typo_chance: 0.015,
        speed_multiplier: 1.3,
        typo_realization_delay_ms: 150,
        typo_correction_delay_ms: 100,
    },
    PersonaProfile {
        name: "tenx",
        display_name: "10x Engineer",
        description: "Blazing fast typing with minimal errors",
        typo_chance: 0.008,
        speed_multiplier: 1.8,
        typo_realization_delay_ms: 120,
        typo_correction_delay_ms: 80,
    },
];

pub fn all() -> &'static [PersonaProfile] {
    &PERSONAS
}

pub fn default_persona() -> PersonaProfile {
    PERSONAS[1]
}

pub fn lookup(name: &str) -> Result<PersonaProfile> {
    let wanted = match name.trim().to_ascii_lowercase().as_str() {
        "10x" => "tenx".to_string(),
        other => other.to_string(),
    };
    PERSONAS
        .iter()
        .find(|p| p.name == wanted)
        .copied()
        .ok_or_else(|| {
            let known: Vec<&str> = PERSONAS.iter().map(|p| p.name).collect();
            TyperError::input(format!(
                "unknown persona '{name}' (expected one of: {})",
                known.join(", ")
            ))
        })
}

/// Persona bound to a number key in the terminal view (`1` = junior).
pub fn by_hotkey(key: char) -> Option<PersonaProfile> {
    let index = key.to_digit(10)?.checked_sub(1)? as usize;
    PERSONAS.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("Senior").unwrap().display_name, "Senior Developer");
        assert_eq!(lookup(" JUNIOR ").unwrap().typo_chance, 0.05);
    }

    #[test]
    fn test_tenx_alias() {
        assert_eq!(lookup("10x").unwrap(), lookup("tenx").unwrap());
    }

    #[test]
    fn test_unknown_persona_lists_known() {
        let err = lookup("intern").unwrap_err();
        assert!(err.to_string().contains("junior, regular, senior, tenx"));
    }

    #[test]
    fn test_default_is_regular() {
        assert_eq!(default_persona().name, "regular");
    }

    #[test]
    fn test_hotkeys() {
        assert_eq!(by_hotkey('1').unwrap().name, "junior");
        assert_eq!(by_hotkey('4').unwrap().name, "tenx");
        assert!(by_hotkey('0').is_none());
        assert!(by_hotkey('5').is_none());
        assert!(by_hotkey('a').is_none());
    }

    #[test]
    fn test_profiles_are_well_formed() {
        for p in all() {
            assert!((0.0..=1.0).contains(&p.typo_chance));
            assert!(p.speed_multiplier > 0.0);
        }
    }
}

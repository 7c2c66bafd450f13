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

//! Core types for typing animations

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{Result, TyperError};
use crate::persona;
use crate::timing::TimingMode;

/// Speed multipliers accepted from callers.
pub const SPEED_RANGE: RangeInclusive<f64> = 0.5..=2.5;

/// One line of a demo script, in file order.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    SetTitle(String),
    SetDescription(String),
    SetLanguage(String),
    SetPersona(String),
    SetSpeed(f64),
    // Opens a new step
    Explain(String),
    // Appended to the step opened by the last Explain
    Code(String),
}

/// The code to type. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    chars: Vec<char>,
}

impl Script {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }
}

impl From<&str> for Script {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Timing and typo parameters of a named typist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonaProfile {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    // Probability in [0, 1] that a keystroke becomes a typo sequence
    pub typo_chance: f64,
    pub speed_multiplier: f64,
    pub typo_realization_delay_ms: u64,
    pub typo_correction_delay_ms: u64,
}

/// Everything a typing session needs to decide its next action.
///
/// Passed by value into each session so the live view and an export never share settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypingConfig {
    pub persona: PersonaProfile,
    pub speed: f64,
    pub mode: TimingMode,
}

impl TypingConfig {
    /// Use the persona's own speed multiplier.
    pub fn for_persona(persona: PersonaProfile) -> Self {
        Self {
            persona,
            speed: persona.speed_multiplier,
            mode: TimingMode::Persona,
        }
    }

    /// Override the speed multiplier, rejecting values outside [`SPEED_RANGE`].
    pub fn with_speed(mut self, speed: f64) -> Result<Self> {
        if !speed.is_finite() || !SPEED_RANGE.contains(&speed) {
            return Err(TyperError::input(format!(
                "speed multiplier {speed} is outside {:.1}x-{:.1}x",
                SPEED_RANGE.start(),
                SPEED_RANGE.end()
            )));
        }
        self.speed = speed;
        Ok(self)
    }

    /// Plain typing: no typos and the coarser delay floor.
    pub fn plain(mut self) -> Self {
        self.mode = TimingMode::Plain;
        self
    }

    pub fn typo_chance(&self) -> f64 {
        match self.mode {
            TimingMode::Persona => self.persona.typo_chance,
            TimingMode::Plain => 0.0,
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self::for_persona(persona::default_persona())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStep {
    // Appended to whatever earlier steps already typed
    pub code: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuidedDemo {
    pub title: String,
    pub description: String,
    pub language: Language,
    pub persona: Option<String>,
    pub speed: Option<f64>,
    pub steps: Vec<DemoStep>,
}

impl GuidedDemo {
    /// The full text once every step has been typed.
    pub fn full_text(&self) -> String {
        self.steps.iter().map(|step| step.code.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Html,
}

impl Language {
    /// Guess the language from content markers. Falls back to JavaScript.
    pub fn detect(code: &str) -> Self {
        let has = |needle: &str| code.contains(needle);

        if has("import React")
            || has("interface ")
            || has(": string")
            || has(": number")
            || has(": boolean")
        {
            Language::TypeScript
        } else if has("def ") || has("import os") || has("__init__") || (has("class ") && has("self"))
        {
            Language::Python
        } else if has("<!DOCTYPE html>") || has("<html>") || has("<div") || has("<body>") {
            Language::Html
        } else {
            Language::JavaScript
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Language::TypeScript => "CodeTyper.ts",
            Language::JavaScript => "CodeTyper.js",
            Language::Python => "codetyper.py",
            Language::Html => "index.html",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Ok(Language::TypeScript),
            "javascript" | "js" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "html" => Ok(Language::Html),
            other => Err(format!("unknown language '{other}'")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Html => "html",
        };
        f.write_str(name)
    }
}

/// Output frame size with the font metrics that go with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    P720,
    P1080,
    K2,
    #[default]
    K4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionProfile {
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
    pub line_height: u32,
    pub padding_left: u32,
    pub padding_top: u32,
}

impl Resolution {
    pub fn profile(&self) -> ResolutionProfile {
        let (width, height, font_size, line_height, padding_left, padding_top) = match self {
            Resolution::P720 => (1280, 720, 14, 20, 60, 20),
            Resolution::P1080 => (1920, 1080, 18, 26, 80, 30),
            Resolution::K2 => (2560, 1440, 22, 32, 100, 40),
            Resolution::K4 => (3840, 2160, 28, 40, 150, 50),
        };
        ResolutionProfile {
            width,
            height,
            font_size,
            line_height,
            padding_left,
            padding_top,
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "720p" => Ok(Resolution::P720),
            "1080p" => Ok(Resolution::P1080),
            "2k" | "1440p" => Ok(Resolution::K2),
            "4k" | "2160p" => Ok(Resolution::K4),
            other => Err(format!(
                "unknown resolution '{other}' (expected 720p, 1080p, 2k or 4k)"
            )),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
            Resolution::K2 => "2k",
            Resolution::K4 => "4k",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bitrate {
    Low,
    Medium,
    #[default]
    High,
    Lossless,
}

impl Bitrate {
    pub fn bits_per_second(&self) -> u64 {
        match self {
            Bitrate::Low => 10_000_000,
            Bitrate::Medium => 25_000_000,
            Bitrate::High => 50_000_000,
            Bitrate::Lossless => 150_000_000,
        }
    }
}

impl FromStr for Bitrate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Bitrate::Low),
            "medium" => Ok(Bitrate::Medium),
            "high" => Ok(Bitrate::High),
            "lossless" => Ok(Bitrate::Lossless),
            other => Err(format!(
                "unknown bitrate '{other}' (expected low, medium, high or lossless)"
            )),
        }
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bitrate::Low => "low",
            Bitrate::Medium => "medium",
            Bitrate::High => "high",
            Bitrate::Lossless => "lossless",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_counts_chars_not_bytes() {
        let script = Script::new("é→x");
        assert_eq!(script.len(), 3);
        assert_eq!(script.get(1), Some('→'));
        assert_eq!(script.get(3), None);
        assert_eq!(script.text(), "é→x");
    }

    #[test]
    fn test_config_defaults_to_persona_speed() {
        let config = TypingConfig::for_persona(persona::lookup("senior").unwrap());
        assert_eq!(config.speed, 1.3);
        assert_eq!(config.mode, TimingMode::Persona);
    }

    #[test]
    fn test_with_speed_rejects_out_of_range() {
        let config = TypingConfig::default();
        assert!(config.with_speed(0.4).is_err());
        assert!(config.with_speed(2.6).is_err());
        assert!(config.with_speed(f64::NAN).is_err());
        assert_eq!(config.with_speed(2.5).unwrap().speed, 2.5);
    }

    #[test]
    fn test_plain_mode_has_no_typos() {
        let config = TypingConfig::for_persona(persona::lookup("junior").unwrap()).plain();
        assert_eq!(config.typo_chance(), 0.0);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(
            Language::detect("interface User { id: number }"),
            Language::TypeScript
        );
        assert_eq!(Language::detect("def main():\n    pass"), Language::Python);
        assert_eq!(Language::detect("<div>hi</div>"), Language::Html);
        assert_eq!(Language::detect("const x = 1;"), Language::JavaScript);
        assert_eq!(Language::detect(""), Language::JavaScript);
    }

    #[test]
    fn test_resolution_profiles() {
        let p = "1080p".parse::<Resolution>().unwrap().profile();
        assert_eq!((p.width, p.height), (1920, 1080));
        assert_eq!(p.line_height, 26);
        assert_eq!(Resolution::default(), Resolution::K4);
        assert!("8k".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_bitrates() {
        assert_eq!("low".parse::<Bitrate>().unwrap().bits_per_second(), 10_000_000);
        assert_eq!(Bitrate::Lossless.bits_per_second(), 150_000_000);
        assert_eq!(Bitrate::default().to_string(), "high");
    }
}

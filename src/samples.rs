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

//! Built-in sample code, typed when no file is given

use crate::types::{Language, Script};

const TYPESCRIPT: &str = include_str!("../samples/sample.ts");
const JAVASCRIPT: &str = include_str!("../samples/sample.js");
const PYTHON: &str = include_str!("../samples/sample.py");
const HTML: &str = include_str!("../samples/index.html");

pub fn sample(language: Language) -> &'static str {
    let text = match language {
        Language::TypeScript => TYPESCRIPT,
        Language::JavaScript => JAVASCRIPT,
        Language::Python => PYTHON,
        Language::Html => HTML,
    };
    text.trim_end()
}

pub fn sample_script(language: Language) -> Script {
    Script::new(sample(language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_detected_as_their_language() {
        for language in [
            Language::TypeScript,
            Language::JavaScript,
            Language::Python,
            Language::Html,
        ] {
            assert_eq!(Language::detect(sample(language)), language);
        }
    }

    #[test]
    fn test_samples_have_no_trailing_newline() {
        let script = sample_script(Language::Python);
        assert!(!script.is_empty());
        assert_ne!(script.get(script.len() - 1), Some('\n'));
    }
}

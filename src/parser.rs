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

//! Parser for guided demo scripts
//!
//! Parses scripts with the format:
//! - @ directives (title, description, language, persona, speed)
//! - # comments
//! - > explanation lines, each opening a new step
//! - $ code lines, appended to the current step

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::{char, not_line_ending, space0},
    combinator::{map, opt, value},
};

use crate::error::{Result, TyperError};
use crate::types::{DemoStep, Directive, GuidedDemo, Language, SPEED_RANGE};

fn parse_float(input: &str) -> IResult<&str, f64> {
    nom::number::complete::double(input)
}

fn parse_text_directive<'a>(name: &'static str, input: &'a str) -> IResult<&'a str, String> {
    let (input, _) = tag("@")(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = tag(name)(input)?;
    let (input, _) = space0(input)?;
    let (input, text) = not_line_ending(input)?;
    Ok((input, text.trim().to_string()))
}

fn parse_title(input: &str) -> IResult<&str, Directive> {
    let (input, text) = parse_text_directive("title:", input)?;
    Ok((input, Directive::SetTitle(text)))
}

fn parse_description(input: &str) -> IResult<&str, Directive> {
    let (input, text) = parse_text_directive("description:", input)?;
    Ok((input, Directive::SetDescription(text)))
}

fn parse_language(input: &str) -> IResult<&str, Directive> {
    let (input, text) = parse_text_directive("language:", input)?;
    Ok((input, Directive::SetLanguage(text)))
}

fn parse_persona(input: &str) -> IResult<&str, Directive> {
    let (input, text) = parse_text_directive("persona:", input)?;
    Ok((input, Directive::SetPersona(text)))
}

fn parse_speed(input: &str) -> IResult<&str, Directive> {
    let (input, _) = tag("@")(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = tag("speed:")(input)?;
    let (input, _) = space0(input)?;
    let (input, value) = parse_float(input)?;
    Ok((input, Directive::SetSpeed(value)))
}

fn parse_directive(input: &str) -> IResult<&str, Directive> {
    alt((
        parse_title,
        parse_description,
        parse_language,
        parse_persona,
        parse_speed,
    ))
    .parse(input)
}

fn parse_comment(input: &str) -> IResult<&str, ()> {
    let (input, _) = char('#')(input)?;
    let (input, _) = not_line_ending(input)?;
    Ok((input, ()))
}

fn parse_explain(input: &str) -> IResult<&str, Directive> {
    let (input, _) = char('>')(input)?;
    let (input, _) = space0(input)?;
    let (input, text) = not_line_ending(input)?;
    Ok((input, Directive::Explain(text.trim().to_string())))
}

fn parse_special_key(input: &str) -> IResult<&str, String> {
    let (input, _) = char('<')(input)?;
    let (input, key_name) = take_until(">")(input)?;
    let (input, _) = char('>')(input)?;

    let text = match key_name {
        "tab" => "\t".to_string(),
        "space" => " ".to_string(),
        "nl" | "ret" | "enter" => "\n".to_string(),
        // Generics, JSX and comparisons are code, not keys
        _ => format!("<{}>", key_name),
    };

    Ok((input, text))
}

fn parse_code_content(input: &str) -> String {
    let mut result = String::new();
    let mut remaining = input;

    while let Some(c) = remaining.chars().next() {
        if remaining.starts_with("\\<") || remaining.starts_with("\\>") {
            result.push_str(&remaining[1..2]);
            remaining = &remaining[2..];
        } else if c == '<' {
            match parse_special_key(remaining) {
                Ok((rest, text)) => {
                    result.push_str(&text);
                    remaining = rest;
                }
                Err(_) => {
                    result.push('<');
                    remaining = &remaining[1..];
                }
            }
        } else {
            result.push(c);
            remaining = &remaining[c.len_utf8()..];
        }
    }

    result
}

fn parse_code(input: &str) -> IResult<&str, Directive> {
    let (input, _) = char('$')(input)?;
    // Only the separator space goes; the rest is indentation
    let (input, _) = opt(char(' ')).parse(input)?;
    let (input, text) = not_line_ending(input)?;

    Ok((input, Directive::Code(parse_code_content(text))))
}

fn parse_line(input: &str) -> IResult<&str, Option<Directive>> {
    alt((
        map(parse_directive, Some),
        value(None, parse_comment),
        map(parse_explain, Some),
        map(parse_code, Some),
    ))
    .parse(input)
}

pub fn parse_directives(input: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();

    for (line_num, line) in input.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim_start();

        if trimmed.is_empty() {
            continue;
        }

        match parse_line(trimmed) {
            Ok((remaining, Some(directive))) => {
                if !remaining.trim().is_empty() {
                    return Err(TyperError::parse(format!(
                        "Line {}: Unexpected text after directive: '{}'",
                        line_num + 1,
                        remaining
                    )));
                }
                directives.push(directive);
            }
            Ok((_, None)) => {}
            Err(e) => {
                return Err(TyperError::parse(format!(
                    "Line {}: Parse error: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }

    Ok(directives)
}

/// Parse a full demo script into a [`GuidedDemo`].
pub fn parse_demo(input: &str) -> Result<GuidedDemo> {
    let mut title = None;
    let mut description = String::new();
    let mut language = None;
    let mut persona = None;
    let mut speed = None;
    let mut steps: Vec<DemoStep> = Vec::new();
    // Code lines of the open step, joined with newlines when the step closes
    let mut code_lines: Vec<String> = Vec::new();

    for directive in parse_directives(input)? {
        match directive {
            Directive::SetTitle(text) => title = Some(text),
            Directive::SetDescription(text) => description = text,
            Directive::SetLanguage(text) => {
                language = Some(text.parse::<Language>().map_err(TyperError::parse)?)
            }
            Directive::SetPersona(name) => persona = Some(name),
            Directive::SetSpeed(value) => {
                if !SPEED_RANGE.contains(&value) {
                    return Err(TyperError::parse(format!(
                        "speed {value} is outside {:.1}x-{:.1}x",
                        SPEED_RANGE.start(),
                        SPEED_RANGE.end()
                    )));
                }
                speed = Some(value);
            }
            Directive::Explain(text) => {
                if let Some(step) = steps.last_mut() {
                    step.code = code_lines.join("\n");
                }
                code_lines.clear();
                steps.push(DemoStep {
                    code: String::new(),
                    explanation: text,
                });
            }
            Directive::Code(text) => {
                if steps.is_empty() {
                    return Err(TyperError::parse(
                        "code line before the first '>' explanation",
                    ));
                }
                code_lines.push(text);
            }
        }
    }

    let Some(last) = steps.last_mut() else {
        return Err(TyperError::parse("demo script has no steps"));
    };
    last.code = code_lines.join("\n");

    let language = language.unwrap_or_else(|| {
        let full: String = steps.iter().map(|s| s.code.as_str()).collect();
        Language::detect(&full)
    });

    Ok(GuidedDemo {
        title: title.unwrap_or_else(|| "Untitled demo".to_string()),
        description,
        language,
        persona,
        speed,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speed() {
        let input = "@ speed:1.3";
        let result = parse_speed(input);
        assert!(result.is_ok());
        let (_, directive) = result.unwrap();
        assert_eq!(directive, Directive::SetSpeed(1.3));
    }

    #[test]
    fn test_parse_title() {
        let (_, directive) = parse_title("@ title: Building a React Component").unwrap();
        assert_eq!(
            directive,
            Directive::SetTitle("Building a React Component".to_string())
        );
    }

    #[test]
    fn test_parse_explain() {
        let (_, directive) = parse_explain(">   First, we import React").unwrap();
        assert_eq!(
            directive,
            Directive::Explain("First, we import React".to_string())
        );
    }

    #[test]
    fn test_parse_code_keeps_indentation() {
        let (_, directive) = parse_code("$     return [];").unwrap();
        assert_eq!(directive, Directive::Code("    return [];".to_string()));
    }

    #[test]
    fn test_parse_empty_code_line() {
        let (_, directive) = parse_code("$").unwrap();
        assert_eq!(directive, Directive::Code(String::new()));
    }

    #[test]
    fn test_parse_code_with_special_keys() {
        let (_, directive) = parse_code("$ <tab>x<space>=<space>1").unwrap();
        assert_eq!(directive, Directive::Code("\tx = 1".to_string()));
    }

    #[test]
    fn test_parse_code_leaves_generics_and_jsx_alone() {
        let (_, directive) = parse_code("$ useState<any>(null); <div className=\"a\">").unwrap();
        assert_eq!(
            directive,
            Directive::Code("useState<any>(null); <div className=\"a\">".to_string())
        );

        let (_, directive) = parse_code("$ for (i = 0; i < n; i++) {").unwrap();
        assert_eq!(
            directive,
            Directive::Code("for (i = 0; i < n; i++) {".to_string())
        );
    }

    #[test]
    fn test_parse_code_with_escaped() {
        let (_, directive) = parse_code(r"$ \<tab\>").unwrap();
        assert_eq!(directive, Directive::Code("<tab>".to_string()));
    }

    #[test]
    fn test_parse_demo() {
        let input = r#"@ title: Tiny demo
@ description: Two steps
@ language: javascript
@ persona: senior
@ speed: 1.5
# comment
> Declare
$ let x = 1;
> Print
$
$ console.log(x);
"#;
        let demo = parse_demo(input).unwrap();
        assert_eq!(demo.title, "Tiny demo");
        assert_eq!(demo.description, "Two steps");
        assert_eq!(demo.language, Language::JavaScript);
        assert_eq!(demo.persona.as_deref(), Some("senior"));
        assert_eq!(demo.speed, Some(1.5));
        assert_eq!(demo.steps.len(), 2);
        assert_eq!(demo.steps[0].code, "let x = 1;");
        assert_eq!(demo.steps[1].code, "\nconsole.log(x);");
        assert_eq!(demo.steps[1].explanation, "Print");
        assert_eq!(demo.full_text(), "let x = 1;\nconsole.log(x);");
    }

    #[test]
    fn test_code_before_explanation_is_rejected() {
        let err = parse_demo("$ let x = 1;").unwrap_err();
        assert!(err.to_string().contains("before the first"));
    }

    #[test]
    fn test_demo_without_steps_is_rejected() {
        assert!(parse_demo("@ title: Nothing\n# here").is_err());
    }

    #[test]
    fn test_unknown_line_reports_line_number() {
        let err = parse_demo("> ok\n$ x\n! what").unwrap_err();
        assert!(err.to_string().contains("Line 3"));
    }

    #[test]
    fn test_bad_speed_is_rejected() {
        assert!(parse_demo("@ speed: 9\n> a\n$ b").is_err());
    }

    #[test]
    fn test_language_is_detected_when_missing() {
        let demo = parse_demo("> a\n$ def main():\n$     pass").unwrap();
        assert_eq!(demo.language, Language::Python);
    }
}

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

//! Guided demos
//!
//! A guided demo types its steps one after another into the same document. After each
//! step it stops and waits for a single continue signal before typing the next one.

use std::time::Duration;
use tracing::info;

use crate::document::{Decorations, Document};
use crate::error::{Result, TyperError};
use crate::parser;
use crate::scheduler::{Session, Tick};
use crate::types::{GuidedDemo, Script, TypingConfig};

const BUILTIN_DEMOS: [(&str, &str); 2] = [
    (
        "react-component",
        include_str!("../demos/react_component.demo"),
    ),
    ("two-sum", include_str!("../demos/two_sum.demo")),
];

pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_DEMOS.iter().map(|(name, _)| *name)
}

pub fn builtin(name: &str) -> Result<GuidedDemo> {
    let wanted = name.trim().to_ascii_lowercase();
    let (_, source) = BUILTIN_DEMOS
        .iter()
        .find(|(n, _)| *n == wanted)
        .ok_or_else(|| {
            let known: Vec<&str> = builtin_names().collect();
            TyperError::input(format!(
                "unknown demo '{name}' (expected one of: {})",
                known.join(", ")
            ))
        })?;
    parser::parse_demo(source)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoState {
    NotStarted,
    StepRunning(usize),
    AwaitingContinue(usize),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoEvent {
    /// Wait this long, then call `fire`.
    Armed(Duration),
    /// Step `step` (zero-based) is typed; waiting for `continue_signal`.
    AwaitingContinue { step: usize, total: usize },
    Finished,
    /// The call did not apply in the current state.
    Ignored,
}

pub struct DemoSequencer {
    demo: GuidedDemo,
    session: Session,
    state: DemoState,
}

impl DemoSequencer {
    pub fn new(demo: GuidedDemo, config: TypingConfig) -> Self {
        Self {
            demo,
            session: Session::new(Script::default(), config),
            state: DemoState::NotStarted,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.session = self.session.with_seed(seed);
        self
    }

    pub fn demo(&self) -> &GuidedDemo {
        &self.demo
    }

    pub fn state(&self) -> DemoState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn set_config(&mut self, config: TypingConfig) {
        self.session.set_config(config);
    }

    /// Clear the document and type the first step.
    pub fn start<D: Document + Decorations>(&mut self, doc: &mut D) -> DemoEvent {
        if matches!(
            self.state,
            DemoState::StepRunning(_) | DemoState::AwaitingContinue(_)
        ) {
            return DemoEvent::Ignored;
        }

        info!(title = %self.demo.title, steps = self.demo.steps.len(), "guided demo started");
        self.session.reset(doc);
        self.run_step(0, doc)
    }

    /// Run the armed action of the current step.
    pub fn fire<D: Document + Decorations>(&mut self, doc: &mut D) -> DemoEvent {
        if !matches!(self.state, DemoState::StepRunning(_)) {
            return DemoEvent::Ignored;
        }
        let tick = self.session.fire(doc);
        self.on_tick(tick)
    }

    /// Move past a completed step. Ignored unless a step is waiting.
    pub fn continue_signal<D: Document + Decorations>(&mut self, doc: &mut D) -> DemoEvent {
        match self.state {
            DemoState::AwaitingContinue(step) => self.run_step(step + 1, doc),
            _ => DemoEvent::Ignored,
        }
    }

    /// Abandon the demo, dropping any armed keystroke and any pending wait.
    pub fn cancel(&mut self) {
        self.session.stop();
        if self.state != DemoState::NotStarted {
            info!(title = %self.demo.title, "guided demo cancelled");
        }
        self.state = DemoState::NotStarted;
    }

    /// Explanation of the step being typed or just typed.
    pub fn explanation(&self) -> Option<&str> {
        match self.state {
            DemoState::StepRunning(step) | DemoState::AwaitingContinue(step) => self
                .demo
                .steps
                .get(step)
                .map(|s| s.explanation.as_str()),
            _ => None,
        }
    }

    pub fn prompt(&self) -> Option<String> {
        match self.state {
            DemoState::AwaitingContinue(step) => Some(format!(
                "Step {} of {} complete. Press any key to continue...",
                step + 1,
                self.demo.steps.len()
            )),
            _ => None,
        }
    }

    fn run_step<D: Document + Decorations>(&mut self, step: usize, doc: &mut D) -> DemoEvent {
        let Some(code) = self.demo.steps.get(step).map(|s| Script::new(&s.code)) else {
            self.state = DemoState::Finished;
            info!(title = %self.demo.title, "guided demo finished");
            return DemoEvent::Finished;
        };

        self.state = DemoState::StepRunning(step);
        info!(
            step = step + 1,
            total = self.demo.steps.len(),
            explanation = %self.demo.steps[step].explanation,
            "demo step started"
        );
        let tick = self.session.start_appending(code, doc);
        self.on_tick(tick)
    }

    fn on_tick(&mut self, tick: Tick) -> DemoEvent {
        match (tick, self.state) {
            (Tick::Armed(delay), _) => DemoEvent::Armed(delay),
            (Tick::Finished | Tick::Idle, DemoState::StepRunning(step)) => {
                self.state = DemoState::AwaitingContinue(step);
                DemoEvent::AwaitingContinue {
                    step,
                    total: self.demo.steps.len(),
                }
            }
            _ => DemoEvent::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Buffer;
    use crate::persona;
    use crate::types::{DemoStep, Language, PersonaProfile};

    fn demo(steps: &[(&str, &str)]) -> GuidedDemo {
        GuidedDemo {
            title: "Test".to_string(),
            description: String::new(),
            language: Language::JavaScript,
            persona: None,
            speed: None,
            steps: steps
                .iter()
                .map(|(code, explanation)| DemoStep {
                    code: code.to_string(),
                    explanation: explanation.to_string(),
                })
                .collect(),
        }
    }

    fn config(typo_chance: f64) -> TypingConfig {
        TypingConfig::for_persona(PersonaProfile {
            typo_chance,
            ..persona::default_persona()
        })
    }

    /// Fire until the current step stops asking for time.
    fn run_step(seq: &mut DemoSequencer, doc: &mut Buffer, mut event: DemoEvent) -> DemoEvent {
        while let DemoEvent::Armed(_) = event {
            event = seq.fire(doc);
        }
        event
    }

    #[test]
    fn test_steps_accumulate_and_wait_for_continue() {
        let steps = [("let a;", "one"), ("\nlet b;", "two"), ("\nlet c;", "three")];
        let mut seq = DemoSequencer::new(demo(&steps), config(0.3)).with_seed(11);
        let mut doc = Buffer::new();
        doc.insert_at_end("stale text");

        let mut event = seq.start(&mut doc);
        let mut expected = String::new();
        for (k, (code, explanation)) in steps.iter().enumerate() {
            assert_eq!(seq.state(), DemoState::StepRunning(k));
            assert_eq!(seq.explanation(), Some(*explanation));

            event = run_step(&mut seq, &mut doc, event);
            expected.push_str(code);
            assert_eq!(event, DemoEvent::AwaitingContinue { step: k, total: 3 });
            assert_eq!(doc.as_str(), expected);

            // Nothing moves until the signal arrives
            assert_eq!(seq.fire(&mut doc), DemoEvent::Ignored);
            assert_eq!(seq.state(), DemoState::AwaitingContinue(k));
            assert_eq!(doc.as_str(), expected);

            event = seq.continue_signal(&mut doc);
        }

        assert_eq!(event, DemoEvent::Finished);
        assert_eq!(seq.state(), DemoState::Finished);
        assert_eq!(seq.explanation(), None);
        assert_eq!(doc.as_str(), "let a;\nlet b;\nlet c;");
    }

    #[test]
    fn test_continue_during_typing_is_ignored() {
        let mut seq = DemoSequencer::new(demo(&[("abc", "x"), ("def", "y")]), config(0.0));
        let mut doc = Buffer::new();
        seq.start(&mut doc);
        assert_eq!(seq.continue_signal(&mut doc), DemoEvent::Ignored);
        assert_eq!(seq.state(), DemoState::StepRunning(0));
        assert_eq!(doc.as_str(), "a");
    }

    #[test]
    fn test_prompt_counts_from_one() {
        let mut seq = DemoSequencer::new(demo(&[("a", "x"), ("b", "y")]), config(0.0));
        let mut doc = Buffer::new();
        let event = seq.start(&mut doc);
        assert_eq!(seq.prompt(), None);
        run_step(&mut seq, &mut doc, event);
        assert_eq!(
            seq.prompt().as_deref(),
            Some("Step 1 of 2 complete. Press any key to continue...")
        );
    }

    #[test]
    fn test_cancel_drops_pending_work() {
        let mut seq = DemoSequencer::new(demo(&[("abcdef", "x")]), config(0.0));
        let mut doc = Buffer::new();
        seq.start(&mut doc);
        seq.cancel();
        assert_eq!(seq.state(), DemoState::NotStarted);
        assert!(seq.session().armed().is_none());
        assert_eq!(seq.fire(&mut doc), DemoEvent::Ignored);
        assert_eq!(seq.continue_signal(&mut doc), DemoEvent::Ignored);
        assert_eq!(doc.as_str(), "a");
    }

    #[test]
    fn test_restart_after_finish() {
        let mut seq = DemoSequencer::new(demo(&[("ab", "x")]), config(0.0));
        let mut doc = Buffer::new();
        let event = seq.start(&mut doc);
        run_step(&mut seq, &mut doc, event);
        assert_eq!(seq.continue_signal(&mut doc), DemoEvent::Finished);

        let event = seq.start(&mut doc);
        assert!(matches!(event, DemoEvent::Armed(_)));
        assert_eq!(doc.as_str(), "a");
    }

    #[test]
    fn test_start_while_running_is_ignored() {
        let mut seq = DemoSequencer::new(demo(&[("ab", "x")]), config(0.0));
        let mut doc = Buffer::new();
        seq.start(&mut doc);
        assert_eq!(seq.start(&mut doc), DemoEvent::Ignored);
        assert_eq!(doc.as_str(), "a");
    }

    #[test]
    fn test_empty_demo_finishes_at_once() {
        let mut seq = DemoSequencer::new(demo(&[]), config(0.0));
        let mut doc = Buffer::new();
        assert_eq!(seq.start(&mut doc), DemoEvent::Finished);
    }

    #[test]
    fn test_builtin_demos_parse() {
        let react = builtin("react-component").unwrap();
        assert_eq!(react.title, "Building a React Component");
        assert_eq!(react.language, Language::TypeScript);
        assert_eq!(react.steps.len(), 8);
        assert_eq!(
            react.steps[0].code,
            "import React, { useState, useEffect } from 'react';"
        );
        assert_eq!(
            react.steps[1].code,
            "\ninterface UserProps {\n  userId: number;\n  showDetails?: boolean;\n}"
        );
        assert_eq!(
            react.steps[3].code,
            "\n  const [user, setUser] = useState<any>(null);\n  const [loading, setLoading] = useState<boolean>(true);"
        );
        assert_eq!(react.steps[7].code, "\n\nexport default UserProfile;");

        let two_sum = builtin("two-sum").unwrap();
        assert_eq!(two_sum.steps.len(), 9);
        assert_eq!(two_sum.language, Language::JavaScript);
        assert!(two_sum.steps[4].code.contains("for (let i = 0; i < nums.length; i++) {"));
    }

    #[test]
    fn test_unknown_builtin() {
        let err = builtin("snake").unwrap_err();
        assert!(err.to_string().contains("react-component, two-sum"));
    }
}

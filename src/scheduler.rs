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

//! Typing session state machine
//!
//! A session types one script into a document, one character at a time. Every action
//! leaves at most one follow-up armed in a single slot; whoever drives the session (a tokio
//! timer, a test, a frame loop) waits out the armed delay and calls [`Session::fire`].
//! Cancelling is just emptying the slot.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{debug, info};

use crate::document::{Decorations, Document};
use crate::timing;
use crate::types::{Script, TypingConfig};
use crate::typo::{self, Keystroke, TYPO_PLACEHOLDER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NextChar,
    // The placeholder is in the document; next step deletes it
    RealizeTypo(char),
    // The placeholder is gone; next step types the intended char
    CorrectTypo(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armed {
    pub phase: Phase,
    pub delay: Duration,
}

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Wait this long, then call `fire`.
    Armed(Duration),
    /// The script is fully typed (or the session was stopped mid-run).
    Finished,
    /// Nothing is armed.
    Idle,
}

pub struct Session {
    script: Script,
    config: TypingConfig,
    cursor: usize,
    state: SessionState,
    armed: Option<Armed>,
    rng: StdRng,
}

impl Session {
    pub fn new(script: Script, config: TypingConfig) -> Self {
        Self {
            script,
            config,
            cursor: 0,
            state: SessionState::Idle,
            armed: None,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Make every random draw of this session reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn config(&self) -> &TypingConfig {
        &self.config
    }

    pub fn armed(&self) -> Option<&Armed> {
        self.armed.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Swap persona or speed. Anything already armed keeps its delay; the next one uses this.
    pub fn set_config(&mut self, config: TypingConfig) {
        self.config = config;
    }

    /// Replace the script. A running session is reset first.
    pub fn load<D: Document + Decorations>(&mut self, script: Script, doc: &mut D) {
        if self.is_running() {
            self.reset(doc);
        }
        self.script = script;
        self.cursor = 0;
    }

    /// Clear the document and type the script from the beginning.
    ///
    /// Does nothing while already running.
    pub fn start<D: Document + Decorations>(&mut self, doc: &mut D) -> Tick {
        if self.is_running() {
            return self.pending();
        }

        self.armed = None;
        self.cursor = 0;
        doc.clear();
        self.state = SessionState::Running;
        info!(
            persona = self.config.persona.display_name,
            speed = self.config.speed,
            chars = self.script.len(),
            "animation started"
        );
        self.type_next(doc)
    }

    /// Type `script` after whatever the document already holds.
    pub fn start_appending<D: Document + Decorations>(&mut self, script: Script, doc: &mut D) -> Tick {
        self.armed = None;
        self.script = script;
        self.cursor = 0;
        self.state = SessionState::Running;
        debug!(chars = self.script.len(), "appending script");
        self.type_next(doc)
    }

    /// Run the armed action.
    pub fn fire<D: Document + Decorations>(&mut self, doc: &mut D) -> Tick {
        let Some(armed) = self.armed.take() else {
            return Tick::Idle;
        };

        match armed.phase {
            Phase::NextChar => self.type_next(doc),
            Phase::RealizeTypo(intended) => {
                doc.delete_last();
                doc.set_cursor_marker(doc.len());
                self.arm(Phase::CorrectTypo(intended), typo::correction_delay(&self.config))
            }
            Phase::CorrectTypo(intended) => {
                self.commit(intended, doc);
                let delay = timing::delay(intended, self.config.speed, self.config.mode, &mut self.rng);
                self.arm(Phase::NextChar, delay)
            }
        }
    }

    /// Cancel anything armed and leave the document as it is.
    pub fn stop(&mut self) {
        self.armed = None;
        if self.is_running() {
            self.state = SessionState::Idle;
        }
    }

    /// Cancel anything armed, rewind and clear the document. Safe in any state.
    pub fn reset<D: Document + Decorations>(&mut self, doc: &mut D) {
        self.armed = None;
        self.state = SessionState::Idle;
        self.cursor = 0;
        doc.clear();
        doc.set_active_line(0);
        doc.set_cursor_marker(0);
    }

    fn pending(&self) -> Tick {
        match self.armed {
            Some(armed) => Tick::Armed(armed.delay),
            None => Tick::Idle,
        }
    }

    fn type_next<D: Document + Decorations>(&mut self, doc: &mut D) -> Tick {
        let next = if self.is_running() {
            self.script.get(self.cursor)
        } else {
            None
        };
        let Some(intended) = next else {
            if self.is_running() {
                self.state = SessionState::Completed;
                debug!(chars = self.cursor, "animation finished");
            }
            self.armed = None;
            return Tick::Finished;
        };

        doc.set_active_line(doc.last_line());
        doc.set_cursor_marker(doc.len());

        match typo::decide(self.config.typo_chance(), &mut self.rng) {
            Keystroke::Typo => {
                let mut buf = [0u8; 4];
                doc.insert_at_end(TYPO_PLACEHOLDER.encode_utf8(&mut buf));
                doc.set_cursor_marker(doc.len());
                self.arm(Phase::RealizeTypo(intended), typo::realization_delay(&self.config))
            }
            Keystroke::Clean => {
                self.commit(intended, doc);
                let delay = timing::delay(intended, self.config.speed, self.config.mode, &mut self.rng);
                self.arm(Phase::NextChar, delay)
            }
        }
    }

    fn commit<D: Document + Decorations>(&mut self, c: char, doc: &mut D) {
        let mut buf = [0u8; 4];
        doc.insert_at_end(c.encode_utf8(&mut buf));
        doc.set_cursor_marker(doc.len());
        self.cursor += 1;
    }

    fn arm(&mut self, phase: Phase, delay: Duration) -> Tick {
        debug_assert!(self.armed.is_none(), "a continuation is already armed");
        self.armed = Some(Armed { phase, delay });
        Tick::Armed(delay)
    }
}

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

//! Real-time playback of typing sessions
//!
//! Waits out each armed delay on the tokio clock and listens for user signals meanwhile.

use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::demo::{DemoEvent, DemoSequencer};
use crate::document::{Buffer, Decorations, Document};
use crate::scheduler::{Session, Tick};
use crate::types::{PersonaProfile, SPEED_RANGE, Script, TypingConfig};

/// Speed change for one `+`/`-` press.
pub const SPEED_STEP: f64 = 0.1;

/// Input from the user while something is playing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Advance a guided demo. Ignored while typing.
    Continue,
    Stop,
    Persona(PersonaProfile),
    SpeedDelta(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Stopped,
}

/// Text drawn around the code view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub title: Option<String>,
    pub explanation: Option<String>,
    pub prompt: Option<String>,
    pub status: String,
}

/// A document that can also show an [`Overlay`].
pub trait Editor: Document + Decorations {
    fn present(&mut self, overlay: &Overlay) -> Result<()>;
}

impl Editor for Buffer {
    fn present(&mut self, _overlay: &Overlay) -> Result<()> {
        Ok(())
    }
}

enum Wake {
    Elapsed,
    Continue,
    Stop,
    Reconfigured,
    Closed,
}

/// Sends [`Signal::Stop`] on Ctrl-C. Only one handler can be installed per process.
pub fn stop_on_ctrlc(signals: UnboundedSender<Signal>) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("received Ctrl-C, stopping playback");
        let _ = signals.send(Signal::Stop);
    })?;
    Ok(())
}

pub struct PlaybackEngine {
    config: TypingConfig,
    signals: UnboundedReceiver<Signal>,
    seed: Option<u64>,
}

impl PlaybackEngine {
    pub fn new(config: TypingConfig, signals: UnboundedReceiver<Signal>) -> Self {
        Self {
            config,
            signals,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &TypingConfig {
        &self.config
    }

    fn status(&self) -> String {
        format!(
            "{} | {:.1}x | 1-4 persona  +/- speed  Ctrl-C quit",
            self.config.persona.display_name, self.config.speed
        )
    }

    fn switch_persona(&mut self, persona: PersonaProfile) {
        self.config.persona = persona;
        self.config.speed = persona.speed_multiplier;
        info!(persona = persona.name, "persona switched");
    }

    fn adjust_speed(&mut self, delta: f64) {
        let speed = ((self.config.speed + delta) * 10.0).round() / 10.0;
        self.config.speed = speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
        debug!(speed = self.config.speed, "speed adjusted");
    }

    /// Wait until `deadline`, or for a continue signal when there is none.
    async fn wait(&mut self, deadline: Option<Instant>) -> Wake {
        loop {
            let signal = match deadline {
                Some(deadline) => tokio::select! {
                    () = sleep_until(deadline) => return Wake::Elapsed,
                    Some(signal) = self.signals.recv() => signal,
                },
                None => match self.signals.recv().await {
                    Some(signal) => signal,
                    None => return Wake::Closed,
                },
            };

            match signal {
                Signal::Stop => return Wake::Stop,
                Signal::Continue if deadline.is_none() => return Wake::Continue,
                Signal::Continue => debug!("continue ignored while typing"),
                Signal::Persona(persona) => {
                    self.switch_persona(persona);
                    return Wake::Reconfigured;
                }
                Signal::SpeedDelta(delta) => {
                    self.adjust_speed(delta);
                    return Wake::Reconfigured;
                }
            }
        }
    }

    /// Type `script` into `editor` in real time.
    pub async fn play<E: Editor>(&mut self, script: Script, editor: &mut E) -> Result<Outcome> {
        let mut session = Session::new(script, self.config);
        if let Some(seed) = self.seed {
            session = session.with_seed(seed);
        }

        let mut tick = session.start(editor);
        loop {
            let delay = match tick {
                Tick::Armed(delay) => delay,
                Tick::Finished => {
                    editor.present(&self.overlay(None, None, None))?;
                    return Ok(Outcome::Completed);
                }
                Tick::Idle => return Ok(Outcome::Stopped),
            };

            let deadline = Instant::now() + delay;
            loop {
                editor.present(&self.overlay(None, None, None))?;
                match self.wait(Some(deadline)).await {
                    Wake::Elapsed => break,
                    Wake::Stop => {
                        session.stop();
                        return Ok(Outcome::Stopped);
                    }
                    Wake::Reconfigured => session.set_config(self.config),
                    Wake::Continue | Wake::Closed => {}
                }
            }
            tick = session.fire(editor);
        }
    }

    /// Run a guided demo, pausing after every step until a continue signal arrives.
    pub async fn play_demo<E: Editor>(
        &mut self,
        sequencer: &mut DemoSequencer,
        editor: &mut E,
    ) -> Result<Outcome> {
        let title = Some(sequencer.demo().title.clone());
        let mut event = sequencer.start(editor);

        loop {
            let deadline = match event {
                DemoEvent::Armed(delay) => Some(Instant::now() + delay),
                DemoEvent::AwaitingContinue { .. } => None,
                DemoEvent::Finished => {
                    editor.present(&self.overlay(title.clone(), None, None))?;
                    return Ok(Outcome::Completed);
                }
                DemoEvent::Ignored => {
                    debug!("demo did not start");
                    return Ok(Outcome::Stopped);
                }
            };

            let wake = loop {
                editor.present(&self.overlay(
                    title.clone(),
                    sequencer.explanation().map(str::to_string),
                    sequencer.prompt(),
                ))?;
                match self.wait(deadline).await {
                    Wake::Reconfigured => sequencer.set_config(self.config),
                    other => break other,
                }
            };

            event = match wake {
                Wake::Elapsed => sequencer.fire(editor),
                Wake::Continue => sequencer.continue_signal(editor),
                Wake::Stop | Wake::Closed => {
                    sequencer.cancel();
                    return Ok(Outcome::Stopped);
                }
                Wake::Reconfigured => continue,
            };
        }
    }

    /// Block until the user continues or stops. Used to keep a finished view on screen.
    pub async fn hold<E: Editor>(&mut self, editor: &mut E, prompt: &str) -> Result<()> {
        loop {
            editor.present(&self.overlay(None, None, Some(prompt.to_string())))?;
            match self.wait(None).await {
                Wake::Reconfigured => {}
                _ => return Ok(()),
            }
        }
    }

    fn overlay(
        &self,
        title: Option<String>,
        explanation: Option<String>,
        prompt: Option<String>,
    ) -> Overlay {
        Overlay {
            title,
            explanation,
            prompt,
            status: self.status(),
        }
    }
}

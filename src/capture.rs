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

//! Frame capture for video export
//!
//! Typing is locked to the output frame rate: every admitted display tick inserts one
//! character and captures one frame, so a script of `L` characters always yields `L + 1`
//! frames (the last one is the finished document).

use std::time::Duration;

use tracing::{debug, warn};

use crate::document::{Buffer, Decorations, Document};
use crate::error::Result;
use crate::render::{FrameRenderer, FrameView};
use crate::sink::VideoSink;
use crate::types::Script;

pub const EXPORT_FPS: u32 = 30;
pub const DISPLAY_HZ: u32 = 60;

fn nanos(n: u64, per_second: u32) -> Duration {
    Duration::from_nanos(n * 1_000_000_000 / u64::from(per_second.max(1)))
}

/// Admits ticks at most once per frame interval.
#[derive(Debug, Clone)]
pub struct FrameGate {
    interval: Duration,
    last: Option<Duration>,
}

impl FrameGate {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: nanos(1, fps),
            last: None,
        }
    }

    /// The first tick is always admitted.
    pub fn admit(&mut self, now: Duration) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

/// Source of display tick timestamps. Each call returns a later time than the last.
pub trait FrameClock {
    fn next_tick(&mut self) -> Duration;
}

/// Simulated display refresh at a fixed rate, starting at zero.
#[derive(Debug, Clone)]
pub struct DisplayClock {
    hz: u32,
    tick: u64,
}

impl DisplayClock {
    pub fn new(hz: u32) -> Self {
        Self { hz: hz.max(1), tick: 0 }
    }
}

impl Default for DisplayClock {
    fn default() -> Self {
        Self::new(DISPLAY_HZ)
    }
}

impl FrameClock for DisplayClock {
    fn next_tick(&mut self) -> Duration {
        let now = nanos(self.tick, self.hz);
        self.tick += 1;
        now
    }
}

pub struct Capture {
    script: Script,
    buffer: Buffer,
    file_name: String,
}

impl Capture {
    pub fn new(script: Script, file_name: impl Into<String>) -> Self {
        Self {
            script,
            buffer: Buffer::new(),
            file_name: file_name.into(),
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Type the script into a fresh buffer, pushing one frame per admitted tick.
    ///
    /// Returns the number of frames pushed. `progress` receives `typed / total * 100`
    /// after each frame and exactly `100` after the final one.
    pub fn run<C, R, S>(
        &mut self,
        clock: &mut C,
        renderer: &mut R,
        sink: &mut S,
        mut progress: impl FnMut(f64),
    ) -> Result<u64>
    where
        C: FrameClock + ?Sized,
        R: FrameRenderer + ?Sized,
        S: VideoSink + ?Sized,
    {
        self.buffer.clear();
        self.buffer.set_active_line(0);
        self.buffer.set_cursor_marker(0);

        let total = self.script.len();
        let mut gate = FrameGate::new(EXPORT_FPS);
        let mut frame_index = 0u64;
        let mut typed = 0;

        while let Some(c) = self.script.get(typed) {
            let now = clock.next_tick();
            if !gate.admit(now) {
                continue;
            }

            self.buffer.insert_at_end(c.encode_utf8(&mut [0; 4]));
            let last_line = self.buffer.last_line();
            self.buffer.set_active_line(last_line);
            let len = self.buffer.len();
            self.buffer.set_cursor_marker(len);
            typed += 1;

            self.capture(renderer, sink, frame_index, false)?;
            frame_index += 1;
            progress(typed as f64 / total as f64 * 100.0);
        }

        self.capture(renderer, sink, frame_index, true)?;
        frame_index += 1;
        progress(100.0);

        debug!(frames = frame_index, chars = total, "capture finished");
        Ok(frame_index)
    }

    fn capture<R, S>(
        &self,
        renderer: &mut R,
        sink: &mut S,
        frame_index: u64,
        is_final: bool,
    ) -> Result<()>
    where
        R: FrameRenderer + ?Sized,
        S: VideoSink + ?Sized,
    {
        let view = FrameView {
            buffer: &self.buffer,
            file_name: &self.file_name,
            frame_index,
            fps: EXPORT_FPS,
            is_final,
        };
        let frame = match renderer.render(&view) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(frame = frame_index, "styled render failed, using plain frame: {e}");
                renderer.render_plain(&view)
            }
        };
        sink.push_frame(&frame)
    }
}

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

//! Video sinks
//!
//! A sink receives rendered frames in order between `start` and `stop`. The ffmpeg sink
//! treats the encoder as an opaque process fed raw RGBA frames on stdin.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::str::FromStr;
use std::thread::JoinHandle;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{Result, TyperError};

pub const DEFAULT_OUTPUT: &str = "code-animation.mp4";
pub const DEFAULT_FRAMES_DIR: &str = "code-animation-frames";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_bps: u64,
}

/// What a finished sink produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    /// File or directory written, `None` for in-memory sinks.
    pub path: Option<PathBuf>,
    pub frames: u64,
}

pub trait VideoSink {
    fn start(&mut self, config: SinkConfig) -> Result<()>;
    fn push_frame(&mut self, frame: &RgbaImage) -> Result<()>;
    fn stop(&mut self) -> Result<VideoArtifact>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    #[default]
    Ffmpeg,
    PngSequence,
}

impl SinkKind {
    pub fn default_output(&self) -> PathBuf {
        match self {
            SinkKind::Ffmpeg => PathBuf::from(DEFAULT_OUTPUT),
            SinkKind::PngSequence => PathBuf::from(DEFAULT_FRAMES_DIR),
        }
    }

    pub fn open(&self, output: impl Into<PathBuf>) -> Box<dyn VideoSink> {
        match self {
            SinkKind::Ffmpeg => Box::new(FfmpegSink::new(output)),
            SinkKind::PngSequence => Box::new(PngSequenceSink::new(output)),
        }
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" | "mp4" => Ok(SinkKind::Ffmpeg),
            "png" | "frames" => Ok(SinkKind::PngSequence),
            other => Err(format!("unknown sink '{other}' (expected mp4 or png)")),
        }
    }
}

fn check_frame(config: &SinkConfig, frame: &RgbaImage) -> Result<()> {
    if frame.dimensions() != (config.width, config.height) {
        return Err(TyperError::sink(format!(
            "frame size mismatch: got {}x{}, expected {}x{}",
            frame.width(),
            frame.height(),
            config.width,
            config.height
        )));
    }
    Ok(())
}

/// Keeps frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    config: Option<SinkConfig>,
    frames: Vec<RgbaImage>,
    stopped: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.config
    }

    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl VideoSink for MemorySink {
    fn start(&mut self, config: SinkConfig) -> Result<()> {
        self.config = Some(config);
        self.frames.clear();
        self.stopped = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| TyperError::sink("memory sink not started"))?;
        check_frame(config, frame)?;
        self.frames.push(frame.clone());
        Ok(())
    }

    fn stop(&mut self) -> Result<VideoArtifact> {
        if self.config.take().is_none() {
            return Err(TyperError::sink("memory sink not started"));
        }
        self.stopped = true;
        Ok(VideoArtifact {
            path: None,
            frames: self.frames.len() as u64,
        })
    }
}

/// Writes `frame_00000.png`, `frame_00001.png`, ... into a directory.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    config: Option<SinkConfig>,
    frames: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: None,
            frames: 0,
        }
    }
}

impl VideoSink for PngSequenceSink {
    fn start(&mut self, config: SinkConfig) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            TyperError::sink(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        self.config = Some(config);
        self.frames = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| TyperError::sink("png sink not started"))?;
        check_frame(config, frame)?;
        let path = self.dir.join(format!("frame_{:05}.png", self.frames));
        frame.save(&path)?;
        self.frames += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<VideoArtifact> {
        if self.config.take().is_none() {
            return Err(TyperError::sink("png sink not started"));
        }
        Ok(VideoArtifact {
            path: Some(self.dir.clone()),
            frames: self.frames,
        })
    }
}

/// Streams raw RGBA frames into the system `ffmpeg`, encoding H.264 MP4.
pub struct FfmpegSink {
    output: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    config: Option<SinkConfig>,
    frames: u64,
}

impl FfmpegSink {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            child: None,
            stdin: None,
            stderr_drain: None,
            config: None,
            frames: 0,
        }
    }

    fn command(&self, config: &SinkConfig) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", config.width, config.height),
            "-r",
            &config.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-b:v",
            &config.bitrate_bps.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&self.output);
        cmd
    }
}

impl VideoSink for FfmpegSink {
    fn start(&mut self, config: SinkConfig) -> Result<()> {
        if self.child.is_some() {
            return Err(TyperError::sink("ffmpeg sink already started"));
        }
        if config.fps == 0 {
            return Err(TyperError::sink("fps must be non-zero"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(TyperError::sink("ffmpeg sink width/height must be non-zero"));
        }
        if !config.width.is_multiple_of(2) || !config.height.is_multiple_of(2) {
            return Err(TyperError::sink(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.output)?;

        if !is_ffmpeg_on_path() {
            return Err(TyperError::sink(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut child = self.command(&config).spawn().map_err(|e| {
            TyperError::sink(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TyperError::sink("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| TyperError::sink("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        debug!(output = %self.output.display(), ?config, "ffmpeg started");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.config = Some(config);
        self.frames = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| TyperError::sink("ffmpeg sink not started"))?;
        check_frame(config, frame)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TyperError::sink("ffmpeg sink is already finalized"));
        };
        stdin.write_all(frame.as_raw()).map_err(|e| {
            TyperError::sink(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<VideoArtifact> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| TyperError::sink("ffmpeg sink not started"))?;

        let status = child
            .wait()
            .map_err(|e| TyperError::sink(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| TyperError::sink("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| TyperError::sink(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        self.config = None;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(TyperError::sink(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        Ok(VideoArtifact {
            path: Some(self.output.clone()),
            frames: self.frames,
        })
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Never stopped: the encoder is killed and its partial output removed
        let Some(mut child) = self.child.take() else {
            return;
        };
        drop(self.stdin.take());
        if let Err(e) = child.kill() {
            warn!("failed to kill ffmpeg: {e}");
        }
        let _ = child.wait();
        if self.output.exists()
            && let Err(e) = fs::remove_file(&self.output)
        {
            warn!(
                "failed to remove partial output {}: {e}",
                self.output.display()
            );
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            TyperError::sink(format!(
                "failed to create output directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

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

//! Video export job
//!
//! Validates the request, drives a [`Capture`] into a sink and makes sure the sink is
//! stopped on every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::capture::{Capture, DisplayClock, EXPORT_FPS};
use crate::error::{Result, TyperError};
use crate::persona;
use crate::render::{CodeRenderer, FrameRenderer};
use crate::sink::{SinkConfig, SinkKind, VideoArtifact, VideoSink};
use crate::types::{Bitrate, Language, Resolution, Script, TypingConfig};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub persona: String,
    /// Falls back to the persona's own multiplier.
    pub speed: Option<f64>,
    pub resolution: Resolution,
    pub bitrate: Bitrate,
    /// Typed with surrounding whitespace trimmed.
    pub script: String,
    /// Title-bar language. Detected from the script when unset.
    pub language: Option<Language>,
    /// Defaults to the sink kind's artifact name.
    pub output: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub sink: SinkKind,
}

#[derive(Debug, Clone)]
pub struct ExportJob {
    script: Script,
    language: Language,
    config: TypingConfig,
    resolution: Resolution,
    bitrate: Bitrate,
    output: PathBuf,
    font: Option<PathBuf>,
    sink_kind: SinkKind,
    progress: f64,
}

impl ExportJob {
    /// Validate `options`. Nothing is started when this fails.
    pub fn new(options: ExportOptions) -> Result<Self> {
        let text = options.script.trim();
        if text.is_empty() {
            return Err(TyperError::input("nothing to export: the script is empty"));
        }

        let persona_name = if options.persona.trim().is_empty() {
            persona::default_persona().name
        } else {
            options.persona.as_str()
        };
        let mut config = TypingConfig::for_persona(persona::lookup(persona_name)?);
        if let Some(speed) = options.speed {
            config = config.with_speed(speed)?;
        }

        let output = options
            .output
            .unwrap_or_else(|| options.sink.default_output());

        Ok(Self {
            language: options.language.unwrap_or_else(|| Language::detect(text)),
            script: Script::new(text),
            config,
            resolution: options.resolution,
            bitrate: options.bitrate,
            output,
            font: options.font,
            sink_kind: options.sink,
            progress: 0.0,
        })
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn config(&self) -> &TypingConfig {
        &self.config
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn sink_config(&self) -> SinkConfig {
        let profile = self.resolution.profile();
        SinkConfig {
            width: profile.width,
            height: profile.height,
            fps: EXPORT_FPS,
            bitrate_bps: self.bitrate.bits_per_second(),
        }
    }

    pub fn open_sink(&self) -> Box<dyn VideoSink> {
        self.sink_kind.open(&self.output)
    }

    pub fn open_renderer(&self) -> Result<CodeRenderer> {
        let profile = self.resolution.profile();
        match &self.font {
            Some(path) => CodeRenderer::from_font_file(profile, path),
            None => Ok(CodeRenderer::new(profile)),
        }
    }

    /// Render every frame into `sink`. The sink is stopped whether or not rendering succeeds.
    pub fn run<S, R>(
        &mut self,
        sink: &mut S,
        renderer: &mut R,
        mut progress: impl FnMut(f64),
    ) -> Result<VideoArtifact>
    where
        S: VideoSink + ?Sized,
        R: FrameRenderer + ?Sized,
    {
        info!(
            persona = self.config.persona.name,
            speed = self.config.speed,
            resolution = %self.resolution,
            bitrate = %self.bitrate,
            chars = self.script.len(),
            output = %self.output.display(),
            "export started"
        );

        let preexisting = self.output.exists();
        self.progress = 0.0;
        let mut capture = Capture::new(self.script.clone(), self.language.file_name());
        let config = self.sink_config();
        let reported = &mut self.progress;

        let outcome = sink.start(config).and_then(|()| {
            capture.run(&mut DisplayClock::default(), renderer, sink, |p| {
                let p = p.clamp(0.0, 100.0).max(*reported);
                *reported = p;
                progress(p);
            })
        });

        let result = match outcome {
            Ok(frames) => sink.stop().inspect(|artifact| {
                info!(frames, written = artifact.frames, "export finished");
            }),
            Err(e) => {
                if let Err(stop_err) = sink.stop() {
                    warn!("failed to stop sink after export error: {stop_err}");
                }
                Err(e)
            }
        };

        if result.is_err() && !preexisting {
            discard_partial(&self.output);
        }
        result
    }
}

/// Remove a half-written artifact. Failure is logged, never fatal.
fn discard_partial(path: &Path) {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return;
    };
    if let Err(e) = removed {
        let err = TyperError::resource(format!("failed to remove {}: {e}", path.display()));
        warn!("{err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use image::RgbaImage;

    fn options(script: &str) -> ExportOptions {
        ExportOptions {
            persona: "senior".to_string(),
            resolution: Resolution::P720,
            script: script.to_string(),
            ..Default::default()
        }
    }

    /// Counts lifecycle calls and fails where told to.
    #[derive(Default)]
    struct FlakySink {
        fail_start: bool,
        fail_after: Option<usize>,
        pushed: usize,
        stops: usize,
        started: bool,
    }

    impl VideoSink for FlakySink {
        fn start(&mut self, _config: SinkConfig) -> Result<()> {
            if self.fail_start {
                return Err(TyperError::sink("encoder missing"));
            }
            self.started = true;
            Ok(())
        }

        fn push_frame(&mut self, _frame: &RgbaImage) -> Result<()> {
            if self.fail_after == Some(self.pushed) {
                return Err(TyperError::sink("pipe closed"));
            }
            self.pushed += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<VideoArtifact> {
            self.stops += 1;
            if !std::mem::take(&mut self.started) {
                return Err(TyperError::sink("not started"));
            }
            Ok(VideoArtifact {
                path: None,
                frames: self.pushed as u64,
            })
        }
    }

    #[test]
    fn test_empty_script_is_rejected() {
        for script in ["", "   \n\t  "] {
            let err = ExportJob::new(options(script)).unwrap_err();
            assert!(matches!(err, TyperError::Input(_)));
            assert!(err.is_user_facing());
        }
    }

    #[test]
    fn test_unknown_persona_and_bad_speed_are_rejected() {
        let mut opts = options("x");
        opts.persona = "intern".to_string();
        assert!(matches!(ExportJob::new(opts), Err(TyperError::Input(_))));

        let mut opts = options("x");
        opts.speed = Some(3.0);
        assert!(matches!(ExportJob::new(opts), Err(TyperError::Input(_))));
    }

    #[test]
    fn test_defaults() {
        let job = ExportJob::new(ExportOptions {
            script: "let a;".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(job.config().persona.name, "regular");
        assert_eq!(job.output(), Path::new("code-animation.mp4"));
        let cfg = job.sink_config();
        assert_eq!((cfg.width, cfg.height, cfg.fps), (3840, 2160, 30));
        assert_eq!(cfg.bitrate_bps, 50_000_000);
    }

    #[test]
    fn test_job_carries_persona_and_speed() {
        let mut opts = options("x");
        opts.speed = Some(2.0);
        let job = ExportJob::new(opts).unwrap();
        assert_eq!(job.config().persona.name, "senior");
        assert_eq!(job.config().speed, 2.0);
    }

    #[test]
    fn test_run_pushes_one_frame_per_char_plus_final() {
        let mut job = ExportJob::new(options("ab\nc")).unwrap();
        let mut sink = MemorySink::new();
        let mut renderer = job.open_renderer().unwrap();
        let mut reports = Vec::new();

        let artifact = job
            .run(&mut sink, &mut renderer, |p| reports.push(p))
            .unwrap();

        assert_eq!(artifact.frames, 5);
        assert_eq!(sink.frames().len(), 5);
        assert!(sink.is_stopped());
        assert_eq!(reports.last(), Some(&100.0));
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(job.progress(), 100.0);
    }

    #[test]
    fn test_surrounding_whitespace_is_not_typed() {
        let mut job = ExportJob::new(options("\n  let a;\n")).unwrap();
        assert_eq!(job.script().len(), 6);

        let mut sink = MemorySink::new();
        let mut renderer = job.open_renderer().unwrap();
        let artifact = job.run(&mut sink, &mut renderer, |_| {}).unwrap();
        assert_eq!(artifact.frames, 7);
        assert_eq!(sink.frames().len(), 7);
    }

    #[test]
    fn test_language_overrides_detection() {
        let script = "def main():\n    pass";
        let job = ExportJob::new(options(script)).unwrap();
        assert_eq!(job.language(), Language::Python);

        let mut opts = options(script);
        opts.language = Some(Language::TypeScript);
        let job = ExportJob::new(opts).unwrap();
        assert_eq!(job.language(), Language::TypeScript);
    }

    #[test]
    fn test_sink_is_stopped_when_push_fails() {
        let mut job = ExportJob::new(options("abcdef")).unwrap();
        let mut sink = FlakySink {
            fail_after: Some(2),
            ..Default::default()
        };
        let mut renderer = job.open_renderer().unwrap();
        let err = job.run(&mut sink, &mut renderer, |_| {}).unwrap_err();
        assert!(err.to_string().contains("pipe closed"));
        assert_eq!(sink.stops, 1);
        assert_eq!(sink.pushed, 2);
    }

    #[test]
    fn test_sink_is_stopped_when_start_fails() {
        let mut job = ExportJob::new(options("abc")).unwrap();
        let mut sink = FlakySink {
            fail_start: true,
            ..Default::default()
        };
        let mut renderer = job.open_renderer().unwrap();
        let err = job.run(&mut sink, &mut renderer, |_| {}).unwrap_err();
        assert!(err.to_string().contains("encoder missing"));
        assert_eq!(sink.stops, 1);
        assert_eq!(sink.pushed, 0);
    }

    #[test]
    fn test_failed_png_export_removes_partial_frames() {
        let dir = std::env::temp_dir().join(format!("codetyper-{}-partial", std::process::id()));
        let mut opts = options("abc");
        opts.sink = SinkKind::PngSequence;
        opts.output = Some(dir.clone());
        let mut job = ExportJob::new(opts).unwrap();

        // Renderer produces the wrong size, so the first push fails after start created the dir
        struct Wrong;
        impl FrameRenderer for Wrong {
            fn render(&mut self, _view: &crate::render::FrameView<'_>) -> Result<RgbaImage> {
                Ok(RgbaImage::new(2, 2))
            }
            fn render_plain(&mut self, _view: &crate::render::FrameView<'_>) -> RgbaImage {
                RgbaImage::new(2, 2)
            }
        }

        let mut sink = job.open_sink();
        assert!(job.run(sink.as_mut(), &mut Wrong, |_| {}).is_err());
        assert!(!dir.exists());
    }

    #[test]
    fn test_missing_font_is_resource_error() {
        let mut opts = options("x");
        opts.font = Some(PathBuf::from("/nonexistent/font.ttf"));
        let job = ExportJob::new(opts).unwrap();
        assert!(matches!(job.open_renderer(), Err(TyperError::Resource(_))));
    }
}

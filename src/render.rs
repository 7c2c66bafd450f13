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

//! Frame rasterizer for video export
//!
//! Draws an editor-like frame: title bar, gutter with line numbers, active line band,
//! highlighted code and a cursor. Glyphs come from a TTF/OTF font through `fontdue`, or
//! from solid blocks when no font is configured.

use std::collections::HashMap;
use std::path::Path;

use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use tracing::trace;

use crate::document::Buffer;
use crate::error::{Result, TyperError};
use crate::highlight::{TokenClass, tokenize_line};
use crate::types::ResolutionProfile;

const BACKGROUND: [u8; 4] = [0x1e, 0x1e, 0x1e, 0xff];
const CHROME: [u8; 4] = [0x25, 0x25, 0x26, 0xff];
const TITLE_TEXT: [u8; 4] = [0xcc, 0xcc, 0xcc, 0xff];
const ACTIVE_LINE: [u8; 4] = [33, 66, 131, 128];
const ACTIVE_BAR: [u8; 4] = [0x56, 0x9c, 0xd6, 0xff];
const LINE_NUMBER: [u8; 4] = [0x85, 0x85, 0x85, 0xff];
const LINE_NUMBER_ACTIVE: [u8; 4] = [0xd4, 0xd4, 0xd4, 0xff];
const CURSOR: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

const TAB_WIDTH: usize = 4;
const BLINK_PERIOD_MS: u64 = 1000;

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub buffer: &'a Buffer,
    pub file_name: &'a str,
    pub frame_index: u64,
    pub fps: u32,
    pub is_final: bool,
}

impl FrameView<'_> {
    /// The cursor is lit for the first half of every second and always on the final frame.
    pub fn cursor_visible(&self) -> bool {
        if self.is_final {
            return true;
        }
        let elapsed_ms = self.frame_index * 1000 / u64::from(self.fps.max(1));
        elapsed_ms % BLINK_PERIOD_MS < BLINK_PERIOD_MS / 2
    }
}

pub trait FrameRenderer {
    /// Full styled frame. Fails when a glyph cannot be drawn.
    fn render(&mut self, view: &FrameView<'_>) -> Result<RgbaImage>;

    /// Unstyled text on the background. Never fails; undrawable glyphs are skipped.
    fn render_plain(&mut self, view: &FrameView<'_>) -> RgbaImage;
}

#[derive(Debug, Clone)]
struct GlyphBitmap {
    width: usize,
    height: usize,
    xmin: i32,
    ymin: i32,
    bitmap: Vec<u8>,
}

struct FontGlyphs {
    font: Font,
    size: f32,
    ascent: f32,
    advance: f32,
    cache: HashMap<char, GlyphBitmap>,
}

impl FontGlyphs {
    fn new(font: Font, size: f32) -> Self {
        let ascent = font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent)
            .unwrap_or(size * 0.8);
        let advance = font.metrics('M', size).advance_width.ceil().max(1.0);
        Self {
            font,
            size,
            ascent,
            advance,
            cache: HashMap::new(),
        }
    }

    /// `None` when the font has no glyph for `c`.
    fn get(&mut self, c: char) -> Option<&GlyphBitmap> {
        if self.font.lookup_glyph_index(c) == 0 {
            return None;
        }
        let font = &self.font;
        let size = self.size;
        Some(self.cache.entry(c).or_insert_with(|| {
            let (metrics, bitmap) = font.rasterize(c, size);
            GlyphBitmap {
                width: metrics.width,
                height: metrics.height,
                xmin: metrics.xmin,
                ymin: metrics.ymin,
                bitmap,
            }
        }))
    }
}

enum Glyphs {
    Blocks,
    Font(Box<FontGlyphs>),
}

/// Geometry derived from a resolution profile.
#[derive(Debug, Clone, Copy)]
struct Layout {
    width: u32,
    height: u32,
    font_size: f32,
    line_height: i64,
    cell_width: f32,
    title_height: i64,
    code_top: i64,
    code_left: i64,
    gutter_width: i64,
}

impl Layout {
    fn new(profile: ResolutionProfile, cell_width: f32) -> Self {
        let font_size = profile.font_size as f32;
        let title_height = (profile.padding_top as f32 * 1.2).round() as i64;
        Self {
            width: profile.width,
            height: profile.height,
            font_size,
            line_height: i64::from(profile.line_height),
            cell_width,
            title_height,
            code_top: title_height + i64::from(profile.padding_top) / 2,
            code_left: i64::from(profile.padding_left),
            gutter_width: i64::from(profile.padding_left) - (font_size * 0.7).round() as i64,
        }
    }

    fn visible_lines(&self) -> usize {
        ((i64::from(self.height) - self.code_top) / self.line_height).max(1) as usize
    }

    fn line_top(&self, row: usize) -> i64 {
        self.code_top + row as i64 * self.line_height
    }

    fn active_bar_x(&self) -> i64 {
        self.gutter_width - (self.font_size * 0.15).round() as i64
    }
}

/// First line to draw so that `active` stays on screen.
pub fn first_visible_line(active: usize, visible: usize) -> usize {
    (active + 1).saturating_sub(visible.max(1))
}

pub struct CodeRenderer {
    layout: Layout,
    glyphs: Glyphs,
}

impl CodeRenderer {
    /// Block-glyph renderer. Needs no font file.
    pub fn new(profile: ResolutionProfile) -> Self {
        let cell_width = (profile.font_size as f32 * 0.6).round().max(1.0);
        Self {
            layout: Layout::new(profile, cell_width),
            glyphs: Glyphs::Blocks,
        }
    }

    pub fn with_font(profile: ResolutionProfile, font_bytes: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(font_bytes, FontSettings::default())
            .map_err(|e| TyperError::resource(format!("failed to parse font: {e}")))?;
        let glyphs = FontGlyphs::new(font, profile.font_size as f32);
        Ok(Self {
            layout: Layout::new(profile, glyphs.advance),
            glyphs: Glyphs::Font(Box::new(glyphs)),
        })
    }

    pub fn from_font_file(profile: ResolutionProfile, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            TyperError::resource(format!("failed to read font {}: {e}", path.display()))
        })?;
        Self::with_font(profile, &bytes)
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    /// Draw `text` starting at column `x`, returning the x after the last char.
    /// Draw `text` from `x`, failing on the first glyph the font lacks.
    fn draw_text(
        &mut self,
        img: &mut RgbaImage,
        text: &str,
        x: f32,
        line_top: i64,
        color: [u8; 4],
    ) -> Result<f32> {
        let (x, missing) = self.draw_glyphs(img, text, x, line_top, color);
        match missing {
            Some(c) => Err(TyperError::render(format!("font has no glyph for {c:?}"))),
            None => Ok(x),
        }
    }

    /// Draw `text` from `x`, leaving a blank cell for glyphs the font lacks.
    fn draw_text_lenient(
        &mut self,
        img: &mut RgbaImage,
        text: &str,
        x: f32,
        line_top: i64,
        color: [u8; 4],
    ) -> f32 {
        let (x, missing) = self.draw_glyphs(img, text, x, line_top, color);
        if let Some(c) = missing {
            trace!("skipped glyph {c:?}");
        }
        x
    }

    /// Returns the pen position after `text` and the first char with no glyph, if any.
    fn draw_glyphs(
        &mut self,
        img: &mut RgbaImage,
        text: &str,
        x: f32,
        line_top: i64,
        color: [u8; 4],
    ) -> (f32, Option<char>) {
        let layout = self.layout;
        let mut x = x;
        let mut missing = None;
        for c in text.chars() {
            match c {
                '\t' => x += layout.cell_width * TAB_WIDTH as f32,
                c if c.is_whitespace() => x += layout.cell_width,
                c => {
                    match &mut self.glyphs {
                        Glyphs::Blocks => draw_block(img, &layout, x, line_top, color),
                        Glyphs::Font(glyphs) => {
                            let ascent = glyphs.ascent;
                            match glyphs.get(c) {
                                Some(glyph) => {
                                    let baseline = line_top as f32
                                        + (layout.line_height as f32 - layout.font_size) / 2.0
                                        + ascent;
                                    let gx = x.round() as i64 + i64::from(glyph.xmin);
                                    let gy = baseline.round() as i64
                                        - glyph.height as i64
                                        - i64::from(glyph.ymin);
                                    blend_glyph(img, glyph, gx, gy, color);
                                }
                                None => {
                                    missing.get_or_insert(c);
                                }
                            }
                        }
                    }
                    x += layout.cell_width;
                }
            }
        }
        (x, missing)
    }

    fn draw_frame(&mut self, view: &FrameView<'_>) -> Result<RgbaImage> {
        let layout = self.layout;
        let mut img = RgbaImage::from_pixel(layout.width, layout.height, Rgba(BACKGROUND));

        // Gutter and title bar
        fill_rect(&mut img, 0, 0, layout.gutter_width, i64::from(layout.height), CHROME);
        fill_rect(&mut img, 0, 0, i64::from(layout.width), layout.title_height, CHROME);
        let title = format!("{} - codetyper", view.file_name);
        let title_width = title.chars().count() as f32 * layout.cell_width;
        let title_x = (layout.width as f32 - title_width) / 2.0;
        let title_top = (layout.title_height - layout.line_height) / 2;
        self.draw_text(&mut img, &title, title_x, title_top, TITLE_TEXT)?;

        let lines: Vec<&str> = view.buffer.lines().collect();
        let active = view.buffer.active_line().min(lines.len().saturating_sub(1));
        let visible = layout.visible_lines();
        let first = first_visible_line(active, visible);

        // Active line band and gutter bar
        let band_top = layout.line_top(active - first);
        fill_rect(
            &mut img,
            layout.gutter_width,
            band_top,
            i64::from(layout.width) - layout.gutter_width,
            layout.line_height,
            ACTIVE_LINE,
        );
        fill_rect(
            &mut img,
            layout.active_bar_x(),
            band_top,
            (layout.font_size * 0.15).round().max(1.0) as i64,
            layout.line_height,
            ACTIVE_BAR,
        );

        for (row, (index, line)) in lines.iter().enumerate().skip(first).take(visible).enumerate() {
            let top = layout.line_top(row);

            let number = (index + 1).to_string();
            let number_color = if index == active {
                LINE_NUMBER_ACTIVE
            } else {
                LINE_NUMBER
            };
            let number_right = layout.gutter_width as f32 - layout.font_size * 0.4;
            let number_x = number_right - number.len() as f32 * layout.cell_width;
            self.draw_text(&mut img, &number, number_x, top, number_color)?;

            let mut x = layout.code_left as f32;
            for token in tokenize_line(line) {
                let [r, g, b] = token.class.rgb();
                x = self.draw_text(&mut img, token.text, x, top, [r, g, b, 0xff])?;
            }
        }

        if view.cursor_visible() {
            let last = lines.len().saturating_sub(1);
            if (first..first + visible).contains(&last) {
                let last_line = lines.last().copied().unwrap_or_default();
                let x = layout.code_left as f32 + columns(last_line) as f32 * layout.cell_width;
                fill_rect(
                    &mut img,
                    x.round() as i64,
                    layout.line_top(last - first),
                    (layout.font_size * 0.15).round().max(2.0) as i64,
                    layout.line_height,
                    CURSOR,
                );
            }
        }

        Ok(img)
    }
}

impl FrameRenderer for CodeRenderer {
    #[tracing::instrument(level = "trace", skip(self, view), fields(frame = view.frame_index))]
    fn render(&mut self, view: &FrameView<'_>) -> Result<RgbaImage> {
        self.draw_frame(view)
    }

    fn render_plain(&mut self, view: &FrameView<'_>) -> RgbaImage {
        let layout = self.layout;
        let mut img = RgbaImage::from_pixel(layout.width, layout.height, Rgba(BACKGROUND));
        let [r, g, b] = TokenClass::Plain.rgb();

        let lines: Vec<&str> = view.buffer.lines().collect();
        let visible = layout.visible_lines();
        let first = first_visible_line(lines.len().saturating_sub(1), visible);
        for (row, line) in lines.iter().skip(first).take(visible).enumerate() {
            let top = layout.line_top(row);
            self.draw_text_lenient(&mut img, line, layout.code_left as f32, top, [r, g, b, 0xff]);
        }
        img
    }
}

fn columns(line: &str) -> usize {
    line.chars()
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

fn draw_block(img: &mut RgbaImage, layout: &Layout, x: f32, line_top: i64, color: [u8; 4]) {
    let glyph_top = line_top + ((layout.line_height as f32 - layout.font_size) / 2.0) as i64;
    let inset = (layout.cell_width * 0.1).round() as i64;
    fill_rect(
        img,
        x.round() as i64 + inset,
        glyph_top + (layout.font_size * 0.25).round() as i64,
        (layout.cell_width.round() as i64 - 2 * inset).max(1),
        (layout.font_size * 0.65).round().max(1.0) as i64,
        color,
    );
}

fn fill_rect(img: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: [u8; 4]) {
    let (iw, ih) = (i64::from(img.width()), i64::from(img.height()));
    let (x0, x1) = (x.clamp(0, iw), (x + w).clamp(0, iw));
    let (y0, y1) = (y.clamp(0, ih), (y + h).clamp(0, ih));
    for py in y0..y1 {
        for px in x0..x1 {
            blend_pixel(img.get_pixel_mut(px as u32, py as u32), color);
        }
    }
}

fn blend_glyph(img: &mut RgbaImage, glyph: &GlyphBitmap, x: i64, y: i64, color: [u8; 4]) {
    let (iw, ih) = (i64::from(img.width()), i64::from(img.height()));
    for row in 0..glyph.height {
        let py = y + row as i64;
        if py < 0 || py >= ih {
            continue;
        }
        for col in 0..glyph.width {
            let px = x + col as i64;
            if px < 0 || px >= iw {
                continue;
            }
            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }
            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            blend_pixel(
                img.get_pixel_mut(px as u32, py as u32),
                [color[0], color[1], color[2], alpha],
            );
        }
    }
}

fn blend_pixel(pixel: &mut Rgba<u8>, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }
    let inv_alpha = 255 - alpha;
    for channel in 0..3 {
        let dst = u16::from(pixel.0[channel]);
        let src_c = u16::from(src[channel]);
        pixel.0[channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    pixel.0[3] = 255;
}

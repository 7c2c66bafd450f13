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

//! Error taxonomy for the animation core

pub type Result<T> = std::result::Result<T, TyperError>;

#[derive(thiserror::Error, Debug)]
pub enum TyperError {
    /// Rejected before any session starts: empty script, bad option values.
    #[error("input error: {0}")]
    Input(String),

    #[error("parse error: {0}")]
    Parse(String),

    /// A styled frame could not be drawn. Recovered by the plain render.
    #[error("render error: {0}")]
    Render(String),

    #[error("video sink error: {0}")]
    Sink(String),

    /// Temporary resources that could not be released. Logged, never fatal.
    #[error("resource error: {0}")]
    Resource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl TyperError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Input errors are shown to the user as-is; everything else is an export failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Input(_) | Self::Parse(_))
    }
}

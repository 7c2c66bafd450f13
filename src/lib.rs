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

//! codetyper: realistic typing animations for source code
//!
//! Scripts are typed character by character with persona-driven timing and typos, either
//! live in a terminal view or captured frame by frame into a video.

pub mod capture;
pub mod demo;
pub mod document;
pub mod error;
pub mod export;
pub mod highlight;
pub mod parser;
pub mod persona;
pub mod playback;
pub mod render;
pub mod samples;
pub mod scheduler;
pub mod sink;
pub mod terminal;
pub mod timing;
pub mod types;
pub mod typo;

pub use error::{Result, TyperError};

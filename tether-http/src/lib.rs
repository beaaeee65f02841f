// Copyright 2026 Tether Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP body chunk objects for chunked transfers
//!
//! A chunked HTTP message body is a sequence of data chunks followed by
//! exactly one terminating chunk which may carry trailing headers. This crate
//! provides the [HttpContent] chunk object, the [ChunkedInput] abstraction
//! over lazy byte sources, and [HttpChunkedStream] which turns any such
//! source into a properly terminated chunk sequence.

#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

mod chunked;
mod content;

pub use chunked::{ChunkedBytes, ChunkedInput, HttpChunkedStream};
pub use content::HttpContent;

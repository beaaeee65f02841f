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

use bytes::Bytes;
use http::HeaderMap;

/// One piece of a chunked HTTP message body.
///
/// A well formed body is zero or more [HttpContent::Data] chunks followed by
/// exactly one [HttpContent::Last].
#[derive(Debug, Clone, PartialEq)]
pub enum HttpContent {
    /// A chunk of body bytes.
    Data(Bytes),
    /// The terminating chunk with its optional trailing headers.
    Last(Option<HeaderMap>),
}

impl HttpContent {
    /// The empty terminating chunk.
    pub fn last() -> Self {
        HttpContent::Last(None)
    }

    /// A terminating chunk carrying trailing headers.
    pub fn with_trailers(trailers: HeaderMap) -> Self {
        HttpContent::Last(Some(trailers))
    }

    /// Whether this chunk terminates the body.
    pub fn is_last(&self) -> bool {
        matches!(self, HttpContent::Last(_))
    }

    /// The body bytes of a data chunk, `None` for the terminating chunk.
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            HttpContent::Data(b) => Some(b),
            HttpContent::Last(_) => None,
        }
    }

    /// The trailing headers of the terminating chunk, if any.
    pub fn trailers(&self) -> Option<&HeaderMap> {
        match self {
            HttpContent::Data(_) => None,
            HttpContent::Last(t) => t.as_ref(),
        }
    }

    /// The number of body bytes this chunk carries. The terminating chunk
    /// carries none.
    pub fn len(&self) -> usize {
        match self {
            HttpContent::Data(b) => b.len(),
            HttpContent::Last(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Bytes> for HttpContent {
    fn from(data: Bytes) -> Self {
        HttpContent::Data(data)
    }
}

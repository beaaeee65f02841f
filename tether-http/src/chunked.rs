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
use std::collections::VecDeque;

use tether_error::Result;

use crate::content::HttpContent;

/// A lazy source of body bytes, read chunk by chunk.
///
/// `read_chunk` returning `Ok(None)` means no chunk is ready right now; it
/// does not mean the source is exhausted. Exhaustion is reported by
/// `is_end_of_input` only.
pub trait ChunkedInput: Send {
    /// True when the source will produce no further chunks.
    fn is_end_of_input(&self) -> bool;

    /// Fetch the next chunk, `None` when no chunk is ready yet.
    fn read_chunk(&mut self) -> Result<Option<Bytes>>;

    /// The total number of bytes this source will produce, when known up front.
    fn length(&self) -> Option<u64>;

    /// The number of bytes produced so far.
    fn progress(&self) -> u64;

    /// Release the resources behind this source.
    fn close(&mut self) {}
}

/// A [ChunkedInput] that streams data for an HTTP chunked transfer.
///
/// Each chunk of the underlying input is wrapped in a [HttpContent::Data].
/// Once the input is exhausted, the terminating chunk is emitted exactly
/// once; afterwards the stream reports end of input.
///
/// Make sure the message headers carry `Transfer-Encoding: chunked` when
/// writing the chunks out.
pub struct HttpChunkedStream<T> {
    input: T,
    last: HttpContent,
    sent_last: bool,
}

impl<T: ChunkedInput> HttpChunkedStream<T> {
    /// Create a new stream over `input` terminated by the empty last chunk.
    pub fn new(input: T) -> Self {
        HttpChunkedStream {
            input,
            last: HttpContent::last(),
            sent_last: false,
        }
    }

    /// Create a new stream over `input` whose terminating chunk carries the
    /// given trailing headers.
    pub fn with_trailers(input: T, trailers: HeaderMap) -> Self {
        HttpChunkedStream {
            input,
            last: HttpContent::with_trailers(trailers),
            sent_last: false,
        }
    }

    /// True when the input is exhausted and the terminating chunk has been
    /// emitted.
    pub fn is_end_of_input(&self) -> bool {
        if self.input.is_end_of_input() {
            // only end of input after the last chunk has been sent
            self.sent_last
        } else {
            false
        }
    }

    /// Fetch the next [HttpContent] chunk of the stream.
    ///
    /// Returns `None` when the stream is complete, or when the input has no
    /// chunk ready yet. The terminating chunk is returned exactly once, right
    /// after the input reports exhaustion.
    pub fn read_chunk(&mut self) -> Result<Option<HttpContent>> {
        if self.input.is_end_of_input() {
            if self.sent_last {
                Ok(None)
            } else {
                // send the last chunk for this input
                self.sent_last = true;
                Ok(Some(self.last.clone()))
            }
        } else {
            match self.input.read_chunk()? {
                Some(data) => Ok(Some(HttpContent::Data(data))),
                None => Ok(None),
            }
        }
    }

    /// The total length of the underlying input, when known.
    pub fn length(&self) -> Option<u64> {
        self.input.length()
    }

    /// The number of input bytes streamed so far.
    pub fn progress(&self) -> u64 {
        self.input.progress()
    }

    /// Close the underlying input.
    pub fn close(&mut self) {
        self.input.close()
    }
}

/// An in-memory [ChunkedInput] over a queue of byte chunks.
pub struct ChunkedBytes {
    chunks: VecDeque<Bytes>,
    length: u64,
    progress: u64,
}

impl ChunkedBytes {
    pub fn new(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        let chunks: VecDeque<Bytes> = chunks.into_iter().collect();
        let length = chunks.iter().map(|c| c.len() as u64).sum();
        ChunkedBytes {
            chunks,
            length,
            progress: 0,
        }
    }
}

impl ChunkedInput for ChunkedBytes {
    fn is_end_of_input(&self) -> bool {
        self.chunks.is_empty()
    }

    fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        let chunk = self.chunks.pop_front();
        if let Some(c) = &chunk {
            self.progress += c.len() as u64;
        }
        Ok(chunk)
    }

    fn length(&self) -> Option<u64> {
        Some(self.length)
    }

    fn progress(&self) -> u64 {
        self.progress
    }

    fn close(&mut self) {
        self.chunks.clear();
    }
}

//! Server-Sent Events decoding for streamed provider responses.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::Error;

/// Upper bound on buffered bytes of a single, still incomplete event.
const MAX_EVENT_BYTES: usize = 1_000_000;

/// A decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// The OpenAI end-of-stream sentinel.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Incremental decoder: feed raw bytes, take out complete events.
///
/// Bytes are buffered until a blank line closes an event, so multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, Error> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.contains(&b'\r') {
            self.buffer.retain(|b| *b != b'\r');
        }

        let finder = memmem::Finder::new(b"\n\n");
        let mut events = Vec::new();
        let mut start = 0;
        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let end = start + pos;
            let text = match std::str::from_utf8(&self.buffer[start..end]) {
                Ok(text) => text,
                Err(e) => {
                    self.buffer.clear();
                    return Err(Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")));
                }
            };
            events.extend(parse_event(text));
            start = end + 2;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_EVENT_BYTES {
            self.buffer.clear();
            return Err(Error::streaming("SSE event exceeded maximum size"));
        }
        Ok(events)
    }

    /// Flush a trailing event that was not closed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        std::str::from_utf8(&rest)
            .ok()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .and_then(parse_event)
    }
}

fn parse_event(text: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Stream adapter turning a byte stream into SSE events.
pub struct SseStream<S> {
    inner: S,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(bytes)) => match self.decoder.push(&bytes) {
                    Ok(events) => self.pending.extend(events),
                    Err(e) => return Poll::Ready(Some(Err(e))),
                },
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!("Stream error: {e}")))));
                }
                None => {
                    self.finished = true;
                    if let Some(event) = self.decoder.finish() {
                        self.pending.push_back(event);
                    }
                }
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

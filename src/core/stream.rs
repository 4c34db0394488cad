//! # Streamed reply rendering
//!
//! Turns the chunked body of one exchange into a progressively updated
//! rendering. Arrival cadence and redraw cadence are decoupled by a
//! [`RedrawThrottle`]: every chunk is appended to the buffer, but the buffer is
//! only re-formatted when the throttle allows it, plus once unconditionally at
//! the end so the final rendering always equals `format(full_text)`.

use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use log::debug;

use crate::backend::ApiError;

pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_millis(50);

/// Decorative prefix shown before every assistant reply.
pub const REPLY_PREFIX: &str = "🍳 ";

/// Turns the accumulated reply text into something a view can draw.
pub trait Formatter {
    type Output;

    fn format(&self, text: &str) -> Self::Output;
}

/// Raw text behind the reply prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl Formatter for PlainFormatter {
    type Output = String;

    fn format(&self, text: &str) -> String {
        format!("{REPLY_PREFIX}{text}")
    }
}

/// Receives each re-rendering of the in-flight reply.
pub trait RenderTarget<T> {
    fn redraw(&mut self, rendering: T);
}

/// Allows at most one redraw per `interval`. A zero interval allows every redraw.
#[derive(Debug, Clone)]
pub struct RedrawThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl RedrawThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Marks the start of a stream; the first redraw waits a full interval.
    pub fn start(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Returns true and records `now` when a redraw is due.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

impl Default for RedrawThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_REDRAW_INTERVAL)
    }
}

/// Incremental UTF-8 decoding that carries an incomplete trailing sequence
/// over to the next fragment.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn push(&mut self, bytes: &[u8], out: &mut String) {
        self.pending.extend_from_slice(bytes);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Flushes whatever is left; a dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}

pub struct StreamRenderer<F: Formatter> {
    formatter: F,
    throttle: RedrawThrottle,
    redraws: usize,
}

impl<F: Formatter> StreamRenderer<F> {
    pub fn new(formatter: F, throttle: RedrawThrottle) -> Self {
        Self {
            formatter,
            throttle,
            redraws: 0,
        }
    }

    /// Number of redraws issued by the last `consume`.
    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Drains `source`, redrawing `target` as the throttle allows, and
    /// resolves with the full decoded text. A failed read aborts with the
    /// error; the caller discards whatever was drawn.
    pub async fn consume<S, T>(&mut self, mut source: S, target: &mut T) -> Result<String, ApiError>
    where
        S: Stream<Item = Result<Vec<u8>, ApiError>> + Unpin,
        T: RenderTarget<F::Output> + ?Sized,
    {
        let mut decoder = Utf8Decoder::default();
        let mut buffer = String::new();
        let mut chunks = 0usize;
        self.redraws = 0;
        self.throttle.start(Instant::now());

        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            chunks += 1;
            decoder.push(&chunk, &mut buffer);
            if self.throttle.ready(Instant::now()) {
                target.redraw(self.formatter.format(&buffer));
                self.redraws += 1;
            }
        }

        decoder.finish(&mut buffer);
        target.redraw(self.formatter.format(&buffer));
        self.redraws += 1;

        debug!(
            "Stream complete: {} chunks, {} bytes, {} redraws",
            chunks,
            buffer.len(),
            self.redraws
        );
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Default)]
    struct Frames(Vec<String>);

    impl RenderTarget<String> for Frames {
        fn redraw(&mut self, rendering: String) {
            self.0.push(rendering);
        }
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, ApiError>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn final_frame_is_formatted_concatenation_for_any_chunking() {
        let text = "Receta: tortilla española 🥚 con cebolla. ¡Buen provecho!";
        let bytes = text.as_bytes();
        for size in [1, 2, 3, 5, 7, bytes.len()] {
            let parts: Vec<&[u8]> = bytes.chunks(size).collect();
            let mut renderer = StreamRenderer::new(PlainFormatter, RedrawThrottle::default());
            let mut frames = Frames::default();
            let full = renderer.consume(chunks(&parts), &mut frames).await.unwrap();
            assert_eq!(full, text, "chunk size {size}");
            assert_eq!(frames.0.last().unwrap(), &format!("🍳 {text}"));
        }
    }

    #[tokio::test]
    async fn disabled_throttle_redraws_every_chunk() {
        let mut renderer = StreamRenderer::new(PlainFormatter, RedrawThrottle::disabled());
        let mut frames = Frames::default();
        renderer
            .consume(chunks(&[b"Sal", b" y ", b"pimienta"]), &mut frames)
            .await
            .unwrap();
        assert_eq!(
            frames.0,
            vec!["🍳 Sal", "🍳 Sal y ", "🍳 Sal y pimienta", "🍳 Sal y pimienta"]
        );
        assert_eq!(renderer.redraws(), 4);
    }

    #[tokio::test]
    async fn long_interval_still_draws_the_end() {
        let mut renderer =
            StreamRenderer::new(PlainFormatter, RedrawThrottle::new(Duration::from_secs(3600)));
        let mut frames = Frames::default();
        renderer
            .consume(chunks(&[b"a", b"b", b"c"]), &mut frames)
            .await
            .unwrap();
        assert_eq!(frames.0, vec!["🍳 abc"]);
    }

    #[tokio::test]
    async fn empty_stream_draws_only_the_prefix() {
        let mut renderer = StreamRenderer::new(PlainFormatter, RedrawThrottle::default());
        let mut frames = Frames::default();
        let full = renderer.consume(chunks(&[]), &mut frames).await.unwrap();
        assert_eq!(full, "");
        assert_eq!(frames.0, vec!["🍳 "]);
    }

    #[tokio::test]
    async fn read_failure_is_returned() {
        let source = stream::iter(vec![
            Ok(b"Mezcla la harina".to_vec()),
            Err(ApiError::Network("connection reset".into())),
            Ok(b" never seen".to_vec()),
        ]);
        let mut renderer = StreamRenderer::new(PlainFormatter, RedrawThrottle::disabled());
        let mut frames = Frames::default();
        let err = renderer.consume(source, &mut frames).await.unwrap_err();
        assert_eq!(err, ApiError::Network("connection reset".into()));
        assert_eq!(frames.0, vec!["🍳 Mezcla la harina"]);
    }

    #[test]
    fn decoder_joins_split_multibyte_sequences() {
        let bytes = "ñandú".as_bytes();
        let mut decoder = Utf8Decoder::default();
        let mut out = String::new();
        decoder.push(&bytes[..1], &mut out);
        assert_eq!(out, "");
        decoder.push(&bytes[1..5], &mut out);
        assert_eq!(out, "ñan");
        decoder.push(&bytes[5..], &mut out);
        decoder.finish(&mut out);
        assert_eq!(out, "ñandú");
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        let mut out = String::new();
        decoder.push(&[b'a', 0xFF, b'b'], &mut out);
        decoder.push(&[0xC3], &mut out);
        decoder.finish(&mut out);
        assert_eq!(out, "a\u{FFFD}b\u{FFFD}");
    }

    #[test]
    fn throttle_waits_a_full_interval_after_start() {
        let mut throttle = RedrawThrottle::new(Duration::from_millis(50));
        let t0 = Instant::now();
        throttle.start(t0);
        assert!(!throttle.ready(t0 + Duration::from_millis(10)));
        assert!(throttle.ready(t0 + Duration::from_millis(50)));
        assert!(!throttle.ready(t0 + Duration::from_millis(90)));
        assert!(throttle.ready(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn zero_interval_is_always_ready() {
        let mut throttle = RedrawThrottle::disabled();
        let t0 = Instant::now();
        throttle.start(t0);
        assert!(throttle.ready(t0));
        assert!(throttle.ready(t0));
    }
}

//! Pull-based token stream over an async byte source.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::{Stream, ready};
use pin_project_lite::pin_project;
use tds_protocol::{ParserConfig, Token, TokenStreamParser};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, trace};

use crate::error::CodecError;

/// Read size used by [`TokenStream::from_reader`].
pub const DEFAULT_READ_CAPACITY: usize = 8 * 1024;

pin_project! {
    /// A stream of decoded tokens.
    ///
    /// Wraps a [`TokenStreamParser`] and pulls the next chunk from `source`
    /// whenever the parser runs out of complete tokens. The stream ends after
    /// the source ends, after the first error, or after cancellation.
    pub struct TokenStream<S> {
        #[pin]
        source: S,
        parser: TokenStreamParser,
        cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
        terminated: bool,
    }
}

impl<S> TokenStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    /// Create a token stream over a source of byte chunks.
    pub fn new(source: S, config: ParserConfig) -> Self {
        Self::with_parser(source, TokenStreamParser::new(config))
    }

    /// Create a token stream driving an existing parser.
    ///
    /// Bytes already fed to `parser` are decoded before the source is polled.
    pub fn with_parser(source: S, parser: TokenStreamParser) -> Self {
        Self {
            source,
            parser,
            cancelled: None,
            terminated: false,
        }
    }

    /// Stop the stream when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancelled = Some(Box::pin(token.cancelled_owned()));
        self
    }

    /// The underlying parser.
    pub fn parser(&self) -> &TokenStreamParser {
        &self.parser
    }

    /// Whether the stream has ended.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<R> TokenStream<ReaderStream<R>>
where
    R: AsyncRead,
{
    /// Create a token stream reading from `reader`.
    pub fn from_reader(reader: R, config: ParserConfig) -> Self {
        Self::new(
            ReaderStream::with_capacity(reader, DEFAULT_READ_CAPACITY),
            config,
        )
    }
}

impl<S> Stream for TokenStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = Result<Token, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.terminated {
                return Poll::Ready(None);
            }

            // Polling also registers the waker, so a cancellation wakes a
            // task parked on the source below.
            if let Some(cancelled) = this.cancelled.as_mut() {
                if cancelled.as_mut().poll(cx).is_ready() {
                    debug!(buffered = this.parser.buffered(), "token stream cancelled");
                    *this.terminated = true;
                    return Poll::Ready(Some(Err(CodecError::Cancelled)));
                }
            }

            match this.parser.next_token() {
                Ok(Some(token)) => return Poll::Ready(Some(Ok(token))),
                Ok(None) => {}
                Err(e) => {
                    *this.terminated = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
            }

            match ready!(this.source.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    trace!(len = chunk.len(), "received chunk");
                    this.parser.feed(&chunk);
                }
                Some(Err(e)) => {
                    *this.terminated = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => {
                    *this.terminated = true;
                    return match this.parser.finish() {
                        Ok(()) => Poll::Ready(None),
                        Err(e) => Poll::Ready(Some(Err(e.into()))),
                    };
                }
            }
        }
    }
}

impl<S> std::fmt::Debug for TokenStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStream")
            .field("parser", &self.parser)
            .field("cancellable", &self.cancelled.is_some())
            .field("terminated", &self.terminated)
            .finish()
    }
}

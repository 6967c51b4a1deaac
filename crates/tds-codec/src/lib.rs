//! # tds-codec
//!
//! Async pull-based token stream for TDS responses.
//!
//! [`TokenStream`] adapts any stream of byte chunks (or an [`AsyncRead`]
//! through [`TokenStream::from_reader`]) into a [`Stream`] of decoded
//! [`Token`]s. Chunks are pulled only when the buffered bytes hold no complete
//! token, so a slow consumer applies backpressure to the source.
//!
//! ## Cancellation
//!
//! A [`CancellationToken`] attached with [`TokenStream::with_cancellation`] is
//! checked before every token and raced against the wait for the next chunk.
//! Once it fires the stream yields [`CodecError::Cancelled`] and ends. A token
//! whose bytes are already buffered is never cut short.
//!
//! ```rust
//! use futures_util::StreamExt;
//! use tds_codec::TokenStream;
//! use tds_protocol::{ParserConfig, Token};
//!
//! # tokio_test::block_on(async {
//! let chunks = vec![
//!     Ok(bytes::Bytes::from_static(&[0xFD, 0x00, 0x00, 0xC1, 0x00])),
//!     Ok(bytes::Bytes::from_static(&[0; 8])),
//! ];
//! let mut tokens = TokenStream::new(futures_util::stream::iter(chunks), ParserConfig::default());
//!
//! assert!(matches!(tokens.next().await, Some(Ok(Token::Done(_)))));
//! assert!(tokens.next().await.is_none());
//! # });
//! ```
//!
//! [`AsyncRead`]: tokio::io::AsyncRead
//! [`Stream`]: futures_core::Stream
//! [`Token`]: tds_protocol::Token
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod stream;

pub use error::CodecError;
pub use stream::TokenStream;
pub use tokio_util::sync::CancellationToken;

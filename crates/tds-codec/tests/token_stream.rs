//! Token streams over async readers and slow sources.

#![allow(clippy::unwrap_used, missing_docs)]

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use tds_codec::{CancellationToken, CodecError, TokenStream};
use tds_protocol::{ParserConfig, Token};
use tds_types::SqlValue;

/// COLMETADATA with one int column, two rows, DONE with a row count.
fn result_set() -> Vec<u8> {
    let mut bytes = vec![0x81, 0x01, 0x00];
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x38, 0x01, b'n', 0x00]);
    bytes.extend_from_slice(&[0xD1, 0x01, 0x00, 0x00, 0x00]);
    bytes.extend_from_slice(&[0xD1, 0x02, 0x00, 0x00, 0x00]);
    bytes.extend_from_slice(&[0xFD, 0x10, 0x00, 0xC1, 0x00, 0x02, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}

#[tokio::test]
async fn test_from_reader_across_reads() {
    let input = result_set();
    let reader = tokio_test::io::Builder::new()
        .read(&input[..7])
        .read(&input[7..20])
        .read(&input[20..])
        .build();

    let tokens: Vec<Token> = TokenStream::from_reader(reader, ParserConfig::default())
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(tokens.len(), 4);
    assert!(matches!(&tokens[0], Token::ColMetadata(m) if m.columns[0].col_name == "n"));
    assert!(matches!(&tokens[2], Token::Row(row) if row.values == vec![SqlValue::Int(2)]));
    assert!(matches!(&tokens[3], Token::Done(done) if done.row_count == Some(2)));
}

#[tokio::test]
async fn test_cancel_while_waiting_for_chunk() {
    let input = Bytes::from(result_set());
    // First row arrives, then the source stalls forever.
    let source = stream::iter(vec![Ok::<_, io::Error>(input.slice(..18))]).chain(stream::pending());

    let cancel = CancellationToken::new();
    let mut tokens =
        TokenStream::new(source, ParserConfig::default()).with_cancellation(cancel.clone());

    assert!(matches!(tokens.next().await, Some(Ok(Token::ColMetadata(_)))));
    assert!(matches!(tokens.next().await, Some(Ok(Token::Row(_)))));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let next = tokio::time::timeout(Duration::from_secs(5), tokens.next())
        .await
        .unwrap();
    assert!(matches!(next, Some(Err(CodecError::Cancelled))));
    assert!(tokens.next().await.is_none());
    assert_eq!(tokens.parser().buffered(), 0);
}

#[tokio::test]
async fn test_consumer_pace_controls_reads() {
    let input = result_set();
    let chunks: Vec<io::Result<Bytes>> = input
        .chunks(3)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    let total = chunks.len();

    let mut pulled = 0usize;
    let source = stream::iter(chunks).inspect(|_| pulled += 1);
    let mut tokens = TokenStream::new(source, ParserConfig::default());

    assert!(matches!(tokens.next().await, Some(Ok(Token::ColMetadata(_)))));
    drop(tokens);
    // COLMETADATA ends inside the fifth 3-byte chunk
    assert_eq!(pulled, 5);
    assert!(pulled < total);
}

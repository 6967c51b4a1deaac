//! End-to-end token stream decoding, fed whole and in arbitrary chunks.

#![allow(clippy::unwrap_used, missing_docs)]

use proptest::prelude::*;
use tds_protocol::{
    ByteWriter, Collation, DoneStatus, EnvChangeValue, ParserConfig, ParserState, ProtocolError,
    TdsVersion, Token, TokenStreamParser,
};
use tds_types::SqlValue;

/// Token with a u16 length-prefixed body.
fn with_length(w: &mut ByteWriter, token_type: u8, body: &ByteWriter) {
    w.write_u8(token_type);
    w.write_u16_le(body.position() as u16);
    w.write_bytes(body.as_slice());
}

fn env_database(w: &mut ByteWriter, new: &str, old: &str) {
    let mut body = ByteWriter::new();
    body.write_u8(0x01);
    body.write_b_varchar(new);
    body.write_b_varchar(old);
    with_length(w, 0xE3, &body);
}

fn info(w: &mut ByteWriter, number: u32, message: &str) {
    let mut body = ByteWriter::new();
    body.write_u32_le(number);
    body.write_u8(1);
    body.write_u8(0);
    body.write_us_varchar(message);
    body.write_b_varchar("sql01");
    body.write_b_varchar("");
    body.write_u32_le(1);
    with_length(w, 0xAB, &body);
}

fn done(w: &mut ByteWriter, token_type: u8, status: u16, row_count: u64) {
    w.write_u8(token_type);
    w.write_u16_le(status);
    w.write_u16_le(0x00C1);
    w.write_u64_le(row_count);
}

/// COLMETADATA: id int, name nvarchar(20), notes varchar(max).
fn metadata(w: &mut ByteWriter) {
    let collation = Collation::default().to_bytes();

    w.write_u8(0x81);
    w.write_u16_le(3);

    w.write_u32_le(0);
    w.write_u16_le(0x0000);
    w.write_u8(0x38);
    w.write_b_varchar("id");

    w.write_u32_le(0);
    w.write_u16_le(0x0001);
    w.write_u8(0xE7);
    w.write_u16_le(40);
    w.write_bytes(&collation);
    w.write_b_varchar("name");

    w.write_u32_le(0);
    w.write_u16_le(0x0001);
    w.write_u8(0xA7);
    w.write_u16_le(0xFFFF);
    w.write_bytes(&collation);
    w.write_b_varchar("notes");
}

fn plp_chunks(w: &mut ByteWriter, total: u64, chunks: &[&str]) {
    w.write_u64_le(total);
    for chunk in chunks {
        w.write_u32_le(chunk.len() as u32);
        w.write_bytes(chunk.as_bytes());
    }
    w.write_u32_le(0);
}

/// A procedure call response touching most token types.
fn response() -> Vec<u8> {
    let mut w = ByteWriter::new();

    env_database(&mut w, "inventory", "master");
    info(&mut w, 5701, "Changed database context to 'inventory'.");
    metadata(&mut w);

    // ROW 1, "alpha", "abc" + "def" with unknown total
    w.write_u8(0xD1);
    w.write_i32_le(1);
    w.write_us_varchar("alpha");
    plp_chunks(&mut w, 0xFFFF_FFFF_FFFF_FFFE, &["abc", "def"]);

    // NBCROW 2, NULL, "xyz" with known total
    w.write_u8(0xD2);
    w.write_u8(0b0000_0010);
    w.write_i32_le(2);
    plp_chunks(&mut w, 3, &["xyz"]);

    // ROW 3, "gamma", NULL
    w.write_u8(0xD1);
    w.write_i32_le(3);
    w.write_us_varchar("gamma");
    w.write_u64_le(0xFFFF_FFFF_FFFF_FFFF);

    done(&mut w, 0xFF, 0x0011, 3);

    // RETURNSTATUS
    w.write_u8(0x79);
    w.write_i32_le(0);

    // RETURNVALUE @count int output = 3
    w.write_u8(0xAC);
    w.write_u16_le(0);
    w.write_b_varchar("@count");
    w.write_u8(0x01);
    w.write_u32_le(0);
    w.write_u16_le(0x0009);
    w.write_bytes(&[0x26, 0x04, 0x04, 0x03, 0x00, 0x00, 0x00]);

    done(&mut w, 0xFE, 0x0000, 0);

    w.as_slice().to_vec()
}

fn parse_chunked(input: &[u8], sizes: &[usize]) -> Vec<Token> {
    let mut parser = TokenStreamParser::new(ParserConfig::default());
    let mut tokens = Vec::new();
    let mut rest = input;
    let mut sizes = sizes.iter().cycle();

    while !rest.is_empty() {
        let size = sizes.next().copied().unwrap_or(rest.len()).clamp(1, rest.len());
        let (chunk, tail) = rest.split_at(size);
        parser.feed(chunk);
        rest = tail;
        for token in parser.tokens() {
            tokens.push(token.unwrap());
        }
    }

    parser.finish().unwrap();
    assert_eq!(parser.state(), ParserState::Done);
    tokens
}

#[test]
fn test_procedure_response() {
    let input = response();
    let tokens = parse_chunked(&input, &[input.len()]);
    assert_eq!(tokens.len(), 10);

    match &tokens[0] {
        Token::EnvChange(env) => {
            assert_eq!(env.new_database(), Some("inventory"));
            assert_eq!(env.old_value, EnvChangeValue::String("master".into()));
        }
        other => panic!("expected ENVCHANGE, got {other:?}"),
    }
    assert!(matches!(&tokens[1], Token::Info(msg) if msg.number == 5701));

    let Token::ColMetadata(metadata) = &tokens[2] else {
        panic!("expected COLMETADATA");
    };
    assert_eq!(metadata.len(), 3);
    assert!(metadata.columns[2].is_plp());

    let rows: Vec<&Vec<SqlValue>> = tokens
        .iter()
        .filter_map(|token| match token {
            Token::Row(row) | Token::NbcRow(row) => Some(&row.values),
            _ => None,
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            &vec![
                SqlValue::Int(1),
                SqlValue::String("alpha".into()),
                SqlValue::String("abcdef".into()),
            ],
            &vec![SqlValue::Int(2), SqlValue::Null, SqlValue::String("xyz".into())],
            &vec![SqlValue::Int(3), SqlValue::String("gamma".into()), SqlValue::Null],
        ]
    );

    match &tokens[6] {
        Token::DoneInProc(done) => {
            assert!(done.has_more());
            assert_eq!(done.row_count, Some(3));
        }
        other => panic!("expected DONEINPROC, got {other:?}"),
    }
    assert_eq!(tokens[7], Token::ReturnStatus(0));
    match &tokens[8] {
        Token::ReturnValue(ret) => {
            assert_eq!(ret.param_name, "count");
            assert_eq!(ret.value, SqlValue::Int(3));
        }
        other => panic!("expected RETURNVALUE, got {other:?}"),
    }
    assert!(matches!(&tokens[9], Token::DoneProc(done) if !done.has_more()));
}

#[test]
fn test_byte_at_a_time() {
    let input = response();
    assert_eq!(parse_chunked(&input, &[1]), parse_chunked(&input, &[input.len()]));
}

#[test]
fn test_doneproc_repetitions() {
    let doneproc = [
        0xFE, 0x00, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    for n in [1usize, 2, 7, 64] {
        let input = doneproc.repeat(n);
        let tokens = parse_chunked(&input, &[5, 11]);
        assert_eq!(tokens.len(), n);
        for token in tokens {
            let Token::DoneProc(done) = token else {
                panic!("expected DONEPROC, got {token:?}");
            };
            assert_eq!(done.status, DoneStatus::empty());
            assert_eq!(done.row_count, None);
            assert!(!done.has_more());
        }
    }
}

#[test]
fn test_order_token() {
    // The u16 length counts bytes: 8 bytes hold four u16 column numbers.
    let input = [
        0xA9, 0x08, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00,
    ];
    let tokens = parse_chunked(&input, &[3]);
    match &tokens[..] {
        [Token::Order(order)] => assert_eq!(order.columns, vec![1, 2, 3, 4]),
        other => panic!("unexpected tokens {other:?}"),
    }
}

#[test]
fn test_packet_size_change() {
    let mut w = ByteWriter::new();
    let mut body = ByteWriter::new();
    body.write_u8(0x04);
    body.write_b_varchar("2048");
    body.write_b_varchar("1024");
    with_length(&mut w, 0xE3, &body);

    let tokens = parse_chunked(w.as_slice(), &[2]);
    match &tokens[..] {
        [Token::EnvChange(env)] => {
            assert_eq!(env.new_value, EnvChangeValue::Integer(2048));
            assert_eq!(env.old_value, EnvChangeValue::Integer(1024));
        }
        other => panic!("unexpected tokens {other:?}"),
    }
}

#[test]
fn test_plp_length_mismatch_terminates() {
    let mut w = ByteWriter::new();
    metadata(&mut w);
    w.write_u8(0xD1);
    w.write_i32_le(1);
    w.write_us_varchar("a");
    plp_chunks(&mut w, 10, &["abc", "def"]);
    done(&mut w, 0xFD, 0x0000, 0);

    let mut parser = TokenStreamParser::new(ParserConfig::default());
    parser.feed(w.as_slice());

    assert!(matches!(parser.next_token(), Ok(Some(Token::ColMetadata(_)))));
    assert!(matches!(
        parser.next_token(),
        Err(ProtocolError::PlpLengthMismatch {
            declared: 10,
            actual: 6
        })
    ));
    assert_eq!(parser.state(), ParserState::Error);
    assert!(parser.next_token().unwrap().is_none());
}

#[test]
fn test_wide_decimal_row() {
    let mut w = ByteWriter::new();
    w.write_u8(0x81);
    w.write_u16_le(1);
    w.write_u32_le(0);
    w.write_u16_le(0x0001);
    w.write_bytes(&[0x6A, 17, 38, 0]);
    w.write_b_varchar("total");

    let wide = 10i128.pow(30);
    w.write_u8(0xD1);
    w.write_u8(17);
    w.write_u8(0x01);
    w.write_bytes(&wide.to_le_bytes());
    done(&mut w, 0xFD, 0x0010, 1);

    let tokens = parse_chunked(w.as_slice(), &[7]);
    assert_eq!(tokens.len(), 3);
    assert!(matches!(
        &tokens[1],
        Token::Row(row) if row.values == vec![SqlValue::Numeric { mantissa: wide, scale: 0 }]
    ));
}

#[test]
fn test_legacy_version_row_counts() {
    let mut parser = TokenStreamParser::new(ParserConfig::new().with_tds_version(TdsVersion::V7_1));
    parser.feed(&[0xFD, 0x10, 0x00, 0xC1, 0x00, 0x05, 0x00, 0x00, 0x00]);

    let Some(Token::Done(done)) = parser.next_token().unwrap() else {
        panic!("expected DONE");
    };
    assert_eq!(done.row_count, Some(5));
    assert!(parser.next_token().unwrap().is_none());
    parser.finish().unwrap();
}

#[test]
fn test_truncated_stream() {
    let input = response();
    let mut parser = TokenStreamParser::new(ParserConfig::default());
    parser.feed(&input[..input.len() - 4]);
    let decoded = parser.tokens().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(decoded.len(), 9);
    assert_eq!(parser.state(), ParserState::Suspended);
    assert!(matches!(
        parser.finish(),
        Err(ProtocolError::UnexpectedEof { pending: 9 })
    ));
}

proptest! {
    #[test]
    fn prop_chunk_boundaries_do_not_matter(
        sizes in prop::collection::vec(1usize..64, 1..16)
    ) {
        let input = response();
        let whole = parse_chunked(&input, &[input.len()]);
        prop_assert_eq!(parse_chunked(&input, &sizes), whole);
    }
}

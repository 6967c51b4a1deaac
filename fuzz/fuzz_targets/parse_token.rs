#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tds_protocol::{ParserConfig, TokenStreamParser};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Chunk sizes cycled over the input.
    chunk_sizes: Vec<u8>,
    data: Vec<u8>,
}

fn parse(data: &[u8], sizes: &[u8]) -> Vec<String> {
    let mut parser = TokenStreamParser::new(ParserConfig::default());
    let mut out = Vec::new();
    let mut rest = data;
    let mut sizes = sizes.iter().map(|&s| usize::from(s).max(1)).cycle();

    while !rest.is_empty() && !parser.is_terminated() {
        let size = sizes.next().unwrap_or(rest.len()).min(rest.len());
        let (chunk, tail) = rest.split_at(size);
        parser.feed(chunk);
        rest = tail;
        for token in parser.tokens() {
            out.push(format!("{token:?}"));
        }
    }
    if let Err(e) = parser.finish() {
        out.push(format!("{e:?}"));
    }
    out
}

fuzz_target!(|input: FuzzInput| {
    // The decoded sequence must not depend on chunk boundaries.
    let whole = parse(&input.data, &[]);
    let chunked = parse(&input.data, &input.chunk_sizes);
    assert_eq!(whole, chunked);
});

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tds_protocol::Collation;

#[derive(Debug, Arbitrary)]
struct FuzzCollationInput {
    collation_bytes: [u8; 5],
    string_data: Vec<u8>,
}

fuzz_target!(|input: FuzzCollationInput| {
    let collation = Collation::from_bytes(input.collation_bytes);
    assert_eq!(Collation::from_bytes(collation.to_bytes()), collation);

    let _ = collation.code_page();
    if let Some(encoding) = collation.encoding() {
        let _ = encoding.decode_without_bom_handling(&input.string_data);
    }
});

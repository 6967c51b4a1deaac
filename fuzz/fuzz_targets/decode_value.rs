#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_protocol::{ByteCursor, ColumnMetadata, DataTypeRegistry, TypeInfo, decode_value};

fuzz_target!(|data: &[u8]| {
    // TYPE_INFO followed by a value, as in a RETURNVALUE token
    let mut src = ByteCursor::from(data);
    let Ok(info) = TypeInfo::decode(&mut src, DataTypeRegistry::standard()) else {
        return;
    };
    let column = ColumnMetadata::from_type_info(info, 0, 0x0001);
    let _ = decode_value(&mut src, &column);
});

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata::{Algorithm, Config, LengthPrefix, Memory, Reader, StringLength, TextEncoding};

#[derive(Arbitrary, Debug)]
enum Op {
    Value,
    Bool,
    Prefix(u8),
    String(u8),
    Terminated,
    Array,
    Section(u8),
    EndSection,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    chars: bool,
    ops: Vec<Op>,
    data: Vec<u8>,
}

const PREFIXES: [LengthPrefix; 12] = [
    LengthPrefix::I8,
    LengthPrefix::U8,
    LengthPrefix::I16,
    LengthPrefix::U16,
    LengthPrefix::I32,
    LengthPrefix::U32,
    LengthPrefix::I64,
    LengthPrefix::U64,
    LengthPrefix::F32,
    LengthPrefix::F64,
    LengthPrefix::Smart15,
    LengthPrefix::Smart62,
];

const ENCODINGS: [TextEncoding; 6] = [
    TextEncoding::Utf8,
    TextEncoding::Utf16Le,
    TextEncoding::Utf16Be,
    TextEncoding::Utf32Le,
    TextEncoding::Ascii,
    TextEncoding::Latin1,
];

fn fuzz(input: FuzzInput) {
    // Reading arbitrary bytes may fail but must never panic or allocate unboundedly
    let config = Config::default()
        .with_max_length(1 << 20)
        .with_string_length(if input.chars {
            StringLength::Chars
        } else {
            StringLength::Bytes
        });
    let mut reader = Reader::new(Memory::from(input.data), config);
    for op in input.ops {
        let _ = match op {
            Op::Value => reader.read::<u64>().map(drop),
            Op::Bool => reader.read::<bool>().map(drop),
            Op::Prefix(i) => reader
                .read_length_prefix(PREFIXES[i as usize % PREFIXES.len()])
                .map(drop),
            Op::String(i) => reader
                .read_string_with(LengthPrefix::Smart15, ENCODINGS[i as usize % ENCODINGS.len()])
                .map(drop),
            Op::Terminated => reader.read_terminated_string().map(drop),
            Op::Array => reader.read_array::<u32>(LengthPrefix::Smart62).map(drop),
            Op::Section(i) => {
                let algorithm = match i % 4 {
                    0 => Algorithm::Deflate,
                    1 => Algorithm::Zlib,
                    2 => Algorithm::Gzip,
                    _ => Algorithm::Zstd,
                };
                reader.begin_prefixed_section(algorithm, LengthPrefix::U16)
            }
            Op::EndSection => reader.end_section(),
        };
    }
    reader.close().unwrap();
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});

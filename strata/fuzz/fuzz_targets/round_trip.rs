#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata::{
    Algorithm, BitOrder, ByteOrder, Config, Endian, LengthPrefix, Memory, Reader, StringLength,
    TextEncoding, Writer,
};

#[derive(Arbitrary, Debug, Clone)]
enum Op {
    U8(u8),
    U32(u32),
    I64(i64),
    F64(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Text(String),
    Terminated(String),
    Smart15(u16),
    Smart62(u64),
    Array(Vec<u16>),
    Section(u8, Vec<Op>),
    Insert(Vec<u8>),
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    big: bool,
    msb: bool,
    chars: bool,
    utf16: bool,
    ops: Vec<Op>,
}

fn algorithm(selector: u8) -> Algorithm {
    match selector % 4 {
        0 => Algorithm::Deflate,
        1 => Algorithm::Zlib,
        2 => Algorithm::Gzip,
        _ => Algorithm::Zstd,
    }
}

fn write(writer: &mut Writer<'_>, op: &Op) {
    match op {
        Op::U8(v) => writer.write(*v).unwrap(),
        Op::U32(v) => writer.write(*v).unwrap(),
        Op::I64(v) => writer.write(*v).unwrap(),
        Op::F64(v) => writer.write(*v).unwrap(),
        Op::Bool(v) => writer.write(*v).unwrap(),
        Op::Bytes(v) => writer.write_prefixed_bytes(v, LengthPrefix::U32).unwrap(),
        Op::Text(v) => writer.write_string(v, LengthPrefix::Smart62).unwrap(),
        Op::Terminated(v) => writer.write_terminated_string_with(v, TextEncoding::Utf8).unwrap(),
        Op::Smart15(v) => writer
            .write_length_prefix(i64::from(v & 0x7FFF), LengthPrefix::Smart15)
            .unwrap(),
        Op::Smart62(v) => writer
            .write_length_prefix((v & ((1 << 62) - 1)) as i64, LengthPrefix::Smart62)
            .unwrap(),
        Op::Array(v) => writer.write_array(v, LengthPrefix::U32).unwrap(),
        Op::Section(selector, ops) => {
            let mut section = writer
                .compress(algorithm(*selector), 1, Some(LengthPrefix::U32))
                .unwrap();
            for op in ops {
                write(&mut section, op);
            }
            section.finish().unwrap();
        }
        Op::Insert(v) => {
            // Prepend at the current position of the active frame
            writer.begin_insert().unwrap();
            writer.write_prefixed_bytes(v, LengthPrefix::U32).unwrap();
            writer.end_insert().unwrap();
        }
    }
}

fn read(reader: &mut Reader<'_>, op: &Op) {
    match op {
        Op::U8(v) => assert_eq!(reader.read::<u8>().unwrap(), *v),
        Op::U32(v) => assert_eq!(reader.read::<u32>().unwrap(), *v),
        Op::I64(v) => assert_eq!(reader.read::<i64>().unwrap(), *v),
        Op::F64(v) => assert_eq!(reader.read::<f64>().unwrap().to_bits(), v.to_bits()),
        Op::Bool(v) => assert_eq!(reader.read::<bool>().unwrap(), *v),
        Op::Bytes(v) | Op::Insert(v) => {
            assert_eq!(reader.read_prefixed_bytes(LengthPrefix::U32).unwrap(), *v)
        }
        Op::Text(v) => assert_eq!(reader.read_string(LengthPrefix::Smart62).unwrap(), *v),
        Op::Terminated(v) => assert_eq!(
            reader.read_terminated_string_with(TextEncoding::Utf8).unwrap(),
            *v
        ),
        Op::Smart15(v) => assert_eq!(
            reader.read_length_prefix(LengthPrefix::Smart15).unwrap(),
            i64::from(v & 0x7FFF)
        ),
        Op::Smart62(v) => assert_eq!(
            reader.read_length_prefix(LengthPrefix::Smart62).unwrap(),
            (v & ((1 << 62) - 1)) as i64
        ),
        Op::Array(v) => assert_eq!(reader.read_array::<u16>(LengthPrefix::U32).unwrap(), *v),
        Op::Section(selector, ops) => {
            let mut section = reader
                .decompress_prefixed(algorithm(*selector), LengthPrefix::U32)
                .unwrap();
            for op in ops {
                read(&mut section, op);
            }
            assert_eq!(section.remaining().unwrap(), 0);
            section.finish().unwrap();
        }
    }
}

fn fuzz(input: FuzzInput) {
    // Values the engines reject by contract are filtered out up front
    let ops: Vec<Op> = input.ops.into_iter().filter(accepted).collect();
    let endian = Endian::new(
        if input.big { ByteOrder::Big } else { ByteOrder::Little },
        if input.msb { BitOrder::Msb0 } else { BitOrder::Lsb0 },
    );
    let config = Config::default()
        .with_endian(endian)
        .with_max_length(i64::MAX)
        .with_string_length(if input.chars {
            StringLength::Chars
        } else {
            StringLength::Bytes
        })
        .with_encoding(if input.utf16 {
            TextEncoding::Utf16Le
        } else {
            TextEncoding::Utf8
        });

    let mut memory = Memory::new();
    let mut writer = Writer::leave_open(&mut memory, config.clone());
    for op in &ops {
        write(&mut writer, op);
    }
    writer.close().unwrap();
    drop(writer);

    let mut reader = Reader::new(Memory::from(memory.into_inner()), config);
    for op in &ops {
        read(&mut reader, op);
    }
    assert_eq!(reader.remaining().unwrap(), 0);
}

fn accepted(op: &Op) -> bool {
    match op {
        Op::Terminated(v) => !v.contains('\0'),
        Op::Array(v) => v.len() < 1 << 16,
        Op::Section(_, ops) => ops.iter().all(accepted),
        _ => true,
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});

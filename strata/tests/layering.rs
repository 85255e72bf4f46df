//! Integration tests for frames layered on top of the base store.

use std::io::Write as _;
use strata::{
    Algorithm, Config, Error, Frame, LengthPrefix, Memory, Reader, Stack, Validation, Writer,
};
use test_case::test_case;

fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) % 7)
        .collect()
}

#[test_case(Algorithm::Deflate; "deflate")]
#[test_case(Algorithm::Zlib; "zlib")]
#[test_case(Algorithm::Gzip; "gzip")]
#[test_case(Algorithm::Zstd; "zstd")]
fn test_sequential_sections(algorithm: Algorithm) {
    let sizes = [0usize, 1, 1000, 100_000];
    let mut memory = Memory::new();
    let mut writer = Writer::leave_open(&mut memory, Config::default());
    for (i, size) in sizes.iter().enumerate() {
        writer.write(i as u8).unwrap();
        let mut section = writer
            .compress(algorithm, 6, Some(LengthPrefix::Smart62))
            .unwrap();
        section
            .write_prefixed_bytes(&payload(i as u8, *size), LengthPrefix::U32)
            .unwrap();
        section.finish().unwrap();
    }
    writer.close().unwrap();
    drop(writer);

    let mut reader = Reader::new(Memory::from(memory.into_inner()), Config::default());
    for (i, size) in sizes.iter().enumerate() {
        assert_eq!(reader.read::<u8>().unwrap(), i as u8);
        let mut section = reader
            .decompress_prefixed(algorithm, LengthPrefix::Smart62)
            .unwrap();
        let bytes = section.read_prefixed_bytes(LengthPrefix::U32).unwrap();
        assert_eq!(bytes, payload(i as u8, *size));
        section.finish().unwrap();
    }
    assert_eq!(reader.remaining().unwrap(), 0);
}

#[test]
fn test_nested_sections_with_mixed_algorithms() {
    let mut memory = Memory::new();
    let mut writer = Writer::leave_open(&mut memory, Config::default());
    writer
        .begin_section(Algorithm::Zstd, 1, Some(LengthPrefix::U32))
        .unwrap();
    for (depth, algorithm) in [Algorithm::Deflate, Algorithm::Gzip, Algorithm::Zlib]
        .into_iter()
        .enumerate()
    {
        writer.write_string(&format!("level {depth}"), LengthPrefix::U8).unwrap();
        writer
            .begin_section(algorithm, 6, Some(LengthPrefix::U32))
            .unwrap();
    }
    writer.write_bytes(&payload(9, 5000)).unwrap();
    // Every open section is flushed, innermost first
    writer.close().unwrap();
    drop(writer);

    let mut reader = Reader::new(Memory::from(memory.into_inner()), Config::default());
    reader
        .begin_prefixed_section(Algorithm::Zstd, LengthPrefix::U32)
        .unwrap();
    for (depth, algorithm) in [Algorithm::Deflate, Algorithm::Gzip, Algorithm::Zlib]
        .into_iter()
        .enumerate()
    {
        assert_eq!(
            reader.read_string(LengthPrefix::U8).unwrap(),
            format!("level {depth}")
        );
        reader
            .begin_prefixed_section(algorithm, LengthPrefix::U32)
            .unwrap();
    }
    assert_eq!(reader.stack().unwrap().depth(), 5);
    assert_eq!(reader.read_bytes(5000).unwrap(), payload(9, 5000));
    reader.close().unwrap();
}

#[test]
fn test_compress_to_end_after_plain_data() {
    let body = payload(3, 50_000);
    let mut memory = Memory::new();
    let mut writer = Writer::leave_open(&mut memory, Config::default());
    writer.write(0xCAFEu16).unwrap();
    writer.write_string("uncompressed header", LengthPrefix::U8).unwrap();
    writer.compress_to_end(Algorithm::Gzip, 9).unwrap();
    writer.write_array(&body, LengthPrefix::U32).unwrap();
    drop(writer);
    assert!(memory.as_slice().len() < body.len());

    let mut reader = Reader::new(Memory::from(memory.into_inner()), Config::default());
    assert_eq!(reader.read::<u16>().unwrap(), 0xCAFE);
    assert_eq!(
        reader.read_string(LengthPrefix::U8).unwrap(),
        "uncompressed header"
    );
    reader.decompress_to_end(Algorithm::Gzip).unwrap();
    assert_eq!(reader.read_array::<u8>(LengthPrefix::U32).unwrap(), body);
    reader.end_section().unwrap();
    assert_eq!(reader.remaining().unwrap(), 0);
}

#[test]
fn test_insert_into_compressed_section() {
    let mut memory = Memory::new();
    let mut writer = Writer::leave_open(&mut memory, Config::default());
    writer
        .begin_section(Algorithm::Zlib, 6, Some(LengthPrefix::U16))
        .unwrap();
    writer.write_bytes(&[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
    writer.set_position(4).unwrap();
    writer.begin_insert().unwrap();
    writer.write_bytes(&[100, 101]).unwrap();
    writer.end_insert().unwrap();
    writer.end_section().unwrap();
    writer.close().unwrap();
    drop(writer);

    let mut reader = Reader::new(Memory::from(memory.into_inner()), Config::default());
    let mut section = reader
        .decompress_prefixed(Algorithm::Zlib, LengthPrefix::U16)
        .unwrap();
    assert_eq!(
        section.read_bytes(10).unwrap(),
        vec![0, 1, 2, 3, 100, 101, 4, 5, 6, 7]
    );
}

#[test]
fn test_end_of_stream_guard() {
    let mut reader = Reader::new(Memory::from(vec![1, 2, 3, 4]), Config::default());
    reader.set_position(1).unwrap();
    assert!(matches!(
        reader.read::<u32>(),
        Err(Error::EndOfStream { overrun: 1 })
    ));

    let config = Config::default().with_validation(Validation {
        end_of_stream: false,
        ..Validation::ALL
    });
    let mut reader = Reader::new(Memory::from(vec![1, 2, 3, 4]), config);
    reader.set_position(1).unwrap();
    assert!(matches!(reader.read::<u32>(), Err(Error::Io(_))));
}

#[test]
fn test_max_length_guard() {
    let config = Config::default().with_max_length(100);
    let mut memory = Memory::new();
    let mut writer = Writer::leave_open(&mut memory, config.clone());
    writer.write_length_prefix(101, LengthPrefix::Smart15).unwrap();
    writer.write_length_prefix(102, LengthPrefix::Smart15).unwrap();
    writer.close().unwrap();
    drop(writer);

    let mut reader = Reader::new(Memory::from(memory.into_inner()), config);
    assert_eq!(reader.read_length_prefix(LengthPrefix::Smart15).unwrap(), 101);
    assert!(matches!(
        reader.read_length_prefix(LengthPrefix::Smart15),
        Err(Error::DataCorruption(_))
    ));
}

#[test]
fn test_push_foreign_frame() {
    let mut writer = Writer::new(Memory::new(), Config::default());
    let other = Stack::new(Memory::new());
    let frame = Frame::new(&other, Memory::new());
    assert!(matches!(
        writer.stack().unwrap().push(frame),
        Err(Error::ContractViolation)
    ));
}

#[test]
fn test_caller_pushed_frame() {
    let mut scratch = Memory::new();
    let mut memory = Memory::new();
    {
        let mut stack = Stack::leave_open(&mut memory);
        let frame = Frame::leave_open(&stack, &mut scratch);
        stack.push(frame).unwrap();

        // Writes land in the caller's frame until it is popped
        let mut writer = Writer::with_stack(stack, Config::default());
        writer.write(5u8).unwrap();
        let frame = writer.stack().unwrap().pop().unwrap();
        frame.dispose().unwrap();
        writer.write(6u8).unwrap();
    }
    assert_eq!(scratch.as_slice(), &[5]);
    assert_eq!(memory.as_slice(), &[6]);
}

#[test]
fn test_base_frame_cannot_be_popped() {
    let mut reader = Reader::new(Memory::new(), Config::default());
    assert!(matches!(
        reader.stack().unwrap().pop(),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(reader.stack().unwrap().depth(), 1);
}

#[test]
fn test_disposed_engines() {
    let mut writer = Writer::new(Memory::new(), Config::default());
    writer.begin_section(Algorithm::Zstd, 3, None).unwrap();
    writer.close().unwrap();
    assert!(matches!(writer.write(1u8), Err(Error::Disposed)));
    assert!(matches!(
        writer.begin_section(Algorithm::Zstd, 3, None),
        Err(Error::Disposed)
    ));
    assert!(matches!(writer.end_section(), Err(Error::Disposed)));
    assert!(matches!(writer.stack(), Err(Error::Disposed)));

    let mut reader = Reader::new(Memory::from(vec![1]), Config::default());
    reader.close().unwrap();
    assert!(matches!(reader.read::<u8>(), Err(Error::Disposed)));
    assert!(matches!(
        reader.decompress_to_end(Algorithm::Zstd),
        Err(Error::Disposed)
    ));
}

#[test]
fn test_store_left_open() {
    let mut memory = Memory::new();
    {
        let mut writer = Writer::leave_open(&mut memory, Config::default());
        writer.write(1u16).unwrap();
    }
    // The caller still owns the store and can keep using it
    memory.write_all(&[9]).unwrap();
    assert_eq!(memory.as_slice(), &[1, 0, 9]);
}

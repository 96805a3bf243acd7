#![no_main]

use lcovstream_adapters_io::ChunkIter;
use lcovstream_app::{EofMode, SectionStream, parse_bytes};
use lcovstream_types::FieldNames;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the tokenizer, interpreter or aggregator.
    let names = FieldNames::default();
    let _ = parse_bytes(data, &names);

    // End-of-input healing runs on whatever is left over.
    for eof in [EofMode::Strict, EofMode::Lenient] {
        let source = ChunkIter::split(data, 7);
        for result in SectionStream::new(source, &names).eof_mode(eof) {
            let _ = result;
        }
    }
});

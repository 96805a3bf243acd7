#![no_main]

use lcovstream_parser::RecordParser;
use lcovstream_types::RawRecord;
use libfuzzer_sys::fuzz_target;

fn complete(records: Vec<RawRecord>) -> Vec<RawRecord> {
    records
        .into_iter()
        .filter(|record| !record.done && !record.incomplete)
        .collect()
}

fuzz_target!(|data: &[u8]| {
    let Some((&size, input)) = data.split_first() else {
        return;
    };
    let chunk_size = usize::from(size % 16) + 1;

    let mut whole = RecordParser::default();
    whole.write(input);
    let expected = complete(whole.flush());

    // Chunk boundaries must not change which records come out.
    let mut chunked = RecordParser::default();
    let mut records = Vec::new();
    for chunk in input.chunks(chunk_size) {
        chunked.write(chunk);
        records.extend(chunked.flush());
    }
    records.extend(chunked.flush());

    assert_eq!(complete(records), expected);
});

#![no_main]

use configtree::{EventData, Parser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| fuzz_parse(data));

fn fuzz_parse(mut data: &[u8]) {
    let mut parser = Parser::new();
    parser.set_input(&mut data);

    while let Ok(event) = parser.parse() {
        if matches!(event.data, EventData::StreamEnd) {
            break;
        }
    }
}

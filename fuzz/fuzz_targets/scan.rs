#![no_main]

use configtree::{Scanner, TokenData};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| fuzz_scan(data));

fn fuzz_scan(mut data: &[u8]) {
    let mut scanner = Scanner::new();
    scanner.set_input(&mut data);

    while let Ok(token) = scanner.scan() {
        if matches!(token.data, TokenData::StreamEnd) {
            break;
        }
    }
}

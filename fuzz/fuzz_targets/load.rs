#![no_main]

use configtree::{load_document, Parser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| fuzz_load(data));

fn fuzz_load(mut data: &[u8]) {
    let mut parser = Parser::new();
    parser.set_input(&mut data);

    while let Ok(Some(_)) = load_document(&mut parser) {}
}

//! Pattern fuzz target: the first line of the input is pattern text, the rest
//! is a buffer to match. Parsing, matching (generic and compiled) and
//! rebuilding must not panic, and both matchers must agree.
//! Build with: cargo fuzz run pattern_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let split = data.iter().position(|b| *b == b'\n').unwrap_or(data.len());
    let source = match std::str::from_utf8(&data[..split]) {
        Ok(x) => x,
        Err(_) => return,
    };
    let bin = data.get(split + 1..).unwrap_or(&[]);
    let pattern = match bitsyntax::parse(source) {
        Ok(p) => p,
        Err(_) => return,
    };
    let generic = pattern.decode(bin);
    let compiled = pattern.compile().decode(bin, None);
    assert_eq!(generic.is_some(), compiled.is_some());
    if let Some(bound) = generic {
        let _ = pattern.build(&bound);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run pattern_fuzz");
}

//! Match and construct binaries from the command line.
//!
//! Usage:
//!   bits match PATTERN HEX [name=value ...]
//!   bits build PATTERN [name=value ...]
//!   bits size PATTERN [name=value ...]
//!
//! `match` prints one `name = value` line per binding and exits 1 when the
//! pattern does not match; extra `name=value` pairs are free variables for
//! size expressions. `build` prints the constructed buffer as hex.
//!
//! Values: `0x..` is a byte string, then unsigned, signed and float numbers are
//! tried in turn; anything else is text. Set `RUST_LOG=bitsyntax=trace` to see
//! why a match failed.

use anyhow::{anyhow, bail, Context};
use bitsyntax::{Bindings, Value};

const USAGE: &str = "usage: bits (match PATTERN HEX | build PATTERN | size PATTERN) [name=value ...]";

fn parse_value(s: &str) -> anyhow::Result<Value<'static>> {
    if let Some(digits) = s.strip_prefix("0x") {
        let bytes = hex::decode(digits).with_context(|| format!("invalid hex value {}", s))?;
        return Ok(Value::from(bytes));
    }
    if let Ok(n) = s.parse::<u64>() {
        return Ok(Value::UInt(n));
    }
    if let Ok(n) = s.parse::<i64>() {
        return Ok(Value::Int(n));
    }
    if let Ok(x) = s.parse::<f64>() {
        return Ok(Value::Float(x));
    }
    Ok(Value::from(s.to_string()))
}

fn parse_bindings(args: &[String]) -> anyhow::Result<Bindings<'static>> {
    let mut bindings = Bindings::new();
    for arg in args {
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("expected name=value, got {}", arg))?;
        bindings.insert(name.to_string(), parse_value(value)?);
    }
    Ok(bindings)
}

fn parse_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    let digits: String = s
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).with_context(|| format!("invalid hex input {}", s))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let (command, rest) = args.split_first().ok_or_else(|| anyhow!(USAGE))?;
    let (source, rest) = rest.split_first().ok_or_else(|| anyhow!(USAGE))?;
    let pattern = bitsyntax::parse(source)?;

    match command.as_str() {
        "match" => {
            let (input, rest) = rest.split_first().ok_or_else(|| anyhow!(USAGE))?;
            let bin = parse_hex(input)?;
            let free = parse_bindings(rest)?;
            let Some(bound) = pattern.decode_with(&bin, &free) else {
                eprintln!("no match");
                std::process::exit(1);
            };
            let mut names: Vec<&String> = bound.keys().collect();
            names.sort();
            for name in names {
                println!("{} = {}", name, bound[name]);
            }
        }
        "build" => {
            let bindings = parse_bindings(rest)?;
            println!("{}", hex::encode(pattern.build(&bindings)?));
        }
        "size" => {
            let bindings = parse_bindings(rest)?;
            println!("{}", bitsyntax::size_of(&pattern, &bindings)?);
        }
        other => bail!("unknown command {}\n{}", other, USAGE),
    }
    Ok(())
}

use bitsyntax::{compile, decode, parse, Bindings, Literal, Pattern, Segment, Size, Specifier, Value};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Bindings in a form that compares NaN payloads and map order consistently.
fn canonical(bound: Option<Bindings<'_>>) -> Option<BTreeMap<String, String>> {
    bound.map(|b| b.into_iter().map(|(k, v)| (k, format!("{:?}", v))).collect())
}

fn assert_same(pattern: &Pattern, bin: &[u8], free: Option<&Bindings<'_>>) {
    let generic = decode(pattern, bin, free);
    let compiled = compile(pattern).decode(bin, free);
    assert_eq!(canonical(compiled), canonical(generic), "{} over {:?}", pattern, bin);
}

#[test]
fn fixed_cases_agree() {
    let cases: &[(&str, &[u8])] = &[
        ("n:8", &[255]),
        ("n:16/signed-little", &[65, 255]),
        ("n:32/signed", &[245, 23, 97, 102]),
        ("n:24/little, _/binary", &[1, 2, 3, 4]),
        ("n:4/float-unit:8", &[64, 73, 15, 219]),
        ("n:5/unit:8-binary, _/binary", &[1, 2, 3, 4, 5, 6, 7, 9, 255]),
        ("len:8, data:len/binary", &[3, 1, 2, 3]),
        ("len:8, data:len/binary", &[3, 1, 2]),
        ("_:3, _:5", &[0]),
        ("_:4, rest/binary", &[0, 1]),
        ("n:12, _:4", &[0, 0]),
        ("\"AB\", n:8", b"AB\x01"),
        ("\"AB\", n:8", b"AC\x01"),
        ("s:5/utf8-z, n:8", b"abc\x00\x07"),
        ("s:2/utf8-hex", b"4142"),
        ("n:2/bcd", &[0x12, 0x34]),
        ("n:2/bcd", &[0x1a, 0x34]),
        ("x:16/float", &[0, 0]),
        ("n/binary, m:8", &[1]),
        ("data:len/binary", &[1]),
        ("5/utf8", b"5"),
        ("7:3/utf8-left, 5/utf8", b"0075"),
        ("7:3/utf8-left, 5/utf8", b"0705"),
    ];
    for (source, bin) in cases {
        assert_same(&parse(source).expect("parse"), bin, None);
    }
}

#[test]
fn free_variables_agree() {
    let mut free = Bindings::new();
    free.insert("len".to_string(), Value::UInt(2));
    let p = parse("data:len/binary, len:8, more:len/binary").expect("parse");
    assert_same(&p, &[1, 2, 1, 9], Some(&free));
    assert_same(&p, &[1, 2, 3, 9], Some(&free));
}

#[test]
fn matcher_is_reusable() {
    let m = bitsyntax::matcher("len:8, data:len/binary").expect("parse");
    for n in 0u8..5 {
        let mut bin = vec![n];
        bin.extend(std::iter::repeat(n).take(n as usize));
        let bound = m.decode(&bin, None).expect("match");
        assert_eq!(bound["len"], Value::UInt(u64::from(n)));
        assert_eq!(bound["data"].as_bytes().map(<[u8]>::len), Some(n as usize));
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Int { bits: u64, signed: bool, little: bool },
    Float { bits: u64, little: bool },
    Bytes(u64),
    /// Sized by the previous segment's value.
    Sized,
    /// Sized by the free variable `len`.
    FreeSized,
    Rest,
    Skip(u64),
    SkipRest,
    Literal(u8),
    Text(u64),
    Terminated(u64),
    Bcd(u64),
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    prop_oneof![
        4 => (
            prop::sample::select(vec![0u64, 4, 8, 12, 16, 24, 32, 40, 64, 72]),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(bits, signed, little)| Shape::Int { bits, signed, little }),
        1 => (prop::sample::select(vec![16u64, 32, 64]), any::<bool>())
            .prop_map(|(bits, little)| Shape::Float { bits, little }),
        2 => (0u64..4).prop_map(Shape::Bytes),
        2 => Just(Shape::Sized),
        1 => Just(Shape::FreeSized),
        1 => Just(Shape::Rest),
        2 => (0u64..12).prop_map(Shape::Skip),
        1 => Just(Shape::SkipRest),
        2 => (0u8..4).prop_map(Shape::Literal),
        1 => (0u64..3).prop_map(Shape::Text),
        1 => (0u64..3).prop_map(Shape::Terminated),
        1 => (0u64..3).prop_map(Shape::Bcd),
    ]
}

fn to_pattern(shapes: &[Shape]) -> Pattern {
    shapes
        .iter()
        .enumerate()
        .map(|(i, shape)| {
            let name = format!("v{}", i);
            let previous = if i == 0 { "len".to_string() } else { format!("v{}", i - 1) };
            match shape {
                Shape::Int { bits, signed, little } => {
                    let mut specs = vec![];
                    if *signed {
                        specs.push(Specifier::Signed);
                    }
                    if *little {
                        specs.push(Specifier::Little);
                    }
                    Segment::variable(name, Some(Size::Fixed(*bits)), &specs)
                }
                Shape::Float { bits, little } => {
                    let order = if *little { Specifier::Little } else { Specifier::Big };
                    Segment::variable(name, Some(Size::Fixed(*bits)), &[Specifier::Float, order])
                }
                Shape::Bytes(n) => Segment::variable(name, Some(Size::Fixed(*n)), &[Specifier::Binary]),
                Shape::Sized => Segment::variable(name, Some(Size::Var(previous)), &[Specifier::Binary]),
                Shape::FreeSized => {
                    Segment::variable(name, Some(Size::Var("len".into())), &[Specifier::Binary])
                }
                Shape::Rest => Segment::variable(name, None, &[Specifier::Binary]),
                Shape::Skip(bits) => Segment::variable("_", Some(Size::Fixed(*bits)), &[]),
                Shape::SkipRest => Segment::rest(),
                Shape::Literal(n) => Segment::value(Literal::Int(i64::from(*n)), None, &[]),
                Shape::Text(n) => Segment::variable(name, Some(Size::Fixed(*n)), &[Specifier::Utf8]),
                Shape::Terminated(n) => {
                    Segment::variable(name, Some(Size::Fixed(*n)), &[Specifier::Utf8, Specifier::Zero])
                }
                Shape::Bcd(n) => Segment::variable(name, Some(Size::Fixed(*n)), &[Specifier::Bcd]),
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn compiled_matcher_agrees_with_decode(
        shapes in prop::collection::vec(arb_shape(), 0..5),
        bin in prop::collection::vec(prop_oneof![3 => 0u8..4, 1 => any::<u8>()], 0..16),
        free_len in prop::option::of(0u64..4),
    ) {
        let pattern = to_pattern(&shapes);
        let mut free = Bindings::new();
        if let Some(len) = free_len {
            free.insert("len".to_string(), Value::UInt(len));
        }
        let generic = decode(&pattern, &bin, Some(&free));
        let compiled = compile(&pattern).decode(&bin, Some(&free));
        prop_assert_eq!(canonical(compiled), canonical(generic));
    }
}

use bitsyntax::{
    parse, Endianness, Justify, Kind, Literal, ParseError, Pattern, Segment, Size, Specifier, Target,
    TextEncoding,
};

fn segments(source: &str) -> Vec<Segment> {
    parse(source).expect("parse").segments().to_vec()
}

#[test]
fn defaults() {
    let s = segments("n");
    assert_eq!(s.len(), 1);
    assert_eq!(s[0], Segment::variable("n", None, &[]));
    assert_eq!(s[0].kind, Kind::Integer);
    assert_eq!(s[0].size, Size::Fixed(8));
    assert_eq!(s[0].endianness, Endianness::Big);
}

#[test]
fn sizes_and_specifiers() {
    let s = segments("len:16/little, payload:len/binary, x:32/float-signed, n:4/signed-little-unit:8");
    assert_eq!(s[0].size, Size::Fixed(16));
    assert_eq!(s[0].endianness, Endianness::Little);
    assert_eq!(s[1].kind, Kind::Binary);
    assert_eq!(s[1].size, Size::Var("len".into()));
    assert_eq!(s[1].unit, 8);
    assert_eq!(s[2].kind, Kind::Float);
    assert!(s[2].signed);
    assert_eq!(s[3].unit, 8);
    assert_eq!(s[3].size, Size::Fixed(4));
    assert!(s[3].signed);
}

#[test]
fn string_specifiers() {
    let s = segments("a:10/utf8-z, b:6/string-left-space, c/utf8-hex, d:2/utf8-right-bits");
    assert!(s[0].zero_terminated);
    assert_eq!(s[0].kind, Kind::String);
    assert_eq!(s[1].padding.map(|p| (p.justify, p.fill)), Some((Justify::Left, ' ')));
    assert_eq!(s[2].encoding, TextEncoding::Hex);
    assert_eq!(s[2].size, Size::Rest);
    assert_eq!(s[3].padding.map(|p| (p.justify, p.fill)), Some((Justify::Right, '0')));
    assert_eq!(s[3].encoding, TextEncoding::Bits);

    let s = segments("n:2/bcd");
    assert_eq!(s[0].kind, Kind::Bcd);
}

#[test]
fn wildcards_and_literals() {
    let s = segments("_:3, _/binary, 42:16, -7/signed, 1.5/float, \"GET \\\"x\\\"\\n\"");
    assert_eq!(s[0].target, Target::Skip);
    assert_eq!(s[1], Segment::rest());
    assert_eq!(s[2].target, Target::Literal(Literal::Int(42)));
    assert_eq!(s[3].target, Target::Literal(Literal::Int(-7)));
    assert_eq!(s[4].target, Target::Literal(Literal::Float(1.5)));
    assert_eq!(s[4].kind, Kind::Float);
    assert_eq!(s[5], Segment::string("GET \"x\"\n"));
    assert_eq!(s[5].size, Size::Fixed(8));
}

#[test]
fn literal_kind_follows_literal() {
    assert_eq!(segments("2.5")[0].kind, Kind::Float);
    assert_eq!(segments("2.5")[0].size, Size::Fixed(64));
    assert_eq!(segments("\"ab\"")[0].kind, Kind::String);
}

#[test]
fn unknown_specifiers_are_ignored() {
    assert_eq!(segments("n:8/bogus")[0], Segment::variable("n", Some(Size::Fixed(8)), &[]));
    let s = segments("x:32/float-wobbly-little");
    assert_eq!(s[0].kind, Kind::Float);
    assert_eq!(s[0].endianness, Endianness::Little);
    assert!(matches!("bogus".parse::<Specifier>(), Err(ParseError::UnknownSpecifier(w)) if w == "bogus"));
}

#[test]
fn float_literals_print_back() {
    for x in [1e300, 2.0, -2.5, 1e-7] {
        let p = Pattern::new(vec![Segment::value(Literal::Float(x), None, &[])]);
        assert_eq!(p.to_string().parse::<Pattern>(), Ok(p));
    }
}

#[test]
fn whitespace_is_ignored() {
    assert_eq!(parse(" a : 8 ,\n b:16 / little "), parse("a:8, b:16/little"));
    assert!(parse("").expect("parse").is_empty());
}

#[test]
fn rejects_bad_input() {
    assert!(matches!(parse("n/unit:0"), Err(ParseError::InvalidSize(_))));
    assert!(matches!(parse("n/unit:257"), Err(ParseError::InvalidSize(_))));
    assert!(matches!(parse("n:99999999999999999999"), Err(ParseError::InvalidSize(_))));
    assert!(matches!(parse("99999999999999999999"), Err(ParseError::InvalidLiteral(_))));
    assert!(matches!(parse("n:"), Err(ParseError::Syntax(_))));
    assert!(matches!(parse("a,,b"), Err(ParseError::Syntax(_))));
    assert!(matches!(parse("\"open"), Err(ParseError::Syntax(_))));
    assert!(matches!(parse("n:8/"), Err(ParseError::Syntax(_))));
}

#[test]
fn display_parses_back() {
    for source in [
        "len:16/little, payload:len/binary, \"END\", _/binary",
        "n:4/signed-little-unit:8",
        "s:5/utf8-z, id:6/utf8-left-space, h/utf8-hex",
        "7:16, x:32/float, n:3/bcd",
    ] {
        let p: Pattern = source.parse().expect("parse");
        assert_eq!(p.to_string(), source);
        assert_eq!(p.to_string().parse::<Pattern>(), Ok(p));
    }
}

#[test]
fn specifier_words() {
    assert_eq!("utf8".parse(), Ok(Specifier::Utf8));
    assert_eq!("string".parse(), Ok(Specifier::Utf8));
    assert_eq!("z".parse(), Ok(Specifier::Zero));
    assert_eq!("unit:16".parse(), Ok(Specifier::Unit(16)));
}

#[test]
fn convenience_constructors() {
    let m = bitsyntax::matcher("a:8, b:8").expect("parse");
    assert_eq!(m.variables(), ["a".to_string(), "b".to_string()]);
    assert!(bitsyntax::builder("a:8/").is_err());
}

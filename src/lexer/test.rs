use fallible_iterator::FallibleIterator;

use vm::Value;
use super::{LexError, Lexer, Token};

fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source.chars()).collect()
}

fn lex_to_strings(source: &str) -> Vec<String> {
    lex(source)
        .expect("tokenizes")
        .iter()
        .map(|token| token.to_string())
        .collect()
}

#[test]
fn delimiters_and_shorthands() {
    assert_eq!(
        lex("(')`,,@#(#;").unwrap(),
        vec![
            Token::Open,
            Token::Quote,
            Token::Close,
            Token::Quasiquote,
            Token::Unquote,
            Token::UnquoteSplicing,
            Token::OpenVector,
            Token::DatumComment,
        ]
    );
}

#[test]
fn booleans() {
    assert_eq!(
        lex("#t #f").unwrap(),
        vec![
            Token::Datum(Value::Boolean(true)),
            Token::Datum(Value::Boolean(false)),
        ]
    );
}

#[test]
fn numbers() {
    assert_eq!(
        lex_to_strings("42 -7 .5 1e2 #xff #b101 #o17 #d42 #i10 #e#x10 1/2"),
        vec!["42", "-7", "0.5", "100", "255", "5", "15", "42", "10", "16", "0.5"]
    );
}

#[test]
fn number_errors() {
    assert_eq!(
        lex("#x5g"),
        Err(LexError::InvalidNumber("5g".to_owned()))
    );
    assert_eq!(lex("#q5"), Err(LexError::InvalidPound('q')));
    assert_eq!(lex("#i#q5"), Err(LexError::InvalidRadix('q')));
    assert_eq!(lex("#x#b5"), Err(LexError::InvalidExactness('b')));
    assert_eq!(
        lex("+inf.0"),
        Err(LexError::NonFiniteNumber("+inf.0".to_owned()))
    );
    assert_eq!(
        lex("-nan.0"),
        Err(LexError::NonFiniteNumber("-nan.0".to_owned()))
    );
}

#[test]
fn identifiers() {
    assert_eq!(
        lex_to_strings("foo set! <=? ... + - list->vector"),
        vec!["foo", "set!", "<=?", "...", "+", "-", "list->vector"]
    );
}

#[test]
fn strings_and_escapes() {
    assert_eq!(
        lex_to_strings(r#""hello" "a\nb" "x\x41;y" "q\"q""#),
        vec!["hello", "a\nb", "xAy", "q\"q"]
    );
}

#[test]
fn string_line_continuation() {
    assert_eq!(lex_to_strings("\"one \\  \n   two\""), vec!["one two"]);
}

#[test]
fn string_errors() {
    assert_eq!(lex("\"abc"), Err(LexError::UnterminatedString));
    assert_eq!(lex(r#""a\qb""#), Err(LexError::InvalidEscape('q')));
    assert_eq!(lex(r#""a\xzz;""#), Err(LexError::InvalidHexEscape));
}

#[test]
fn comments() {
    assert_eq!(
        lex_to_strings("; line\n42 #| block #| nested |# |# 7"),
        vec!["42", "7"]
    );
}

#[test]
fn unterminated_block_comment() {
    assert_eq!(lex("#| abc"), Err(LexError::UnterminatedComment));
}

#[test]
fn directives_are_ignored() {
    assert_eq!(lex_to_strings("#!fold-case 42"), vec!["42"]);
}

#[test]
fn character_literals_are_rejected() {
    assert_eq!(lex(r"#\a"), Err(LexError::CharacterLiteral));
}

#[test]
fn piped_symbols_are_rejected() {
    assert_eq!(lex("|sym|"), Err(LexError::PipedSymbol));
}

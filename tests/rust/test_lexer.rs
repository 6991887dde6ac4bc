//! Lexer tests: tokenization, comments, number literals, error handling

use ministack::lexer::Lexer;
use ministack::lexer::tokens::TokenType;

fn lex(source: &str) -> Vec<(TokenType, String)> {
    let tokens = Lexer::new(source, "test.c").tokenize().unwrap();
    tokens.into_iter()
        .filter(|t| !matches!(t.token_type, TokenType::Eof))
        .map(|t| (t.token_type, t.value))
        .collect()
}

fn lex_types(source: &str) -> Vec<TokenType> {
    lex(source).into_iter().map(|(tt, _)| tt).collect()
}

fn lex_err(source: &str) -> String {
    Lexer::new(source, "test.c").tokenize().unwrap_err().message
}

// ── Basic tokens ────────────────────────────────────────────

#[test]
fn identifier() {
    let tokens = lex("hello");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0], (TokenType::Identifier, "hello".into()));
}

#[test]
fn heap_base_is_an_identifier() {
    assert_eq!(lex("__heap_base"), vec![(TokenType::Identifier, "__heap_base".into())]);
}

#[test]
fn integer_literal() {
    assert_eq!(lex("42")[0], (TokenType::Integer, "42".into()));
}

#[test]
fn float_literal() {
    assert_eq!(lex("5.5")[0], (TokenType::Float, "5.5".into()));
}

#[test]
fn exponent_makes_a_float() {
    assert_eq!(lex("1e3")[0], (TokenType::Float, "1e3".into()));
    assert_eq!(lex("2.5E-2")[0], (TokenType::Float, "2.5E-2".into()));
}

#[test]
fn eof_is_always_last() {
    let tokens = Lexer::new("", "test.c").tokenize().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::Eof);
}

// ── Keywords ────────────────────────────────────────────────

#[test]
fn keywords() {
    assert_eq!(
        lex_types("double int void export if else for while return"),
        vec![
            TokenType::Double,
            TokenType::Int,
            TokenType::Void,
            TokenType::Export,
            TokenType::If,
            TokenType::Else,
            TokenType::For,
            TokenType::While,
            TokenType::Return,
        ]
    );
}

#[test]
fn keyword_prefix_is_identifier() {
    assert_eq!(lex_types("doubles integer fn"), vec![TokenType::Identifier; 3]);
}

// ── Operators ───────────────────────────────────────────────

#[test]
fn two_character_operators() {
    assert_eq!(
        lex_types("== != <= >= += -= *= /= ++ --"),
        vec![
            TokenType::Equals,
            TokenType::NotEquals,
            TokenType::LessEqual,
            TokenType::GreaterEqual,
            TokenType::PlusAssign,
            TokenType::MinusAssign,
            TokenType::StarAssign,
            TokenType::SlashAssign,
            TokenType::PlusPlus,
            TokenType::MinusMinus,
        ]
    );
}

#[test]
fn single_character_operators() {
    assert_eq!(
        lex_types("( ) { } ; , = + - * / < >"),
        vec![
            TokenType::LParen,
            TokenType::RParen,
            TokenType::LBrace,
            TokenType::RBrace,
            TokenType::Semicolon,
            TokenType::Comma,
            TokenType::Assign,
            TokenType::Plus,
            TokenType::Minus,
            TokenType::Star,
            TokenType::Slash,
            TokenType::LessThan,
            TokenType::GreaterThan,
        ]
    );
}

#[test]
fn increment_in_for_header() {
    assert_eq!(
        lex_types("i < x; i++)"),
        vec![
            TokenType::Identifier,
            TokenType::LessThan,
            TokenType::Identifier,
            TokenType::Semicolon,
            TokenType::Identifier,
            TokenType::PlusPlus,
            TokenType::RParen,
        ]
    );
}

#[test]
fn pointer_declaration() {
    assert_eq!(
        lex_types("double *p = pmalloc(8);"),
        vec![
            TokenType::Double,
            TokenType::Star,
            TokenType::Identifier,
            TokenType::Assign,
            TokenType::Identifier,
            TokenType::LParen,
            TokenType::Integer,
            TokenType::RParen,
            TokenType::Semicolon,
        ]
    );
}

// ── Comments and positions ──────────────────────────────────

#[test]
fn line_comment_skipped() {
    assert_eq!(lex_types("x // ignored ; {\ny"), vec![TokenType::Identifier; 2]);
}

#[test]
fn block_comment_skipped() {
    assert_eq!(lex_types("x /* a\n * b */ y"), vec![TokenType::Identifier; 2]);
}

#[test]
fn slash_is_still_division() {
    assert_eq!(
        lex_types("a / b"),
        vec![TokenType::Identifier, TokenType::Slash, TokenType::Identifier]
    );
}

#[test]
fn positions_track_lines_and_columns() {
    let tokens = Lexer::new("int a;\n  double b;", "test.c").tokenize().unwrap();
    let b = tokens.iter().find(|t| t.value == "b").unwrap();
    assert_eq!((b.line, b.column), (2, 10));
    assert_eq!(b.file, "test.c");
}

// ── Errors ──────────────────────────────────────────────────

#[test]
fn unexpected_character() {
    assert!(lex_err("x @ y").contains("Unexpected character"));
}

#[test]
fn unterminated_block_comment() {
    assert!(lex_err("x /* never closed").contains("Unterminated block comment"));
}

#[test]
fn trailing_dot_is_rejected() {
    assert!(lex_err("5.").contains("Expected digit after '.'"));
}

#[test]
fn empty_exponent_is_rejected() {
    assert!(lex_err("1e+").contains("exponent"));
}

#[test]
fn suffix_on_number_is_rejected() {
    assert!(lex_err("12abc").contains("Invalid suffix"));
}

#[test]
fn error_display_has_location() {
    let err = Lexer::new("\n  @", "prog.c").tokenize().unwrap_err();
    assert_eq!(err.to_string(), "prog.c:2:3: Unexpected character: '@'");
}

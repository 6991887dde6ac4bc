use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Eof,

    // Literals
    Integer,
    Float,

    Identifier,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Comma,

    // Assignment
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PlusPlus,
    MinusMinus,

    // Comparison / arithmetic
    Equals,
    NotEquals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,

    // Keywords: types
    Double,
    Int,
    Void,

    // Keywords: declarations and control flow
    Export,
    Extern,
    If,
    Else,
    For,
    While,
    Return,
}

impl TokenType {
    /// Whether this token starts a type name
    pub fn is_type(&self) -> bool {
        matches!(self, TokenType::Double | TokenType::Int | TokenType::Void)
    }
}

/// Look up a keyword string and return its TokenType, or None if it's a plain identifier.
pub fn keyword_type(word: &str) -> Option<TokenType> {
    match word {
        "double" => Some(TokenType::Double),
        "int" => Some(TokenType::Int),
        "void" => Some(TokenType::Void),
        "export" => Some(TokenType::Export),
        "extern" => Some(TokenType::Extern),
        "if" => Some(TokenType::If),
        "else" => Some(TokenType::Else),
        "for" => Some(TokenType::For),
        "while" => Some(TokenType::While),
        "return" => Some(TokenType::Return),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub line: usize,
    pub column: usize,
    pub file: String,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token_type {
            TokenType::Eof => {
                write!(f, "Token({:?}, {}:{})", self.token_type, self.line, self.column)
            }
            _ => {
                write!(
                    f,
                    "Token({:?}, {:?}, {}:{})",
                    self.token_type, self.value, self.line, self.column
                )
            }
        }
    }
}

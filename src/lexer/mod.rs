pub mod tokens;

use tokens::{keyword_type, Token, TokenType};
use std::fmt;

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub file: String,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

impl std::error::Error for LexerError {}

pub struct Lexer {
    source: Vec<char>,
    filename: String,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str, filename: &str) -> Self {
        Self {
            source: source.chars().collect(),
            filename: filename.to_string(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        loop {
            self.skip_trivia()?;
            if self.at_end() {
                break;
            }
            self.scan_token()?;
        }

        self.tokens.push(self.make_token(TokenType::Eof, ""));
        Ok(self.tokens)
    }

    /// Skip whitespace, `// line` comments and `/* block */` comments
    fn skip_trivia(&mut self) -> Result<(), LexerError> {
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_ahead(1) == Some('/') {
                while !self.at_end() && self.peek() != '\n' {
                    self.advance();
                }
            } else if ch == '/' && self.peek_ahead(1) == Some('*') {
                let (line, column) = (self.line, self.column);
                self.advance();
                self.advance();
                loop {
                    if self.at_end() {
                        return Err(LexerError {
                            message: "Unterminated block comment".to_string(),
                            line,
                            column,
                            file: self.filename.clone(),
                        });
                    }
                    if self.peek() == '*' && self.peek_ahead(1) == Some('/') {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn scan_token(&mut self) -> Result<(), LexerError> {
        let ch = self.peek();

        if ch.is_ascii_digit() {
            return self.scan_number();
        }

        // Two-character operators
        let next = self.peek_ahead(1);
        let double = match (ch, next) {
            ('=', Some('=')) => Some(TokenType::Equals),
            ('!', Some('=')) => Some(TokenType::NotEquals),
            ('<', Some('=')) => Some(TokenType::LessEqual),
            ('>', Some('=')) => Some(TokenType::GreaterEqual),
            ('+', Some('=')) => Some(TokenType::PlusAssign),
            ('-', Some('=')) => Some(TokenType::MinusAssign),
            ('*', Some('=')) => Some(TokenType::StarAssign),
            ('/', Some('=')) => Some(TokenType::SlashAssign),
            ('+', Some('+')) => Some(TokenType::PlusPlus),
            ('-', Some('-')) => Some(TokenType::MinusMinus),
            _ => None,
        };
        if let Some(tt) = double {
            let s: String = [ch, next.unwrap_or_default()].iter().collect();
            self.tokens.push(self.make_token(tt, &s));
            self.advance();
            self.advance();
            return Ok(());
        }

        // Single-character tokens
        let single = match ch {
            '(' => Some(TokenType::LParen),
            ')' => Some(TokenType::RParen),
            '{' => Some(TokenType::LBrace),
            '}' => Some(TokenType::RBrace),
            ';' => Some(TokenType::Semicolon),
            ',' => Some(TokenType::Comma),
            '+' => Some(TokenType::Plus),
            '-' => Some(TokenType::Minus),
            '*' => Some(TokenType::Star),
            '/' => Some(TokenType::Slash),
            '<' => Some(TokenType::LessThan),
            '>' => Some(TokenType::GreaterThan),
            '=' => Some(TokenType::Assign),
            _ => None,
        };

        if let Some(tt) = single {
            let s = ch.to_string();
            self.tokens.push(self.make_token(tt, &s));
            self.advance();
            return Ok(());
        }

        // Identifiers and keywords
        if ch.is_ascii_alphabetic() || ch == '_' {
            return self.scan_identifier();
        }

        Err(LexerError {
            message: format!("Unexpected character: {:?}", ch),
            line: self.line,
            column: self.column,
            file: self.filename.clone(),
        })
    }

    /// digits [ '.' digits ] [ ('e' | 'E') ['+' | '-'] digits ]
    fn scan_number(&mut self) -> Result<(), LexerError> {
        let start_col = self.column;
        let start_line = self.line;
        let mut num_chars = String::new();
        let mut is_float = false;

        self.take_digits(&mut num_chars);

        if !self.at_end() && self.peek() == '.' {
            if !self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) {
                return Err(LexerError {
                    message: format!("Expected digit after '.' in number literal {}.", num_chars),
                    line: start_line,
                    column: start_col,
                    file: self.filename.clone(),
                });
            }
            num_chars.push(self.advance());
            self.take_digits(&mut num_chars);
            is_float = true;
        }

        if !self.at_end() && (self.peek() == 'e' || self.peek() == 'E') {
            num_chars.push(self.advance());
            if !self.at_end() && (self.peek() == '+' || self.peek() == '-') {
                num_chars.push(self.advance());
            }
            if self.at_end() || !self.peek().is_ascii_digit() {
                return Err(LexerError {
                    message: format!("Expected digit in exponent of number literal {}", num_chars),
                    line: start_line,
                    column: start_col,
                    file: self.filename.clone(),
                });
            }
            self.take_digits(&mut num_chars);
            is_float = true;
        }

        if !self.at_end() && (self.peek().is_ascii_alphabetic() || self.peek() == '_') {
            return Err(LexerError {
                message: format!("Invalid suffix {:?} on number literal {}", self.peek(), num_chars),
                line: self.line,
                column: self.column,
                file: self.filename.clone(),
            });
        }

        let tt = if is_float {
            TokenType::Float
        } else {
            TokenType::Integer
        };

        self.tokens.push(Token {
            token_type: tt,
            value: num_chars,
            line: start_line,
            column: start_col,
            file: self.filename.clone(),
        });
        Ok(())
    }

    fn take_digits(&mut self, out: &mut String) {
        while !self.at_end() && self.peek().is_ascii_digit() {
            out.push(self.advance());
        }
    }

    fn scan_identifier(&mut self) -> Result<(), LexerError> {
        let start_col = self.column;
        let mut word = String::new();

        while !self.at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            word.push(self.advance());
        }

        let tt = keyword_type(&word).unwrap_or(TokenType::Identifier);
        self.tokens.push(Token {
            token_type: tt,
            value: word,
            line: self.line,
            column: start_col,
            file: self.filename.clone(),
        });
        Ok(())
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn peek(&self) -> char {
        self.source[self.pos]
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn make_token(&self, token_type: TokenType, value: &str) -> Token {
        Token {
            token_type,
            value: value.to_string(),
            line: self.line,
            column: self.column,
            file: self.filename.clone(),
        }
    }
}

//! Tokenizer for CEL expressions.

/// Words which are reserved by the CEL grammar and may not be used as
/// identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "as", "break", "const", "continue", "else", "for", "function", "if", "import", "let", "loop",
    "package", "namespace", "return", "var", "void", "while",
];

/// A malformed token, located by the byte offset it starts at.
#[derive(Debug, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LexError {}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Ident(String),

    /// The magnitude of an integer literal. The sign is applied by the parser
    /// so that `-9223372036854775808` can be represented.
    Int(u64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    True,
    False,
    Null,
    In,

    LParen,
    RParen,
    LBracket,
    /// `[?`, the optional index operator.
    LBracketQuestion,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    /// `.?`, the optional field selection operator.
    DotQuestion,
    Comma,
    Colon,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Int(value) => write!(f, "'{value}'"),
            Self::Uint(value) => write!(f, "'{value}u'"),
            Self::Double(value) => write!(f, "'{value}'"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Bytes(_) => f.write_str("bytes literal"),
            Self::True => f.write_str("'true'"),
            Self::False => f.write_str("'false'"),
            Self::Null => f.write_str("'null'"),
            Self::In => f.write_str("'in'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::LBracket => f.write_str("'['"),
            Self::LBracketQuestion => f.write_str("'[?'"),
            Self::RBracket => f.write_str("']'"),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::Dot => f.write_str("'.'"),
            Self::DotQuestion => f.write_str("'.?'"),
            Self::Comma => f.write_str("','"),
            Self::Colon => f.write_str("':'"),
            Self::Question => f.write_str("'?'"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::Percent => f.write_str("'%'"),
            Self::Bang => f.write_str("'!'"),
            Self::Eq => f.write_str("'=='"),
            Self::Ne => f.write_str("'!='"),
            Self::Lt => f.write_str("'<'"),
            Self::Le => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::Ge => f.write_str("'>='"),
            Self::And => f.write_str("'&&'"),
            Self::Or => f.write_str("'||'"),
        }
    }
}

/// A token together with the byte offset it starts at.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Splits `input` into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LexError> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    position: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            position: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.position + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.position)
            .map_or(self.input.len(), |(offset, _)| *offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        Some(c)
    }

    fn error<T>(&self, offset: usize, message: impl Into<String>) -> Result<T, LexError> {
        Err(LexError {
            message: message.into(),
            offset,
        })
    }

    fn run(mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let offset = self.offset();

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c == '/' && self.peek_at(1) == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
                continue;
            }

            let token = match c {
                '0'..='9' => self.number()?,
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number()?,
                '\'' | '"' => self.string(false, false)?,
                'r' | 'R' | 'b' | 'B' if self.is_string_prefix() => self.prefixed_string()?,
                c if c == '_' || c.is_ascii_alphabetic() => self.identifier(),
                _ => self.punctuation()?,
            };

            tokens.push(Spanned { token, offset });
        }

        Ok(tokens)
    }

    fn punctuation(&mut self) -> Result<Token, LexError> {
        let offset = self.offset();
        let Some(c) = self.bump() else {
            return self.error(offset, "unexpected end of input");
        };
        let next = self.peek();

        let (token, consumed_next) = match (c, next) {
            ('(', _) => (Token::LParen, false),
            (')', _) => (Token::RParen, false),
            ('[', Some('?')) => (Token::LBracketQuestion, true),
            ('[', _) => (Token::LBracket, false),
            (']', _) => (Token::RBracket, false),
            ('{', _) => (Token::LBrace, false),
            ('}', _) => (Token::RBrace, false),
            ('.', Some('?')) => (Token::DotQuestion, true),
            ('.', _) => (Token::Dot, false),
            (',', _) => (Token::Comma, false),
            (':', _) => (Token::Colon, false),
            ('?', _) => (Token::Question, false),
            ('+', _) => (Token::Plus, false),
            ('-', _) => (Token::Minus, false),
            ('*', _) => (Token::Star, false),
            ('/', _) => (Token::Slash, false),
            ('%', _) => (Token::Percent, false),
            ('=', Some('=')) => (Token::Eq, true),
            ('!', Some('=')) => (Token::Ne, true),
            ('!', _) => (Token::Bang, false),
            ('<', Some('=')) => (Token::Le, true),
            ('<', _) => (Token::Lt, false),
            ('>', Some('=')) => (Token::Ge, true),
            ('>', _) => (Token::Gt, false),
            ('&', Some('&')) => (Token::And, true),
            ('|', Some('|')) => (Token::Or, true),
            (c, _) => return self.error(offset, format!("token recognition error at: '{c}'")),
        };

        if consumed_next {
            self.bump();
        }

        Ok(token)
    }

    fn identifier(&mut self) -> Token {
        let start = self.offset();
        while self
            .peek()
            .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric())
        {
            self.bump();
        }
        let word = &self.input[start..self.offset()];

        match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "in" => Token::In,
            _ => Token::Ident(word.to_owned()),
        }
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let start = self.offset();

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let digits_start = self.offset();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &self.input[digits_start..self.offset()];
            let Ok(value) = u64::from_str_radix(digits, 16) else {
                return self.error(start, format!("invalid hex literal '{}'", &self.input[start..self.offset()]));
            };
            return Ok(self.integer_suffix(value));
        }

        let mut is_double = false;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }

        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_double = true;
                for _ in 0..=sign {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let literal = &self.input[start..self.offset()];

        if is_double {
            return match literal.parse::<f64>() {
                Ok(value) => Ok(Token::Double(value)),
                Err(_) => self.error(start, format!("invalid double literal '{literal}'")),
            };
        }

        match literal.parse::<u64>() {
            Ok(value) => Ok(self.integer_suffix(value)),
            Err(_) => self.error(start, format!("integer literal '{literal}' is out of range")),
        }
    }

    fn integer_suffix(&mut self, value: u64) -> Token {
        if matches!(self.peek(), Some('u' | 'U')) {
            self.bump();
            Token::Uint(value)
        } else {
            Token::Int(value)
        }
    }

    fn is_string_prefix(&self) -> bool {
        match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (_, Some('\'' | '"'), _) => true,
            (Some('r' | 'R'), Some('b' | 'B'), Some('\'' | '"'))
            | (Some('b' | 'B'), Some('r' | 'R'), Some('\'' | '"')) => true,
            _ => false,
        }
    }

    fn prefixed_string(&mut self) -> Result<Token, LexError> {
        let mut raw = false;
        let mut bytes = false;

        while let Some(c) = self.peek() {
            match c {
                'r' | 'R' => raw = true,
                'b' | 'B' => bytes = true,
                _ => break,
            }
            self.bump();
        }

        self.string(raw, bytes)
    }

    fn string(&mut self, raw: bool, bytes: bool) -> Result<Token, LexError> {
        let start = self.offset();
        let Some(quote) = self.bump() else {
            return self.error(start, "unexpected end of input");
        };

        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = Vec::<u8>::new();

        loop {
            let Some(c) = self.bump() else {
                return self.error(start, "unterminated string literal");
            };

            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    break;
                }
            }

            if !triple && (c == '\n' || c == '\r') {
                return self.error(start, "unterminated string literal");
            }

            if c == '\\' && !raw {
                self.escape(&mut value, bytes)?;
                continue;
            }

            let mut buffer = [0; 4];
            value.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
        }

        if bytes {
            return Ok(Token::Bytes(value));
        }

        match String::from_utf8(value) {
            Ok(value) => Ok(Token::String(value)),
            Err(_) => self.error(start, "string literal is not valid UTF-8"),
        }
    }

    fn escape(&mut self, value: &mut Vec<u8>, bytes: bool) -> Result<(), LexError> {
        let offset = self.offset();
        let Some(c) = self.bump() else {
            return self.error(offset, "unterminated escape sequence");
        };

        let simple = match c {
            'a' => Some(0x07),
            'b' => Some(0x08),
            'f' => Some(0x0c),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'v' => Some(0x0b),
            '\\' => Some(b'\\'),
            '\'' => Some(b'\''),
            '"' => Some(b'"'),
            '`' => Some(b'`'),
            '?' => Some(b'?'),
            _ => None,
        };

        if let Some(byte) = simple {
            value.push(byte);
            return Ok(());
        }

        match c {
            'x' | 'X' => {
                let code = self.hex_digits(2, offset)?;
                self.push_code(value, code, bytes, offset)
            }
            'u' if !bytes => {
                let code = self.hex_digits(4, offset)?;
                self.push_code(value, code, bytes, offset)
            }
            'U' if !bytes => {
                let code = self.hex_digits(8, offset)?;
                self.push_code(value, code, bytes, offset)
            }
            '0'..='3' => {
                let mut code = c.to_digit(8).unwrap_or_default();
                for _ in 0..2 {
                    match self.bump().and_then(|c| c.to_digit(8)) {
                        Some(digit) => code = code * 8 + digit,
                        None => return self.error(offset, "invalid octal escape sequence"),
                    }
                }
                self.push_code(value, code, bytes, offset)
            }
            c => self.error(offset, format!("invalid escape sequence '\\{c}'")),
        }
    }

    fn hex_digits(&mut self, count: usize, offset: usize) -> Result<u32, LexError> {
        let mut code = 0;
        for _ in 0..count {
            match self.bump().and_then(|c| c.to_digit(16)) {
                Some(digit) => code = code * 16 + digit,
                None => return self.error(offset, "invalid hex escape sequence"),
            }
        }
        Ok(code)
    }

    fn push_code(
        &self,
        value: &mut Vec<u8>,
        code: u32,
        bytes: bool,
        offset: usize,
    ) -> Result<(), LexError> {
        if bytes {
            // Octal and hex escapes in bytes literals denote raw bytes.
            value.push(code as u8);
            return Ok(());
        }

        match char::from_u32(code) {
            Some(c) => {
                let mut buffer = [0; 4];
                value.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
                Ok(())
            }
            None => self.error(offset, format!("invalid unicode code point {code:#x}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input)
            .expect("input must tokenize")
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn operators_and_identifiers() {
        assert_eq!(
            tokens("self.size() <= 10 && oldSelf.?foo[?0] != null"),
            vec![
                Token::Ident("self".to_owned()),
                Token::Dot,
                Token::Ident("size".to_owned()),
                Token::LParen,
                Token::RParen,
                Token::Le,
                Token::Int(10),
                Token::And,
                Token::Ident("oldSelf".to_owned()),
                Token::DotQuestion,
                Token::Ident("foo".to_owned()),
                Token::LBracketQuestion,
                Token::Int(0),
                Token::RBracket,
                Token::Ne,
                Token::Null,
            ]
        );
    }

    #[rstest]
    #[case("42", Token::Int(42))]
    #[case("42u", Token::Uint(42))]
    #[case("0x1F", Token::Int(31))]
    #[case("1.5", Token::Double(1.5))]
    #[case("1e3", Token::Double(1000.0))]
    #[case(".5", Token::Double(0.5))]
    #[case("9223372036854775808", Token::Int(9_223_372_036_854_775_808))]
    fn numbers(#[case] input: &str, #[case] expected: Token) {
        assert_eq!(tokens(input), vec![expected]);
    }

    #[rstest]
    #[case(r#""hello""#, "hello")]
    #[case(r"'it\'s'", "it's")]
    #[case(r"'tab\there'", "tab\there")]
    #[case(r"r'\d+'", r"\d+")]
    #[case(r"'é'", "é")]
    #[case(r"'\101'", "A")]
    #[case("'''multi\nline'''", "multi\nline")]
    fn strings(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(tokens(input), vec![Token::String(expected.to_owned())]);
    }

    #[test]
    fn bytes() {
        assert_eq!(tokens(r"b'\xff'"), vec![Token::Bytes(vec![0xff])]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(tokens("true // trailing"), vec![Token::True]);
    }

    #[rstest]
    #[case("'unterminated")]
    #[case("a # b")]
    #[case("99999999999999999999")]
    #[case(r"'\q'")]
    fn errors(#[case] input: &str) {
        assert!(tokenize(input).is_err());
    }
}

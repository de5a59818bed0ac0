//! Tokenizer for FHIRPath expressions
//!
//! Produces spanned tokens over the input with byte offsets. Identifiers and
//! delimited text are zero-copy slices; string literals are unescaped.

use super::error::{ParseResult, SyntaxError};
use super::span::Spanned;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use unicode_xid::UnicodeXID;

/// Token produced by the tokenizer
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Decimal literal as written (e.g., 3.14)
    Decimal(&'input str),
    /// Unescaped string literal
    String(String),
    /// Date literal without the `@`
    Date(&'input str),
    /// DateTime literal without the `@`
    DateTime(&'input str),
    /// Time literal without the `@T`
    Time(&'input str),

    /// Plain identifier
    Identifier(&'input str),
    /// Backtick-delimited identifier, content only
    DelimitedIdentifier(&'input str),
    /// `$name`
    Dollar(&'input str),
    /// `%name`, `%\`name\`` or `%'name'`
    Percent(&'input str),

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `~`
    Equivalent,
    /// `!~`
    NotEquivalent,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,

    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,

    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
    /// `implies`
    Implies,
    /// `div`
    Div,
    /// `mod`
    Mod,
    /// `in`
    In,
    /// `contains`
    Contains,
    /// `is`
    Is,
    /// `as`
    As,
    /// `true`
    True,
    /// `false`
    False,
}

static KEYWORD_TABLE: Lazy<FxHashMap<&'static str, Token<'static>>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("and", Token::And);
    map.insert("or", Token::Or);
    map.insert("xor", Token::Xor);
    map.insert("implies", Token::Implies);
    map.insert("div", Token::Div);
    map.insert("mod", Token::Mod);
    map.insert("in", Token::In);
    map.insert("contains", Token::Contains);
    map.insert("is", Token::Is);
    map.insert("as", Token::As);
    map.insert("true", Token::True);
    map.insert("false", Token::False);
    map
});

/// Words that read as keywords of the language
pub fn keywords() -> impl Iterator<Item = &'static str> {
    KEYWORD_TABLE.keys().copied()
}

impl Token<'_> {
    /// Source text of a keyword token
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            Token::And => "and",
            Token::Or => "or",
            Token::Xor => "xor",
            Token::Implies => "implies",
            Token::Div => "div",
            Token::Mod => "mod",
            Token::In => "in",
            Token::Contains => "contains",
            Token::Is => "is",
            Token::As => "as",
            Token::True => "true",
            Token::False => "false",
            _ => return None,
        })
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        if let Some(keyword) = self.keyword_text() {
            return format!("'{keyword}'");
        }
        let text = match self {
            Token::Integer(value) => return value.to_string(),
            Token::Decimal(value) => return value.to_string(),
            Token::String(value) => return format!("'{value}'"),
            Token::Date(value) | Token::DateTime(value) => return format!("@{value}"),
            Token::Time(value) => return format!("@T{value}"),
            Token::Identifier(name) => return format!("'{name}'"),
            Token::DelimitedIdentifier(name) => return format!("`{name}`"),
            Token::Dollar(name) => return format!("${name}"),
            Token::Percent(name) => return format!("%{name}"),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Multiply => "*",
            Token::Divide => "/",
            Token::Ampersand => "&",
            Token::Pipe => "|",
            Token::Equal => "=",
            Token::NotEqual => "!=",
            Token::Equivalent => "~",
            Token::NotEquivalent => "!~",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            _ => "token",
        };
        format!("'{text}'")
    }
}

/// Tokenizer over one expression
pub struct Tokenizer<'input> {
    input: &'input str,
    position: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a new tokenizer
    pub fn new(input: &'input str) -> Self {
        Self { input, position: 0 }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> ParseResult<Vec<Spanned<Token<'input>>>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_char_at(&self, skip: usize) -> Option<char> {
        self.input[self.position..].chars().nth(skip)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn skip_trivia(&mut self) -> ParseResult<()> {
        loop {
            match self.peek_char() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_char_at(1) == Some('/') => {
                    while let Some(ch) = self.bump() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_char_at(1) == Some('*') => {
                    let start = self.position;
                    match self.input[start + 2..].find("*/") {
                        Some(end) => self.position = start + 2 + end + 2,
                        None => {
                            return Err(SyntaxError::new(
                                "Unterminated comment",
                                start,
                                self.input.len() - start,
                            ));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Option<Spanned<Token<'input>>>> {
        self.skip_trivia()?;
        let start = self.position;
        let Some(ch) = self.bump() else {
            return Ok(None);
        };

        let token = match ch {
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            '{' => Token::LeftBrace,
            '}' => Token::RightBrace,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Multiply,
            '/' => Token::Divide,
            '&' => Token::Ampersand,
            '|' => Token::Pipe,
            '=' => Token::Equal,
            '~' => Token::Equivalent,
            '<' => self.with_equals(Token::LessThanOrEqual, Token::LessThan),
            '>' => self.with_equals(Token::GreaterThanOrEqual, Token::GreaterThan),
            '!' => match self.peek_char() {
                Some('=') => {
                    self.bump();
                    Token::NotEqual
                }
                Some('~') => {
                    self.bump();
                    Token::NotEquivalent
                }
                _ => return Err(SyntaxError::new("Unexpected character '!'", start, 1)),
            },
            '\'' => Token::String(self.scan_string(start, '\'')?),
            '`' => Token::DelimitedIdentifier(self.scan_delimited(start, '`')?),
            '@' => self.scan_temporal(start)?,
            '$' => Token::Dollar(self.scan_variable_name(start)?),
            '%' => match self.peek_char() {
                Some('`') => {
                    self.bump();
                    Token::Percent(self.scan_delimited(start, '`')?)
                }
                Some('\'') => {
                    self.bump();
                    Token::Percent(self.scan_delimited(start, '\'')?)
                }
                _ => Token::Percent(self.scan_variable_name(start)?),
            },
            c if c.is_ascii_digit() => self.scan_number(start)?,
            c if is_identifier_start(c) => {
                self.scan_identifier_tail();
                let text = &self.input[start..self.position];
                KEYWORD_TABLE
                    .get(text)
                    .cloned()
                    .unwrap_or(Token::Identifier(text))
            }
            other => {
                return Err(SyntaxError::new(
                    format!("Unexpected character '{other}'"),
                    start,
                    other.len_utf8(),
                ));
            }
        };

        Ok(Some(Spanned::new(token, start, self.position)))
    }

    fn with_equals(&mut self, with: Token<'input>, without: Token<'input>) -> Token<'input> {
        if self.peek_char() == Some('=') {
            self.bump();
            with
        } else {
            without
        }
    }

    fn scan_identifier_tail(&mut self) {
        while let Some(ch) = self.peek_char() {
            if is_identifier_continue(ch) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn scan_variable_name(&mut self, start: usize) -> ParseResult<&'input str> {
        let name_start = self.position;
        match self.peek_char() {
            Some(ch) if is_identifier_start(ch) => {
                self.scan_identifier_tail();
                Ok(&self.input[name_start..self.position])
            }
            _ => Err(SyntaxError::new(
                "Expected variable name",
                start,
                self.position - start,
            )),
        }
    }

    fn scan_delimited(&mut self, start: usize, quote: char) -> ParseResult<&'input str> {
        let content_start = self.position;
        while let Some(ch) = self.bump() {
            if ch == '\\' {
                self.bump();
            } else if ch == quote {
                return Ok(&self.input[content_start..self.position - 1]);
            }
        }
        Err(SyntaxError::new(
            format!("Unterminated {quote}-delimited text"),
            start,
            self.input.len() - start,
        ))
    }

    fn scan_string(&mut self, start: usize, quote: char) -> ParseResult<String> {
        let mut value = String::new();
        while let Some(ch) = self.bump() {
            match ch {
                '\\' => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('f') => '\u{000C}',
                        Some('u') => self.scan_unicode_escape()?,
                        Some(other) => other,
                        None => break,
                    };
                    value.push(escaped);
                }
                c if c == quote => return Ok(value),
                c => value.push(c),
            }
        }
        Err(SyntaxError::new(
            "Unterminated string literal",
            start,
            self.input.len() - start,
        ))
    }

    fn scan_unicode_escape(&mut self) -> ParseResult<char> {
        let start = self.position;
        let end = (start + 4).min(self.input.len());
        let digits = self.input.get(start..end).unwrap_or_default();
        let code = u32::from_str_radix(digits, 16)
            .ok()
            .filter(|_| digits.len() == 4)
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxError::new("Invalid unicode escape", start, digits.len()))?;
        self.position = end;
        Ok(code)
    }

    fn scan_number(&mut self, start: usize) -> ParseResult<Token<'input>> {
        self.scan_digits();
        let is_decimal = self.peek_char() == Some('.')
            && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_decimal {
            self.bump();
            self.scan_digits();
            return Ok(Token::Decimal(&self.input[start..self.position]));
        }
        let text = &self.input[start..self.position];
        text.parse::<i64>().map(Token::Integer).map_err(|_| {
            SyntaxError::new(
                format!("Integer literal '{text}' is out of range"),
                start,
                text.len(),
            )
        })
    }

    fn scan_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn scan_temporal(&mut self, start: usize) -> ParseResult<Token<'input>> {
        if self.peek_char() == Some('T') {
            self.bump();
            let body_start = self.position;
            self.scan_while(|c| c.is_ascii_digit() || c == ':' || c == '.');
            if self.position == body_start {
                return Err(SyntaxError::new("Invalid time literal", start, 2));
            }
            return Ok(Token::Time(&self.input[body_start..self.position]));
        }

        let body_start = self.position;
        self.scan_while(|c| c.is_ascii_digit() || c == '-');
        if self.position == body_start {
            return Err(SyntaxError::new("Invalid date literal", start, 1));
        }
        if self.peek_char() == Some('T') {
            self.bump();
            self.scan_while(|c| c.is_ascii_digit() || matches!(c, ':' | '.' | '+' | '-' | 'Z'));
            return Ok(Token::DateTime(&self.input[body_start..self.position]));
        }
        Ok(Token::Date(&self.input[body_start..self.position]))
    }

    fn scan_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek_char().is_some_and(&predicate) {
            self.bump();
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || UnicodeXID::is_xid_start(ch)
}

fn is_identifier_continue(ch: char) -> bool {
    ch == '_' || UnicodeXID::is_xid_continue(ch)
}

//! Tokenizer for type-declaration sources.

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    /// Template literal; only its presence matters.
    Template,
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.kind, TokenKind::Punct(q) if *q == p)
    }

    pub fn is_ident(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(w) if w == word)
    }
}

/// Longest punctuators first. `>` is always a single token so nested generics close
/// one level at a time.
const PUNCTUATORS: [&str; 27] = [
    "...", "=>", "{", "}", "(", ")", "[", "]", "<", ">", ",", ";", ":", "?", ".", "=",
    "|", "&", "*", "@", "!", "+", "-", "~", "/", "%", "^",
];

pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut col = 1;
    let mut newline_before = false;

    macro_rules! advance {
        ($n:expr) => {
            for _ in 0..$n {
                if i >= chars.len() {
                    break;
                }
                if chars[i] == '\n' {
                    line += 1;
                    col = 1;
                } else {
                    col += 1;
                }
                i += 1;
            }
        };
    }

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            if c == '\n' {
                newline_before = true;
            }
            advance!(1);
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                advance!(1);
            }
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let (start_line, start_col) = (line, col);
            advance!(2);
            loop {
                if i >= chars.len() {
                    bail!("{}:{}: unterminated block comment", start_line, start_col);
                }
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    advance!(2);
                    break;
                }
                if chars[i] == '\n' {
                    newline_before = true;
                }
                advance!(1);
            }
            continue;
        }

        let (tok_line, tok_col) = (line, col);
        let kind = if c == '"' || c == '\'' {
            let quote = c;
            advance!(1);
            let mut value = String::new();
            loop {
                match chars.get(i) {
                    None | Some('\n') => {
                        bail!("{}:{}: unterminated string literal", tok_line, tok_col)
                    }
                    Some(&ch) if ch == quote => {
                        advance!(1);
                        break;
                    }
                    Some('\\') => {
                        if let Some(&escaped) = chars.get(i + 1) {
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                        advance!(2);
                    }
                    Some(&ch) => {
                        value.push(ch);
                        advance!(1);
                    }
                }
            }
            TokenKind::Str(value)
        } else if c == '`' {
            advance!(1);
            let mut depth = 0usize;
            loop {
                match chars.get(i) {
                    None => bail!("{}:{}: unterminated template literal", tok_line, tok_col),
                    Some('\\') => advance!(2),
                    Some('`') if depth == 0 => {
                        advance!(1);
                        break;
                    }
                    Some('$') if chars.get(i + 1) == Some(&'{') => {
                        depth += 1;
                        advance!(2);
                    }
                    Some('}') if depth > 0 => {
                        depth -= 1;
                        advance!(1);
                    }
                    Some(_) => advance!(1),
                }
            }
            TokenKind::Template
        } else if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit))
        {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_')
            {
                advance!(1);
            }
            let text: String = chars[start..i].iter().filter(|ch| **ch != '_').collect();
            let value = parse_number(&text).ok_or_else(|| {
                anyhow::anyhow!("{}:{}: invalid numeric literal {}", tok_line, tok_col, text)
            })?;
            TokenKind::Number(value)
        } else if c.is_alphabetic() || c == '_' || c == '$' || c == '#' {
            let start = i;
            advance!(1);
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                advance!(1);
            }
            TokenKind::Ident(chars[start..i].iter().collect())
        } else {
            let rest: String = chars[i..(i + 3).min(chars.len())].iter().collect();
            match PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
                Some(p) => {
                    advance!(p.len());
                    TokenKind::Punct(*p)
                }
                None => bail!("{}:{}: unexpected character {:?}", tok_line, tok_col, c),
            }
        };

        tokens.push(Token {
            kind,
            line: tok_line,
            col: tok_col,
            newline_before,
        });
        newline_before = false;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        col,
        newline_before: true,
    });
    Ok(tokens)
}

fn parse_number(text: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    let radix = |prefix: &str, radix: u32| {
        lower
            .strip_prefix(prefix)
            .and_then(|digits| u64::from_str_radix(digits.trim_end_matches('n'), radix).ok())
            .map(|v| v as f64)
    };
    if lower.starts_with("0x") {
        radix("0x", 16)
    } else if lower.starts_with("0b") {
        radix("0b", 2)
    } else if lower.starts_with("0o") {
        radix("0o", 8)
    } else {
        lower.trim_end_matches('n').parse().ok()
    }
}

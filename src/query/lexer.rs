//! Tokenizer for query text

use serde_json::{Number, Value};

use crate::error::{CosmosError, CosmosResult};

use super::ast::CompareOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword; keywords are matched case-insensitively by the parser
    Ident(String),
    Number(Value),
    Str(String),
    /// `@name`, stored with the `@`
    Param(String),
    Star,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Compare(CompareOp),
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }
}

pub(crate) fn syntax_error(msg: impl Into<String>) -> CosmosError {
    CosmosError::bad_request(format!("Syntax error: {}", msg.into()))
}

pub fn tokenize(text: &str) -> CosmosResult<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Compare(CompareOp::Eq));
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Compare(CompareOp::Ne));
                    i += 2;
                } else {
                    return Err(syntax_error("unexpected '!'"));
                }
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Compare(CompareOp::Le));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Compare(CompareOp::Ne));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Compare(CompareOp::Lt));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Compare(CompareOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Compare(CompareOp::Gt));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let (s, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            '@' => {
                let start = i;
                i += 1;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                if i == start + 1 {
                    return Err(syntax_error("empty parameter name"));
                }
                tokens.push(Token::Param(chars[start..i].iter().collect()));
            }
            '-' | '.' | '0'..='9' => {
                let (n, next) = read_number(&chars, i)?;
                tokens.push(Token::Number(n));
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(syntax_error(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn read_string(chars: &[char], start: usize) -> CosmosResult<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| syntax_error("unterminated string"))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(syntax_error("unterminated string"))
}

fn read_number(chars: &[char], start: usize) -> CosmosResult<(Value, usize)> {
    let mut i = start;
    if chars[i] == '-' {
        i += 1;
    }
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    let text: String = chars[start..i].iter().collect();

    if let Ok(n) = text.parse::<i64>() {
        return Ok((Value::Number(n.into()), i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(|n| (Value::Number(n), i))
        .ok_or_else(|| syntax_error(format!("invalid number '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenize_filter() {
        let tokens = tokenize("SELECT * FROM c WHERE c.age >= 21 AND c.name <> 'x'").unwrap();
        assert!(tokens[0].is_keyword("select"));
        assert_eq!(tokens[1], Token::Star);
        assert!(tokens.contains(&Token::Compare(CompareOp::Ge)));
        assert!(tokens.contains(&Token::Compare(CompareOp::Ne)));
        assert!(tokens.contains(&Token::Number(json!(21))));
        assert!(tokens.contains(&Token::Str("x".to_string())));
    }

    #[test]
    fn test_tokenize_parameters_and_floats() {
        let tokens = tokenize("c.price < @max OR c.price = -1.5").unwrap();
        assert!(tokens.contains(&Token::Param("@max".to_string())));
        assert!(tokens.contains(&Token::Number(json!(-1.5))));
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(tokenize("c.name = 'open").is_err());
        assert!(tokenize("c.a ! 1").is_err());
        assert!(tokenize("c.a = #").is_err());
        assert_eq!(tokenize("@").unwrap_err().status_code(), Some(400));
    }
}

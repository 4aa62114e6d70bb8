//! Filter expression tokenizer.
//!
//! Splits an expression string into [`Token`]s. Keywords (`AND`, `OR`,
//! `NOT`, `LIKE`, `IN`) are recognized first; remaining barewords are
//! classified by a fixed priority:
//!
//! 1. after an operator or a non-`NOT` logical word: `Value`
//! 2. signed decimal number: `Value`
//! 3. contains a dot: `Field`
//! 4. after `NOT`, matching an identifier: `Field`
//! 5. otherwise: `Field`
//!
//! The order is load-bearing. Rule 1 makes `x = a.b` read its right side as
//! a value, rule 2 wins over rule 4 so `NOT 123 = 5` sees a numeric value
//! where `NOT version = 5` sees a field. Downstream code pins this order in
//! tests; do not reorder.

use crate::error::ParseError;
use crate::token::{Token, TokenKind};
use crate::value::is_number;

const TWO_CHAR_OPERATORS: &[&str] = &["==", "!=", ">=", "<=", "<>", "~~"];

fn is_operator_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>' | '~')
}

fn is_word_boundary(c: char) -> bool {
    c.is_whitespace() || is_operator_char(c) || c == '(' || c == ')'
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Single-use tokenizer over one expression string.
pub struct Tokenizer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            index: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the whole input. The returned stream always ends with an
    /// `Eof` token positioned past the last byte.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(&(pos, c)) = self.chars.get(self.index) {
            if c.is_whitespace() {
                self.index += 1;
            } else if c == '(' {
                self.index += 1;
                self.tokens.push(Token::new(TokenKind::LParen, "(", pos));
            } else if c == ')' {
                self.index += 1;
                self.tokens.push(Token::new(TokenKind::RParen, ")", pos));
            } else if c == '\'' || c == '"' {
                self.quoted_value(pos, c)?;
            } else if is_operator_char(c) {
                self.operator(pos, c);
            } else {
                self.word(pos);
            }
        }
        self.tokens.push(Token::eof(self.input.len()));
        Ok(self.tokens)
    }

    /// Scan a quoted value. The token text keeps its surrounding quotes so
    /// parse-time coercion can tell quoted strings from barewords; escapes
    /// are resolved here.
    fn quoted_value(&mut self, start: usize, quote: char) -> Result<(), ParseError> {
        self.index += 1;
        let mut content = String::new();
        while let Some(&(_, c)) = self.chars.get(self.index) {
            self.index += 1;
            if c == '\\' {
                if let Some(&(_, escaped)) = self.chars.get(self.index) {
                    self.index += 1;
                    content.push(escaped);
                }
            } else if c == quote {
                let mut text = String::with_capacity(content.len() + 2);
                text.push(quote);
                text.push_str(&content);
                text.push(quote);
                self.tokens.push(Token::new(TokenKind::Value, text, start));
                return Ok(());
            } else {
                content.push(c);
            }
        }
        Err(ParseError::new(
            "unterminated quoted value",
            start,
            self.input.len() - start,
        ))
    }

    /// Scan a symbolic operator, combining greedily into a known
    /// two-character operator when the next character extends one.
    fn operator(&mut self, start: usize, first: char) {
        self.index += 1;
        let mut text = String::from(first);
        if let Some(&(_, next)) = self.chars.get(self.index) {
            let mut candidate = text.clone();
            candidate.push(next);
            if TWO_CHAR_OPERATORS.contains(&candidate.as_str()) {
                self.index += 1;
                text = candidate;
            }
        }
        self.tokens.push(Token::new(TokenKind::Operator, text, start));
    }

    /// Scan a bareword and classify it.
    fn word(&mut self, start: usize) {
        let text = self.take_word();

        if text.eq_ignore_ascii_case("AND") || text.eq_ignore_ascii_case("OR") {
            self.tokens.push(Token::new(TokenKind::LogicalOp, text, start));
            return;
        }
        if text.eq_ignore_ascii_case("NOT") {
            // `NOT` directly before `IN` is the NOT IN operator, not a
            // logical negation.
            if let Some(next) = self.peek_word() {
                if next.eq_ignore_ascii_case("IN") {
                    self.skip_whitespace();
                    let second = self.take_word();
                    let merged = format!("{text} {second}");
                    self.tokens
                        .push(Token::new(TokenKind::Operator, merged, start));
                    return;
                }
            }
            self.tokens.push(Token::new(TokenKind::LogicalOp, text, start));
            return;
        }
        if text.eq_ignore_ascii_case("LIKE") || text.eq_ignore_ascii_case("IN") {
            self.tokens.push(Token::new(TokenKind::Operator, text, start));
            return;
        }

        let kind = self.classify(&text);
        self.tokens.push(Token::new(kind, text, start));
    }

    /// Bareword classification. See the module docs for the rule order.
    fn classify(&self, text: &str) -> TokenKind {
        let prev = self.tokens.last();
        let prev_is_not = prev.is_some_and(|t| t.is_logical("NOT"));
        if let Some(prev) = prev {
            let follows_operator = prev.kind == TokenKind::Operator
                || (prev.kind == TokenKind::LogicalOp && !prev_is_not);
            if follows_operator {
                return TokenKind::Value;
            }
        }
        if is_number(text) {
            return TokenKind::Value;
        }
        if text.contains('.') {
            return TokenKind::Field;
        }
        if prev_is_not && is_identifier(text) {
            return TokenKind::Field;
        }
        TokenKind::Field
    }

    fn take_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.get(self.index) {
            if is_word_boundary(c) {
                break;
            }
            word.push(c);
            self.index += 1;
        }
        word
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.get(self.index) {
            if !c.is_whitespace() {
                break;
            }
            self.index += 1;
        }
    }

    /// Look at the next word without consuming it.
    fn peek_word(&self) -> Option<String> {
        let mut index = self.index;
        while let Some(&(_, c)) = self.chars.get(index) {
            if !c.is_whitespace() {
                break;
            }
            index += 1;
        }
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.get(index) {
            if is_word_boundary(c) {
                break;
            }
            word.push(c);
            index += 1;
        }
        if word.is_empty() {
            None
        } else {
            Some(word)
        }
    }
}

/// Tokenize `input` into a stream terminated by `Eof`.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Tokenizer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().iter().map(|t| t.kind).collect()
    }

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).unwrap().iter().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn basic_stream_with_positions() {
        let tokens = tokenize("importance = high").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], Token::new(TokenKind::Field, "importance", 0));
        assert_eq!(tokens[1], Token::new(TokenKind::Operator, "=", 11));
        assert_eq!(tokens[2], Token::new(TokenKind::Value, "high", 13));
        assert_eq!(tokens[3], Token::eof(17));
    }

    #[test]
    fn operators_combine_greedily() {
        assert_eq!(
            texts("a >= 1 AND b <> 2 AND c ~~ x AND d == 4"),
            vec!["a", ">=", "1", "AND", "b", "<>", "2", "AND", "c", "~~", "x", "AND", "d", "==", "4", ""]
        );
        // A lone '!' stays a single-character operator token.
        assert_eq!(texts("a ! 1")[1], "!");
    }

    #[test]
    fn no_whitespace_around_operators() {
        let tokens = tokenize("confidenceScore>0.8").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Field, "confidenceScore", 0));
        assert_eq!(tokens[1], Token::new(TokenKind::Operator, ">", 15));
        assert_eq!(tokens[2], Token::new(TokenKind::Value, "0.8", 16));
    }

    #[test]
    fn quoted_values_keep_quotes_and_resolve_escapes() {
        let tokens = tokenize("name = 'John Doe'").unwrap();
        assert_eq!(tokens[2].text, "'John Doe'");
        assert_eq!(tokens[2].kind, TokenKind::Value);

        let tokens = tokenize(r"note = 'it\'s fine'").unwrap();
        assert_eq!(tokens[2].text, "'it's fine'");
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = tokenize("a = 'oops").unwrap_err();
        assert_eq!(err.position, 4);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("a = 1 and b = 2 Or not c = 3"),
            vec![
                TokenKind::Field,
                TokenKind::Operator,
                TokenKind::Value,
                TokenKind::LogicalOp,
                // rule 1: barewords right after AND/OR classify as values
                TokenKind::Value,
                TokenKind::Operator,
                TokenKind::Value,
                TokenKind::LogicalOp,
                TokenKind::LogicalOp,
                TokenKind::Field,
                TokenKind::Operator,
                TokenKind::Value,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn not_before_in_merges_into_one_operator() {
        let tokens = tokenize("status NOT IN active,archived").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Operator);
        assert_eq!(tokens[1].text, "NOT IN");
        assert_eq!(tokens[2].kind, TokenKind::Value);
    }

    #[test]
    fn bareword_after_not_is_a_field() {
        let tokens = tokenize("NOT deleted = true").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LogicalOp);
        assert_eq!(tokens[1].kind, TokenKind::Field);
        assert_eq!(tokens[1].text, "deleted");
    }

    // The next four tests pin the classification priority. Changing the
    // rule order breaks at least one of them.

    #[test]
    fn rule1_value_after_operator_beats_dotted_field() {
        let tokens = tokenize("x = a.b").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Value);
        assert_eq!(tokens[2].text, "a.b");
    }

    #[test]
    fn rule1_value_after_and_or() {
        let tokens = tokenize("a = 1 AND b = 2").unwrap();
        assert_eq!(tokens[4].text, "b");
        assert_eq!(tokens[4].kind, TokenKind::Value);
    }

    #[test]
    fn rule2_leading_number_is_a_value_even_in_field_position() {
        let tokens = tokenize("123 = 5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Value);
        assert_eq!(tokens[0].text, "123");
    }

    #[test]
    fn rule2_beats_rule4_after_not() {
        let tokens = tokenize("NOT 123 = 5").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Value);

        let tokens = tokenize("NOT version = 5").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Field);
    }

    #[test]
    fn rule3_dotted_bareword_is_a_field() {
        let tokens = tokenize("metadata.category = work").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Field);
        assert_eq!(tokens[0].text, "metadata.category");
    }

    #[test]
    fn eof_is_positioned_past_the_input() {
        let tokens = tokenize("a = 1").unwrap();
        assert_eq!(tokens.last().unwrap(), &Token::eof(5));
        let tokens = tokenize("   ").unwrap();
        assert_eq!(tokens, vec![Token::eof(3)]);
    }
}

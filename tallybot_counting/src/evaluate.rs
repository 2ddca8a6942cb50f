use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub static PLAIN_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

// Letters never get past this, so nothing but arithmetic reaches the parser.
pub static EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-*/().\s]+$").unwrap());

/// Parenthesis nesting past this is refused rather than recursed into.
const MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("message contains characters that are not part of an expression")]
    InvalidCharacter,
    #[error("expression is malformed")]
    Malformed,
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression does not evaluate to a whole number")]
    NonInteger,
    #[error("expression evaluates to a negative number")]
    Negative,
    #[error("number is too large")]
    Overflow,
}

/// Reads a counting attempt out of a message.
///
/// Plain digits always count. Arithmetic is only considered when `allow_math` is set,
/// otherwise anything but digits is [`EvalError::InvalidCharacter`].
pub fn parse_count(content: &str, allow_math: bool) -> Result<u64, EvalError> {
    let content = content.trim();

    if PLAIN_NUMBER.is_match(content) {
        return content.parse::<u64>().map_err(|_| EvalError::Overflow);
    }

    if !allow_math {
        return Err(EvalError::InvalidCharacter);
    }

    evaluate(content)
}

/// Evaluates an arithmetic expression made of digits, `+ - * /` and parentheses.
///
/// Every intermediate value has to be a whole number, so `7/2*2` and `3.5+3.5` are both
/// refused. Only the final result has to be non-negative.
pub fn evaluate(input: &str) -> Result<u64, EvalError> {
    let input = input.trim();

    if !EXPRESSION.is_match(input) {
        return Err(EvalError::InvalidCharacter);
    }

    let mut parser = Parser {
        chars: input.chars().peekable(),
        depth: 0,
    };

    let value = parser.expr()?;

    parser.skip_whitespace();
    if parser.chars.peek().is_some() {
        return Err(EvalError::Malformed);
    }

    if value < 0 {
        return Err(EvalError::Negative);
    }

    u64::try_from(value).map_err(|_| EvalError::Overflow)
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    depth: usize,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn peek_op(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().copied()
    }

    fn expr(&mut self) -> Result<i128, EvalError> {
        let mut value = self.term()?;

        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.chars.next();
            let rhs = self.term()?;
            value = match op {
                '+' => value.checked_add(rhs),
                _ => value.checked_sub(rhs),
            }
            .ok_or(EvalError::Overflow)?;
        }

        Ok(value)
    }

    fn term(&mut self) -> Result<i128, EvalError> {
        let mut value = self.unary()?;

        while let Some(op @ ('*' | '/')) = self.peek_op() {
            self.chars.next();
            let rhs = self.unary()?;
            value = if op == '*' {
                value.checked_mul(rhs).ok_or(EvalError::Overflow)?
            } else {
                if rhs == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                if value % rhs != 0 {
                    return Err(EvalError::NonInteger);
                }
                value / rhs
            };
        }

        Ok(value)
    }

    fn unary(&mut self) -> Result<i128, EvalError> {
        match self.peek_op() {
            Some('-') => {
                self.chars.next();
                self.descend(Self::unary)?
                    .checked_neg()
                    .ok_or(EvalError::Overflow)
            }
            Some('+') => {
                self.chars.next();
                self.descend(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<i128, EvalError> {
        match self.peek_op() {
            Some('(') => {
                self.chars.next();
                let value = self.descend(Self::expr)?;
                if self.peek_op() != Some(')') {
                    return Err(EvalError::Malformed);
                }
                self.chars.next();
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            _ => Err(EvalError::Malformed),
        }
    }

    fn descend(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<i128, EvalError>,
    ) -> Result<i128, EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::Malformed);
        }
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn number(&mut self) -> Result<i128, EvalError> {
        let mut whole = String::new();
        while let Some(c) = self.chars.next_if(char::is_ascii_digit) {
            whole.push(c);
        }

        // "4.0" is still four, "3.5" is not a whole number.
        let mut has_point = false;
        let mut fraction_is_zero = true;
        if self.chars.next_if_eq(&'.').is_some() {
            has_point = true;
            while let Some(c) = self.chars.next_if(char::is_ascii_digit) {
                if c != '0' {
                    fraction_is_zero = false;
                }
            }
        }

        if whole.is_empty() {
            return Err(if has_point && !fraction_is_zero {
                EvalError::NonInteger
            } else {
                EvalError::Malformed
            });
        }

        if !fraction_is_zero {
            return Err(EvalError::NonInteger);
        }

        whole.parse::<i128>().map_err(|_| EvalError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_count("7", false), Ok(7));
        assert_eq!(parse_count("007", false), Ok(7));
        assert_eq!(parse_count("  12  ", false), Ok(12));
        assert_eq!(parse_count("0", true), Ok(0));
    }

    #[test]
    fn math_needs_to_be_allowed() {
        assert_eq!(parse_count("1+1", false), Err(EvalError::InvalidCharacter));
        assert_eq!(parse_count("1+1", true), Ok(2));
    }

    #[test]
    fn expressions_that_make_seven() {
        for input in ["7", "3+4", "  3 + 4 ", "(2+2)*1+3", "14/2", "-(-7)", "2*3+1", "4.0+3"] {
            assert_eq!(evaluate(input), Ok(7), "{input}");
        }
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(evaluate("2+3*4"), Ok(14));
        assert_eq!(evaluate("(2+3)*4"), Ok(20));
        assert_eq!(evaluate("10-4-3"), Ok(3));
        assert_eq!(evaluate("100/10/5"), Ok(2));
        assert_eq!(evaluate("10-3*3"), Ok(1));
        assert_eq!(evaluate("(2+2)*1"), Ok(4));
    }

    #[test]
    fn rejects_non_arithmetic() {
        assert_eq!(evaluate("abc"), Err(EvalError::InvalidCharacter));
        assert_eq!(evaluate("7;DROP"), Err(EvalError::InvalidCharacter));
        assert_eq!(parse_count("seven", true), Err(EvalError::InvalidCharacter));
        assert_eq!(parse_count("", true), Err(EvalError::InvalidCharacter));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(evaluate("1/0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("2/0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("-1"), Err(EvalError::Negative));
        assert_eq!(evaluate("-5"), Err(EvalError::Negative));
        assert_eq!(evaluate("3.5+3.5"), Err(EvalError::NonInteger));
        assert_eq!(evaluate("7/2*2"), Err(EvalError::NonInteger));
        assert_eq!(evaluate(".5"), Err(EvalError::NonInteger));
    }

    #[test]
    fn rejects_malformed() {
        for input in ["1+", "()", "(1+2", "1+2)", "1 2", ".", "*3", "1++"] {
            assert!(evaluate(input).is_err(), "{input}");
        }
        assert_eq!(evaluate("1 2"), Err(EvalError::Malformed));
    }

    #[test]
    fn deep_nesting_is_refused() {
        let input = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(evaluate(&input), Err(EvalError::Malformed));

        let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(evaluate(&shallow), Ok(1));
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(
            parse_count("99999999999999999999999", false),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            evaluate("99999999999999999999*99999999999999999999"),
            Err(EvalError::Overflow)
        );
    }
}

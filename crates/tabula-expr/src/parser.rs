//! Expression parser
//!
//! A recursive descent parser for placeholder expressions with operator
//! precedence. The text between `{{` and `}}` is handed in without the braces.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{ExprError, ExprResult};

/// Parse an expression into an AST
///
/// # Example
/// ```rust
/// use tabula_expr::parse_expression;
///
/// let ast = parse_expression("a + b * 2").unwrap();
/// let ast = parse_expression("items.Where(i => i.Price > 10).Count()").unwrap();
/// let ast = parse_expression("Iif(a == null, string.Empty, a.City)").unwrap();
/// ```
pub fn parse_expression(text: &str) -> ExprResult<Expr> {
    let mut parser = ExprParser::new(text);
    let expr = parser.parse_expression()?;

    match parser.current_token() {
        Token::Eof => Ok(expr),
        token => Err(ExprError::Parse(format!(
            "Syntax error: unexpected {} at position {}",
            token.describe(),
            parser.token_start
        ))),
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),

    /// Names and keywords (`true`, `null`, `and`, ...)
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,
    Question,
    DoubleQuestion,
    Colon,
    Comma,
    Dot,
    Arrow,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,

    /// A lexing failure, reported when the parser reaches it
    Invalid(String),

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Integer(i) => format!("'{}'", i),
            Token::Float(f) => format!("'{}'", f),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Identifier(name) => format!("'{}'", name),
            Token::Invalid(msg) => msg.clone(),
            Token::Eof => "end of expression".into(),
            other => format!("{:?}", other),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Identifier(name) if name.eq_ignore_ascii_case(keyword))
    }
}

/// Expression parser
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    token_start: usize,
    current_token: Option<Token>,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            token_start: 0,
            current_token: None,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        // One- or two-character operators
        match c {
            '=' => {
                self.advance();
                return match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::Equal
                    }
                    Some('>') => {
                        self.advance();
                        Token::Arrow
                    }
                    _ => Token::Equal,
                };
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Token::NotEqual;
                }
                return Token::Bang;
            }
            '<' => {
                self.advance();
                return match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                };
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Token::GreaterEqual;
                }
                return Token::GreaterThan;
            }
            '&' => {
                self.advance();
                if self.peek_char() == Some('&') {
                    self.advance();
                    return Token::AndAnd;
                }
                return Token::Invalid("'&' (did you mean '&&'?)".into());
            }
            '|' => {
                self.advance();
                if self.peek_char() == Some('|') {
                    self.advance();
                    return Token::OrOr;
                }
                return Token::Invalid("'|' (did you mean '||'?)".into());
            }
            '?' => {
                self.advance();
                if self.peek_char() == Some('?') {
                    self.advance();
                    return Token::DoubleQuestion;
                }
                return Token::Question;
            }
            _ => {}
        }

        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        if c.is_ascii_digit() {
            return self.scan_number();
        }

        // A dot directly followed by a digit is a number (.5)
        if c == '.' {
            if self.peek_char_at(1).map_or(false, |d| d.is_ascii_digit()) {
                return self.scan_number();
            }
            self.advance();
            return Token::Dot;
        }

        if c.is_alphabetic() || c == '_' || c == '@' {
            return self.scan_identifier();
        }

        self.advance();
        Token::Invalid(format!("character '{}'", c))
    }

    fn scan_string(&mut self, quote: char) -> Token {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => return Token::Invalid("unterminated string literal".into()),
                Some(c) if c == quote => {
                    // Doubled quote is an escaped quote
                    if self.peek_char_at(1) == Some(quote) {
                        s.push(quote);
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        return Token::String(s);
                    }
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => return Token::Invalid("unterminated string literal".into()),
                    };
                    s.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        let mut is_float = false;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part: only when a digit follows, so `1.ToString()` stays a call
        if self.peek_char() == Some('.')
            && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let digits_at = match self.peek_char_at(1) {
                Some('+') | Some('-') => 2,
                _ => 1,
            };
            if self
                .peek_char_at(digits_at)
                .map_or(false, |c| c.is_ascii_digit())
            {
                is_float = true;
                for _ in 0..digits_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        if !is_float {
            if let Ok(i) = num_str.parse::<i64>() {
                return Token::Integer(i);
            }
        }
        match num_str.parse::<f64>() {
            Ok(f) => Token::Float(f),
            Err(_) => Token::Invalid(format!("number '{}'", num_str)),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        self.advance();
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        Token::Identifier(self.input[start..self.pos].to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> ExprResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(ExprError::Parse(format!(
                "Expected {}, got {}",
                expected.describe(),
                self.current_token().describe()
            )))
        }
    }

    fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Conditional: ?:
    // 2. Null coalescing: ??
    // 3. Logical or: ||, or
    // 4. Logical and: &&, and
    // 5. Comparison: ==, =, !=, <>, <, <=, >, >=
    // 6. Additive: +, -
    // 7. Multiplicative: *, /, %
    // 8. Unary: -, !, not
    // 9. Postfix: .member, .method(...), [index]
    // 10. Primary: literals, names, calls, parentheses

    fn parse_expression(&mut self) -> ExprResult<Expr> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> ExprResult<Expr> {
        let condition = self.parse_coalesce()?;

        if !matches!(self.current_token(), Token::Question) {
            return Ok(condition);
        }
        self.consume();
        let then = self.parse_expression()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.parse_expression()?;

        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_coalesce(&mut self) -> ExprResult<Expr> {
        let left = self.parse_or()?;

        if matches!(self.current_token(), Token::DoubleQuestion) {
            self.consume();
            // Right associative: a ?? b ?? c == a ?? (b ?? c)
            let right = self.parse_coalesce()?;
            return Ok(Self::binary(BinaryOperator::Coalesce, left, right));
        }

        Ok(left)
    }

    fn parse_or(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_and()?;

        while matches!(self.current_token(), Token::OrOr) || self.current_token().is_keyword("or")
        {
            self.consume();
            let right = self.parse_and()?;
            left = Self::binary(BinaryOperator::Or, left, right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_comparison()?;

        while matches!(self.current_token(), Token::AndAnd)
            || self.current_token().is_keyword("and")
        {
            self.consume();
            let right = self.parse_comparison()?;
            left = Self::binary(BinaryOperator::And, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ExprResult<Expr> {
        let op = match self.current_token() {
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Bang => Some(UnaryOperator::Not),
            t if t.is_keyword("not") => Some(UnaryOperator::Not),
            _ => None,
        };

        match op {
            Some(op) => {
                self.consume();
                let operand = self.parse_unary()?;
                // Fold negative literals so `-5` stays a literal
                Ok(match (op, operand) {
                    (UnaryOperator::Negate, Expr::Integer(i)) => Expr::Integer(-i),
                    (UnaryOperator::Negate, Expr::Float(f)) => Expr::Float(-f),
                    (op, operand) => Expr::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                })
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ExprResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_token() {
                Token::Dot => {
                    self.consume();
                    let name = match self.consume() {
                        Token::Identifier(name) => name,
                        other => {
                            return Err(ExprError::Parse(format!(
                                "Identifier expected after '.', got {}",
                                other.describe()
                            )))
                        }
                    };
                    expr = if matches!(self.current_token(), Token::LeftParen) {
                        let args = self.parse_arguments()?;
                        Expr::MethodCall {
                            target: Box::new(expr),
                            name,
                            args,
                        }
                    } else {
                        Expr::Member {
                            target: Box::new(expr),
                            name,
                        }
                    };
                }
                Token::LeftBracket => {
                    self.consume();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RightBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        match self.current_token().clone() {
            Token::Integer(i) => {
                self.consume();
                Ok(Expr::Integer(i))
            }

            Token::Float(f) => {
                self.consume();
                Ok(Expr::Float(f))
            }

            Token::String(s) => {
                self.consume();
                Ok(Expr::String(s))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::Identifier(name) => {
                self.consume();
                if matches!(self.current_token(), Token::LeftParen) {
                    let args = self.parse_arguments()?;
                    return Ok(Expr::Call { name, args });
                }
                Ok(match name.to_ascii_lowercase().as_str() {
                    "true" => Expr::Boolean(true),
                    "false" => Expr::Boolean(false),
                    "null" => Expr::Null,
                    "it" => Expr::It,
                    _ => Expr::Ident(name),
                })
            }

            Token::Invalid(msg) => Err(ExprError::Parse(format!(
                "Syntax error: invalid {} at position {}",
                msg, self.token_start
            ))),

            token => Err(ExprError::Parse(format!(
                "Expression expected, got {} at position {}",
                token.describe(),
                self.token_start
            ))),
        }
    }

    fn parse_arguments(&mut self) -> ExprResult<Vec<Expr>> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_argument()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                args.push(self.parse_argument()?);
            }
        }

        self.expect(&Token::RightParen)?;
        Ok(args)
    }

    /// An argument is an expression or a single-parameter lambda `x => body`
    fn parse_argument(&mut self) -> ExprResult<Expr> {
        let expr = self.parse_expression()?;

        if !matches!(self.current_token(), Token::Arrow) {
            return Ok(expr);
        }
        let param = match expr {
            Expr::Ident(param) => param,
            other => {
                return Err(ExprError::Parse(format!(
                    "Lambda parameter must be a name, got {:?}",
                    other
                )))
            }
        };
        self.consume();
        let body = self.parse_expression()?;

        Ok(Expr::Lambda {
            param,
            body: Box::new(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.into()))
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_expression("42").unwrap(), Expr::Integer(42));
        assert_eq!(parse_expression("3.14").unwrap(), Expr::Float(3.14));
        assert_eq!(parse_expression("1e3").unwrap(), Expr::Float(1000.0));
        assert_eq!(parse_expression("-7").unwrap(), Expr::Integer(-7));
        assert_eq!(parse_expression("TRUE").unwrap(), Expr::Boolean(true));
        assert_eq!(parse_expression("null").unwrap(), Expr::Null);
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(
            parse_expression(r#""say \"hi\"""#).unwrap(),
            Expr::String("say \"hi\"".into())
        );
        assert_eq!(
            parse_expression(r#""a""b""#).unwrap(),
            Expr::String("a\"b".into())
        );
        assert_eq!(parse_expression("'x'").unwrap(), Expr::String("x".into()));
        assert!(parse_expression("\"open").is_err());
    }

    #[test]
    fn test_parse_precedence() {
        let ast = parse_expression("a + b * c").unwrap();
        assert_eq!(
            ast,
            Expr::Binary {
                op: BinaryOperator::Add,
                left: ident("a"),
                right: Box::new(Expr::Binary {
                    op: BinaryOperator::Multiply,
                    left: ident("b"),
                    right: ident("c"),
                }),
            }
        );

        let ast = parse_expression("a == 1 && b <> 2 or c").unwrap();
        match ast {
            Expr::Binary {
                op: BinaryOperator::Or,
                left,
                ..
            } => assert!(matches!(
                *left,
                Expr::Binary {
                    op: BinaryOperator::And,
                    ..
                }
            )),
            other => panic!("unexpected ast {:?}", other),
        }
    }

    #[test]
    fn test_parse_conditional_and_coalesce() {
        let ast = parse_expression("a ?? b ? 1 : 2").unwrap();
        match ast {
            Expr::Conditional { condition, .. } => assert!(matches!(
                *condition,
                Expr::Binary {
                    op: BinaryOperator::Coalesce,
                    ..
                }
            )),
            other => panic!("unexpected ast {:?}", other),
        }
    }

    #[test]
    fn test_parse_member_chain() {
        let ast = parse_expression("@a.Manager.Name[0]").unwrap();
        assert_eq!(
            ast,
            Expr::Index {
                target: Box::new(Expr::Member {
                    target: Box::new(Expr::Member {
                        target: ident("@a"),
                        name: "Manager".into(),
                    }),
                    name: "Name".into(),
                }),
                index: Box::new(Expr::Integer(0)),
            }
        );
    }

    #[test]
    fn test_parse_lambda_argument() {
        let ast = parse_expression("items.Count(c => c.Id == 9999)").unwrap();
        match ast {
            Expr::MethodCall { name, args, .. } => {
                assert_eq!(name, "Count");
                assert!(matches!(&args[0], Expr::Lambda { param, .. } if param == "c"));
            }
            other => panic!("unexpected ast {:?}", other),
        }
    }

    #[test]
    fn test_parse_call_and_it() {
        let ast = parse_expression("np(it.Name, \"x\")").unwrap();
        assert_eq!(
            ast,
            Expr::Call {
                name: "np".into(),
                args: vec![
                    Expr::Member {
                        target: Box::new(Expr::It),
                        name: "Name".into(),
                    },
                    Expr::String("x".into()),
                ],
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_expression("").is_err());
        assert!(parse_expression("a +").is_err());
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("(a").is_err());
        assert!(parse_expression("a & b").is_err());
        assert!(parse_expression("1 => 2").is_err());
    }
}

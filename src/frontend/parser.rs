//! Parser for the kernel description language.
//!
//! A recursive descent parser that converts a stream of tokens into a
//! [`KernelDecl`]. Sections must appear in the order `TENSORS` (optional),
//! `LOOPS`, `BODY`.

use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::frontend::ast::*;
use crate::utils::errors::{ParseError, ParseErrorKind};
use anyhow::Result;
use log::debug;

/// A parser for kernel descriptions.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser from a lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let first_token = lexer.next_token()?;

        Ok(Self {
            lexer,
            current: first_token.clone(),
            previous: first_token,
        })
    }

    /// Parse a complete kernel description.
    pub fn parse_kernel(&mut self) -> Result<KernelDecl> {
        let start = self.current.span;
        let mut kernel = KernelDecl::new();

        if self.match_token(TokenKind::Tensors)? {
            self.consume(TokenKind::Colon, "Expected ':' after TENSORS")?;
            kernel.tensors = self.parse_tensor_decls()?;
            debug!("parsed {} tensor declarations", kernel.tensors.len());
        }

        if !self.check(TokenKind::Loops) {
            let kind = ParseErrorKind::MissingSection;
            return Err(self.error(kind, "Missing LOOPS section", &["LOOPS"]));
        }
        self.advance()?;
        self.consume(TokenKind::Colon, "Expected ':' after LOOPS")?;
        kernel.loops = self.parse_loop_specs()?;

        if !self.check(TokenKind::Body) {
            let kind = ParseErrorKind::MissingSection;
            return Err(self.error(kind, "Missing BODY section", &["BODY"]));
        }
        self.advance()?;
        self.consume(TokenKind::Colon, "Expected ':' after BODY")?;
        kernel.body = self.parse_body()?;

        if !self.is_at_end() {
            return Err(self.error(
                ParseErrorKind::UnexpectedToken,
                "Unexpected input after kernel body",
                &["end of file"],
            ));
        }

        kernel.span = start.merge(&self.previous.span);
        debug!(
            "parsed kernel: {} loops, {} statements",
            kernel.loops.len(),
            kernel.body.len()
        );
        Ok(kernel)
    }

    fn parse_tensor_decls(&mut self) -> Result<Vec<TensorDecl>> {
        let mut decls = vec![self.parse_tensor_decl()?];
        while self.match_token(TokenKind::Comma)? {
            decls.push(self.parse_tensor_decl()?);
        }
        Ok(decls)
    }

    fn parse_tensor_decl(&mut self) -> Result<TensorDecl> {
        let start = self.current.span;
        let name = self.consume_identifier("Expected tensor name")?;
        self.consume(TokenKind::Colon, "Expected ':' after tensor name")?;
        let dtype = self.consume_identifier("Expected element type")?;
        self.consume(TokenKind::LeftBracket, "Expected '[' before tensor extents")?;

        let mut extents = vec![self.parse_extent()?];
        while self.match_token(TokenKind::Comma)? {
            extents.push(self.parse_extent()?);
        }
        self.consume(TokenKind::RightBracket, "Expected ']' after tensor extents")?;

        Ok(TensorDecl {
            name,
            dtype,
            extents,
            span: start.merge(&self.previous.span),
        })
    }

    fn parse_extent(&mut self) -> Result<usize> {
        if !self.check(TokenKind::Integer) {
            let kind = ParseErrorKind::InvalidLiteral;
            return Err(self.error(kind, "Expected integer extent", &["integer"]));
        }
        let value = self.current.lexeme.parse::<usize>().map_err(|_| {
            self.error(ParseErrorKind::InvalidLiteral, "Extent out of range", &[])
        })?;
        self.advance()?;
        Ok(value)
    }

    fn parse_loop_specs(&mut self) -> Result<Vec<LoopSpec>> {
        let mut loops = vec![self.parse_loop_spec()?];
        while self.match_token(TokenKind::Comma)? {
            loops.push(self.parse_loop_spec()?);
        }
        Ok(loops)
    }

    /// `index = lower : upper [: step]`; the step defaults to 1.
    fn parse_loop_spec(&mut self) -> Result<LoopSpec> {
        let start = self.current.span;
        let index = self.consume_identifier("Expected loop index")?;
        self.consume(TokenKind::Equal, "Expected '=' after loop index")?;
        let lower = self.parse_expression()?;
        self.consume(TokenKind::Colon, "Expected ':' after lower bound")?;
        let upper = self.parse_expression()?;
        let step = if self.match_token(TokenKind::Colon)? {
            self.parse_expression()?
        } else {
            Expr::int_lit(1, self.previous.span)
        };

        Ok(LoopSpec {
            index,
            lower,
            upper,
            step,
            span: start.merge(&self.previous.span),
        })
    }

    fn parse_body(&mut self) -> Result<Vec<AssignStmt>> {
        let mut body = vec![self.parse_statement()?];
        while self.match_token(TokenKind::Semicolon)? {
            if self.is_at_end() {
                break;
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<AssignStmt> {
        let start = self.current.span;
        if !self.check(TokenKind::Identifier) {
            return Err(self.error(
                ParseErrorKind::InvalidTarget,
                "Expected tensor access or scalar as assignment target",
                &["identifier"],
            ));
        }
        let name = self.current.lexeme.clone();
        self.advance()?;

        let target = if self.match_token(TokenKind::LeftBracket)? {
            let indices = self.parse_indices()?;
            AssignTarget::Tensor { name, indices }
        } else {
            AssignTarget::Scalar(name)
        };

        self.consume(TokenKind::Equal, "Expected '=' in assignment")?;
        let value = self.parse_expression()?;

        Ok(AssignStmt {
            target,
            value,
            span: start.merge(&self.previous.span),
        })
    }

    /// Indices after an opening `[`, through the closing `]`.
    fn parse_indices(&mut self) -> Result<Vec<Expr>> {
        let mut indices = vec![self.parse_expression()?];
        while self.match_token(TokenKind::Comma)? {
            indices.push(self.parse_expression()?);
        }
        self.consume(TokenKind::RightBracket, "Expected ']' after indices")?;
        Ok(indices)
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_additive_expr()
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;
        while self.match_token(TokenKind::Plus)? {
            let right = self.parse_multiplicative_expr()?;
            left = Expr::binary(BinaryOp::Add, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_primary_expr()?;
        while self.match_token(TokenKind::Star)? {
            let right = self.parse_primary_expr()?;
            left = Expr::binary(BinaryOp::Mul, left, right);
        }
        Ok(left)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        let start = self.current.span;

        match self.current.kind {
            TokenKind::Integer => {
                let value: i64 = self.current.lexeme.parse().map_err(|_| {
                    self.error(ParseErrorKind::InvalidLiteral, "Invalid integer", &[])
                })?;
                self.advance()?;
                Ok(Expr::int_lit(value, start))
            }
            TokenKind::Float => {
                let value: f64 = self.current.lexeme.parse().map_err(|_| {
                    self.error(ParseErrorKind::InvalidLiteral, "Invalid float", &[])
                })?;
                self.advance()?;
                Ok(Expr::float_lit(value, start))
            }
            TokenKind::Min => {
                self.advance()?;
                self.consume(TokenKind::LeftParen, "Expected '(' after min")?;
                let a = self.parse_expression()?;
                self.consume(TokenKind::Comma, "Expected ','")?;
                let b = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "Expected ')'")?;
                let span = start.merge(&self.previous.span);
                Ok(Expr::new(ExprKind::Min(Box::new(a), Box::new(b)), span))
            }
            TokenKind::Identifier => {
                let name = self.current.lexeme.clone();
                self.advance()?;
                if self.match_token(TokenKind::LeftBracket)? {
                    let indices = self.parse_indices()?;
                    Ok(Expr::new(
                        ExprKind::Access { tensor: name, indices },
                        start.merge(&self.previous.span),
                    ))
                } else {
                    Ok(Expr::var(name, start))
                }
            }
            TokenKind::LeftParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "Expected ')'")?;
                Ok(Expr::new(ExprKind::Grouped(Box::new(inner)), start.merge(&self.previous.span)))
            }
            _ => Err(self.error(
                ParseErrorKind::ExpectedExpression,
                "Expected expression",
                &["integer", "float", "identifier", "min", "("],
            )),
        }
    }

    // Helper methods
    fn check(&self, kind: TokenKind) -> bool { self.current.kind == kind }
    fn is_at_end(&self) -> bool { self.current.kind == TokenKind::Eof }

    fn advance(&mut self) -> Result<&Token> {
        self.previous = self.current.clone();
        self.current = self.lexer.next_token()?;
        Ok(&self.previous)
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.error(ParseErrorKind::UnexpectedToken, message, &[kind.name()]))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<String> {
        if self.check(TokenKind::Identifier) {
            let name = self.current.lexeme.clone();
            self.advance()?;
            Ok(name)
        } else {
            Err(self.error(ParseErrorKind::UnexpectedToken, message, &["identifier"]))
        }
    }

    fn match_token(&mut self, kind: TokenKind) -> Result<bool> {
        if self.check(kind) { self.advance()?; Ok(true) } else { Ok(false) }
    }

    fn make_parse_error(
        &self,
        kind: ParseErrorKind,
        message: &str,
        expected: &[&str],
    ) -> ParseError {
        ParseError {
            message: message.to_string(),
            span: self.current.span,
            kind,
            expected: expected.iter().map(|s| s.to_string()).collect(),
            found: Some(self.current.kind.name().to_string()),
        }
    }

    fn error(&self, kind: ParseErrorKind, message: &str, expected: &[&str]) -> anyhow::Error {
        self.make_parse_error(kind, message, expected).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<KernelDecl> {
        let lexer = Lexer::new(source);
        let mut parser = Parser::new(lexer)?;
        parser.parse_kernel()
    }

    fn parse_err_kind(source: &str) -> ParseErrorKind {
        let err = parse(source).unwrap_err();
        err.downcast_ref::<ParseError>().expect("parse error").kind
    }

    #[test]
    fn test_minimal_kernel() {
        let kernel = parse("LOOPS: i=0:N:1, j=0:M:1 BODY: C[i, j] = A[i, j] + B[i, j]").unwrap();
        assert!(kernel.tensors.is_empty());
        assert_eq!(kernel.loop_indices().collect::<Vec<_>>(), vec!["i", "j"]);
        assert_eq!(kernel.body.len(), 1);
        assert_eq!(kernel.body[0].target.name(), "C");
        assert_eq!(kernel.body[0].value.to_string(), "A[i, j] + B[i, j]");
    }

    #[test]
    fn test_tensor_section() {
        let kernel = parse(
            "TENSORS: X: f64[8, 4], y: i32[8]\nLOOPS: i=0:8:1\nBODY: y[i] = 0",
        )
        .unwrap();
        assert_eq!(kernel.tensors.len(), 2);
        let x = kernel.find_tensor("X").unwrap();
        assert_eq!(x.dtype, "f64");
        assert_eq!(x.extents, vec![8, 4]);
    }

    #[test]
    fn test_precedence() {
        let kernel = parse("LOOPS: i=0:N BODY: s = a + b * c").unwrap();
        match &kernel.body[0].value.kind {
            ExprKind::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_default_step() {
        let kernel = parse("LOOPS: i=0:N BODY: s = i").unwrap();
        assert!(matches!(kernel.loops[0].step.kind, ExprKind::IntLiteral(1)));
    }

    #[test]
    fn test_bound_expressions() {
        let kernel = parse("LOOPS: i=0:min(N, 64) + 1:2 BODY: s = i").unwrap();
        assert_eq!(kernel.loops[0].upper.to_string(), "min(N, 64) + 1");
        assert!(matches!(kernel.loops[0].step.kind, ExprKind::IntLiteral(2)));
    }

    #[test]
    fn test_multiple_statements() {
        let kernel = parse("LOOPS: i=0:N BODY: s = A[i, i]; B[i, i] = s * 2.0;").unwrap();
        assert_eq!(kernel.body.len(), 2);
        assert!(matches!(kernel.body[0].target, AssignTarget::Scalar(_)));
        assert!(matches!(kernel.body[1].value.kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn test_missing_sections() {
        assert_eq!(parse_err_kind("BODY: s = 1"), ParseErrorKind::MissingSection);
        assert_eq!(parse_err_kind("LOOPS: i=0:N"), ParseErrorKind::MissingSection);
    }

    #[test]
    fn test_invalid_target() {
        assert_eq!(parse_err_kind("LOOPS: i=0:N BODY: 1 = i"), ParseErrorKind::InvalidTarget);
    }

    #[test]
    fn test_expected_expression() {
        assert_eq!(parse_err_kind("LOOPS: i=0:N BODY: s = ]"), ParseErrorKind::ExpectedExpression);
    }

    #[test]
    fn test_trailing_garbage() {
        assert_eq!(
            parse_err_kind("LOOPS: i=0:N BODY: s = 1 s = 2"),
            ParseErrorKind::UnexpectedToken
        );
    }
}

//! Recursive descent parser for CEL expressions, including macro expansion.

use crate::cel::{
    ast::{BinaryOp, Expr, ExprKind, Literal, Macro, UnaryOp},
    lexer::{RESERVED_WORDS, Spanned, Token, tokenize},
};

/// Maximum nesting of sub-expressions, which bounds the recursion depth of
/// the parser and of every pass over the AST.
pub const MAX_NESTING_DEPTH: usize = 100;

/// A syntax error, located by the byte offset of the offending token.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Syntax error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Parses `input` into an expression tree.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input).map_err(|error| ParseError {
        message: error.message,
        offset: error.offset,
    })?;

    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
        end_offset: input.len(),
    };

    let expr = parser.expr()?;

    if let Some(token) = parser.peek() {
        return parser.error(format!("mismatched input {token} expecting <EOF>"));
    }

    // Every later pass recurses once per level of the tree.
    if expr.depth() > MAX_NESTING_DEPTH {
        return Err(ParseError {
            message: format!("expression recursion limit exceeded: {MAX_NESTING_DEPTH}"),
            offset: expr.offset,
        });
    }

    Ok(expr)
}

/// Joins `terms` with `op` into a tree of logarithmic depth. `offsets[i]` is
/// the offset of the operator between `terms[i]` and `terms[i + 1]`.
fn balanced_tree(op: BinaryOp, mut terms: Vec<Expr>, mut offsets: Vec<usize>) -> Option<Expr> {
    if terms.len() <= 1 {
        return terms.pop();
    }

    let middle = terms.len() / 2;
    let right_terms = terms.split_off(middle);
    let right_offsets = offsets.split_off(middle);
    let offset = offsets.pop()?;

    Some(Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(balanced_tree(op, terms, offsets)?),
            rhs: Box::new(balanced_tree(op, right_terms, right_offsets)?),
        },
        offset,
    ))
}

struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    depth: usize,
    end_offset: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|spanned| &spanned.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map_or(self.end_offset, |spanned| spanned.offset)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.position).cloned()?;
        self.position += 1;
        Some(spanned)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            return Ok(());
        }

        match self.peek() {
            Some(found) => self.error(format!("mismatched input {found} expecting {token}")),
            None => self.error(format!("unexpected end of input, expecting {token}")),
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ParseError {
            message: message.into(),
            offset: self.offset(),
        })
    }

    fn recursion_limit_exceeded<T>(&self) -> Result<T> {
        self.error(format!(
            "expression recursion limit exceeded: {MAX_NESTING_DEPTH}"
        ))
    }

    /// Fails once a left-deep chain of `links` operators or member accesses,
    /// started at the current nesting, would exceed [`MAX_NESTING_DEPTH`].
    fn check_chain(&self, links: usize) -> Result<()> {
        if self.depth + links > MAX_NESTING_DEPTH {
            return self.recursion_limit_exceeded();
        }
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return self.recursion_limit_exceeded();
        }

        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<Expr> {
        self.nested(|parser| {
            let offset = parser.offset();
            let condition = parser.or()?;

            if !parser.eat(&Token::Question) {
                return Ok(condition);
            }

            let then = parser.or()?;
            parser.expect(&Token::Colon)?;
            let otherwise = parser.expr()?;

            Ok(Expr::new(
                ExprKind::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                offset,
            ))
        })
    }

    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr>,
        operator: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr> {
        let mut lhs = operand(self)?;
        let mut links = 0;

        while let Some(op) = self.peek().and_then(operator) {
            links += 1;
            self.check_chain(links)?;

            let offset = self.offset();
            self.position += 1;
            let rhs = operand(self)?;

            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                offset,
            );
        }

        Ok(lhs)
    }

    /// Parses a chain of one associative logical operator into a balanced
    /// tree, so long chains of conditions stay shallow.
    fn logical_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr>,
        token: &Token,
        op: BinaryOp,
    ) -> Result<Expr> {
        let mut terms = vec![operand(self)?];
        let mut offsets = Vec::new();

        while self.peek() == Some(token) {
            offsets.push(self.offset());
            self.position += 1;
            terms.push(operand(self)?);
        }

        match balanced_tree(op, terms, offsets) {
            Some(expr) => Ok(expr),
            None => self.error("expected an expression"),
        }
    }

    fn or(&mut self) -> Result<Expr> {
        self.logical_level(Self::and, &Token::Or, BinaryOp::Or)
    }

    fn and(&mut self) -> Result<Expr> {
        self.logical_level(Self::relation, &Token::And, BinaryOp::And)
    }

    fn relation(&mut self) -> Result<Expr> {
        self.binary_level(Self::addition, |token| match token {
            Token::Eq => Some(BinaryOp::Equals),
            Token::Ne => Some(BinaryOp::NotEquals),
            Token::Lt => Some(BinaryOp::Less),
            Token::Le => Some(BinaryOp::LessEquals),
            Token::Gt => Some(BinaryOp::Greater),
            Token::Ge => Some(BinaryOp::GreaterEquals),
            Token::In => Some(BinaryOp::In),
            _ => None,
        })
    }

    fn addition(&mut self) -> Result<Expr> {
        self.binary_level(Self::multiplication, |token| match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn multiplication(&mut self) -> Result<Expr> {
        self.binary_level(Self::unary, |token| match token {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            Token::Percent => Some(BinaryOp::Modulo),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<Expr> {
        let offset = self.offset();

        match self.peek() {
            Some(Token::Bang) => {
                self.position += 1;
                let operand = self.nested(Self::unary)?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    offset,
                ))
            }
            Some(Token::Minus) => {
                self.position += 1;

                if let Some(literal) = self.negative_literal()? {
                    let literal = Expr::new(ExprKind::Literal(literal), offset);
                    return self.member_suffix(literal);
                }

                let operand = self.nested(Self::unary)?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Negate,
                        operand: Box::new(operand),
                    },
                    offset,
                ))
            }
            _ => self.member(),
        }
    }

    /// Folds a minus sign directly followed by a numeric literal into a
    /// negative literal.
    fn negative_literal(&mut self) -> Result<Option<Literal>> {
        let literal = match self.peek() {
            Some(Token::Int(magnitude)) => {
                let magnitude = *magnitude;
                if magnitude > i64::MAX as u64 + 1 {
                    return self.error(format!("integer literal -{magnitude} is out of range"));
                }
                Literal::Int(0i64.wrapping_sub_unsigned(magnitude))
            }
            Some(Token::Double(value)) => Literal::Double(-*value),
            _ => return Ok(None),
        };

        self.position += 1;
        Ok(Some(literal))
    }

    fn member(&mut self) -> Result<Expr> {
        let primary = self.primary()?;
        self.member_suffix(primary)
    }

    fn member_suffix(&mut self, mut expr: Expr) -> Result<Expr> {
        let mut links = 0;

        loop {
            let offset = self.offset();
            if matches!(
                self.peek(),
                Some(Token::Dot | Token::DotQuestion | Token::LBracket | Token::LBracketQuestion)
            ) {
                links += 1;
                self.check_chain(links)?;
            }

            match self.peek() {
                Some(Token::Dot | Token::DotQuestion) => {
                    let optional = self.peek() == Some(&Token::DotQuestion);
                    self.position += 1;
                    let field = self.identifier()?;

                    if !optional && self.eat(&Token::LParen) {
                        let args = self.arguments()?;
                        expr = self.method_call(expr, field, args, offset)?;
                        continue;
                    }

                    expr = Expr::new(
                        ExprKind::Select {
                            operand: Box::new(expr),
                            field,
                            optional,
                        },
                        offset,
                    );
                }
                Some(Token::LBracket | Token::LBracketQuestion) => {
                    let optional = self.peek() == Some(&Token::LBracketQuestion);
                    self.position += 1;
                    let index = self.expr()?;
                    self.expect(&Token::RBracket)?;

                    expr = Expr::new(
                        ExprKind::Index {
                            operand: Box::new(expr),
                            index: Box::new(index),
                            optional,
                        },
                        offset,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn method_call(
        &mut self,
        target: Expr,
        function: String,
        mut args: Vec<Expr>,
        offset: usize,
    ) -> Result<Expr> {
        let Some(kind) = Macro::from_call(&function, args.len()) else {
            return Ok(Expr::new(
                ExprKind::Call {
                    target: Some(Box::new(target)),
                    function,
                    args,
                },
                offset,
            ));
        };

        let variable = match &args[0].kind {
            ExprKind::Ident(name) => name.clone(),
            _ => {
                return Err(ParseError {
                    message: format!("{kind}() variable name must be a simple identifier"),
                    offset: args[0].offset,
                });
            }
        };

        let transform = if kind == Macro::MapFilter {
            args.pop().map(Box::new)
        } else {
            None
        };
        let step = args.pop().map(Box::new);
        let Some(step) = step else {
            return self.error(format!("{kind}() requires a predicate"));
        };

        Ok(Expr::new(
            ExprKind::Comprehension {
                kind,
                range: Box::new(target),
                variable,
                step,
                transform,
            },
            offset,
        ))
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                if RESERVED_WORDS.contains(&name.as_str()) {
                    return self.error(format!("reserved identifier: {name}"));
                }
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            Some(token) => self.error(format!("mismatched input {token} expecting IDENTIFIER")),
            None => self.error("unexpected end of input, expecting IDENTIFIER"),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();

        if self.eat(&Token::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.expr()?);

            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();

        // A leading dot refers to the root namespace, which is the only
        // namespace expressions are evaluated in.
        if self.peek() == Some(&Token::Dot)
            && matches!(
                self.tokens.get(self.position + 1).map(|spanned| &spanned.token),
                Some(Token::Ident(_))
            )
        {
            self.position += 1;
        }

        let Some(spanned) = self.advance() else {
            return self.error("unexpected end of input");
        };

        let kind = match spanned.token {
            Token::Null => ExprKind::Literal(Literal::Null),
            Token::True => ExprKind::Literal(Literal::Bool(true)),
            Token::False => ExprKind::Literal(Literal::Bool(false)),
            Token::Int(magnitude) => match i64::try_from(magnitude) {
                Ok(value) => ExprKind::Literal(Literal::Int(value)),
                Err(_) => {
                    self.position -= 1;
                    return self.error(format!("integer literal {magnitude} is out of range"));
                }
            },
            Token::Uint(value) => ExprKind::Literal(Literal::Uint(value)),
            Token::Double(value) => ExprKind::Literal(Literal::Double(value)),
            Token::String(value) => ExprKind::Literal(Literal::String(value)),
            Token::Bytes(value) => ExprKind::Literal(Literal::Bytes(value)),
            Token::Ident(_) => {
                self.position -= 1;
                let name = self.identifier()?;
                return self.identifier_or_call(name, offset);
            }
            Token::LParen => {
                let expr = self.expr()?;
                self.expect(&Token::RParen)?;
                return Ok(expr);
            }
            Token::LBracket => ExprKind::List(self.list_elements()?),
            Token::LBrace => ExprKind::Map(self.map_entries()?),
            token => {
                self.position -= 1;
                return self.error(format!("mismatched input {token} expecting an expression"));
            }
        };

        Ok(Expr::new(kind, offset))
    }

    fn identifier_or_call(&mut self, name: String, offset: usize) -> Result<Expr> {
        if self.peek() == Some(&Token::LBrace) {
            return self.error(format!("message construction is not supported: {name}{{...}}"));
        }

        if !self.eat(&Token::LParen) {
            return Ok(Expr::new(ExprKind::Ident(name), offset));
        }

        let mut args = self.arguments()?;

        if name == "has" {
            let argument = match args.pop() {
                Some(argument) if args.is_empty() => argument,
                _ => return self.error("has() requires exactly one argument"),
            };

            return match argument.kind {
                ExprKind::Select {
                    operand,
                    field,
                    optional: false,
                } => Ok(Expr::new(ExprKind::Has { operand, field }, offset)),
                _ => Err(ParseError {
                    message: "invalid argument to has() macro".to_owned(),
                    offset: argument.offset,
                }),
            };
        }

        Ok(Expr::new(
            ExprKind::Call {
                target: None,
                function: name,
                args,
            },
            offset,
        ))
    }

    fn list_elements(&mut self) -> Result<Vec<Expr>> {
        let mut elements = Vec::new();

        loop {
            if self.eat(&Token::RBracket) {
                return Ok(elements);
            }
            if self.peek() == Some(&Token::Question) {
                return self.error("optional list elements are not supported");
            }

            elements.push(self.expr()?);

            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBracket)?;
                return Ok(elements);
            }
        }
    }

    fn map_entries(&mut self) -> Result<Vec<(Expr, Expr)>> {
        let mut entries = Vec::new();

        loop {
            if self.eat(&Token::RBrace) {
                return Ok(entries);
            }
            if self.peek() == Some(&Token::Question) {
                return self.error("optional map entries are not supported");
            }

            let key = self.expr()?;
            self.expect(&Token::Colon)?;
            let value = self.expr()?;
            entries.push((key, value));

            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                return Ok(entries);
            }
        }
    }
}

/// Converts a byte `offset` into `input` into a 1-based line and column.
pub fn line_and_column(input: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(input.len());
    let mut line = 1;
    let mut column = 1;

    for (index, c) in input.char_indices() {
        if index >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

//! Recursive-descent parser, one function per precedence level.
//!
//! From loosest to tightest:
//!
//! | Level | Operators | Associativity |
//! |-------|-----------|---------------|
//! | or | `\|` | left |
//! | xor | `^` | left |
//! | and | `&` | left |
//! | shift | `<<` `>>` | left |
//! | additive | `+` `-` | left |
//! | multiplicative | `*` `/` `//` `%` | left |
//! | power | `**` | right |
//! | unary | `+` `-` `~` | prefix |
//!
//! Unary binds tighter than `**`, so `-2**2` is `(-2)**2`.

use super::lexer::Token;
use crate::decimal::ExactDecimal;
use crate::error::{KernelError, KernelResult};

/// Deepest nesting of parentheses, prefixes and powers accepted.
pub const MAX_DEPTH: usize = 256;

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+x`
    Plus,
    /// `-x`
    Neg,
    /// `~x`
    Invert,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Rem,
    /// `**`
    Pow,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A literal number.
    Literal(ExactDecimal),
    /// A prefix operator applied to an operand.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// An infix operator.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// Parses a full token stream into one expression.
///
/// # Errors
///
/// [`KernelError::Invalid`] on any syntax error, trailing tokens, or nesting
/// deeper than [`MAX_DEPTH`].
pub fn parse(tokens: &[Token]) -> KernelResult<Expr> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(KernelError::invalid(format!(
            "unexpected {token:?} at token {}",
            parser.pos
        ))),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn descend(&mut self) -> KernelResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(KernelError::invalid("expression nested too deeply"));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Left-associative level: `next (op next)*`.
    fn left_assoc(
        &mut self,
        next: fn(&mut Self) -> KernelResult<Expr>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> KernelResult<Expr> {
        let mut left = next(self)?;
        while let Some(op) = self.peek().and_then(op_for) {
            self.advance();
            let right = next(self)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> KernelResult<Expr> {
        self.left_assoc(Self::parse_xor, |t| {
            matches!(t, Token::Pipe).then_some(BinaryOp::BitOr)
        })
    }

    fn parse_xor(&mut self) -> KernelResult<Expr> {
        self.left_assoc(Self::parse_and, |t| {
            matches!(t, Token::Caret).then_some(BinaryOp::BitXor)
        })
    }

    fn parse_and(&mut self) -> KernelResult<Expr> {
        self.left_assoc(Self::parse_shift, |t| {
            matches!(t, Token::Amp).then_some(BinaryOp::BitAnd)
        })
    }

    fn parse_shift(&mut self) -> KernelResult<Expr> {
        self.left_assoc(Self::parse_additive, |t| match t {
            Token::Shl => Some(BinaryOp::Shl),
            Token::Shr => Some(BinaryOp::Shr),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> KernelResult<Expr> {
        self.left_assoc(Self::parse_multiplicative, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> KernelResult<Expr> {
        self.left_assoc(Self::parse_power, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::SlashSlash => Some(BinaryOp::FloorDiv),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn parse_power(&mut self) -> KernelResult<Expr> {
        let base = self.parse_unary()?;
        if !matches!(self.peek(), Some(Token::StarStar)) {
            return Ok(base);
        }
        self.advance();
        self.descend()?;
        let exponent = self.parse_power()?;
        self.ascend();
        Ok(Expr::binary(BinaryOp::Pow, base, exponent))
    }

    fn parse_unary(&mut self) -> KernelResult<Expr> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Tilde) => UnaryOp::Invert,
            _ => return self.parse_primary(),
        };
        self.advance();
        self.descend()?;
        let operand = self.parse_unary()?;
        self.ascend();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> KernelResult<Expr> {
        match self.peek() {
            Some(Token::Number(value)) => {
                self.advance();
                Ok(Expr::Literal(value.clone()))
            }
            Some(Token::LParen) => {
                self.advance();
                self.descend()?;
                let inner = self.parse_or()?;
                self.ascend();
                if matches!(self.peek(), Some(Token::RParen)) {
                    self.advance();
                    Ok(inner)
                } else {
                    Err(KernelError::invalid(format!(
                        "expected ')' at token {}",
                        self.pos
                    )))
                }
            }
            Some(token) => Err(KernelError::invalid(format!(
                "unexpected {token:?} at token {}",
                self.pos
            ))),
            None => Err(KernelError::invalid("unexpected end of expression")),
        }
    }
}

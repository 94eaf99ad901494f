//! Recursive-descent / precedence-climbing parser (§10.4) turning a token stream
//! into the AST described by §3. Precedence, loosest to tightest: ternary, or,
//! and, equality, relational, additive, multiplicative, unary, postfix, primary.

use super::lexer::{Token, TokenKind};
use crate::{
    ast::{BinOp, Exp, ExpKind, SourceInfo, Stat, StatKind, UnOp},
    error::ErrorKind,
};

pub fn parse(tokens: Vec<Token>) -> Result<Stat, ErrorKind> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut stats = Vec::new();
    while !parser.at(TokenKind::Eof) {
        stats.push(parser.parse_stat()?);
    }
    Ok(Stat::new(StatKind::Block(stats), SourceInfo::unknown()))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_info(&self) -> SourceInfo {
        self.tokens[self.pos].info
    }

    fn at(&self, kind: TokenKind) -> bool {
        *self.peek() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ErrorKind> {
        if *self.peek() == kind {
            Ok(self.advance())
        } else {
            Err(ErrorKind::ParseError {
                message: format!("expected {what}, found {:?}", self.peek()),
            })
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ErrorKind> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ErrorKind::ParseError {
                message: format!("expected {what}, found {other:?}"),
            }),
        }
    }

    // ------------------------------------------------------------ statements --

    fn parse_stat(&mut self) -> Result<Stat, ErrorKind> {
        let start = self.peek_info();
        match self.peek().clone() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => self.parse_return(start),
            _ => self.parse_expr_stat(start),
        }
    }

    fn parse_block(&mut self) -> Result<Stat, ErrorKind> {
        let start = self.peek_info();
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stats = Vec::new();
        while !self.at(TokenKind::RBrace) {
            stats.push(self.parse_stat()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Stat::new(StatKind::Block(stats), start))
    }

    fn parse_if(&mut self) -> Result<Stat, ErrorKind> {
        let start = self.peek_info();
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_exp()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then = Box::new(self.parse_stat()?);
        let else_ = if self.at(TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_stat()?))
        } else {
            None
        };
        Ok(Stat::new(StatKind::If { cond, then, else_ }, start))
    }

    fn parse_while(&mut self) -> Result<Stat, ErrorKind> {
        let start = self.peek_info();
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_exp()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_stat()?);
        Ok(Stat::new(StatKind::While { cond, body }, start))
    }

    fn parse_for(&mut self) -> Result<Stat, ErrorKind> {
        let start = self.peek_info();
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let id = self.expect_ident("loop variable")?;
        self.expect(TokenKind::In, "'in'")?;
        let list = self.parse_exp()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_stat()?);
        Ok(Stat::new(StatKind::For { id, list, body }, start))
    }

    fn parse_return(&mut self, start: SourceInfo) -> Result<Stat, ErrorKind> {
        self.advance();
        let value = if self.at(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_exp()?)
        };
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Stat::new(StatKind::Return(value), start))
    }

    /// Parses an assignment, compound assignment, or bare function-call statement;
    /// all three start by parsing a full expression and then looking at what
    /// follows it.
    fn parse_expr_stat(&mut self, start: SourceInfo) -> Result<Stat, ErrorKind> {
        let exp = self.parse_exp()?;
        let kind = match self.peek().clone() {
            TokenKind::Assign => {
                self.advance();
                let rhs = self.parse_exp()?;
                StatKind::Assign { lhs: exp, rhs }
            }
            TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign
            | TokenKind::PercentAssign => {
                let op = compound_op(&self.advance().kind);
                let rhs = self.parse_exp()?;
                StatKind::CompoundAssign { lhs: exp, rhs, op }
            }
            _ => match exp.kind {
                ExpKind::FuncCallExp { ctx, name, args } => StatKind::FuncCallStat {
                    ctx: ctx.map(|e| *e),
                    name,
                    args,
                },
                _ => {
                    return Err(ErrorKind::ParseError {
                        message: "expected assignment or function call statement".to_owned(),
                    });
                }
            },
        };
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Stat::new(kind, start))
    }

    // ----------------------------------------------------------- expressions --

    fn parse_exp(&mut self) -> Result<Exp, ErrorKind> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let cond = self.parse_or()?;
        if self.at(TokenKind::Question) {
            self.advance();
            let then = Box::new(self.parse_exp()?);
            self.expect(TokenKind::Colon, "':'")?;
            let else_ = Box::new(self.parse_exp()?);
            Ok(Exp::new(
                ExpKind::Ternary {
                    cond: Box::new(cond),
                    then,
                    else_,
                },
                start,
            ))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let mut lhs = self.parse_and()?;
        while self.at(TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binop(BinOp::Or, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let mut lhs = self.parse_equality()?;
        while self.at(TokenKind::And) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = binop(BinOp::And, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binop(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binop(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binop(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binop(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Not => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            Ok(Exp::new(ExpKind::UnOp { op, operand }, start))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Result<Exp, ErrorKind> {
        let mut base = self.parse_primary()?;
        loop {
            let start = base.info;
            match self.peek().clone() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident("member name")?;
                    if self.at(TokenKind::LParen) {
                        let args = self.parse_args()?;
                        base = Exp::new(
                            ExpKind::FuncCallExp {
                                ctx: Some(Box::new(base)),
                                name,
                                args,
                            },
                            start,
                        );
                    } else {
                        base = Exp::new(
                            ExpKind::Member {
                                container: Box::new(base),
                                name,
                            },
                            start,
                        );
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.parse_exp()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    base = Exp::new(
                        ExpKind::Index {
                            container: Box::new(base),
                            key: Box::new(key),
                        },
                        start,
                    );
                }
                _ => break,
            }
        }
        Ok(base)
    }

    fn parse_args(&mut self) -> Result<Vec<Exp>, ErrorKind> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            args.push(self.parse_exp()?);
            while self.at(TokenKind::Comma) {
                self.advance();
                args.push(self.parse_exp()?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Exp, ErrorKind> {
        let start = self.peek_info();
        match self.peek().clone() {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Exp::new(ExpKind::Int(i), start))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Exp::new(ExpKind::Float(f), start))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Exp::new(ExpKind::Str(s), start))
            }
            TokenKind::True => {
                self.advance();
                Ok(Exp::new(ExpKind::Int(1), start))
            }
            TokenKind::False => {
                self.advance();
                Ok(Exp::new(ExpKind::Int(0), start))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.at(TokenKind::LParen) {
                    let args = self.parse_args()?;
                    Ok(Exp::new(
                        ExpKind::FuncCallExp {
                            ctx: None,
                            name,
                            args,
                        },
                        start,
                    ))
                } else {
                    Ok(Exp::new(ExpKind::Id(name), start))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_exp()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBrace => self.parse_map_def(start),
            TokenKind::LBracket => self.parse_list_or_range(start),
            TokenKind::Function => self.parse_func_def(start),
            other => Err(ErrorKind::ParseError {
                message: format!("unexpected token {other:?}"),
            }),
        }
    }

    fn parse_map_def(&mut self, start: SourceInfo) -> Result<Exp, ErrorKind> {
        self.advance();
        let mut fields: Vec<(String, Exp)> = Vec::new();
        if !self.at(TokenKind::RBrace) {
            self.push_map_field(&mut fields)?;
            while self.at(TokenKind::Comma) {
                self.advance();
                self.push_map_field(&mut fields)?;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Exp::new(ExpKind::MapDef(fields), start))
    }

    fn push_map_field(&mut self, fields: &mut Vec<(String, Exp)>) -> Result<(), ErrorKind> {
        let (name, value) = self.parse_map_field()?;
        if fields.iter().any(|(existing, _)| *existing == name) {
            return Err(ErrorKind::ParseError {
                message: format!("duplicate map key '{name}'"),
            });
        }
        fields.push((name, value));
        Ok(())
    }

    fn parse_map_field(&mut self) -> Result<(String, Exp), ErrorKind> {
        let name = self.expect_ident("map key")?;
        self.expect(TokenKind::Colon, "':'")?;
        let value = self.parse_exp()?;
        Ok((name, value))
    }

    fn parse_list_or_range(&mut self, start: SourceInfo) -> Result<Exp, ErrorKind> {
        self.advance();
        if self.at(TokenKind::RBracket) {
            self.advance();
            return Ok(Exp::new(ExpKind::ListDef(Vec::new()), start));
        }
        let first = self.parse_exp()?;
        if self.at(TokenKind::DotDot) {
            self.advance();
            let end = self.parse_exp()?;
            let step = if self.at(TokenKind::DotDot) {
                self.advance();
                self.parse_exp()?
            } else {
                Exp::new(ExpKind::Int(1), start)
            };
            self.expect(TokenKind::RBracket, "']'")?;
            return Ok(Exp::new(
                ExpKind::RangeDef {
                    begin: Box::new(first),
                    end: Box::new(end),
                    step: Box::new(step),
                },
                start,
            ));
        }
        let mut items = vec![first];
        while self.at(TokenKind::Comma) {
            self.advance();
            items.push(self.parse_exp()?);
        }
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(Exp::new(ExpKind::ListDef(items), start))
    }

    fn parse_func_def(&mut self, start: SourceInfo) -> Result<Exp, ErrorKind> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            params.push(self.expect_ident("parameter name")?);
            while self.at(TokenKind::Comma) {
                self.advance();
                params.push(self.expect_ident("parameter name")?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_block()?);
        Ok(Exp::new(ExpKind::FuncDef { params, body }, start))
    }
}

fn compound_op(kind: &TokenKind) -> BinOp {
    match kind {
        TokenKind::PlusAssign => BinOp::Add,
        TokenKind::MinusAssign => BinOp::Sub,
        TokenKind::StarAssign => BinOp::Mul,
        TokenKind::SlashAssign => BinOp::Div,
        TokenKind::PercentAssign => BinOp::Mod,
        other => unreachable!("not a compound-assign token: {other:?}"),
    }
}

fn binop(op: BinOp, l: Exp, r: Exp, info: SourceInfo) -> Exp {
    Exp::new(
        ExpKind::BinOp {
            op,
            l: Box::new(l),
            r: Box::new(r),
        },
        info,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize;

    fn parse_source(src: &str) -> Stat {
        parse(tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_assignment_and_precedence() {
        let stat = parse_source("a = 1 + 2 * 3;");
        let StatKind::Block(stats) = &stat.kind else {
            unreachable!()
        };
        let StatKind::Assign { rhs, .. } = &stats[0].kind else {
            unreachable!()
        };
        let ExpKind::BinOp { op: BinOp::Add, r, .. } = &rhs.kind else {
            unreachable!("expected addition at the top, got {:?}", rhs.kind)
        };
        assert!(matches!(
            r.kind,
            ExpKind::BinOp {
                op: BinOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn parses_unqualified_and_qualified_calls() {
        let stat = parse_source("f(a, b.c());");
        let StatKind::Block(stats) = &stat.kind else {
            unreachable!()
        };
        assert!(matches!(&stats[0].kind, StatKind::FuncCallStat { ctx: None, name, .. } if name == "f"));
    }

    #[test]
    fn parses_range_and_list_literals() {
        let range = parse_source("r = [1..10..2];");
        let list = parse_source("l = [1, 2, 3];");
        let StatKind::Block(stats) = &range.kind else {
            unreachable!()
        };
        assert!(matches!(stats[0].kind, StatKind::Assign { .. }));
        let StatKind::Assign { rhs, .. } = &stats[0].kind else {
            unreachable!()
        };
        assert!(matches!(rhs.kind, ExpKind::RangeDef { .. }));

        let StatKind::Block(stats) = &list.kind else {
            unreachable!()
        };
        let StatKind::Assign { rhs, .. } = &stats[0].kind else {
            unreachable!()
        };
        assert!(matches!(&rhs.kind, ExpKind::ListDef(items) if items.len() == 3));
    }

    #[test]
    fn parses_ternary_looser_than_or() {
        let stat = parse_source("x = a or b ? 1 : 2;");
        let StatKind::Block(stats) = &stat.kind else {
            unreachable!()
        };
        let StatKind::Assign { rhs, .. } = &stats[0].kind else {
            unreachable!()
        };
        let ExpKind::Ternary { cond, .. } = &rhs.kind else {
            unreachable!("expected ternary at the top, got {:?}", rhs.kind)
        };
        assert!(matches!(cond.kind, ExpKind::BinOp { op: BinOp::Or, .. }));
    }

    #[test]
    fn rejects_duplicate_map_keys() {
        let err = parse(tokenize("m = {a: 1, b: 2, a: 3};").unwrap()).unwrap_err();
        assert!(matches!(err, ErrorKind::ParseError { .. }));
    }
}

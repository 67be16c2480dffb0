// Ladder points formulas.
//
// Two small expression languages evaluated against a ladder entry:
//
//     3*win + 2*draw + 1*loss
//     [win=1, score_against=0: 1] + [loss=1, margin<=7: 1]
//
// The first is plain arithmetic over named fields. The second chains
// bracketed bonus rules whose value counts only when every condition holds.
// Unknown names evaluate to zero and arithmetic never fails: division by zero
// and non-finite results collapse to zero.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::Division;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointsError {
    #[error("unexpected character {ch:?} at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("formula ended unexpectedly")]
    UnexpectedEnd,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Integer(u64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Compare(CompareOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier {name:?}"),
            Token::Integer(n) => write!(f, "integer {n}"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Colon => write!(f, "':'"),
            Token::Comma => write!(f, "','"),
            Token::Compare(op) => write!(f, "'{op}'"),
        }
    }
}

/// Split `input` into `(token, byte offset)` pairs.
fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, PointsError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_alphabetic() {
            let mut ident = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    ident.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Ident(ident), pos));
            continue;
        }

        if ch.is_ascii_digit() {
            let mut value: u64 = 0;
            while let Some(&(_, c)) = chars.peek() {
                let Some(digit) = c.to_digit(10) else { break };
                value = value.saturating_mul(10).saturating_add(u64::from(digit));
                chars.next();
            }
            tokens.push((Token::Integer(value), pos));
            continue;
        }

        chars.next();
        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '=' => Token::Compare(CompareOp::Eq),
            '>' | '<' => {
                let or_equal = matches!(chars.peek(), Some(&(_, '=')));
                if or_equal {
                    chars.next();
                }
                Token::Compare(match (ch, or_equal) {
                    ('>', true) => CompareOp::Ge,
                    ('>', false) => CompareOp::Gt,
                    (_, true) => CompareOp::Le,
                    (_, false) => CompareOp::Lt,
                })
            }
            other => {
                return Err(PointsError::UnexpectedChar {
                    ch: other,
                    position: pos,
                })
            }
        };
        tokens.push((token, pos));
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Comma separated conditions; true when all are.
    All(Vec<Expr>),
    /// `[condition: value]`
    Rule {
        condition: Box<Expr>,
        value: Box<Expr>,
    },
}

/// Named numeric fields a formula is evaluated against.
pub trait Environment {
    fn get(&self, name: &str) -> Option<f64>;
}

impl Environment for HashMap<String, f64> {
    fn get(&self, name: &str) -> Option<f64> {
        HashMap::get(self, name).copied()
    }
}

impl Environment for HashMap<&str, f64> {
    fn get(&self, name: &str) -> Option<f64> {
        HashMap::get(self, name).copied()
    }
}

fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl Expr {
    pub fn evaluate(&self, env: &dyn Environment) -> f64 {
        let value = match self {
            Expr::Num(n) => *n,
            Expr::Var(name) => env.get(name).unwrap_or(0.0),
            Expr::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (lhs.evaluate(env), rhs.evaluate(env));
                match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div if rhs == 0.0 => 0.0,
                    BinaryOp::Div => lhs / rhs,
                }
            }
            Expr::Compare { op, lhs, rhs } => {
                let (lhs, rhs) = (lhs.evaluate(env), rhs.evaluate(env));
                truth(match op {
                    CompareOp::Eq => lhs == rhs,
                    CompareOp::Gt => lhs > rhs,
                    CompareOp::Lt => lhs < rhs,
                    CompareOp::Ge => lhs >= rhs,
                    CompareOp::Le => lhs <= rhs,
                })
            }
            Expr::All(conditions) => truth(conditions.iter().all(|c| c.evaluate(env) != 0.0)),
            Expr::Rule { condition, value } => {
                if condition.evaluate(env) != 0.0 {
                    value.evaluate(env)
                } else {
                    0.0
                }
            }
        };
        finite(value)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    /// Allow `= > < >= <=` at the additive level (bonus formulas only).
    comparisons: bool,
}

impl Parser {
    fn new(input: &str, comparisons: bool) -> Result<Self, PointsError> {
        Ok(Parser {
            tokens: tokenize(input)?,
            pos: 0,
            comparisons,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self) -> PointsError {
        match self.tokens.get(self.pos) {
            Some((token, position)) => PointsError::UnexpectedToken {
                found: token.to_string(),
                position: *position,
            },
            None => PointsError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), PointsError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn finish(&self) -> Result<(), PointsError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// expr := term (('+' | '-' | comparison) term)*
    fn expression(&mut self) -> Result<Expr, PointsError> {
        let mut lhs = self.term()?;
        loop {
            lhs = match self.peek() {
                Some(Token::Plus) | Some(Token::Minus) => {
                    let op = match self.advance() {
                        Some(Token::Plus) => BinaryOp::Add,
                        _ => BinaryOp::Sub,
                    };
                    let rhs = self.term()?;
                    Expr::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    }
                }
                Some(Token::Compare(op)) if self.comparisons => {
                    let op = *op;
                    self.pos += 1;
                    let rhs = self.term()?;
                    Expr::Compare {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    }
                }
                _ => return Ok(lhs),
            };
        }
    }

    /// term := atom (('*' | '/') atom)*
    fn term(&mut self) -> Result<Expr, PointsError> {
        let mut lhs = self.atom()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.atom()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    /// atom := identifier | '-'? integer | '(' expr ')'
    fn atom(&mut self) -> Result<Expr, PointsError> {
        match self.peek() {
            Some(Token::Ident(_)) => match self.advance() {
                Some(Token::Ident(name)) => Ok(Expr::Var(name)),
                _ => Err(PointsError::UnexpectedEnd),
            },
            Some(Token::Integer(n)) => {
                let n = *n as f64;
                self.pos += 1;
                Ok(Expr::Num(n))
            }
            Some(Token::Minus) => match self.tokens.get(self.pos + 1) {
                Some((Token::Integer(n), _)) => {
                    let n = *n as f64;
                    self.pos += 2;
                    Ok(Expr::Num(-n))
                }
                _ => Err(self.unexpected()),
            },
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// condition := expr (',' expr)*
    fn condition(&mut self) -> Result<Expr, PointsError> {
        let mut conditions = vec![self.expression()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            conditions.push(self.expression()?);
        }
        Ok(match conditions.len() {
            1 => conditions.remove(0),
            _ => Expr::All(conditions),
        })
    }

    /// rule := '[' condition ':' expr ']'
    fn rule(&mut self) -> Result<Expr, PointsError> {
        self.expect(Token::LBracket)?;
        let condition = self.condition()?;
        self.expect(Token::Colon)?;
        let value = self.expression()?;
        self.expect(Token::RBracket)?;
        Ok(Expr::Rule {
            condition: Box::new(condition),
            value: Box::new(value),
        })
    }

    /// chain := rule (('+' | '-') rule)*
    fn chain(&mut self) -> Result<Expr, PointsError> {
        let mut lhs = self.rule()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.rule()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Calculators
// ---------------------------------------------------------------------------

/// Arithmetic points formula, e.g. `3*win + 2*draw + 1*loss`.
#[derive(Debug, Clone, PartialEq)]
pub struct Calculator {
    expr: Expr,
}

impl Calculator {
    pub fn parse(text: &str) -> Result<Self, PointsError> {
        let mut parser = Parser::new(text, false)?;
        let expr = parser.expression()?;
        parser.finish()?;
        Ok(Calculator { expr })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, env: &dyn Environment) -> f64 {
        self.expr.evaluate(env)
    }
}

/// Chain of conditional bonus rules, e.g. `[loss=1, margin<=7: 1]`.
/// Blank text is a valid formula worth nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BonusPointCalculator {
    expr: Option<Expr>,
}

impl BonusPointCalculator {
    pub fn parse(text: &str) -> Result<Self, PointsError> {
        if text.trim().is_empty() {
            return Ok(BonusPointCalculator { expr: None });
        }
        let mut parser = Parser::new(text, true)?;
        let expr = parser.chain()?;
        parser.finish()?;
        Ok(BonusPointCalculator { expr: Some(expr) })
    }

    pub fn evaluate(&self, env: &dyn Environment) -> f64 {
        self.expr.as_ref().map_or(0.0, |e| e.evaluate(env))
    }
}

// ---------------------------------------------------------------------------
// Ladder entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// The recorded outcome of a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub is_bye: bool,
    pub is_forfeit: bool,
    pub forfeit_winner: Option<Side>,
}

impl MatchResult {
    pub fn score(&self, side: Side) -> i64 {
        match side {
            Side::Home => self.home_score,
            Side::Away => self.away_score,
        }
        .unwrap_or(0)
    }
}

/// One team's line on the ladder for a single match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LadderEntry {
    pub played: i64,
    pub win: i64,
    pub loss: i64,
    pub draw: i64,
    pub bye: i64,
    pub forfeit_for: i64,
    pub forfeit_against: i64,
    pub score_for: i64,
    pub score_against: i64,
    pub bonus_points: f64,
    pub points: f64,
}

impl LadderEntry {
    /// Absolute score difference.
    pub fn margin(&self) -> i64 {
        (self.score_for - self.score_against).abs()
    }
}

impl Environment for LadderEntry {
    fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "played" => self.played,
            "win" => self.win,
            "loss" => self.loss,
            "draw" => self.draw,
            "bye" => self.bye,
            "forfeit_for" => self.forfeit_for,
            "forfeit_against" => self.forfeit_against,
            "score_for" => self.score_for,
            "score_against" => self.score_against,
            "margin" => self.margin(),
            "bonus_points" => return Some(self.bonus_points),
            "points" => return Some(self.points),
            _ => return None,
        };
        Some(value as f64)
    }
}

/// A division's compiled points formulas.
#[derive(Debug, Clone)]
pub struct PointsTable {
    points: Option<Calculator>,
    bonus: BonusPointCalculator,
    include_forfeits_in_played: bool,
}

impl PointsTable {
    pub fn new(
        points_formula: &str,
        bonus_points_formula: Option<&str>,
        include_forfeits_in_played: bool,
    ) -> Result<Self, PointsError> {
        let points = if points_formula.trim().is_empty() {
            None
        } else {
            Some(Calculator::parse(points_formula)?)
        };
        let bonus = BonusPointCalculator::parse(bonus_points_formula.unwrap_or_default())?;
        Ok(PointsTable {
            points,
            bonus,
            include_forfeits_in_played,
        })
    }

    pub fn for_division(division: &Division) -> Result<Self, PointsError> {
        PointsTable::new(
            &division.points_formula,
            division.bonus_points_formula.as_deref(),
            division.include_forfeits_in_played,
        )
    }

    /// Ladder entry for `side` of `result`.
    pub fn entry(&self, result: &MatchResult, side: Side) -> LadderEntry {
        let score_for = result.score(side);
        let score_against = result.score(side.opponent());

        let mut entry = LadderEntry {
            played: 1,
            score_for,
            score_against,
            ..LadderEntry::default()
        };

        if result.is_bye {
            entry.bye = 1;
        } else if result.is_forfeit {
            if !self.include_forfeits_in_played {
                entry.played = 0;
            }
            let won = result.forfeit_winner == Some(side);
            entry.forfeit_for = i64::from(won);
            entry.forfeit_against = i64::from(!won);
        } else {
            entry.win = i64::from(score_for > score_against);
            entry.loss = i64::from(score_for < score_against);
            entry.draw = i64::from(score_for == score_against);
        }

        entry.points = self.points.as_ref().map_or(0.0, |c| c.evaluate(&entry));
        entry.bonus_points = self.bonus.evaluate(&entry);
        entry.points += entry.bonus_points;
        entry
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

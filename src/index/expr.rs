//! Filter expressions: the boolean structure of query values and the
//! comparison literals inside them.

use super::algebra::MaskAlgebra;

/// Separator of AND groups.
pub const AND: char = ';';
/// Separator of OR alternatives.
pub const OR: char = ',';
/// Prefix of negated literals.
pub const NOT: char = '!';

/// Boolean structure of a filter value over one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Parse `value` into `;`-separated AND groups of `,`-separated alternatives.
    ///
    /// Single-element groups are collapsed so that `"a"` parses to a literal.
    /// Returns `None` if `value` holds no literal at all.
    pub fn parse(value: &str) -> Option<Self> {
        let groups = value
            .split(AND)
            .filter_map(|group| {
                let alternatives = group
                    .split(OR)
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(Self::parse_literal)
                    .collect::<Vec<_>>();
                Self::collapse(alternatives, Expr::Or)
            })
            .collect::<Vec<_>>();
        Self::collapse(groups, Expr::And)
    }

    fn parse_literal(token: &str) -> Self {
        match token.strip_prefix(NOT) {
            Some(rest) if !rest.starts_with('=') => Expr::Not(Box::new(Self::parse_literal(rest))),
            _ => Expr::Literal(token.to_string()),
        }
    }

    fn collapse(mut items: Vec<Expr>, ctor: fn(Vec<Expr>) -> Expr) -> Option<Expr> {
        match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(ctor(items)),
        }
    }

    /// Whether any OR node occurs in the expression.
    pub fn has_or(&self) -> bool {
        match self {
            Expr::Literal(_) => false,
            Expr::Not(inner) => inner.has_or(),
            Expr::And(items) => items.iter().any(Expr::has_or),
            Expr::Or(_) => true,
        }
    }

    /// The literals of a flat conjunction, i.e., a literal or an AND of literals.
    pub fn conjunction_literals(&self) -> Option<Vec<&str>> {
        match self {
            Expr::Literal(lit) => Some(vec![lit.as_str()]),
            Expr::And(items) => items
                .iter()
                .map(|item| match item {
                    Expr::Literal(lit) => Some(lit.as_str()),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

/// Compilation of the literals of one field into a predicate family.
pub trait LiteralCompiler {
    type Output: MaskAlgebra;

    /// Compile a positive literal.
    fn compile_literal(&self, literal: &str) -> Self::Output;

    /// Compile a negated literal; unconstrained unless the field knows better.
    fn compile_negated(&self, _literal: &str) -> Self::Output {
        Self::Output::unconstrained()
    }
}

/// Fold `expr` bottom-up with the AND/OR rules of the compiler's family.
pub fn compile<C: LiteralCompiler + ?Sized>(compiler: &C, expr: &Expr) -> C::Output {
    match expr {
        Expr::Literal(literal) => compiler.compile_literal(literal),
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Literal(literal) => compiler.compile_negated(literal),
            _ => C::Output::unconstrained(),
        },
        Expr::And(items) => items
            .iter()
            .map(|item| compile(compiler, item))
            .fold(C::Output::unconstrained(), MaskAlgebra::all_of),
        Expr::Or(items) => items
            .iter()
            .map(|item| compile(compiler, item))
            .reduce(MaskAlgebra::any_of)
            .unwrap_or_else(C::Output::unconstrained),
    }
}

/// Parse and compile a query value; empty values are unconstrained.
pub fn compile_str<C: LiteralCompiler + ?Sized>(compiler: &C, value: &str) -> C::Output {
    Expr::parse(value)
        .map(|expr| compile(compiler, &expr))
        .unwrap_or_else(C::Output::unconstrained)
}

/// Comparison operator of a numeric literal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ComparisonOp {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl ComparisonOp {
    /// Operator tokens, longest first so that `<=` is not read as `<`.
    const TOKENS: [(&'static str, ComparisonOp); 7] = [
        ("<=", ComparisonOp::Le),
        (">=", ComparisonOp::Ge),
        ("==", ComparisonOp::Eq),
        ("!=", ComparisonOp::Ne),
        ("<", ComparisonOp::Lt),
        (">", ComparisonOp::Gt),
        ("=", ComparisonOp::Eq),
    ];

    /// Split a leading operator token off `s`.
    pub fn strip(s: &str) -> Option<(ComparisonOp, &str)> {
        Self::TOKENS
            .iter()
            .find_map(|(token, op)| s.strip_prefix(token).map(|rest| (*op, rest)))
    }

    /// Whether `lhs OP rhs` holds.
    pub fn eval(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            ComparisonOp::Eq => lhs == rhs,
            ComparisonOp::Ne => lhs != rhs,
            ComparisonOp::Lt => lhs < rhs,
            ComparisonOp::Le => lhs <= rhs,
            ComparisonOp::Gt => lhs > rhs,
            ComparisonOp::Ge => lhs >= rhs,
        }
    }
}

/// A literal of the form `<key><op><value>`, e.g., `DP>20` or `sift<0.1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison<'a> {
    /// Text before the operator, may be empty.
    pub key: &'a str,
    pub op: ComparisonOp,
    /// Raw text after the operator.
    pub value: &'a str,
}

impl<'a> Comparison<'a> {
    /// Split `literal` at its first operator character.
    ///
    /// Returns `None` if there is no operator or the value starts with another
    /// operator character (e.g., `sift<<0.1`).
    pub fn parse(literal: &'a str) -> Option<Self> {
        let pos = literal.find(['<', '>', '=', '!'])?;
        let (key, rest) = literal.split_at(pos);
        let (op, value) = ComparisonOp::strip(rest)?;
        let value = value.trim();
        if value.is_empty() || value.starts_with(['<', '>', '=', '!']) {
            return None;
        }
        Some(Self {
            key: key.trim(),
            op,
            value,
        })
    }

    /// The value as a finite number.
    pub fn number(&self) -> Option<f64> {
        self.value.parse::<f64>().ok().filter(|v| !v.is_nan())
    }
}

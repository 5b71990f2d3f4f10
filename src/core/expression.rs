//! Formula parser for cell expressions
//!
//! Turns one formula string like "A1 / B4 * 3 - B2" into an expression tree.
//! The grammar has no parentheses and no precedence: the text is cut at every
//! `+ - * /` and the operands are folded strictly left to right, so the
//! example above evaluates as `((A1 / B4) * 3) - B2`.
//!
//! Parsing is total. Anything that is neither a cell reference nor a number
//! becomes an [`ExprNode::Unknown`] leaf, which evaluates to NaN.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operation {
    /// Map a segmentation character to its operator
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operation::Add),
            '-' => Some(Operation::Sub),
            '*' => Some(Operation::Mul),
            '/' => Some(Operation::Div),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Sub => '-',
            Operation::Mul => '*',
            Operation::Div => '/',
        }
    }

    /// Apply with IEEE semantics; division by zero gives infinity or NaN
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            Operation::Add => left + right,
            Operation::Sub => left - right,
            Operation::Mul => left * right,
            Operation::Div => left / right,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Expression tree node
///
/// Serialized with an internal `type` tag so snapshots read as
/// `{"type":"reference","value":"A1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExprNode {
    /// A numeric literal
    Literal { value: f64 },
    /// A cell reference such as "B100"
    Reference { value: String },
    /// Binary operation: left op right
    Operator {
        name: Operation,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    /// Operand text that could not be classified (trimmed, possibly empty)
    Unknown { value: String },
}

impl ExprNode {
    pub fn literal(value: f64) -> Self {
        ExprNode::Literal { value }
    }

    pub fn reference(key: impl Into<String>) -> Self {
        ExprNode::Reference { value: key.into() }
    }

    pub fn unknown(text: impl Into<String>) -> Self {
        ExprNode::Unknown { value: text.into() }
    }

    pub fn operator(name: Operation, left: ExprNode, right: ExprNode) -> Self {
        ExprNode::Operator {
            name,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Every referenced cell key, left subtree first, duplicates kept
    pub fn references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            ExprNode::Operator { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            ExprNode::Reference { value } => out.push(value.clone()),
            ExprNode::Literal { .. } | ExprNode::Unknown { .. } => {}
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            ExprNode::Operator { left, right, .. } => left.leaf_count() + right.leaf_count(),
            _ => 1,
        }
    }

    pub fn operator_count(&self) -> usize {
        match self {
            ExprNode::Operator { left, right, .. } => {
                1 + left.operator_count() + right.operator_count()
            }
            _ => 0,
        }
    }

    /// Whether any leaf failed to classify
    pub fn has_unknown(&self) -> bool {
        match self {
            ExprNode::Operator { left, right, .. } => left.has_unknown() || right.has_unknown(),
            ExprNode::Unknown { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::Literal { value } => write!(f, "{value}"),
            ExprNode::Reference { value } | ExprNode::Unknown { value } => write!(f, "{value}"),
            ExprNode::Operator { name, left, right } => match right.as_ref() {
                ExprNode::Operator { .. } => write!(f, "{left} {name} ({right})"),
                _ => write!(f, "{left} {name} {right}"),
            },
        }
    }
}

fn reference_re() -> &'static Regex {
    static REFERENCE_RE: OnceLock<Regex> = OnceLock::new();
    REFERENCE_RE
        .get_or_init(|| Regex::new(r"^[A-Z]+[0-9]+$").expect("reference regex must compile"))
}

/// Whether `text` has the shape of a cell key (`^[A-Z]+[0-9]+$`)
pub fn is_cell_reference(text: &str) -> bool {
    reference_re().is_match(text)
}

/// Numeric literal: decimal/exponent notation, a 0x/0o/0b integer, or the
/// word `Infinity`. Anything else must start with a digit or '.', so spellings
/// like "inf", "infinity" or "NaN" stay unknown.
fn parse_number(text: &str) -> Option<f64> {
    if text == "Infinity" {
        return Some(f64::INFINITY);
    }
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '.') {
        return None;
    }

    let radix = match text.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&text[2..], radix).ok().map(|n| n as f64);
    }

    text.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Classify one operand slice
fn parse_operand(text: &str) -> ExprNode {
    let text = text.trim();
    if is_cell_reference(text) {
        ExprNode::reference(text)
    } else if let Some(value) = parse_number(text) {
        ExprNode::literal(value)
    } else {
        ExprNode::unknown(text)
    }
}

/// Parse a formula into a left-nested operator chain.
///
/// `a + b - c * d` becomes `((a + b) - c) * d`. A leading `-` is an ordinary
/// binary operator with an empty (unknown) left operand, and a missing operand
/// on either side of an operator becomes `Unknown("")`.
pub fn parse(formula: &str) -> ExprNode {
    let cuts: Vec<(usize, Operation)> = formula
        .char_indices()
        .filter_map(|(i, c)| Operation::from_char(c).map(|op| (i, op)))
        .collect();

    let first_end = cuts.first().map_or(formula.len(), |&(i, _)| i);
    let mut acc = parse_operand(&formula[..first_end]);

    for (n, &(start, op)) in cuts.iter().enumerate() {
        let end = cuts.get(n + 1).map_or(formula.len(), |&(i, _)| i);
        // operator chars are single-byte, so start + 1 is a char boundary
        let operand = parse_operand(&formula[start + 1..end]);
        acc = ExprNode::operator(op, acc, operand);
    }

    acc
}

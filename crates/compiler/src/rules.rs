//! Pratt parse-rule table: a rule per token kind providing
//! `{prefix, infix, precedence}`. Per the design notes' guidance to prefer
//! "a sum-type enum of rule identifiers plus a dispatcher... over raw
//! function pointers, to keep the parser re-entrant," rules name a
//! [`ParseFnId`] that `Compiler::dispatch` matches on rather than storing
//! `fn` pointers directly.

use crate::token::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    /// One level tighter than `self`, used to parse a binary operator's
    /// right operand so that the operator is left-associative.
    pub fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call | Primary => Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFnId {
    Grouping,
    Unary,
    Binary,
    Number,
    StringLit,
    Literal,
    Variable,
    And,
    Or,
    Call,
    Dot,
    Map,
}

#[derive(Clone, Copy)]
pub struct ParseRule {
    pub prefix: Option<ParseFnId>,
    pub infix: Option<ParseFnId>,
    pub precedence: Precedence,
}

const fn rule(
    prefix: Option<ParseFnId>,
    infix: Option<ParseFnId>,
    precedence: Precedence,
) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

/// Token kinds with no parse role (punctuation with no expression meaning,
/// keywords reserved for grammar this implementation doesn't parse) fall
/// through to the all-`None` default rule.
pub fn rule_for(kind: TokenKind) -> ParseRule {
    use Precedence::*;
    use TokenKind::*;
    match kind {
        LeftParen => rule(Some(ParseFnId::Grouping), Some(ParseFnId::Call), Call),
        LeftBrace => rule(Some(ParseFnId::Map), None, None),
        Dot => rule(None, Some(ParseFnId::Dot), Call),
        Minus => rule(Some(ParseFnId::Unary), Some(ParseFnId::Binary), Term),
        Plus => rule(None, Some(ParseFnId::Binary), Term),
        Slash => rule(None, Some(ParseFnId::Binary), Factor),
        Star => rule(None, Some(ParseFnId::Binary), Factor),
        Bang => rule(Some(ParseFnId::Unary), None, None),
        BangEqual => rule(None, Some(ParseFnId::Binary), Equality),
        EqualEqual => rule(None, Some(ParseFnId::Binary), Equality),
        Greater => rule(None, Some(ParseFnId::Binary), Comparison),
        GreaterEqual => rule(None, Some(ParseFnId::Binary), Comparison),
        Less => rule(None, Some(ParseFnId::Binary), Comparison),
        LessEqual => rule(None, Some(ParseFnId::Binary), Comparison),
        Identifier => rule(Some(ParseFnId::Variable), None, None),
        String => rule(Some(ParseFnId::StringLit), None, None),
        Number => rule(Some(ParseFnId::Number), None, None),
        And => rule(None, Some(ParseFnId::And), Precedence::And),
        Or => rule(None, Some(ParseFnId::Or), Precedence::Or),
        False | True | Nil => rule(Some(ParseFnId::Literal), None, None),
        _ => rule(None, None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_next_is_monotonic_and_caps_at_primary() {
        assert_eq!(Precedence::None.next(), Precedence::Assignment);
        assert_eq!(Precedence::Primary.next(), Precedence::Primary);
        assert!(Precedence::Term < Precedence::Factor);
    }

    #[test]
    fn minus_is_both_prefix_and_infix() {
        let r = rule_for(TokenKind::Minus);
        assert!(r.prefix.is_some());
        assert!(r.infix.is_some());
        assert_eq!(r.precedence, Precedence::Term);
    }

    #[test]
    fn unrecognized_kinds_have_no_rule() {
        let r = rule_for(TokenKind::Semicolon);
        assert!(r.prefix.is_none() && r.infix.is_none());
    }
}

//! Regular expressions over symbol alphabets.
//!
//! Symbols are whole tokens ("a", "loves", "B#1"), not single characters:
//! the alphabet of a path query is the set of edge labels, and the alphabet
//! of an RSM box mixes terminals with nonterminal names.
//!
//! Text syntax: `|` (or `+`) for union, `.` or juxtaposition for
//! concatenation, postfix `*` for Kleene star, parentheses for grouping,
//! `epsilon` or `$` for the empty word. `a.b.c*` is "a, then b, then any
//! number of c".

use crate::error::QueryError;
use crate::fa::{Dfa, EpsilonNfa, Nfa};

/// A regular expression AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regex {
    /// The empty word.
    Epsilon,
    /// A single symbol (one whole token).
    Symbol(String),
    /// Concatenation.
    Concat(Box<Regex>, Box<Regex>),
    /// Alternation.
    Union(Box<Regex>, Box<Regex>),
    /// Kleene star.
    Star(Box<Regex>),
}

impl Regex {
    pub fn symbol(name: impl Into<String>) -> Self {
        Regex::Symbol(name.into())
    }

    pub fn concat(lhs: Self, rhs: Self) -> Self {
        Regex::Concat(Box::new(lhs), Box::new(rhs))
    }

    pub fn union(lhs: Self, rhs: Self) -> Self {
        Regex::Union(Box::new(lhs), Box::new(rhs))
    }

    pub fn star(inner: Self) -> Self {
        Regex::Star(Box::new(inner))
    }

    /// Parses regex text.
    ///
    /// `+` is union, following the convention of the grammar tooling this
    /// input format comes from, not one-or-more repetition.
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        let tokens = lex(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let regex = parser.parse_union()?;
        if parser.pos != parser.tokens.len() {
            return Err(QueryError::MalformedRegex(format!(
                "unexpected {} after end of expression",
                parser.tokens[parser.pos]
            )));
        }
        Ok(regex)
    }

    /// Thompson construction into an ε-NFA.
    pub fn to_epsilon_nfa(&self) -> EpsilonNfa {
        let mut enfa = EpsilonNfa::new();
        let (start, accept) = self.thompson(&mut enfa);
        enfa.add_start_state(start);
        enfa.add_final_state(accept);
        enfa
    }

    /// Compiles to an NFA (ε eliminated).
    pub fn to_nfa(&self) -> Nfa<u32> {
        self.to_epsilon_nfa().into_nfa()
    }

    /// Compiles to a deterministic acceptor (subset construction).
    pub fn to_dfa(&self) -> Dfa {
        self.to_epsilon_nfa().to_dfa()
    }

    /// Builds one Thompson fragment, returning its (start, accept) states.
    fn thompson(&self, enfa: &mut EpsilonNfa) -> (u32, u32) {
        match self {
            Regex::Epsilon => {
                let s = enfa.add_state();
                let t = enfa.add_state();
                enfa.add_epsilon_transition(s, t);
                (s, t)
            }
            Regex::Symbol(name) => {
                let s = enfa.add_state();
                let t = enfa.add_state();
                enfa.add_transition(s, name.clone(), t);
                (s, t)
            }
            Regex::Concat(lhs, rhs) => {
                let (s1, t1) = lhs.thompson(enfa);
                let (s2, t2) = rhs.thompson(enfa);
                enfa.add_epsilon_transition(t1, s2);
                (s1, t2)
            }
            Regex::Union(lhs, rhs) => {
                let s = enfa.add_state();
                let t = enfa.add_state();
                let (s1, t1) = lhs.thompson(enfa);
                let (s2, t2) = rhs.thompson(enfa);
                enfa.add_epsilon_transition(s, s1);
                enfa.add_epsilon_transition(s, s2);
                enfa.add_epsilon_transition(t1, t);
                enfa.add_epsilon_transition(t2, t);
                (s, t)
            }
            Regex::Star(inner) => {
                let s = enfa.add_state();
                let t = enfa.add_state();
                let (s1, t1) = inner.thompson(enfa);
                enfa.add_epsilon_transition(s, t);
                enfa.add_epsilon_transition(s, s1);
                enfa.add_epsilon_transition(t1, t);
                enfa.add_epsilon_transition(t1, s1);
                (s, t)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Symbol(String),
    Union,
    Dot,
    Star,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Symbol(name) => write!(f, "symbol `{name}`"),
            Token::Union => write!(f, "`|`"),
            Token::Dot => write!(f, "`.`"),
            Token::Star => write!(f, "`*`"),
            Token::LParen => write!(f, "`(`"),
            Token::RParen => write!(f, "`)`"),
        }
    }
}

fn lex(text: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut symbol = String::new();
    let flush = |symbol: &mut String, tokens: &mut Vec<Token>| {
        if !symbol.is_empty() {
            tokens.push(Token::Symbol(std::mem::take(symbol)));
        }
    };
    for c in text.chars() {
        match c {
            '|' | '+' => {
                flush(&mut symbol, &mut tokens);
                tokens.push(Token::Union);
            }
            '.' => {
                flush(&mut symbol, &mut tokens);
                tokens.push(Token::Dot);
            }
            '*' => {
                flush(&mut symbol, &mut tokens);
                tokens.push(Token::Star);
            }
            '(' => {
                flush(&mut symbol, &mut tokens);
                tokens.push(Token::LParen);
            }
            ')' => {
                flush(&mut symbol, &mut tokens);
                tokens.push(Token::RParen);
            }
            c if c.is_whitespace() => flush(&mut symbol, &mut tokens),
            c => symbol.push(c),
        }
    }
    flush(&mut symbol, &mut tokens);
    if tokens.is_empty() {
        return Err(QueryError::MalformedRegex("empty expression".to_string()));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_union(&mut self) -> Result<Regex, QueryError> {
        let mut lhs = self.parse_concat()?;
        while self.peek() == Some(&Token::Union) {
            self.pos += 1;
            let rhs = self.parse_concat()?;
            lhs = Regex::union(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_concat(&mut self) -> Result<Regex, QueryError> {
        let mut lhs = self.parse_postfix()?;
        loop {
            match self.peek() {
                // Explicit `.` concatenation
                Some(Token::Dot) => {
                    self.pos += 1;
                    let rhs = self.parse_postfix()?;
                    lhs = Regex::concat(lhs, rhs);
                }
                // Juxtaposition: `a b` or `a (b|c)`
                Some(Token::Symbol(_)) | Some(Token::LParen) => {
                    let rhs = self.parse_postfix()?;
                    lhs = Regex::concat(lhs, rhs);
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_postfix(&mut self) -> Result<Regex, QueryError> {
        let mut inner = self.parse_atom()?;
        while self.peek() == Some(&Token::Star) {
            self.pos += 1;
            inner = Regex::star(inner);
        }
        Ok(inner)
    }

    fn parse_atom(&mut self) -> Result<Regex, QueryError> {
        match self.peek().cloned() {
            Some(Token::Symbol(name)) => {
                self.pos += 1;
                if name == "epsilon" || name == "$" {
                    Ok(Regex::Epsilon)
                } else {
                    Ok(Regex::Symbol(name))
                }
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_union()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(QueryError::MalformedRegex(
                        "unbalanced parentheses".to_string(),
                    )),
                }
            }
            Some(token) => Err(QueryError::MalformedRegex(format!(
                "expected a symbol or `(`, found {token}"
            ))),
            None => Err(QueryError::MalformedRegex(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}

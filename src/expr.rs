//! Typed evaluation of query expression trees.
//!
//! The textual query language is parsed elsewhere; what arrives here is an
//! [`Expr`] tree. Evaluation is fully typed: values are a closed tagged
//! variant ([`Value`]), every operation matches exhaustively on its operand
//! kinds and rejects invalid combinations with a descriptive error, and
//! variable bindings live in an immutable environment ([`Env`]): `bind`
//! returns a new environment and never mutates shared state.
//!
//! Lambdas for `map`/`filter` are a small, explicitly-scoped expression
//! sub-language ([`LambdaExpr`]: parameter reference, literals, arithmetic,
//! comparison, boolean connectives, edge field access), built once as an
//! AST and interpreted, never as late-bound source text.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::automaton::AutomatonMatrix;
use crate::error::QueryError;
use crate::fa::{graph_to_nfa, EpsilonNfa, Nfa};
use crate::graph::{LabeledGraph, Vertex};

/// A scalar value: integer, string, or boolean.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scalar {
    Int(i64),
    Str(String),
    Bool(bool),
}

/// The closed set of value kinds query expressions evaluate to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Automaton(Nfa<Vertex>),
    VertexSet(BTreeSet<Vertex>),
    LabelSet(BTreeSet<String>),
    EdgeSet(BTreeSet<(Vertex, String, Vertex)>),
    Scalar(Scalar),
    List(Vec<Value>),
}

impl Value {
    /// The kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Automaton(_) => "automaton",
            Value::VertexSet(_) => "vertex set",
            Value::LabelSet(_) => "label set",
            Value::EdgeSet(_) => "edge set",
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
        }
    }

    /// Imports a graph as an automaton value with every vertex both start
    /// and final, the way graphs enter a query program.
    pub fn from_graph(graph: &LabeledGraph) -> Value {
        Value::Automaton(graph_to_nfa(graph, None, None))
    }
}

#[derive(Debug)]
struct Binding {
    name: String,
    value: Value,
    next: Option<Rc<Binding>>,
}

/// An immutable environment: a persistent chain of bindings.
///
/// [`Env::bind`] returns a *new* environment sharing its tail with the old
/// one; existing environments are never changed, so evaluation cannot leak
/// state between calls. The latest binding of a name shadows earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Env {
    head: Option<Rc<Binding>>,
}

impl Env {
    /// The empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new environment extended with one binding.
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Env {
        Env {
            head: Some(Rc::new(Binding {
                name: name.into(),
                value,
                next: self.head.clone(),
            })),
        }
    }

    /// Looks up a name, innermost binding first.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = self.head.as_deref();
        while let Some(binding) = current {
            if binding.name == name {
                return Some(&binding.value);
            }
            current = binding.next.as_deref();
        }
        None
    }
}

/// Field of an edge element inside a lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeField {
    Source,
    Label,
    Target,
}

/// The lambda body sub-language.
#[derive(Debug, Clone, PartialEq)]
pub enum LambdaExpr {
    /// Reference to the lambda parameter (by its declared name).
    Param(String),
    Int(i64),
    Str(String),
    Bool(bool),
    Field(Box<LambdaExpr>, EdgeField),
    Add(Box<LambdaExpr>, Box<LambdaExpr>),
    Sub(Box<LambdaExpr>, Box<LambdaExpr>),
    Mul(Box<LambdaExpr>, Box<LambdaExpr>),
    Eq(Box<LambdaExpr>, Box<LambdaExpr>),
    Ne(Box<LambdaExpr>, Box<LambdaExpr>),
    Lt(Box<LambdaExpr>, Box<LambdaExpr>),
    Le(Box<LambdaExpr>, Box<LambdaExpr>),
    And(Box<LambdaExpr>, Box<LambdaExpr>),
    Or(Box<LambdaExpr>, Box<LambdaExpr>),
    Not(Box<LambdaExpr>),
}

/// A compiled lambda: one named parameter and a body AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub param: String,
    pub body: LambdaExpr,
}

impl Lambda {
    pub fn new(param: impl Into<String>, body: LambdaExpr) -> Self {
        Self {
            param: param.into(),
            body,
        }
    }
}

/// A query expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a bound name.
    Var(String),
    Int(i64),
    Str(String),
    /// The automaton accepting exactly one one-symbol word.
    Symbol(String),
    /// A set literal: all integers (a vertex set) or all strings (a label
    /// set). An empty literal is an empty vertex set.
    SetOf(Vec<Expr>),
    ListOf(Vec<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Intersect(Box<Expr>, Box<Expr>),
    Concat(Box<Expr>, Box<Expr>),
    Star(Box<Expr>),
    SetStart(Box<Expr>, Box<Expr>),
    SetFinal(Box<Expr>, Box<Expr>),
    AddStart(Box<Expr>, Box<Expr>),
    AddFinal(Box<Expr>, Box<Expr>),
    GetStart(Box<Expr>),
    GetFinal(Box<Expr>),
    GetVertices(Box<Expr>),
    GetEdges(Box<Expr>),
    GetLabels(Box<Expr>),
    /// All `(source, target)` reachability pairs of an automaton, as a list
    /// of two-element `[source, target]` lists.
    GetReachable(Box<Expr>),
    Map(Box<Expr>, Lambda),
    Filter(Box<Expr>, Lambda),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn union(lhs: Self, rhs: Self) -> Self {
        Expr::Union(Box::new(lhs), Box::new(rhs))
    }

    pub fn intersect(lhs: Self, rhs: Self) -> Self {
        Expr::Intersect(Box::new(lhs), Box::new(rhs))
    }

    pub fn concat(lhs: Self, rhs: Self) -> Self {
        Expr::Concat(Box::new(lhs), Box::new(rhs))
    }

    pub fn star(inner: Self) -> Self {
        Expr::Star(Box::new(inner))
    }
}

/// Evaluates a `bind` statement: the result is a new environment with one
/// more binding. The input environment is unchanged.
pub fn eval_bind(name: &str, expr: &Expr, env: &Env) -> Result<Env, QueryError> {
    let value = eval(expr, env)?;
    Ok(env.bind(name, value))
}

/// Evaluates an expression in an environment.
pub fn eval(expr: &Expr, env: &Env) -> Result<Value, QueryError> {
    match expr {
        Expr::Var(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownIdentifier(name.clone())),
        Expr::Int(i) => Ok(Value::Scalar(Scalar::Int(*i))),
        Expr::Str(s) => Ok(Value::Scalar(Scalar::Str(s.clone()))),
        Expr::Symbol(name) => {
            let mut nfa = Nfa::new();
            nfa.add_transition(0u32, name.clone(), 1);
            nfa.add_start_state(0);
            nfa.add_final_state(1);
            Ok(Value::Automaton(nfa))
        }
        Expr::SetOf(items) => eval_set_literal(items, env),
        Expr::ListOf(items) => {
            let values = items
                .iter()
                .map(|item| eval(item, env))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(values))
        }
        Expr::Union(lhs, rhs) => match (eval(lhs, env)?, eval(rhs, env)?) {
            (Value::Automaton(a), Value::Automaton(b)) => Ok(Value::Automaton(
                EpsilonNfa::from_nfa(&a).union(&EpsilonNfa::from_nfa(&b)).into_nfa(),
            )),
            (Value::VertexSet(a), Value::VertexSet(b)) => {
                Ok(Value::VertexSet(a.union(&b).copied().collect()))
            }
            (Value::LabelSet(a), Value::LabelSet(b)) => {
                Ok(Value::LabelSet(a.union(&b).cloned().collect()))
            }
            (Value::EdgeSet(a), Value::EdgeSet(b)) => {
                Ok(Value::EdgeSet(a.union(&b).cloned().collect()))
            }
            (lhs, rhs) => Err(mismatch("union", &lhs, &rhs)),
        },
        Expr::Intersect(lhs, rhs) => match (eval(lhs, env)?, eval(rhs, env)?) {
            (Value::Automaton(a), Value::Automaton(b)) => {
                Ok(Value::Automaton(intersect_automata(&a, &b)))
            }
            (Value::VertexSet(a), Value::VertexSet(b)) => {
                Ok(Value::VertexSet(a.intersection(&b).copied().collect()))
            }
            (Value::LabelSet(a), Value::LabelSet(b)) => {
                Ok(Value::LabelSet(a.intersection(&b).cloned().collect()))
            }
            (Value::EdgeSet(a), Value::EdgeSet(b)) => {
                Ok(Value::EdgeSet(a.intersection(&b).cloned().collect()))
            }
            (lhs, rhs) => Err(mismatch("intersect", &lhs, &rhs)),
        },
        Expr::Concat(lhs, rhs) => match (eval(lhs, env)?, eval(rhs, env)?) {
            (Value::Automaton(a), Value::Automaton(b)) => Ok(Value::Automaton(
                EpsilonNfa::from_nfa(&a).concat(&EpsilonNfa::from_nfa(&b)).into_nfa(),
            )),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (Value::Scalar(Scalar::Str(a)), Value::Scalar(Scalar::Str(b))) => {
                Ok(Value::Scalar(Scalar::Str(a + &b)))
            }
            (lhs, rhs) => Err(mismatch("concat", &lhs, &rhs)),
        },
        Expr::Star(inner) => match eval(inner, env)? {
            Value::Automaton(a) => {
                Ok(Value::Automaton(EpsilonNfa::from_nfa(&a).star().into_nfa()))
            }
            value => Err(invalid("star", &value)),
        },
        Expr::SetStart(lhs, rhs) => {
            with_automaton_and_vertices("set_start", lhs, rhs, env, |nfa, vertices| {
                nfa.set_start_states(vertices);
            })
        }
        Expr::SetFinal(lhs, rhs) => {
            with_automaton_and_vertices("set_final", lhs, rhs, env, |nfa, vertices| {
                nfa.set_final_states(vertices);
            })
        }
        Expr::AddStart(lhs, rhs) => {
            with_automaton_and_vertices("add_start", lhs, rhs, env, |nfa, vertices| {
                for v in vertices {
                    nfa.add_start_state(v);
                }
            })
        }
        Expr::AddFinal(lhs, rhs) => {
            with_automaton_and_vertices("add_final", lhs, rhs, env, |nfa, vertices| {
                for v in vertices {
                    nfa.add_final_state(v);
                }
            })
        }
        Expr::GetStart(inner) => match eval(inner, env)? {
            Value::Automaton(nfa) => Ok(Value::VertexSet(nfa.start_states().clone())),
            value => Err(invalid("get_start", &value)),
        },
        Expr::GetFinal(inner) => match eval(inner, env)? {
            Value::Automaton(nfa) => Ok(Value::VertexSet(nfa.final_states().clone())),
            value => Err(invalid("get_final", &value)),
        },
        Expr::GetVertices(inner) => match eval(inner, env)? {
            Value::Automaton(nfa) => Ok(Value::VertexSet(nfa.states().clone())),
            value => Err(invalid("get_vertices", &value)),
        },
        Expr::GetEdges(inner) => match eval(inner, env)? {
            Value::Automaton(nfa) => Ok(Value::EdgeSet(
                nfa.transitions()
                    .map(|(from, label, to)| (*from, label.to_string(), *to))
                    .collect(),
            )),
            value => Err(invalid("get_edges", &value)),
        },
        Expr::GetLabels(inner) => match eval(inner, env)? {
            Value::Automaton(nfa) => Ok(Value::LabelSet(
                nfa.symbols().into_iter().map(str::to_string).collect(),
            )),
            value => Err(invalid("get_labels", &value)),
        },
        Expr::GetReachable(inner) => match eval(inner, env)? {
            Value::Automaton(nfa) => {
                let matrix = AutomatonMatrix::from_nfa(&nfa);
                let closure = matrix.transitive_closure();
                let pairs = closure
                    .iter()
                    .map(|(i, j)| {
                        Value::List(vec![
                            Value::Scalar(Scalar::Int(*matrix.state_of(i) as i64)),
                            Value::Scalar(Scalar::Int(*matrix.state_of(j) as i64)),
                        ])
                    })
                    .collect();
                Ok(Value::List(pairs))
            }
            value => Err(invalid("get_reachable", &value)),
        },
        Expr::Map(inner, lambda) => {
            let value = eval(inner, env)?;
            let elems = elements("map", &value)?;
            let mapped = elems
                .iter()
                .map(|elem| eval_lambda(lambda, elem).map(|out| out.into_value()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(mapped))
        }
        Expr::Filter(inner, lambda) => {
            let value = eval(inner, env)?;
            let elems = elements("filter", &value)?;
            let mut keep = Vec::new();
            for elem in &elems {
                match eval_lambda(lambda, elem)? {
                    Elem::Bool(true) => keep.push(elem.clone()),
                    Elem::Bool(false) => {}
                    other => {
                        return Err(QueryError::InvalidOperand {
                            operation: "filter",
                            kind: other.kind(),
                        })
                    }
                }
            }
            rebuild("filter", &value, keep)
        }
    }
}

fn mismatch(operation: &'static str, lhs: &Value, rhs: &Value) -> QueryError {
    QueryError::TypeMismatch {
        operation,
        lhs: lhs.kind(),
        rhs: rhs.kind(),
    }
}

fn invalid(operation: &'static str, value: &Value) -> QueryError {
    QueryError::InvalidOperand {
        operation,
        kind: value.kind(),
    }
}

fn eval_set_literal(items: &[Expr], env: &Env) -> Result<Value, QueryError> {
    let values = items
        .iter()
        .map(|item| eval(item, env))
        .collect::<Result<Vec<_>, _>>()?;
    let mut vertices = BTreeSet::new();
    let mut labels = BTreeSet::new();
    for value in &values {
        match value {
            Value::Scalar(Scalar::Int(i)) => {
                let v = u32::try_from(*i).map_err(|_| QueryError::InvalidOperand {
                    operation: "set literal",
                    kind: "negative integer",
                })?;
                vertices.insert(v);
            }
            Value::Scalar(Scalar::Str(s)) => {
                labels.insert(s.clone());
            }
            other => return Err(invalid("set literal", other)),
        }
    }
    match (vertices.is_empty(), labels.is_empty()) {
        (_, true) => Ok(Value::VertexSet(vertices)),
        (true, false) => Ok(Value::LabelSet(labels)),
        (false, false) => Err(QueryError::TypeMismatch {
            operation: "set literal",
            lhs: "vertex set",
            rhs: "label set",
        }),
    }
}

/// Intersection of automaton values via the Kronecker product; composite
/// product indices become the states of the result.
fn intersect_automata(a: &Nfa<Vertex>, b: &Nfa<Vertex>) -> Nfa<Vertex> {
    let product = AutomatonMatrix::from_nfa(a).intersect(&AutomatonMatrix::from_nfa(b));
    let composite = product.to_nfa();
    let mut nfa = Nfa::new();
    for &s in composite.states() {
        nfa.add_state(s as u32);
    }
    for (from, label, to) in composite.transitions() {
        nfa.add_transition(*from as u32, label, *to as u32);
    }
    for &s in composite.start_states() {
        nfa.add_start_state(s as u32);
    }
    for &s in composite.final_states() {
        nfa.add_final_state(s as u32);
    }
    nfa
}

fn with_automaton_and_vertices(
    operation: &'static str,
    lhs: &Expr,
    rhs: &Expr,
    env: &Env,
    apply: impl FnOnce(&mut Nfa<Vertex>, BTreeSet<Vertex>),
) -> Result<Value, QueryError> {
    match (eval(lhs, env)?, eval(rhs, env)?) {
        (Value::Automaton(mut nfa), Value::VertexSet(vertices)) => {
            apply(&mut nfa, vertices);
            Ok(Value::Automaton(nfa))
        }
        (lhs, rhs) => Err(mismatch(operation, &lhs, &rhs)),
    }
}

/// An element flowing through `map`/`filter`.
#[derive(Debug, Clone, PartialEq)]
enum Elem {
    Int(i64),
    Str(String),
    Bool(bool),
    Edge(Vertex, String, Vertex),
}

impl Elem {
    fn kind(&self) -> &'static str {
        match self {
            Elem::Int(_) => "integer",
            Elem::Str(_) => "string",
            Elem::Bool(_) => "boolean",
            Elem::Edge(..) => "edge",
        }
    }

    fn into_value(self) -> Value {
        match self {
            Elem::Int(i) => Value::Scalar(Scalar::Int(i)),
            Elem::Str(s) => Value::Scalar(Scalar::Str(s)),
            Elem::Bool(b) => Value::Scalar(Scalar::Bool(b)),
            Elem::Edge(from, label, to) => Value::List(vec![
                Value::Scalar(Scalar::Int(from as i64)),
                Value::Scalar(Scalar::Str(label)),
                Value::Scalar(Scalar::Int(to as i64)),
            ]),
        }
    }
}

/// Breaks an iterable value into lambda elements.
fn elements(operation: &'static str, value: &Value) -> Result<Vec<Elem>, QueryError> {
    match value {
        Value::VertexSet(set) => Ok(set.iter().map(|&v| Elem::Int(v as i64)).collect()),
        Value::LabelSet(set) => Ok(set.iter().map(|s| Elem::Str(s.clone())).collect()),
        Value::EdgeSet(set) => Ok(set
            .iter()
            .map(|(from, label, to)| Elem::Edge(*from, label.clone(), *to))
            .collect()),
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Scalar(Scalar::Int(i)) => Ok(Elem::Int(*i)),
                Value::Scalar(Scalar::Str(s)) => Ok(Elem::Str(s.clone())),
                Value::Scalar(Scalar::Bool(b)) => Ok(Elem::Bool(*b)),
                other => Err(invalid(operation, other)),
            })
            .collect(),
        other => Err(invalid(operation, other)),
    }
}

/// Rebuilds a filtered value with the kind of the original.
fn rebuild(
    operation: &'static str,
    original: &Value,
    kept: Vec<Elem>,
) -> Result<Value, QueryError> {
    match original {
        Value::VertexSet(_) => Ok(Value::VertexSet(
            kept.into_iter()
                .filter_map(|e| match e {
                    Elem::Int(i) => u32::try_from(i).ok(),
                    _ => None,
                })
                .collect(),
        )),
        Value::LabelSet(_) => Ok(Value::LabelSet(
            kept.into_iter()
                .filter_map(|e| match e {
                    Elem::Str(s) => Some(s),
                    _ => None,
                })
                .collect(),
        )),
        Value::EdgeSet(_) => Ok(Value::EdgeSet(
            kept.into_iter()
                .filter_map(|e| match e {
                    Elem::Edge(from, label, to) => Some((from, label, to)),
                    _ => None,
                })
                .collect(),
        )),
        Value::List(_) => Ok(Value::List(
            kept.into_iter().map(Elem::into_value).collect(),
        )),
        other => Err(invalid(operation, other)),
    }
}

fn eval_lambda(lambda: &Lambda, elem: &Elem) -> Result<Elem, QueryError> {
    eval_lambda_expr(&lambda.body, &lambda.param, elem)
}

fn eval_lambda_expr(expr: &LambdaExpr, param: &str, elem: &Elem) -> Result<Elem, QueryError> {
    let binary = |op: &'static str,
                  lhs: &LambdaExpr,
                  rhs: &LambdaExpr|
     -> Result<(Elem, Elem, &'static str), QueryError> {
        let l = eval_lambda_expr(lhs, param, elem)?;
        let r = eval_lambda_expr(rhs, param, elem)?;
        Ok((l, r, op))
    };

    match expr {
        LambdaExpr::Param(name) => {
            if name == param {
                Ok(elem.clone())
            } else {
                Err(QueryError::UnknownIdentifier(name.clone()))
            }
        }
        LambdaExpr::Int(i) => Ok(Elem::Int(*i)),
        LambdaExpr::Str(s) => Ok(Elem::Str(s.clone())),
        LambdaExpr::Bool(b) => Ok(Elem::Bool(*b)),
        LambdaExpr::Field(inner, field) => {
            match eval_lambda_expr(inner, param, elem)? {
                Elem::Edge(from, label, to) => Ok(match field {
                    EdgeField::Source => Elem::Int(from as i64),
                    EdgeField::Label => Elem::Str(label),
                    EdgeField::Target => Elem::Int(to as i64),
                }),
                other => Err(QueryError::InvalidOperand {
                    operation: "field access",
                    kind: other.kind(),
                }),
            }
        }
        LambdaExpr::Add(lhs, rhs) => match binary("add", lhs, rhs)? {
            (Elem::Int(a), Elem::Int(b), _) => Ok(Elem::Int(a + b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Sub(lhs, rhs) => match binary("sub", lhs, rhs)? {
            (Elem::Int(a), Elem::Int(b), _) => Ok(Elem::Int(a - b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Mul(lhs, rhs) => match binary("mul", lhs, rhs)? {
            (Elem::Int(a), Elem::Int(b), _) => Ok(Elem::Int(a * b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Eq(lhs, rhs) => match binary("eq", lhs, rhs)? {
            (Elem::Int(a), Elem::Int(b), _) => Ok(Elem::Bool(a == b)),
            (Elem::Str(a), Elem::Str(b), _) => Ok(Elem::Bool(a == b)),
            (Elem::Bool(a), Elem::Bool(b), _) => Ok(Elem::Bool(a == b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Ne(lhs, rhs) => match binary("ne", lhs, rhs)? {
            (Elem::Int(a), Elem::Int(b), _) => Ok(Elem::Bool(a != b)),
            (Elem::Str(a), Elem::Str(b), _) => Ok(Elem::Bool(a != b)),
            (Elem::Bool(a), Elem::Bool(b), _) => Ok(Elem::Bool(a != b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Lt(lhs, rhs) => match binary("lt", lhs, rhs)? {
            (Elem::Int(a), Elem::Int(b), _) => Ok(Elem::Bool(a < b)),
            (Elem::Str(a), Elem::Str(b), _) => Ok(Elem::Bool(a < b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Le(lhs, rhs) => match binary("le", lhs, rhs)? {
            (Elem::Int(a), Elem::Int(b), _) => Ok(Elem::Bool(a <= b)),
            (Elem::Str(a), Elem::Str(b), _) => Ok(Elem::Bool(a <= b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::And(lhs, rhs) => match binary("and", lhs, rhs)? {
            (Elem::Bool(a), Elem::Bool(b), _) => Ok(Elem::Bool(a && b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Or(lhs, rhs) => match binary("or", lhs, rhs)? {
            (Elem::Bool(a), Elem::Bool(b), _) => Ok(Elem::Bool(a || b)),
            (l, r, op) => Err(elem_mismatch(op, &l, &r)),
        },
        LambdaExpr::Not(inner) => match eval_lambda_expr(inner, param, elem)? {
            Elem::Bool(b) => Ok(Elem::Bool(!b)),
            other => Err(QueryError::InvalidOperand {
                operation: "not",
                kind: other.kind(),
            }),
        },
    }
}

fn elem_mismatch(operation: &'static str, lhs: &Elem, rhs: &Elem) -> QueryError {
    QueryError::TypeMismatch {
        operation,
        lhs: lhs.kind(),
        rhs: rhs.kind(),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn b(expr: LambdaExpr) -> Box<LambdaExpr> {
        Box::new(expr)
    }

    #[test]
    fn test_env_is_immutable() {
        let env = Env::new();
        let extended = env.bind("x", Value::Scalar(Scalar::Int(1)));
        // The original environment is untouched.
        assert!(env.lookup("x").is_none());
        assert_eq!(
            extended.lookup("x"),
            Some(&Value::Scalar(Scalar::Int(1)))
        );
        // Shadowing: the newest binding wins, the older env still sees 1.
        let shadowed = extended.bind("x", Value::Scalar(Scalar::Int(2)));
        assert_eq!(
            shadowed.lookup("x"),
            Some(&Value::Scalar(Scalar::Int(2)))
        );
        assert_eq!(
            extended.lookup("x"),
            Some(&Value::Scalar(Scalar::Int(1)))
        );
    }

    #[test]
    fn test_unknown_identifier() {
        let err = eval(&Expr::var("nope"), &Env::new()).unwrap_err();
        assert_eq!(err, QueryError::UnknownIdentifier("nope".to_string()));
    }

    #[test]
    fn test_symbol_star_concat() {
        let env = Env::new();
        let expr = Expr::concat(Expr::symbol("a"), Expr::star(Expr::symbol("b")));
        let Value::Automaton(nfa) = eval(&expr, &env).unwrap() else {
            panic!("expected an automaton");
        };
        assert!(nfa.accepts(["a"]));
        assert!(nfa.accepts(["a", "b", "b"]));
        assert!(!nfa.accepts(["b"]));
    }

    #[test]
    fn test_union_type_mismatch() {
        let env = Env::new();
        let expr = Expr::union(Expr::symbol("a"), Expr::SetOf(vec![Expr::Int(1)]));
        let err = eval(&expr, &env).unwrap_err();
        assert_eq!(
            err,
            QueryError::TypeMismatch {
                operation: "union",
                lhs: "automaton",
                rhs: "vertex set",
            }
        );
    }

    #[test]
    fn test_automaton_intersection() {
        let env = Env::new();
        // (a | b) ∩ (b | c) accepts exactly "b".
        let lhs = Expr::union(Expr::symbol("a"), Expr::symbol("b"));
        let rhs = Expr::union(Expr::symbol("b"), Expr::symbol("c"));
        let Value::Automaton(nfa) = eval(&Expr::intersect(lhs, rhs), &env).unwrap() else {
            panic!("expected an automaton");
        };
        assert!(nfa.accepts(["b"]));
        assert!(!nfa.accepts(["a"]));
        assert!(!nfa.accepts(["c"]));
    }

    #[test]
    fn test_set_start_and_accessors() {
        let graph = LabeledGraph::from_edges([(0, "a", 1), (1, "a", 2)]);
        let env = Env::new().bind("g", Value::from_graph(&graph));

        let expr = Expr::GetStart(Box::new(Expr::SetStart(
            Box::new(Expr::var("g")),
            Box::new(Expr::SetOf(vec![Expr::Int(0)])),
        )));
        assert_eq!(
            eval(&expr, &env).unwrap(),
            Value::VertexSet(BTreeSet::from([0]))
        );
        // The binding itself is unchanged: all vertices are still starts.
        let expr = Expr::GetStart(Box::new(Expr::var("g")));
        assert_eq!(
            eval(&expr, &env).unwrap(),
            Value::VertexSet(BTreeSet::from([0, 1, 2]))
        );
    }

    #[test]
    fn test_get_edges_and_labels() {
        let graph = LabeledGraph::from_edges([(0, "a", 1), (1, "b", 2)]);
        let env = Env::new().bind("g", Value::from_graph(&graph));

        assert_eq!(
            eval(&Expr::GetLabels(Box::new(Expr::var("g"))), &env).unwrap(),
            Value::LabelSet(BTreeSet::from(["a".to_string(), "b".to_string()]))
        );
        assert_eq!(
            eval(&Expr::GetEdges(Box::new(Expr::var("g"))), &env).unwrap(),
            Value::EdgeSet(BTreeSet::from([
                (0, "a".to_string(), 1),
                (1, "b".to_string(), 2),
            ]))
        );
    }

    #[test]
    fn test_map_increments_vertices() {
        let env = Env::new().bind("vs", Value::VertexSet(BTreeSet::from([1, 2, 3])));
        let lambda = Lambda::new(
            "v",
            LambdaExpr::Add(b(LambdaExpr::Param("v".to_string())), b(LambdaExpr::Int(1))),
        );
        let expr = Expr::Map(Box::new(Expr::var("vs")), lambda);
        assert_eq!(
            eval(&expr, &env).unwrap(),
            Value::List(vec![
                Value::Scalar(Scalar::Int(2)),
                Value::Scalar(Scalar::Int(3)),
                Value::Scalar(Scalar::Int(4)),
            ])
        );
    }

    #[test]
    fn test_filter_edges_by_label() {
        let edges = BTreeSet::from([
            (0, "a".to_string(), 1),
            (1, "b".to_string(), 2),
            (2, "a".to_string(), 3),
        ]);
        let env = Env::new().bind("es", Value::EdgeSet(edges));
        let lambda = Lambda::new(
            "e",
            LambdaExpr::Eq(
                b(LambdaExpr::Field(
                    b(LambdaExpr::Param("e".to_string())),
                    EdgeField::Label,
                )),
                b(LambdaExpr::Str("a".to_string())),
            ),
        );
        let expr = Expr::Filter(Box::new(Expr::var("es")), lambda);
        assert_eq!(
            eval(&expr, &env).unwrap(),
            Value::EdgeSet(BTreeSet::from([
                (0, "a".to_string(), 1),
                (2, "a".to_string(), 3),
            ]))
        );
    }

    #[test]
    fn test_lambda_scoping() {
        let env = Env::new().bind("vs", Value::VertexSet(BTreeSet::from([1])));
        // A lambda body referencing a name other than its parameter fails,
        // even if that name is bound in the outer environment.
        let lambda = Lambda::new("v", LambdaExpr::Param("vs".to_string()));
        let expr = Expr::Map(Box::new(Expr::var("vs")), lambda);
        assert_eq!(
            eval(&expr, &env).unwrap_err(),
            QueryError::UnknownIdentifier("vs".to_string())
        );
    }

    #[test]
    fn test_filter_requires_boolean_lambda() {
        let env = Env::new().bind("vs", Value::VertexSet(BTreeSet::from([1])));
        let lambda = Lambda::new("v", LambdaExpr::Int(3));
        let expr = Expr::Filter(Box::new(Expr::var("vs")), lambda);
        assert_eq!(
            eval(&expr, &env).unwrap_err(),
            QueryError::InvalidOperand {
                operation: "filter",
                kind: "integer",
            }
        );
    }

    #[test]
    fn test_get_reachable() {
        let graph = LabeledGraph::from_edges([(0, "a", 1), (1, "b", 2)]);
        let env = Env::new().bind("g", Value::from_graph(&graph));
        let Value::List(pairs) = eval(&Expr::GetReachable(Box::new(Expr::var("g"))), &env).unwrap()
        else {
            panic!("expected a list");
        };
        let expected = Value::List(vec![
            Value::Scalar(Scalar::Int(0)),
            Value::Scalar(Scalar::Int(2)),
        ]);
        assert!(pairs.contains(&expected));
        assert_eq!(pairs.len(), 3); // (0,1), (0,2), (1,2)
    }

    #[test]
    fn test_eval_bind_chains() {
        let env = Env::new();
        let env = eval_bind("a", &Expr::symbol("a"), &env).unwrap();
        let env = eval_bind(
            "aa",
            &Expr::concat(Expr::var("a"), Expr::var("a")),
            &env,
        )
        .unwrap();
        let Some(Value::Automaton(nfa)) = env.lookup("aa") else {
            panic!("expected an automaton binding");
        };
        assert!(nfa.accepts(["a", "a"]));
        assert!(!nfa.accepts(["a"]));
    }

    #[test]
    fn test_concat_strings_and_lists() {
        let env = Env::new();
        let expr = Expr::concat(Expr::Str("ab".to_string()), Expr::Str("cd".to_string()));
        assert_eq!(
            eval(&expr, &env).unwrap(),
            Value::Scalar(Scalar::Str("abcd".to_string()))
        );
        let expr = Expr::concat(
            Expr::ListOf(vec![Expr::Int(1)]),
            Expr::ListOf(vec![Expr::Int(2)]),
        );
        assert_eq!(
            eval(&expr, &env).unwrap(),
            Value::List(vec![
                Value::Scalar(Scalar::Int(1)),
                Value::Scalar(Scalar::Int(2)),
            ])
        );
    }
}

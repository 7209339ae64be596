//! Context-free grammars and the weak Chomsky normal form.
//!
//! Text format: one production per line, `Head -> Body1 | Body2 | ...`,
//! symbols separated by spaces. A token starting with an uppercase letter is
//! a nonterminal; anything else is a terminal. `epsilon`, `$`, or an empty
//! body denote the empty word. The default start symbol is `S`.
//!
//! The weak normal form keeps only productions of three shapes: a single
//! terminal, the empty word, or exactly two nonterminals. Conversion runs
//! unit-production elimination, then useless-symbol removal, then terminal
//! lifting and binarization, in that order; the CFPQ evaluators assume
//! their input grammar has gone through the whole pipeline.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::QueryError;

/// A grammar symbol: nonterminal (variable) or terminal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sym {
    Var(String),
    Term(String),
}

impl Sym {
    /// The symbol's name, regardless of kind.
    pub fn name(&self) -> &str {
        match self {
            Sym::Var(name) | Sym::Term(name) => name,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Sym::Var(_))
    }
}

/// A single production `head -> body`. An empty body is the empty word.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Production {
    pub head: String,
    pub body: Vec<Sym>,
}

/// A context-free grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    start: String,
    variables: BTreeSet<String>,
    terminals: BTreeSet<String>,
    productions: BTreeSet<Production>,
}

fn is_variable_token(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_uppercase())
}

impl Grammar {
    /// Parses grammar text with start symbol `S`.
    pub fn from_text(text: &str) -> Result<Self, QueryError> {
        Self::from_text_with_start(text, "S")
    }

    /// Parses grammar text with an explicit start symbol.
    pub fn from_text_with_start(text: &str, start: &str) -> Result<Self, QueryError> {
        let mut productions = BTreeSet::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((head, bodies)) = line.split_once("->") else {
                return Err(QueryError::MalformedGrammar(format!(
                    "line {}: missing `->`",
                    lineno + 1
                )));
            };
            let head = head.trim();
            if head.is_empty() || head.split_whitespace().count() != 1 {
                return Err(QueryError::MalformedGrammar(format!(
                    "line {}: head must be a single symbol",
                    lineno + 1
                )));
            }
            if !is_variable_token(head) {
                return Err(QueryError::MalformedGrammar(format!(
                    "line {}: head `{head}` is not a nonterminal (must start uppercase)",
                    lineno + 1
                )));
            }
            for alternative in bodies.split('|') {
                let body: Vec<Sym> = alternative
                    .split_whitespace()
                    .filter(|token| *token != "epsilon" && *token != "$")
                    .map(|token| {
                        if is_variable_token(token) {
                            Sym::Var(token.to_string())
                        } else {
                            Sym::Term(token.to_string())
                        }
                    })
                    .collect();
                productions.insert(Production {
                    head: head.to_string(),
                    body,
                });
            }
        }
        Ok(Self::from_parts(start.to_string(), productions))
    }

    /// Assembles a grammar, recomputing the variable and terminal sets from
    /// the productions. The start symbol is always a variable.
    pub fn from_parts(start: String, productions: BTreeSet<Production>) -> Self {
        let mut variables = BTreeSet::from([start.clone()]);
        let mut terminals = BTreeSet::new();
        for p in &productions {
            variables.insert(p.head.clone());
            for sym in &p.body {
                match sym {
                    Sym::Var(v) => {
                        variables.insert(v.clone());
                    }
                    Sym::Term(t) => {
                        terminals.insert(t.clone());
                    }
                }
            }
        }
        Self {
            start,
            variables,
            terminals,
            productions,
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    pub fn terminals(&self) -> &BTreeSet<String> {
        &self.terminals
    }

    pub fn productions(&self) -> &BTreeSet<Production> {
        &self.productions
    }

    /// Replaces every unit production `A -> B` by B's non-unit productions,
    /// for every B unit-reachable from A.
    pub fn eliminate_unit_productions(&self) -> Grammar {
        // Unit-reachability closure, seeded with the trivial (A, A) pairs.
        let mut reach: BTreeMap<&str, BTreeSet<&str>> = self
            .variables
            .iter()
            .map(|v| (v.as_str(), BTreeSet::from([v.as_str()])))
            .collect();
        loop {
            let mut changed = false;
            for p in &self.productions {
                if let [Sym::Var(b)] = p.body.as_slice() {
                    let via: Vec<&str> = reach[b.as_str()].iter().copied().collect();
                    let entry = reach.get_mut(p.head.as_str()).expect("head is a variable");
                    for v in via {
                        changed |= entry.insert(v);
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let mut productions = BTreeSet::new();
        for (head, reachable) in &reach {
            for p in &self.productions {
                let is_unit = matches!(p.body.as_slice(), [Sym::Var(_)]);
                if !is_unit && reachable.contains(p.head.as_str()) {
                    productions.insert(Production {
                        head: head.to_string(),
                        body: p.body.clone(),
                    });
                }
            }
        }
        Grammar::from_parts(self.start.clone(), productions)
    }

    /// Drops non-generating variables, then variables unreachable from the
    /// start symbol, together with every production mentioning them.
    pub fn remove_useless_symbols(&self) -> Grammar {
        // Generating variables: fixpoint over productions whose body is all
        // terminals or already-generating variables.
        let mut generating: BTreeSet<&str> = BTreeSet::new();
        loop {
            let mut changed = false;
            for p in &self.productions {
                if generating.contains(p.head.as_str()) {
                    continue;
                }
                let ok = p.body.iter().all(|sym| match sym {
                    Sym::Term(_) => true,
                    Sym::Var(v) => generating.contains(v.as_str()),
                });
                if ok {
                    generating.insert(p.head.as_str());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let surviving: Vec<&Production> = self
            .productions
            .iter()
            .filter(|p| {
                generating.contains(p.head.as_str())
                    && p.body.iter().all(|sym| match sym {
                        Sym::Term(_) => true,
                        Sym::Var(v) => generating.contains(v.as_str()),
                    })
            })
            .collect();

        // Reachability from the start symbol over the surviving productions.
        let mut reachable: BTreeSet<&str> = BTreeSet::from([self.start.as_str()]);
        loop {
            let mut changed = false;
            for p in &surviving {
                if !reachable.contains(p.head.as_str()) {
                    continue;
                }
                for sym in &p.body {
                    if let Sym::Var(v) = sym {
                        changed |= reachable.insert(v.as_str());
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let productions = surviving
            .into_iter()
            .filter(|p| reachable.contains(p.head.as_str()))
            .cloned()
            .collect();
        Grammar::from_parts(self.start.clone(), productions)
    }

    /// Converts to weak Chomsky normal form: unit elimination, useless-symbol
    /// removal, then terminal lifting and binarization. Every resulting
    /// production is a single terminal, the empty word, or two nonterminals.
    pub fn to_weak_normal_form(&self) -> Grammar {
        let g = self.eliminate_unit_productions().remove_useless_symbols();

        let mut used: BTreeSet<String> = g.variables.clone();
        let mut term_wrappers: BTreeMap<String, String> = BTreeMap::new();
        let mut productions: BTreeSet<Production> = BTreeSet::new();
        let mut split_counter = 0usize;

        for p in &g.productions {
            if p.body.len() <= 1 {
                productions.insert(p.clone());
                continue;
            }
            // Lift terminals out of long bodies.
            let vars: Vec<String> = p
                .body
                .iter()
                .map(|sym| match sym {
                    Sym::Var(v) => v.clone(),
                    Sym::Term(t) => term_wrappers
                        .entry(t.clone())
                        .or_insert_with(|| {
                            let wrapper = fresh_name(format!("{t}#t"), &mut used);
                            productions.insert(Production {
                                head: wrapper.clone(),
                                body: vec![Sym::Term(t.clone())],
                            });
                            wrapper
                        })
                        .clone(),
                })
                .collect();

            // Binarize: A -> X1 X2 ... Xk becomes a right-branching chain.
            let mut head = p.head.clone();
            for i in 0..vars.len() - 2 {
                split_counter += 1;
                let link = fresh_name(format!("{}#{}", p.head, split_counter), &mut used);
                productions.insert(Production {
                    head,
                    body: vec![Sym::Var(vars[i].clone()), Sym::Var(link.clone())],
                });
                head = link;
            }
            productions.insert(Production {
                head,
                body: vec![
                    Sym::Var(vars[vars.len() - 2].clone()),
                    Sym::Var(vars[vars.len() - 1].clone()),
                ],
            });
        }

        Grammar::from_parts(g.start, productions)
    }

    /// Variables that derive the empty word.
    pub fn nullable_set(&self) -> BTreeSet<String> {
        let mut nullable: BTreeSet<String> = BTreeSet::new();
        loop {
            let mut changed = false;
            for p in &self.productions {
                if nullable.contains(&p.head) {
                    continue;
                }
                let ok = p.body.iter().all(|sym| match sym {
                    Sym::Term(_) => false,
                    Sym::Var(v) => nullable.contains(v),
                });
                if ok {
                    nullable.insert(p.head.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        nullable
    }

    /// Membership test: CYK over the weak normal form, with nullable
    /// partners accounted for (the weak form keeps ε productions).
    pub fn contains<'a>(&self, word: impl IntoIterator<Item = &'a str>) -> bool {
        let word: Vec<&str> = word.into_iter().collect();
        let wnf = self.to_weak_normal_form();
        let nullable = wnf.nullable_set();
        if word.is_empty() {
            return nullable.contains(wnf.start());
        }

        let binaries: Vec<(&str, &str, &str)> = wnf
            .productions
            .iter()
            .filter_map(|p| match p.body.as_slice() {
                [Sym::Var(b), Sym::Var(c)] => Some((p.head.as_str(), b.as_str(), c.as_str())),
                _ => None,
            })
            .collect();

        // A variable derives a span if one side derives it and the other side
        // is nullable; saturate each cell under that rule.
        let close_cell = |cell: &mut BTreeSet<String>| loop {
            let mut changed = false;
            for &(head, b, c) in &binaries {
                if cell.contains(head) {
                    continue;
                }
                if (cell.contains(b) && nullable.contains(c))
                    || (nullable.contains(b) && cell.contains(c))
                {
                    cell.insert(head.to_string());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        };

        let n = word.len();
        // table[len - 1][i]: variables deriving word[i .. i + len]
        let mut table: Vec<Vec<BTreeSet<String>>> = vec![vec![BTreeSet::new(); n]; n];
        for i in 0..n {
            let mut cell = BTreeSet::new();
            for p in &wnf.productions {
                if let [Sym::Term(t)] = p.body.as_slice() {
                    if t == word[i] {
                        cell.insert(p.head.clone());
                    }
                }
            }
            close_cell(&mut cell);
            table[0][i] = cell;
        }
        for len in 2..=n {
            for i in 0..=n - len {
                let mut cell = BTreeSet::new();
                for split in 1..len {
                    for &(head, b, c) in &binaries {
                        if table[split - 1][i].contains(b)
                            && table[len - split - 1][i + split].contains(c)
                        {
                            cell.insert(head.to_string());
                        }
                    }
                }
                close_cell(&mut cell);
                table[len - 1][i] = cell;
            }
        }
        table[n - 1][0].contains(wnf.start())
    }
}

/// Returns `base`, primed until it collides with nothing in `used`, and
/// records it as used.
fn fresh_name(base: String, used: &mut BTreeSet<String>) -> String {
    let mut name = base;
    while used.contains(&name) {
        name.push('\'');
    }
    used.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_from_text() {
        let g = Grammar::from_text("S -> a S b | epsilon").unwrap();
        assert_eq!(g.start(), "S");
        assert_eq!(g.variables().len(), 1);
        assert_eq!(
            g.terminals().iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(g.productions().len(), 2);
    }

    #[test]
    fn test_from_text_errors() {
        assert!(matches!(
            Grammar::from_text("S a b"),
            Err(QueryError::MalformedGrammar(_))
        ));
        assert!(matches!(
            Grammar::from_text("s -> a"),
            Err(QueryError::MalformedGrammar(_))
        ));
        assert!(matches!(
            Grammar::from_text("S T -> a"),
            Err(QueryError::MalformedGrammar(_))
        ));
    }

    #[test]
    fn test_wnf_drops_useless_symbols() {
        let g = Grammar::from_text("S -> A B | B S | C\nA -> a\nB -> b b b\nC -> C c").unwrap();
        let wnf = g.to_weak_normal_form();

        assert!(wnf.variables().contains("A"));
        assert!(wnf.variables().contains("B"));
        assert!(wnf.variables().contains("S"));
        assert!(!wnf.variables().contains("C"));

        assert!(wnf.terminals().contains("a"));
        assert!(wnf.terminals().contains("b"));
        assert!(!wnf.terminals().contains("c"));
    }

    #[test]
    fn test_wnf_shapes() {
        let g = Grammar::from_text("S -> a S b | epsilon").unwrap();
        let wnf = g.to_weak_normal_form();
        for p in wnf.productions() {
            match p.body.as_slice() {
                [] => {}
                [Sym::Term(_)] => {}
                [Sym::Var(_), Sym::Var(_)] => {}
                other => panic!("not in weak normal form: {other:?}"),
            }
        }
        // The language is preserved.
        assert!(wnf.contains([]));
        assert!(wnf.contains(["a", "b"]));
        assert!(wnf.contains(["a", "a", "b", "b"]));
        assert!(!wnf.contains(["a", "b", "b"]));
    }

    #[test]
    fn test_unit_elimination() {
        let g = Grammar::from_text("S -> A | B | C\nA -> a\nB -> b\nC -> C").unwrap();
        assert!(g.contains(["a"]));
        assert!(g.contains(["b"]));
        assert!(!g.contains(["c"]));
    }

    #[test]
    fn test_contains_balanced_brackets() {
        let g = Grammar::from_text("S -> S S | o S c | epsilon").unwrap();
        assert!(g.contains([]));
        assert!(g.contains(["o", "c"]));
        assert!(g.contains(["o", "o", "c", "c", "o", "c"]));
        assert!(!g.contains(["o"]));
        assert!(!g.contains(["c", "o"]));
    }

    #[test]
    fn test_nullable_through_chain() {
        let g = Grammar::from_text("S -> A B\nA -> epsilon\nB -> b | epsilon").unwrap();
        assert!(g.contains([]));
        assert!(g.contains(["b"]));
        assert!(!g.contains(["b", "b"]));
    }
}

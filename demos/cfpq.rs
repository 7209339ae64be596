//! Context-free path query demo.
//!
//! ```bash
//! cargo run --example cfpq -- \
//!     --edge 0:a:1 --edge 1:a:2 --edge 2:b:3 --edge 3:b:4 \
//!     --grammar "S -> a S b | a b" --strategy tensor
//! ```
//!
//! Productions are separated by `;` or newlines.

use std::collections::BTreeSet;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, Result};
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use cfpq_rs::cfg::Grammar;
use cfpq_rs::cfpq::{cfpq_with_hellings, cfpq_with_matrix, cfpq_with_tensor};
use cfpq_rs::graph::LabeledGraph;
use cfpq_rs::rsm::Rsm;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Strategy {
    Hellings,
    Matrix,
    Tensor,
}

#[derive(Parser)]
#[command(about = "Evaluate a context-free path query over an edge-labeled graph")]
struct Args {
    /// Edge in `source:label:target` form (repeatable).
    #[arg(long = "edge")]
    edges: Vec<String>,

    /// Grammar text: productions separated by `;` (start symbol `S`).
    #[arg(long)]
    grammar: String,

    /// Evaluation strategy; all three return the same pairs.
    #[arg(long, value_enum, default_value = "hellings")]
    strategy: Strategy,

    /// Comma-separated start vertices (default: all).
    #[arg(long)]
    starts: Option<String>,

    /// Comma-separated final vertices (default: all).
    #[arg(long)]
    finals: Option<String>,
}

fn parse_edge(text: &str) -> Result<(u32, String, u32)> {
    let parts: Vec<&str> = text.split(':').collect();
    let [from, label, to] = parts.as_slice() else {
        return Err(eyre!("edge `{text}` is not in source:label:target form"));
    };
    Ok((from.parse()?, label.to_string(), to.parse()?))
}

fn parse_vertices(text: &str) -> Result<BTreeSet<u32>> {
    text.split(',')
        .map(|v| Ok(v.trim().parse()?))
        .collect()
}

fn main() -> Result<()> {
    color_eyre::install()?;
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let args = Args::parse();

    let mut graph = LabeledGraph::new();
    for edge in &args.edges {
        let (from, label, to) = parse_edge(edge)?;
        graph.add_edge(from, label, to);
    }

    let grammar = Grammar::from_text(&args.grammar.replace(';', "\n"))?;
    info!(
        "grammar: {} variables, {} productions; strategy {:?}",
        grammar.variables().len(),
        grammar.productions().len(),
        args.strategy
    );

    let starts = args.starts.as_deref().map(parse_vertices).transpose()?;
    let finals = args.finals.as_deref().map(parse_vertices).transpose()?;

    let pairs = match args.strategy {
        Strategy::Hellings => {
            cfpq_with_hellings(&grammar, &graph, starts.as_ref(), finals.as_ref())?
        }
        Strategy::Matrix => cfpq_with_matrix(&grammar, &graph, starts.as_ref(), finals.as_ref())?,
        Strategy::Tensor => {
            let rsm = Rsm::from_grammar(&grammar);
            cfpq_with_tensor(&rsm, &graph, starts.as_ref(), finals.as_ref())?
        }
    };

    println!("{} pair(s):", pairs.len());
    for (from, to) in pairs {
        println!("  {from} -> {to}");
    }
    Ok(())
}

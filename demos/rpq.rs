//! Regular path query demo.
//!
//! ```bash
//! cargo run --example rpq -- \
//!     --edge 0:a:1 --edge 1:b:2 --edge 2:c:0 \
//!     --regex "a.b.c*" --starts 0 --finals 2
//! ```

use std::collections::BTreeSet;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use cfpq_rs::dot::graph_to_dot;
use cfpq_rs::graph::LabeledGraph;
use cfpq_rs::rpq::regular_path_query;

#[derive(Parser)]
#[command(about = "Evaluate a regular path query over an edge-labeled graph")]
struct Args {
    /// Edge in `source:label:target` form (repeatable).
    #[arg(long = "edge")]
    edges: Vec<String>,

    /// Regular expression over edge labels (`.` concat, `|` union, `*` star).
    #[arg(long)]
    regex: String,

    /// Comma-separated start vertices (default: all).
    #[arg(long)]
    starts: Option<String>,

    /// Comma-separated final vertices (default: all).
    #[arg(long)]
    finals: Option<String>,

    /// Print the graph in DOT format and exit.
    #[arg(long)]
    dot: bool,
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
    info!(
        "graph: {} vertices, {} edges",
        graph.num_vertices(),
        graph.num_edges()
    );

    if args.dot {
        print!("{}", graph_to_dot(&graph));
        return Ok(());
    }

    let starts = args.starts.as_deref().map(parse_vertices).transpose()?;
    let finals = args.finals.as_deref().map(parse_vertices).transpose()?;

    let pairs = regular_path_query(&graph, starts.as_ref(), finals.as_ref(), &args.regex)?;
    println!("{} pair(s):", pairs.len());
    for (from, to) in pairs {
        println!("  {from} -> {to}");
    }
    Ok(())
}

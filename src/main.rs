use anyhow::Result;
use clap::{Parser, Subcommand};
use graph::{GitWalker, GraphSession, GraphStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gitgraph")]
#[command(about = "Visualize a git commit history as a node graph", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print commits in topological order
    Sort {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Maximum number of commits to walk
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Arrange the commit graph and print node positions
    Graph {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Maximum number of commits to walk
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show graph statistics
    Stats {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Maximum number of commits to walk
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Sort { path, limit } => cmd_sort(&path, limit),
        Commands::Graph { path, limit } => cmd_graph(&path, limit),
        Commands::Stats { path, limit } => cmd_stats(&path, limit),
    }
}

fn walk(path: &std::path::Path, limit: Option<usize>) -> Result<Vec<graph::CommitRecord>> {
    let walker = GitWalker::new(path.to_str())?;
    walker.records(limit)
}

fn cmd_sort(path: &std::path::Path, limit: Option<usize>) -> Result<()> {
    let records = walk(path, limit)?;
    let store = GraphStore::build(&records)?;
    let by_id: std::collections::HashMap<&str, &graph::CommitRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();

    for id in store.topological_sort()? {
        match by_id.get(id.as_str()) {
            Some(record) => println!("{}  {}  {}", id, record.author, record.message),
            None => println!("{id}"),
        }
    }
    Ok(())
}

fn cmd_graph(path: &std::path::Path, limit: Option<usize>) -> Result<()> {
    let records = walk(path, limit)?;
    let mut session = GraphSession::default();
    session.build_from_records(records)?;
    session.arrange()?;

    println!("{:<10} {:>5} {:>10} {:>10}", "commit", "level", "x", "y");
    for node_box in session.geometry() {
        let level = session.level(&node_box.id);
        match level {
            Some(level) => println!(
                "{:<10} {:>5} {:>10.1} {:>10.1}",
                node_box.id, level, node_box.rect.x, node_box.rect.y
            ),
            // unreachable from the designated root, left unplaced
            None => println!("{:<10} {:>5} {:>10} {:>10}", node_box.id, "-", "-", "-"),
        }
    }
    Ok(())
}

fn cmd_stats(path: &std::path::Path, limit: Option<usize>) -> Result<()> {
    let records = walk(path, limit)?;
    let merges = records.iter().filter(|r| r.is_merge()).count();
    let store = GraphStore::build(&records)?;

    println!("commits:  {}", store.node_count());
    println!("edges:    {}", store.edge_count());
    println!("roots:    {}", store.roots().len());
    println!("leaves:   {}", store.leaves().len());
    println!("merges:   {}", merges);
    println!("valid:    {}", store.validate());
    Ok(())
}

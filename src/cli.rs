//! Flowdraft CLI - inspect, validate, render and generate flowcharts and code

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use flowdraft::config::Config;
use flowdraft::document::{self, Document};
use flowdraft::export;
use flowdraft::generation::{self, OpenRouterClient};
use flowdraft::store::{DocumentFilter, DocumentStore, FileStore, Visibility};

/// Command line companion to the Flowdraft editor
#[derive(Parser, Debug)]
#[command(name = "flowdraft-cli", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the nodes and edges of a flowchart file
    Inspect {
        /// Flowchart JSON file
        file: PathBuf,
    },
    /// Check a flowchart file; exits non-zero when it is rejected
    Validate {
        file: PathBuf,
    },
    /// Render a flowchart file to PNG and/or SVG
    Render(RenderArgs),
    /// Ask the configured generator for a flowchart
    Generate {
        /// What the flowchart should describe
        prompt: String,
        /// Output file (defaults to a name derived from the title)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask the configured generator for JavaScript implementing a flowchart
    Code {
        file: PathBuf,
        /// Output file (defaults to <title>_generated.js)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Work with saved flowcharts
    #[command(subcommand)]
    Store(StoreCommand),
}

#[derive(Args, Debug)]
struct RenderArgs {
    file: PathBuf,
    /// Write the 1024x768 overview card as PNG
    #[arg(long)]
    png: Option<PathBuf>,
    /// Write the canvas as SVG
    #[arg(long)]
    svg: Option<PathBuf>,
    /// Write the canvas (instead of the overview) as PNG
    #[arg(long)]
    canvas_png: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// List saved flowcharts, newest first
    List {
        #[arg(long, conflicts_with = "public")]
        drafts: bool,
        #[arg(long)]
        public: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Export a saved flowchart as exchange JSON
    Export {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save a flowchart file into the store
    Import {
        file: PathBuf,
        /// Save as a public project instead of a draft
        #[arg(long)]
        public: bool,
    },
    /// Delete a saved flowchart
    Delete {
        id: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Inspect { file } => inspect(&file),
        Command::Validate { file } => {
            let doc = load(&file)?;
            println!(
                "✅ {} is valid ({} nodes, {} edges)",
                file.display(),
                doc.graph.nodes.len(),
                doc.graph.edges.len()
            );
            Ok(())
        }
        Command::Render(args) => render(args),
        Command::Generate { prompt, output } => generate(&prompt, output),
        Command::Code { file, output } => code(&file, output),
        Command::Store(command) => store(command),
    }
}

fn load(path: &Path) -> Result<Document> {
    let imported = document::read_import(path)?;
    Ok(imported.into_document(&Document::new().metadata))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("could not write {}", path.display()))?;
    println!("📄 wrote {}", path.display());
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let doc = load(path)?;
    let meta = &doc.metadata;

    println!("Flowchart: {}", meta.title);
    if !meta.description.is_empty() {
        println!("  {}", meta.description);
    }
    println!(
        "  Version {} | {} | modified {}",
        meta.version,
        if meta.is_draft { "draft" } else { "published" },
        meta.last_modified.format("%Y-%m-%d %H:%M")
    );

    println!("  Nodes: {}", doc.graph.nodes.len());
    for node in &doc.graph.nodes {
        println!(
            "    - {} [{}] \"{}\" at ({}, {})",
            node.id,
            node.kind.wire_name(),
            node.label(),
            node.position.x,
            node.position.y
        );
    }
    println!("  Edges: {}", doc.graph.edges.len());
    for edge in &doc.graph.edges {
        match &edge.label {
            Some(label) => println!("    {} --> {} : {}", edge.source, edge.target, label),
            None => println!("    {} --> {}", edge.source, edge.target),
        }
    }
    Ok(())
}

fn render(args: RenderArgs) -> Result<()> {
    if args.png.is_none() && args.svg.is_none() && args.canvas_png.is_none() {
        bail!("nothing to render: pass --png, --svg or --canvas-png");
    }
    let doc = load(&args.file)?;

    if let Some(path) = &args.png {
        write(path, &export::overview_png(&doc)?)?;
    }
    if let Some(path) = &args.svg {
        write(path, export::canvas_svg(&doc.graph).as_bytes())?;
    }
    if let Some(path) = &args.canvas_png {
        write(path, &export::canvas_png(&doc.graph)?)?;
    }
    Ok(())
}

fn generate(prompt: &str, output: Option<PathBuf>) -> Result<()> {
    let config = Config::load();
    let client = OpenRouterClient::new(config.generator)?;

    println!("🤖 asking {} ...", client.model());
    let graph = generation::generate(&client, prompt)?;
    let metadata = generation::generated_metadata(prompt.trim(), &Document::new().metadata);
    let doc = Document::with_graph(graph, metadata);
    println!(
        "✅ generated {} nodes, {} edges",
        doc.graph.nodes.len(),
        doc.graph.edges.len()
    );

    let path = output.unwrap_or_else(|| PathBuf::from(doc.file_name("json")));
    write(&path, doc.to_json()?.as_bytes())
}

fn code(file: &Path, output: Option<PathBuf>) -> Result<()> {
    let doc = load(file)?;
    let config = Config::load();
    let client = OpenRouterClient::new(config.generator)?;

    println!("🤖 asking {} for code ...", client.model());
    let code = generation::generate_code(&client, &doc)?;
    let path = output.unwrap_or_else(|| PathBuf::from(generation::code_file_name(&doc)));
    write(&path, code.as_bytes())
}

fn store(command: StoreCommand) -> Result<()> {
    let config = Config::load();
    let store = FileStore::open(config.store_dir())?;

    match command {
        StoreCommand::List {
            drafts,
            public,
            limit,
        } => {
            let visibility = match (drafts, public) {
                (true, _) => Some(Visibility::Draft),
                (_, true) => Some(Visibility::Public),
                _ => None,
            };
            let filter = DocumentFilter {
                visibility,
                limit: Some(limit),
                ..DocumentFilter::default()
            };
            let records = store.load(&filter)?;
            if records.is_empty() {
                println!("No saved flowcharts in {}", store.dir().display());
            }
            for record in records {
                println!(
                    "{}  {:<7}  {}  {}",
                    record.id,
                    record.visibility.noun(),
                    record.updated_at.format("%Y-%m-%d %H:%M"),
                    record.title
                );
            }
            Ok(())
        }
        StoreCommand::Export { id, output } => {
            let record = store.get(&id)?;
            let doc = record.document()?;
            let path = output.unwrap_or_else(|| PathBuf::from(doc.file_name("json")));
            write(&path, doc.to_json()?.as_bytes())
        }
        StoreCommand::Import { file, public } => {
            let doc = load(&file)?;
            let record = store.save(&doc, Visibility::from_draft(!public))?;
            println!(
                "✅ saved '{}' as {} ({})",
                record.title,
                record.visibility.noun(),
                record.id
            );
            Ok(())
        }
        StoreCommand::Delete { id } => {
            store.delete(&id)?;
            println!("🗑 deleted {id}");
            Ok(())
        }
    }
}

//! PartDoc command-line tool

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use pd_core::constants::DOCUMENT_EXTENSION;
use pd_core::interchange;
use pd_core::{Document, ExportOptions, ImportOptions, Settings, TreeItem, TreeModel};

#[derive(Parser)]
#[command(name = "pdt")]
#[command(about = "Inspect, edit and exchange PartDoc documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (RON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the object tree
    Tree {
        document: PathBuf,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suppress a feature (or unsuppress it with --off), recompute and save
    Suppress {
        document: PathBuf,
        /// Object name or label
        object: String,
        /// Unsuppress instead
        #[arg(long)]
        off: bool,
    },
    /// Export objects to a STEP file
    Export {
        document: PathBuf,
        output: PathBuf,
        /// Object names or labels
        #[arg(required = true)]
        objects: Vec<String>,
    },
    /// Insert the shapes of a STEP file into a document (created if missing,
    /// with the .pdoc extension added when none is given)
    Import { input: PathBuf, document: PathBuf },
    /// Show volume and topology of every object with a shape
    Info { document: PathBuf },
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pd_core=info,pd_cad=info,pd_tool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Tree { document, json } => {
            let doc = open(&document)?;
            let tree = TreeModel::build(&doc);
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                for root in &tree.roots {
                    print_item(root, 0);
                }
            }
        }
        Commands::Suppress {
            document,
            object,
            off,
        } => {
            let mut doc = open(&document)?;
            let name = resolve(&doc, &object)?;
            doc.set_suppressed(&name, !off)?;
            if let Err(e) = doc.recompute() {
                tracing::warn!("{}", e);
            }
            doc.save_with(&document, &settings.persistence)?;

            let state = if off { "active" } else { "suppressed" };
            println!("{} is now {}", object.bold(), state);
        }
        Commands::Export {
            document,
            output,
            objects,
        } => {
            let doc = open(&document)?;
            let names = objects
                .iter()
                .map(|o| resolve(&doc, o))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let options = ExportOptions::from(&settings.interchange);
            let count = interchange::export(&doc, &names, &output, &options)?;
            println!("Wrote {} record(s) to {}", count, output.display());
        }
        Commands::Import {
            input,
            mut document,
        } => {
            if document.extension().is_none() {
                document.set_extension(DOCUMENT_EXTENSION);
            }
            let mut doc = if document.exists() {
                open(&document)?
            } else {
                let stem = document
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Unnamed".to_string());
                Document::new(stem)
            };
            let options = ImportOptions::from(&settings.interchange);
            let created = interchange::insert(&input, &mut doc, &options)?;
            if let Err(e) = doc.recompute() {
                tracing::warn!("{}", e);
            }
            doc.save_with(&document, &settings.persistence)?;

            for name in &created {
                let label = doc.get(name).map(|o| o.label()).unwrap_or(name);
                println!("{} {}", "+".green(), label);
            }
        }
        Commands::Info { document } => {
            let doc = open(&document)?;
            println!("{} ({})", doc.label.bold(), doc.name);
            for object in doc.iter() {
                let Some(shape) = object.shape() else {
                    continue;
                };
                let suppressed = object.is_suppressed();
                println!(
                    "  {:<24} {:<24} volume {:>12.4}  faces {:>3}  edges {:>3}{}",
                    object.display_label(),
                    object.type_id().dimmed(),
                    shape.volume,
                    shape.face_count(),
                    shape.edge_count(),
                    if suppressed { "  (suppressed)" } else { "" }
                );
            }
        }
    }

    Ok(())
}

fn open(path: &Path) -> anyhow::Result<Document> {
    Document::load(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Accept either an internal name or a unique label
fn resolve(doc: &Document, object: &str) -> anyhow::Result<String> {
    if doc.contains(object) {
        return Ok(object.to_string());
    }
    match doc.find_by_label(object).as_slice() {
        [single] => Ok(single.name().to_string()),
        [] => bail!("no object named or labelled {object}"),
        many => bail!(
            "label {object} is ambiguous: {}",
            many.iter().map(|o| o.name()).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn print_item(item: &TreeItem, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = if item.style.strike_out {
        item.label.strikethrough().dimmed().to_string()
    } else if item.style.error {
        item.label.red().to_string()
    } else if item.style.tip {
        item.label.bold().to_string()
    } else {
        item.label.clone()
    };
    println!("{}{} {}", indent, label, item.type_id.dimmed());
    for child in &item.children {
        print_item(child, depth + 1);
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use canvas_fold::canvas::{Canvas, CanvasSession};
use canvas_fold::commands::FoldCommand;
use canvas_fold::config::FoldSettings;
use canvas_fold::document::{CanvasData, load_canvas, save_canvas};
use canvas_fold::fold::FoldPlugin;
use canvas_fold::vault::Vault;

#[derive(Debug, Parser)]
#[command(name = "canvas_fold", about = "Fold and expand nodes of a canvas document")]
struct Cli {
    /// Plugin settings file (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Vault root used to resolve file nodes, frontmatter and thumbnails.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct Target {
    /// Canvas document to operate on.
    canvas: PathBuf,

    /// Write the result back to the canvas file instead of printing it.
    #[arg(long)]
    write: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List nodes with their fold state and header label.
    Inspect { canvas: PathBuf },
    /// Fold the given nodes, or every node when none are given.
    Fold {
        #[command(flatten)]
        target: Target,
        #[arg(long = "node")]
        nodes: Vec<String>,
    },
    /// Expand the given nodes, or every node when none are given.
    Expand {
        #[command(flatten)]
        target: Target,
        #[arg(long = "node")]
        nodes: Vec<String>,
    },
    /// Toggle one node as a header click would.
    Toggle {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        node: String,
    },
    /// Set a node alias. An empty alias clears it.
    Alias {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        node: String,
        alias: String,
    },
    /// Set a node thumbnail. An empty value clears it.
    Thumbnail {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        node: String,
        thumbnail: String,
    },
    /// Remove alias and thumbnail from a node.
    ClearCustomizations {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        node: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let settings =
        FoldSettings::load(cli.settings.as_deref()).context("failed to load configuration")?;
    let vault = cli.vault.map(Vault::new);

    match cli.command {
        Commands::Inspect { canvas } => {
            let session = open_session(&canvas, settings, vault)?;
            print_nodes(&session);
        }
        Commands::Fold { target, nodes } => {
            let mut session = open_session(&target.canvas, settings, vault)?;
            run_batch(&mut session, &nodes, true)?;
            finish(&session, &target)?;
        }
        Commands::Expand { target, nodes } => {
            let mut session = open_session(&target.canvas, settings, vault)?;
            run_batch(&mut session, &nodes, false)?;
            finish(&session, &target)?;
        }
        Commands::Toggle { target, node } => {
            let mut session = open_session(&target.canvas, settings, vault)?;
            let started = session
                .click_header(&node)
                .with_context(|| format!("failed to toggle node `{node}`"))?;
            if started {
                drain_scheduler(&mut session).await;
            }
            finish(&session, &target)?;
        }
        Commands::Alias {
            target,
            node,
            alias,
        } => {
            let mut session = open_session(&target.canvas, settings, vault)?;
            session
                .set_alias(&node, &alias)
                .with_context(|| format!("failed to set alias on `{node}`"))?;
            finish(&session, &target)?;
        }
        Commands::Thumbnail {
            target,
            node,
            thumbnail,
        } => {
            let mut session = open_session(&target.canvas, settings, vault)?;
            session
                .set_thumbnail(&node, &thumbnail)
                .with_context(|| format!("failed to set thumbnail on `{node}`"))?;
            finish(&session, &target)?;
        }
        Commands::ClearCustomizations { target, node } => {
            let mut session = open_session(&target.canvas, settings, vault)?;
            session
                .remove_customizations(&node)
                .with_context(|| format!("failed to clear customizations on `{node}`"))?;
            finish(&session, &target)?;
        }
    }

    Ok(())
}

fn open_session(
    path: &Path,
    settings: FoldSettings,
    vault: Option<Vault>,
) -> Result<CanvasSession<FoldPlugin>> {
    let data = load_canvas(path)?;
    let mut session = CanvasSession::new(Canvas::from_data(data), FoldPlugin::new(settings, vault));
    let installed = session.layout_change();
    info!(
        canvas = %path.display(),
        nodes = session.canvas().node_count(),
        hooks = installed.len(),
        "canvas opened"
    );
    Ok(session)
}

fn run_batch(session: &mut CanvasSession<FoldPlugin>, nodes: &[String], collapse: bool) -> Result<()> {
    let command = match (nodes.is_empty(), collapse) {
        (true, true) => FoldCommand::FoldAll,
        (true, false) => FoldCommand::ExpandAll,
        (false, true) => FoldCommand::FoldSelected,
        (false, false) => FoldCommand::ExpandSelected,
    };
    session.canvas_mut().set_selection(nodes.iter().map(String::as_str));
    session
        .run_command(command)
        .with_context(|| format!("failed to run `{command}`"))
}

/// Sleeps through the deferred toggle steps the way the host timer would.
async fn drain_scheduler(session: &mut CanvasSession<FoldPlugin>) {
    while let Some(wait) = session.observer().scheduler().next_due_in() {
        tokio::time::sleep(wait).await;
        session.advance(wait);
    }
}

fn finish(session: &CanvasSession<FoldPlugin>, target: &Target) -> Result<()> {
    let data = session.canvas().get_data();
    if target.write {
        save_canvas(&target.canvas, &data)?;
        info!(canvas = %target.canvas.display(), "canvas written");
        return Ok(());
    }
    print_document(&data)
}

fn print_document(data: &CanvasData) -> Result<()> {
    let raw = serde_json::to_string_pretty(data).context("failed to serialize canvas document")?;
    println!("{raw}");
    Ok(())
}

fn print_nodes(session: &CanvasSession<FoldPlugin>) {
    for node in session.canvas().nodes() {
        let state = if node.data.is_collapsed() {
            "collapsed"
        } else if node.is_hidden_by_group() {
            "hidden"
        } else {
            "expanded"
        };
        let label = session.displayed_label(node.id()).unwrap_or("-");
        println!("{}\t{}\t{state}\t{label}", node.id(), node.data.kind.as_str());
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,canvas_fold=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

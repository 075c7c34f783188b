use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use playground_workspace::app::App;
use playground_workspace::command::Command;
use playground_workspace::config::{AppConfig, LoggingConfig, SandboxConfig, WorkspaceConfig};
use playground_workspace::error;
use playground_workspace::event::{Event, EventHandler, Notification};
use playground_workspace::logging;
use playground_workspace::sync::{JsonFileGateway, LocalDirBooter, SessionRegistry, SyncAdapter};
use playground_workspace::tree::{BlankTemplate, DirectoryTemplate, TemplateSource};
use playground_workspace::ui;
use playground_workspace::workspace::Workspace;

/// Drive a playground workspace from the command line.
#[derive(Parser, Debug)]
#[command(name = "pgw", version, about)]
struct Cli {
    /// Workspace to open (created from the template if unknown)
    workspace_id: String,

    /// Config file, on top of the usual search path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of stored workspaces
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Directory to mirror the project into
    #[arg(long)]
    sandbox_dir: Option<PathBuf>,

    /// Starter project for new workspaces
    #[arg(long)]
    template: Option<PathBuf>,

    /// Read commands from a file instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. debug)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        AppConfig {
            workspace: WorkspaceConfig {
                store_dir: path(&self.store_dir),
                template_dir: path(&self.template),
            },
            sandbox: SandboxConfig {
                root: path(&self.sandbox_dir),
                ..Default::default()
            },
            logging: LoggingConfig {
                level: self.log_level.clone(),
                ..Default::default()
            },
        }
    }
}

fn print_events(events: &mut EventHandler) -> bool {
    let mut any_error = false;
    for event in events.drain() {
        if let Event::Notify(note) = &event {
            any_error |= note.is_error();
        }
        if let Some(line) = ui::render_event(&event) {
            println!("{}", line);
        }
    }
    any_error
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()))?;
    logging::init(&config)?;

    let session = if config.sandbox_enabled() {
        let booter = LocalDirBooter::new(config.sandbox_root(&cli.workspace_id));
        let registry = Arc::new(SessionRegistry::new(Arc::new(booter)));
        SessionRegistry::install_global(registry)
            .ok()
            .or_else(SessionRegistry::global)
    } else {
        None
    };

    let mut events = EventHandler::new();
    if let Some(registry) = &session {
        events.forward_ready(registry.subscribe_ready());
    }

    let gateway = Arc::new(JsonFileGateway::new(config.store_dir()));
    let sync = SyncAdapter::new(cli.workspace_id.clone(), session, gateway);
    let template: Box<dyn TemplateSource> = match config.template_dir() {
        Some(dir) => Box::new(DirectoryTemplate::new(dir)),
        None => Box::new(BlankTemplate),
    };

    let opened = Workspace::open(sync, template.as_ref(), events.sender()).await;
    print_events(&mut events);
    let mut app = App::new(opened?);
    info!(id = %cli.workspace_id, "ready");

    let input: Box<dyn tokio::io::AsyncRead + Unpin> = match &cli.script {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let result = match line.parse::<Command>() {
            Ok(command) => app.execute(command).await,
            Err(err) => Err(err),
        };
        let notified = print_events(&mut events);
        match result {
            Ok(Some(text)) => println!("{}", text.trim_end()),
            Ok(None) => {}
            Err(err) if !notified => println!("{}", Notification::from(&err)),
            Err(_) => {}
        }
        if app.should_quit {
            break;
        }
    }

    if app.workspace.buffers().any_unsaved() {
        warn!("leaving with unsaved changes");
        println!("{}", Notification::info("Unsaved changes were discarded"));
    }
    Ok(())
}

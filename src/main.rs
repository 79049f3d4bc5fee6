mod db;
mod export;
mod migrations;
mod policy;
mod schema;
mod service;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db::Database;
use export::{export, ExportFormat};
use migrations::Migrator;
use policy::Requester;
use serde_json::Value as JsonValue;
use service::{DiagramService, ServiceOptions, DEFAULT_PER_PAGE};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use types::{DiagramId, DiagramPatch, NewDiagram, UserId};

#[derive(Parser)]
#[command(name = "dbdiagrams")]
#[command(about = "Store DBML diagrams in SQLite with per-owner access rules")]
struct Cli {
    /// Database file path
    #[arg(long, env = "DBDIAGRAMS_DB", default_value = "dbdiagrams.db", global = true)]
    db: PathBuf,

    /// Refuse to create diagrams on behalf of another owner
    #[arg(long, global = true)]
    strict_owner: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply, roll back, or inspect schema migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Work with diagrams as a given user
    Diagram {
        #[command(subcommand)]
        action: DiagramAction,
    },
    /// Export diagrams visible to a user
    Export {
        /// Requesting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: Option<String>,

        /// Export a single diagram (required for dbml)
        #[arg(long)]
        diagram: Option<String>,

        /// Output format
        #[arg(long, short, value_enum)]
        format: ExportFormatArg,

        /// Output file path
        #[arg(long, short)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply every pending migration
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(long, default_value = "1")]
        steps: usize,
    },
    /// Show applied and pending migrations
    Status,
}

#[derive(Subcommand)]
enum UserAction {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    List,
    /// Delete a user and every diagram they own
    Rm { id: String },
}

#[derive(Subcommand)]
enum DiagramAction {
    List {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: usize,
    },
    Show {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: Option<String>,
        id: String,
    },
    Create {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// DBML source file, `-` for stdin
        #[arg(long, value_name = "FILE")]
        dbml: PathBuf,
        /// Canvas state JSON file
        #[arg(long, value_name = "FILE")]
        canvas: Option<PathBuf>,
        /// Owner id; defaults to the requesting user
        #[arg(long)]
        owner: Option<String>,
    },
    Update {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: Option<String>,
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_name = "FILE")]
        dbml: Option<PathBuf>,
        #[arg(long, value_name = "FILE", conflicts_with = "clear_canvas")]
        canvas: Option<PathBuf>,
        #[arg(long)]
        clear_canvas: bool,
    },
    Rm {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: Option<String>,
        id: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum ExportFormatArg {
    Csv,
    Json,
    Dbml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(fmt: ExportFormatArg) -> Self {
        match fmt {
            ExportFormatArg::Csv => ExportFormat::Csv,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Dbml => ExportFormat::Dbml,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli).map_err(with_sql_hint)
}

/// Attach a readable explanation when the root cause is an SQLite error
fn with_sql_hint(err: anyhow::Error) -> anyhow::Error {
    let hint = err
        .chain()
        .find_map(|e| e.downcast_ref::<rusqlite::Error>())
        .map(db::format_sql_error);
    match hint {
        Some(hint) => err.context(hint),
        None => err,
    }
}

fn run(cli: Cli) -> Result<()> {
    let options = ServiceOptions {
        enforce_owner_on_create: cli.strict_owner,
    };

    match cli.command {
        Commands::Migrate { action } => run_migrate(&cli.db, action),
        Commands::User { action } => run_user(&open(&cli.db)?, action),
        Commands::Diagram { action } => run_diagram(&open(&cli.db)?, options, action),
        Commands::Export {
            as_user,
            diagram,
            format,
            out,
        } => run_export(
            &open(&cli.db)?,
            options,
            &requester(as_user),
            diagram.map(DiagramId::from),
            format.into(),
            &out,
        ),
    }
}

fn open(path: &Path) -> Result<Database> {
    Database::open(path, false)
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

fn requester(as_user: Option<String>) -> Requester {
    as_user.map(Requester::user).unwrap_or(Requester::Anonymous)
}

fn run_migrate(path: &Path, action: MigrateAction) -> Result<()> {
    let mut database = Database::open(path, true)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    let migrator = Migrator::default();

    match action {
        MigrateAction::Up => {
            for m in migrator.up(database.connection_mut())? {
                println!("applied     {}_{}", m.id, m.name);
            }
        }
        MigrateAction::Down { steps } => {
            for m in migrator.down(database.connection_mut(), steps)? {
                println!("rolled back {}_{}", m.id, m.name);
            }
        }
        MigrateAction::Status => {
            for status in migrator.status(database.connection())? {
                let applied = status
                    .applied
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "pending".to_string());
                println!("{}_{:<20} {}", status.id, status.name, applied);
            }
            for collection in db::list_collections(database.connection())? {
                let count = collection
                    .record_count
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "collection {:<12} {:>8} records  created {}",
                    collection.name,
                    count,
                    collection.created.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

fn run_user(database: &Database, action: UserAction) -> Result<()> {
    let conn = database.connection();
    match action {
        UserAction::Add { email, name } => {
            let user = db::users::create_user(conn, &email, &name)?;
            println!("{}", user.id);
        }
        UserAction::List => {
            for user in db::users::list_users(conn)? {
                println!("{}  {:<32} {}", user.id, user.email, user.name);
            }
        }
        UserAction::Rm { id } => {
            if !db::users::delete_user(conn, &UserId::from(id.as_str()))? {
                anyhow::bail!("User not found: {}", id);
            }
        }
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read DBML from stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read DBML file: {}", path.display()))
}

fn read_canvas(path: &Path) -> Result<JsonValue> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read canvas file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Canvas file is not valid JSON: {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")?
    );
    Ok(())
}

fn run_diagram(database: &Database, options: ServiceOptions, action: DiagramAction) -> Result<()> {
    let service = DiagramService::new(database.connection(), options)?;

    match action {
        DiagramAction::List {
            as_user,
            page,
            per_page,
        } => {
            let result = service.list(&requester(as_user), page, per_page)?;
            for d in &result.items {
                println!("{}  {:<32} {}", d.id, d.name, d.updated.to_rfc3339());
            }
            println!(
                "page {}/{} ({} diagrams)",
                result.page, result.total_pages, result.total_items
            );
        }
        DiagramAction::Show { as_user, id } => {
            let diagram = service.view(&requester(as_user), &DiagramId::from(id))?;
            print_json(&diagram)?;
        }
        DiagramAction::Create {
            as_user,
            name,
            description,
            dbml,
            canvas,
            owner,
        } => {
            let input = NewDiagram {
                name,
                description,
                dbml: read_source(&dbml)?,
                canvas_state: canvas.as_deref().map(read_canvas).transpose()?,
                owner: owner.map(UserId::from),
            };
            let diagram = service.create(&requester(as_user), input)?;
            println!("{}", diagram.id);
        }
        DiagramAction::Update {
            as_user,
            id,
            name,
            description,
            dbml,
            canvas,
            clear_canvas,
        } => {
            let canvas_state = if clear_canvas {
                Some(None)
            } else {
                canvas.as_deref().map(read_canvas).transpose()?.map(Some)
            };
            let patch = DiagramPatch {
                name,
                description,
                dbml: dbml.as_deref().map(read_source).transpose()?,
                canvas_state,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update");
            }
            let diagram = service.update(&requester(as_user), &DiagramId::from(id), patch)?;
            print_json(&diagram)?;
        }
        DiagramAction::Rm { as_user, id } => {
            service.delete(&requester(as_user), &DiagramId::from(id))?;
        }
    }
    Ok(())
}

fn run_export(
    database: &Database,
    options: ServiceOptions,
    requester: &Requester,
    diagram: Option<DiagramId>,
    format: ExportFormat,
    output_path: &Path,
) -> Result<()> {
    let service = DiagramService::new(database.connection(), options)?;

    let diagrams = match diagram {
        Some(id) => vec![service.view(requester, &id)?],
        None => service.list_all(requester)?,
    };

    export(&diagrams, format, output_path)?;

    println!("Exported {} diagram(s) to: {}", diagrams.len(), output_path.display());
    Ok(())
}

//! ReQL command-line client
//!
//! Connects to a server over the JSON driver protocol and runs one query.
//!
//! # Examples
//!
//! ```bash
//! # Run a raw term: r.db("blog").table("posts").count()
//! reql query '[43,[[15,[[14,["blog"]],"posts"]]]]'
//!
//! # List databases
//! reql db list
//!
//! # Create a table in the default database
//! reql --db blog table create posts --primary-key slug
//!
//! # Describe the server
//! reql server-info
//! ```

use clap::{Parser, Subcommand};
use rethinkdb_client::{r, Connection, ConnectionConfig, QueryResult, RunOptions, Term};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// ReQL command-line client
#[derive(Parser, Debug)]
#[command(name = "reql")]
#[command(version = rethinkdb_client::VERSION)]
#[command(about = "Run ReQL queries against a RethinkDB server", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// TOML file with connection settings; flags override it
    #[arg(long, global = true, env = "RETHINKDB_CONFIG")]
    config: Option<PathBuf>,

    /// Server host [env: RETHINKDB_HOST]
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server driver port [env: RETHINKDB_PORT]
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Authentication key [env: RETHINKDB_AUTH_KEY]
    #[arg(long, global = true)]
    auth_key: Option<String>,

    /// Default database [env: RETHINKDB_DB]
    #[arg(long, global = true)]
    db: Option<String>,

    /// Connect and handshake timeout in seconds
    #[arg(long, global = true, default_value = "20")]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true, env = "RETHINKDB_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a query given as its wire JSON term
    Query {
        /// Term JSON, e.g. '[15,["users"]]'
        term: String,

        /// Do not wait for a response
        #[arg(long)]
        noreply: bool,

        /// Write durability (hard or soft)
        #[arg(long)]
        durability: Option<String>,

        /// Ask the server for a query profile
        #[arg(long)]
        profile: bool,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Table operations
    Table {
        #[command(subcommand)]
        command: TableCommands,
    },

    /// Show server information
    ServerInfo,

    /// Show client version
    Version,
}

/// Database commands
#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Create a new database
    Create {
        /// Database name
        name: String,
    },

    /// Drop a database
    Drop {
        /// Database name
        name: String,
    },

    /// List all databases
    List,
}

/// Table commands
#[derive(Subcommand, Debug)]
enum TableCommands {
    /// Create a new table
    Create {
        /// Table name
        name: String,
        /// Primary key field (default: "id")
        #[arg(long)]
        primary_key: Option<String>,
    },

    /// Drop a table
    Drop {
        /// Table name
        name: String,
    },

    /// List tables
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    if let Commands::Version = cli.command {
        println!("reql {}", rethinkdb_client::VERSION);
        return Ok(());
    }

    let config = connection_config(&cli)?;
    let conn = Connection::connect(config).await?;

    let result = match cli.command {
        Commands::Query {
            term,
            noreply,
            durability,
            profile,
        } => {
            let value: serde_json::Value = serde_json::from_str(&term)?;
            let term = Term::from_json(&value)?;
            let mut options = RunOptions::new().noreply(noreply).profile(profile);
            if let Some(durability) = durability {
                options = options.durability(durability);
            }
            run_and_print(&conn, &term, &options).await
        }
        Commands::Db { command } => {
            let term = match command {
                DbCommands::Create { name } => r::db_create(name),
                DbCommands::Drop { name } => r::db_drop(name),
                DbCommands::List => r::db_list(),
            };
            run_and_print(&conn, &term, &RunOptions::default()).await
        }
        Commands::Table { command } => {
            let term = match command {
                TableCommands::Create { name, primary_key } => {
                    let term = r::table_create(name);
                    match primary_key {
                        Some(key) => term.with_optarg("primary_key", key),
                        None => term,
                    }
                }
                TableCommands::Drop { name } => r::table_drop(name),
                TableCommands::List => r::table_list(),
            };
            run_and_print(&conn, &term, &RunOptions::default()).await
        }
        Commands::ServerInfo => {
            let info = conn.server_info().await?;
            println!("{}", serde_json::to_string_pretty(&info.to_json())?);
            Ok(())
        }
        Commands::Version => Ok(()),
    };

    conn.close().await?;
    result
}

/// Config file, then `RETHINKDB_*` variables, then flags.
fn connection_config(cli: &Cli) -> anyhow::Result<ConnectionConfig> {
    let config = match &cli.config {
        Some(path) => ConnectionConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => ConnectionConfig::default(),
    };
    let mut config = config.with_env()?;
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(key) = &cli.auth_key {
        config.auth_key = Some(key.clone());
    }
    if let Some(db) = &cli.db {
        config.db = Some(db.clone());
    }
    Ok(config.with_timeout(Duration::from_secs(cli.timeout)))
}

async fn run_and_print(conn: &Connection, term: &Term, options: &RunOptions) -> anyhow::Result<()> {
    info!(query = %term, "Running query");
    match conn.run_with(term, options).await? {
        QueryResult::Empty => {}
        QueryResult::Atom(datum) => {
            println!("{}", serde_json::to_string_pretty(&datum.to_json())?);
        }
        QueryResult::Sequence(rows) => {
            for row in rows {
                println!("{}", row.to_json());
            }
        }
        QueryResult::Cursor(mut cursor) => {
            while let Some(row) = cursor.next().await? {
                println!("{}", row.to_json());
            }
        }
    }
    Ok(())
}

/// Console output plus optional rolling log files
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    let file_layer = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "reql.log");
            Some(fmt::layer().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

use dbeditor::config::{log_filter_from_env, EditorConfig};
use dbeditor::db::{build_uri, Database, DatabaseKind, Netloc};
use dbeditor::ingestion::{import_to_table, open_source};
use dbeditor::schema::{BuilderRegistry, ColumnDef};
use dbeditor::value::Value;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbeditor")]
#[command(about = "Inspect a SQLite database, build tables and bulk-import CSV or spreadsheet files")]
#[command(version)]
struct Args {
    /// SQLite database file (or set DBEDITOR_DATABASE env var; in-memory when neither is given)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables of the database
    Tables,
    /// Show the columns of a table, marking the primary key
    Columns {
        table: String,
    },
    /// Print every row of a table
    Select {
        table: String,
    },
    /// Import a CSV or spreadsheet file into an existing table
    Import {
        table: String,

        /// CSV (.csv, .txt) or spreadsheet (.xlsx, .xls, .ods, ...) file
        file: PathBuf,

        /// Worksheet to read (default: first sheet)
        #[arg(short, long)]
        worksheet: Option<String>,

        /// Rows per transaction (or set DBEDITOR_BATCH_SIZE env var)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },
    /// Create a table from column specs
    CreateTable {
        name: String,

        /// name:type[:pk][:autoincrement][:not-null][:unique][:default=LIT]
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,
    },
    /// Run a raw SQL statement
    Query {
        sql: String,

        /// Named parameter as name=value
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Print a connection URI
    Uri {
        /// sqlite, mysql or postgresql
        #[arg(long)]
        kind: String,

        #[arg(long)]
        path: String,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        driver: Option<String>,
    },
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter_from_env()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = EditorConfig::from_env();

    let args = Args::parse();
    let json = args.json;
    let database = args.database.or(config.database_path);
    let open = || -> Result<Database> {
        match &database {
            Some(path) => Database::open(path)
                .with_context(|| format!("Failed to open database {}", path.display())),
            None => Ok(Database::open_in_memory()?),
        }
    };

    match args.command {
        Commands::Tables => {
            let db = open()?;
            let tables = db.get_tables()?;
            emit(&tables, json, || {
                for table in &tables {
                    println!("{}", table);
                }
            })
        }
        Commands::Columns { table } => {
            let db = open()?;
            let handle = db.get_table(&table)?;
            emit(handle.columns(), json, || {
                for column in handle.columns() {
                    let pk = match column.primary_key_position {
                        Some(pos) => format!("  [pk {}]", pos),
                        None => String::new(),
                    };
                    println!("{:<24} {}{}", column.name, column.declared_type, pk);
                }
            })
        }
        Commands::Select { table } => {
            let db = open()?;
            let columns = db.get_table_column_names(&table)?;
            let rows = db.select_all(&table)?;
            emit(&rows, json, || print_rows(&columns, &rows))
        }
        Commands::Import { table, file, worksheet, batch_size } => {
            let mut db = open()?;
            let batch_size = batch_size.unwrap_or(config.batch_size);
            let mut source = open_source(&file, worksheet.as_deref())
                .with_context(|| format!("Failed to open {}", file.display()))?;
            info!("Importing {:?} into {}", file, table);
            let report = import_to_table(&mut db, &table, source.as_mut(), batch_size)?;
            emit(&report, json, || {
                println!(
                    "{} rows inserted into {} in {} batches ({:?})",
                    report.rows_inserted, report.table, report.batches_committed, report.status
                );
            })
        }
        Commands::CreateTable { name, columns } => {
            let mut db = open()?;
            let mut registry = BuilderRegistry::for_database(&db);
            let builder = registry.start_building(&db, &name)?;
            for spec in &columns {
                let column: ColumnDef = spec
                    .parse()
                    .with_context(|| format!("Invalid column spec '{}'", spec))?;
                builder.add_column(column)?;
            }
            let handle = registry.finalize(&name, &mut db)?;
            emit(&handle, json, || {
                println!("Created table {} ({})", handle.name(), handle.column_names().join(", "));
            })
        }
        Commands::Query { sql, params } => {
            let db = open()?;
            let params = params
                .iter()
                .map(|p| parse_param(p))
                .collect::<Result<Vec<_>>>()?;
            let bound: Vec<(&str, Value)> = params
                .iter()
                .map(|(name, value)| (name.as_str(), value.clone()))
                .collect();
            let result = db.execute_raw(&sql, &bound)?;
            emit(&result, json, || {
                if result.columns.is_empty() {
                    println!("{} rows affected", result.rows_affected);
                } else {
                    print_rows(&result.columns, &result.rows);
                }
            })
        }
        Commands::Uri { kind, path, user, password, host, port, driver } => {
            let kind: DatabaseKind = kind.parse()?;
            let netloc = user.map(|user| {
                let mut netloc = Netloc::new(user, password.unwrap_or_default());
                if let Some(host) = host {
                    netloc = netloc.with_host(host);
                }
                if let Some(port) = port {
                    netloc = netloc.with_port(port);
                }
                netloc
            });
            let uri = build_uri(kind, &path, netloc.as_ref(), driver.as_deref())?;
            emit(&uri, json, || println!("{}", uri))
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Parameter '{}' must look like name=value", raw))?;
    Ok((name.trim().to_string(), Value::from(value)))
}

fn print_rows(columns: &[String], rows: &[Vec<Value>]) {
    println!("{}", columns.join("\t"));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join("\t"));
    }
}

fn emit<T: Serialize + ?Sized>(value: &T, json: bool, text: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

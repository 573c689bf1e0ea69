use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use pgmerge::{MergeRequest, Reconciler, TableSpec};
use tokio_postgres::NoTls;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

mod config;

use config::{Config, ConfigError};

/// Reconcile a Postgres table with another one, in one set-based statement.
#[derive(Debug, Parser)]
#[command(name = "pgmerge", version, about, arg_required_else_help = true)]
struct Cli {
    /// Database connection URL
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Log catalog queries and generated SQL
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Insert missing rows and update matching ones (MERGE)
    Upsert(Target),
    /// Delete destination rows whose key is gone from the source
    DeleteMissing(Target),
    /// Upsert, then delete missing rows, in one transaction
    Sync(Target),
}

#[derive(Debug, Args)]
struct Target {
    /// Source table (`table` or `schema.table`)
    source: String,

    /// Destination table (`table` or `schema.table`)
    destination: String,

    /// Unique or primary-key constraint on the destination
    /// (default: its primary key)
    #[arg(long)]
    key: Option<String>,

    /// Print the SQL without running it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Upsert,
    DeleteMissing,
}

impl Commands {
    fn split(&self) -> (&Target, &'static [Step]) {
        match self {
            Commands::Upsert(target) => (target, &[Step::Upsert]),
            Commands::DeleteMissing(target) => (target, &[Step::DeleteMissing]),
            Commands::Sync(target) => (target, &[Step::Upsert, Step::DeleteMissing]),
        }
    }
}

impl Target {
    /// Qualify unqualified names with the configured schemas, if any.
    fn request(&self, config: &Config) -> MergeRequest {
        let source = TableSpec::parse(&self.source).or_schema(config.source_schema.clone());
        let destination =
            TableSpec::parse(&self.destination).or_schema(config.destination_schema.clone());

        let request = MergeRequest::between(source, destination);
        match &self.key {
            Some(key) => request.with_key(key.clone()),
            None => request,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no database URL: pass --database-url, set DATABASE_URL, or add database_url to .config/pgmerge.styx")]
    MissingDatabaseUrl,

    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("transaction failed: {0}")]
    Transaction(#[source] tokio_postgres::Error),

    #[error(transparent)]
    Reconcile(#[from] pgmerge::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("{} {}", "error:".red().bold(), e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` directives, plus `pgmerge=debug` with `--verbose` and
/// `pgmerge=info` otherwise.
fn log_filter(verbose: bool) -> Result<EnvFilter, ParseError> {
    let directive = if verbose { "pgmerge=debug" } else { "pgmerge=info" };
    Ok(EnvFilter::from_default_env().add_directive(directive.parse()?))
}

fn init_tracing(verbose: bool) -> Result<(), ParseError> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose)?)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let (config, config_path) = config::load_or_default()?;
    if let Some(path) = &config_path {
        debug!(path = %path.display(), "loaded config");
    }

    let database_url = cli
        .database_url
        .or_else(|| config.database_url.clone())
        .ok_or(CliError::MissingDatabaseUrl)?;
    let masked_url = mask_password(&database_url);

    let (target, steps) = cli.command.split();
    let request = target.request(&config);
    let dry_run = target.dry_run || config.dry_run;

    eprintln!("{} {}", "database:".dimmed(), masked_url);

    let (mut client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .map_err(|source| CliError::Connect {
            url: masked_url.clone(),
            source,
        })?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    let tx = client.transaction().await.map_err(CliError::Transaction)?;

    {
        let reconciler = pgmerge::postgres(&tx);
        for step in steps {
            if dry_run {
                print_plan(&reconciler, *step, &request).await?;
            } else {
                apply(&reconciler, *step, &request).await?;
            }
        }
    }

    if dry_run {
        tx.rollback().await.map_err(CliError::Transaction)?;
        eprintln!("{}", "dry run: nothing was executed".yellow());
    } else {
        tx.commit().await.map_err(CliError::Transaction)?;
        info!("committed");
    }

    Ok(())
}

async fn print_plan<C, X>(
    reconciler: &Reconciler<C, X>,
    step: Step,
    request: &MergeRequest,
) -> Result<(), CliError>
where
    C: pgmerge::Catalog,
    X: pgmerge::Executor,
{
    let statement = match step {
        Step::Upsert => reconciler.plan_upsert(request).await?,
        Step::DeleteMissing => reconciler.plan_reconcile_deletes(request).await?,
    };
    println!("-- {}", statement.kind.cyan());
    println!("{};", statement.sql);
    Ok(())
}

async fn apply<C, X>(
    reconciler: &Reconciler<C, X>,
    step: Step,
    request: &MergeRequest,
) -> Result<(), CliError>
where
    C: pgmerge::Catalog,
    X: pgmerge::Executor,
{
    let outcome = match step {
        Step::Upsert => reconciler.upsert(request).await?,
        Step::DeleteMissing => reconciler.reconcile_deletes(request).await?,
    };
    println!(
        "{} {} row(s) affected",
        outcome.statement.kind.green().bold(),
        outcome.rows_affected
    );
    Ok(())
}

fn mask_password(url: &str) -> String {
    // Simple masking: replace password between :// and @
    if let Some(start) = url.find("://") {
        if let Some(at) = url.rfind('@') {
            if at > start + 3 {
                let prefix = &url[..start + 3];
                let suffix = &url[at..];
                if let Some(colon) = url[start + 3..at].find(':') {
                    let user = &url[start + 3..start + 3 + colon];
                    return format!("{}{}:***{}", prefix, user, suffix);
                }
            }
        }
    }
    url.to_string()
}

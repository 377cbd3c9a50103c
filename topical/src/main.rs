use anyhow::Result;
use clap::Parser;
use topical::{
    api,
    config::{Cli, Command, Config, DbCommand},
    db,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    let default_level = if cfg.logging_enabled { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => api::run_http_server(cfg).await,
        Command::Db { command } => {
            let conn = db::open(&cfg.database)?;
            match command {
                DbCommand::Init => db::init(&conn)?,
                DbCommand::Drop => db::drop_all(&conn)?,
                DbCommand::Reset => db::reset(&conn)?,
            }
            info!(database = %cfg.database, ?command, "database updated");
            Ok(())
        }
    }
}

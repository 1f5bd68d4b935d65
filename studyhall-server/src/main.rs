use colored::Colorize;
use log::{error, info};
use studyhall_collab::{Collab, PgDatabase};
use studyhall_server::{config::Config, logging, run_server};

#[tokio::main]
async fn main() {
    logging::init_logger();

    let config = Config::from_env();

    info!("Connecting to database...");

    match PgDatabase::new(&config.database_url).await {
        Ok(database) => {
            let collab = Collab::new(database, config.auth.clone());

            info!("Initialized successfully.");
            run_server(config, collab).await;
        }
        Err(e) => {
            error!(
                "{} Read the error below to troubleshoot the issue.",
                "studyhall failed to start!".bold().red()
            );
            error!("{e}");
            error!(
                "{}",
                "Hint: make sure postgres is reachable at DATABASE_URL and migrations can run, then try again."
                    .italic()
            );
        }
    }
}

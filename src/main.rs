mod app;
mod capture;
mod commands;
mod config;
mod logging;
mod store;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

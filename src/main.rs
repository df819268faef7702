mod app;
mod backend;
mod capture;
mod chat;
mod commands;
mod config;
mod logging;
mod playback;
mod session;
mod transcript;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    app::run().await
}

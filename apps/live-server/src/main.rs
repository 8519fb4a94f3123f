use std::net::SocketAddr;

use clap::Parser as _;
use live_server::{AppState, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = Config::parse();
	let state = AppState::build(&config);
	state.spawn_background_tasks();

	let router = live_server::router(state);

	let addr = SocketAddr::new(config.bind, config.port);
	let listener = tokio::net::TcpListener::bind(addr).await?;
	info!("listening on {}", listener.local_addr()?);
	axum::serve(listener, router).await?;
	Ok(())
}

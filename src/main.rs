use std::{error::Error, sync::Arc};

use clap::Parser;
use connect_tunnel::{server, Config, HttpConnectDialer, Socks5Server};
use log::{error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let upstream = config.upstream().map_err(|e| {
        error!("Error parsing upstream proxy URL: {}", e);
        e
    })?;
    info!("Upstream proxy configured: {}", upstream);

    let front = Arc::new(Socks5Server::new(HttpConnectDialer::new(
        upstream,
        config.http(),
    )));
    let listener = TcpListener::bind(config.listen()).await.map_err(|e| {
        error!("Error starting SOCKS5 server on {}: {}", config.listen(), e);
        e
    })?;
    info!("SOCKS5 proxy listening on {}", listener.local_addr()?);

    let shutdown = CancellationToken::new();
    let mut accept_loop = tokio::spawn(server::serve(listener, front, shutdown.clone()));

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        res = &mut accept_loop => {
            res??;
            return Ok(());
        }
    }

    info!("Shutdown");
    shutdown.cancel();
    accept_loop.await??;
    Ok(())
}

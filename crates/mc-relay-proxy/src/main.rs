use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use mc_relay_proto::packets::{GAME_VERSION, PROTOCOL_VERSION};
use mc_relay_proxy::auth::MojangSessionService;
use mc_relay_proxy::config::ProxyConfig;
use mc_relay_proxy::{accounts, console, login, Proxy};

#[tokio::main]
async fn main() {
    let config = match ProxyConfig::load_or_default("proxy.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load proxy.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "mc-relay v{} starting on {} (Minecraft {GAME_VERSION}, protocol {PROTOCOL_VERSION})",
        env!("CARGO_PKG_VERSION"),
        config.proxy.bind
    );
    info!("MOTD: {}", config.proxy.motd);
    if let Some(socks) = &config.accounts.socks_proxy {
        info!("Backend connections go through SOCKS5 proxy {socks}");
    }

    let session_service = match MojangSessionService::new() {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Failed to create the session service client: {e}");
            std::process::exit(1);
        }
    };
    let proxy = match Proxy::new(config, Arc::new(session_service)) {
        Ok(proxy) => proxy,
        Err(e) => {
            eprintln!("Failed to generate the server key pair: {e}");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(&proxy.config().proxy.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {e}", proxy.config().proxy.bind);
            std::process::exit(1);
        }
    };

    proxy.spawn_sweeper();
    proxy.spawn_event_listener();

    match accounts::load_accounts(&proxy.config().accounts.file) {
        Ok(entries) => {
            info!("Loaded {} accounts", entries.len());
            let proxy = proxy.clone();
            tokio::spawn(async move {
                let connected = accounts::connect_all(&proxy, entries).await;
                info!("{connected} backend sessions connected");
            });
        }
        Err(e) => warn!("No accounts loaded: {}", e.reason()),
    }

    // Handle Ctrl+C
    let proxy_ctrlc = proxy.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        proxy_ctrlc.shutdown();
    });

    // Console REPL: read lines from stdin
    let proxy_console = proxy.clone();
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let output = console::dispatch(&proxy_console, line.trim());
            if !output.is_empty() {
                println!("{output}");
            }
            if proxy_console.is_shutting_down() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("Connection from {addr}");
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("set_nodelay failed for {addr}: {e}");
                    }
                    tokio::spawn(login::handle_client(proxy.clone(), stream, addr.to_string()));
                }
                Err(e) => error!("accept failed: {e}"),
            },
            _ = proxy.wait_for_shutdown() => break,
        }
    }

    proxy.shutdown();
    // Give writer tasks a moment to flush the kick packets.
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    info!("Proxy shut down.");
}

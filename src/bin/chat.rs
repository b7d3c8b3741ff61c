use std::{path::PathBuf, time::Duration};

use clap::Parser;
use roomcast::client::{
    Connectivity, OfflineStore, Session,
    auth::AuthClient,
    channel,
    runner::{self, Input, TerminalRenderer},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Terminal client for a roomcast server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    #[arg(short, long)]
    username: String,

    #[arg(short, long)]
    password: String,

    #[arg(short, long, default_value = "general")]
    room: String,

    /// Create the account before logging in.
    #[arg(long)]
    register: bool,

    /// Where messages written while offline are kept.
    #[arg(long, default_value = "chat-offline.db")]
    offline_db: PathBuf,

    #[arg(long, default_value_t = 2)]
    reconnect_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let auth = AuthClient::new(&args.server);
    if args.register {
        auth.register(&args.username, &args.password).await?;
        println!("Registered {}", args.username);
    }
    let username = auth.login(&args.username, &args.password).await?;
    if let Ok(status) = auth.status().await {
        tracing::info!(mode = %status.mode, "server storage");
    }

    let mut channel = channel::spawn(auth.channel_url(), Duration::from_secs(args.reconnect_secs));
    let store = OfflineStore::open(&format!("sqlite://{}?mode=rwc", args.offline_db.display())).await;
    // the runner brings the session online from the channel's link state
    let mut session = Session::new(channel.handle.clone(), TerminalRenderer::default(), store, Connectivity::Offline);
    session.restore().await;
    session.join(username, &args.room);

    let (input_tx, mut input) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if input_tx.send(Input::Line(line)).is_err() {
                break;
            }
        }
    });

    runner::run(&mut session, &mut input, &mut channel.events, &mut channel.link).await;

    drop(session);
    drop(channel.handle);
    let _ = channel.task.await;
    Ok(())
}

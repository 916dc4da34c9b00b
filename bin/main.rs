use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::sync::broadcast;

use mailsink::{logging, policy::ServerPolicy, server::Server, Signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let path = find_config_file()?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Unable to read {}", path.display()))?;
    let policy = toml::from_str::<ServerPolicy>(&raw)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    let (shutdown, receiver) = broadcast::channel(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(Signal::Shutdown);
        }
    });

    Server::with_policy(Arc::new(policy)).serve(receiver).await?;

    Ok(())
}

/// Configuration is looked up via `MAILSINK_CONFIG`, then ./mailsink.toml,
/// then /etc/mailsink/mailsink.toml.
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("MAILSINK_CONFIG") {
        let path = PathBuf::from(path);
        anyhow::ensure!(
            path.exists(),
            "MAILSINK_CONFIG points to non-existent file: {}",
            path.display()
        );
        return Ok(path);
    }

    ["mailsink.toml", "/etc/mailsink/mailsink.toml"]
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No configuration file found; set MAILSINK_CONFIG or create ./mailsink.toml"
            )
        })
}

use anyhow::{bail, Context, Result};
use rota_core::adapter::memory::MemoryRoleAdapter;
use rota_core::{ConfigStore, RoleAdapter, RotationEngine};
use rota_discord::{DiscordConfig, DiscordRoleAdapter};
use std::path::Path;
use std::sync::Arc;

pub struct ServeArgs {
    pub port: u16,
    pub guild: Option<String>,
    pub token: Option<String>,
    pub api_base: String,
    pub dry_run: bool,
}

fn build_adapter(args: ServeArgs) -> Result<Arc<dyn RoleAdapter>> {
    if args.dry_run {
        tracing::warn!("dry run: role changes are simulated in memory");
        return Ok(Arc::new(MemoryRoleAdapter::permissive()));
    }
    let Some(guild) = args.guild else {
        bail!("--guild (or ROTA_GUILD_ID) is required unless --dry-run is set");
    };
    let Some(token) = args.token else {
        bail!("--token (or DISCORD_TOKEN) is required unless --dry-run is set");
    };
    let adapter = DiscordRoleAdapter::new(DiscordConfig {
        token,
        guild_id: guild,
        api_base: args.api_base,
    })
    .context("failed to set up the Discord client")?;
    Ok(Arc::new(adapter))
}

pub fn run(root: &Path, args: ServeArgs) -> Result<()> {
    let port = args.port;
    let adapter = build_adapter(args)?;
    let store = ConfigStore::at_root(root);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let engine = RotationEngine::new(store, adapter);

        // A failed load leaves the engine idle; fix the file and POST /api/reload.
        match engine.load().await {
            Ok(state) => tracing::info!(%state, "rotation engine ready"),
            Err(e) => tracing::error!(error = %e, "initial load failed"),
        }

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("cannot bind port {port}"))?;
        let actual_port = listener.local_addr()?.port();
        println!("rota serving {} on http://localhost:{actual_port}", root.display());

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        };
        rota_server::serve_on(listener, engine, shutdown).await
    })
}

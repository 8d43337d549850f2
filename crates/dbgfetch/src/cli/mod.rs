pub mod app;
mod tracker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dbgfetch::{BuildId, CacheStore, Config, ProcessEnv, ServerSource, Session};
use tracing::debug;

use app::{App, Commands};
use tracker::DownloadBar;

fn config(app: &App) -> anyhow::Result<Config> {
    let mut config = Config::from_env(Arc::new(ProcessEnv)).context("reading DEBUGINFOD_* environment")?;
    if let Some(urls) = &app.urls {
        config = config.servers(ServerSource::Fixed(urls.clone()));
    }
    if let Some(dir) = &app.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(secs) = app.timeout {
        config.fetch = config.fetch.transfer_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

fn parse_id(raw: &str) -> anyhow::Result<BuildId> {
    raw.parse().with_context(|| format!("bad build-id {raw:?}"))
}

pub async fn run(app: App) -> anyhow::Result<()> {
    let config = config(&app)?;
    debug!(cache = %config.cache_dir.display(), "configuration loaded");

    if let Commands::Clean(arg) = &app.cmd {
        let store = CacheStore::new(&config.cache_dir, config.cache);
        let report = store.clean(Duration::from_secs(arg.max_unused_age))?;
        println!(
            "removed {} files ({} bytes), {} directories",
            report.removed_files, report.removed_bytes, report.removed_dirs
        );
        return Ok(());
    }

    let mut session = Session::begin(config)?;
    let bar = app.progress.then(|| DownloadBar::new("fetching"));
    session.set_progress(bar.as_ref().map(DownloadBar::sink));

    let result = lookup(&session, &app.cmd).await;
    match (&result, bar) {
        (Ok(_), Some(bar)) => bar.finish("done"),
        (Err(_), Some(bar)) => bar.abandon(),
        _ => {}
    }
    session.end();

    println!("{}", result?.display());
    Ok(())
}

async fn lookup<C: dbgfetch::HttpClient>(session: &Session<C>, cmd: &Commands) -> anyhow::Result<PathBuf> {
    let path = match cmd {
        Commands::DebugInfo(arg) => session.find_debuginfo(&parse_id(&arg.build_id)?).await?,
        Commands::Executable(arg) => session.find_executable(&parse_id(&arg.build_id)?).await?,
        Commands::Source(arg) => session.find_source(&parse_id(&arg.build_id)?, &arg.filename).await?,
        Commands::Clean(_) => anyhow::bail!("clean is not a lookup"),
    };
    Ok(path)
}

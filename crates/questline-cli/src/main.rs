mod cli;
mod console;
mod demo;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use questline_core::domain::{AppKey, InstanceId};
use questline_core::impls::HttpJobService;
use questline_core::ports::JobService;
use questline_core::workflow::{InstallApp, InstanceAction, SideloadApp, UpdateApp};
use questline_core::{HttpConfig, QuestConfig, QuestContext, Sequencer, Workflow};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Command};
use crate::console::ConsoleObserver;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_filter = if args.debug {
        "questline_core=debug,questline=debug"
    } else {
        "questline_core=info,questline=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = QuestConfig::from_env()?;
    let service: Arc<dyn JobService> = if args.demo {
        info!("using the scripted demo backend");
        Arc::new(demo::backend())
    } else {
        let http = HttpConfig::from_env()?;
        info!(base_url = %http.base_url, "using the device api");
        Arc::new(HttpJobService::new(&http)?)
    };
    let context = QuestContext::new(service, config);

    match args.command {
        Command::Install { app, version, name } => {
            let mut install = InstallApp::new(AppKey::new(app, version));
            if let Some(name) = name {
                install = install.with_instance_name(name);
            }
            let instance = run(&context, &install).await?;
            println!("instance {instance} is running");
        }
        Command::Sideload { manifest, name } => {
            let raw = std::fs::read_to_string(&manifest)
                .with_context(|| format!("reading {}", manifest.display()))?;
            let sideload = SideloadApp {
                manifest: raw,
                instance_name: name,
            };
            let instance = run(&context, &sideload).await?;
            println!("instance {instance} is running");
        }
        Command::Update {
            app,
            from,
            to,
            instances,
        } => {
            let update = UpdateApp {
                app,
                from,
                to,
                instances: instances.into_iter().map(InstanceId::new).collect(),
            };
            run(&context, &update).await?;
        }
        Command::Start { instance } => {
            run(&context, &InstanceAction::start(InstanceId::new(instance))).await?;
        }
        Command::Stop { instance } => {
            run(&context, &InstanceAction::stop(InstanceId::new(instance))).await?;
        }
        Command::Quests { watch, clear } => quests(&context, watch, clear).await?,
    }
    Ok(())
}

/// Execute one workflow while printing the progress of its current quest.
async fn run<W: Workflow>(context: &QuestContext, workflow: &W) -> Result<W::Output> {
    let observer = Arc::new(ConsoleObserver::default());
    let sequencer = Sequencer::new(context.clone())
        .with_observer(observer.clone())
        .with_refresh_hook(Arc::new(|workflow: &'static str| {
            info!(workflow, "app and instance lists are stale");
        }));

    let printer = console::spawn_progress_printer(
        context.clone(),
        observer,
        context.config().wait_retry_delay,
    );
    let result = sequencer.execute(workflow).await;
    printer.abort();
    Ok(result?)
}

async fn quests(context: &QuestContext, watch: Option<u64>, clear: bool) -> Result<()> {
    context.load().await?;

    if let Some(seconds) = watch {
        context.set_fetching(true).await;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
        let mut last = Vec::new();
        while tokio::time::Instant::now() < deadline {
            let current = context.main_quests().await;
            if current != last {
                println!("--");
                current.iter().for_each(|q| console::print_tree(q, 0));
                last = current;
            }
            tokio::time::sleep(context.config().poll_interval).await;
        }
        context.set_fetching(false).await;
    } else {
        for quest in context.main_quests().await {
            console::print_tree(&quest, 0);
        }
    }

    if clear {
        let removed = context.purge_finished_quests().await?;
        println!("deleted {} finished quest(s)", removed.len());
    }
    Ok(())
}

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use field_sync::{
    load_settings, InMemoryForm, SelectOption, SyncEvent, SyncSettings, Synchronizer,
};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drives the subcategory synchronizer against a live listing endpoint
/// using a headless form, printing the rendered options after each step.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    domain: Option<String>,
    /// Category preselected before binding, as on an edit page.
    #[arg(long)]
    initial: Option<String>,
    #[arg(long)]
    bind_timeout_ms: Option<u64>,
    /// Category values to select in order; pass "" to clear the selection.
    selections: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(domain) = args.domain {
        settings.domain = domain;
    }
    settings.bind_timeout = Some(Duration::from_millis(args.bind_timeout_ms.unwrap_or(2_000)));

    let form = Arc::new(build_form(&settings, args.initial.as_deref(), &args.selections));
    let sync = Synchronizer::over_http(form.clone(), settings.clone())
        .context("failed to build listing client")?;
    let mut events = sync.subscribe_events();
    let settle_limit = settings.request_timeout + Duration::from_secs(1);

    let binding = sync.bind().await.context("failed to bind form controls")?;
    if let Some(initial) = args.initial.filter(|value| !value.is_empty()) {
        wait_settled(&mut events, settle_limit).await?;
        print_options(&form, &settings, &format!("initial {initial}"));
    }

    for selection in &args.selections {
        form.select(&settings.category_control, selection.as_str())?;
        wait_settled(&mut events, settle_limit).await?;
        print_options(&form, &settings, &format!("category {selection:?}"));
    }

    binding.detach();
    info!("probe finished");
    Ok(())
}

fn build_form(settings: &SyncSettings, initial: Option<&str>, selections: &[String]) -> InMemoryForm {
    let mut categories = vec![SelectOption::sentinel(&settings.sentinel_label)];
    for value in initial.into_iter().chain(selections.iter().map(String::as_str)) {
        if !value.is_empty() && !categories.iter().any(|option| option.value == value) {
            categories.push(SelectOption::new(value, format!("category {value}")));
        }
    }

    let form = InMemoryForm::new();
    form.insert_select(&settings.category_control, categories, initial.unwrap_or_default());
    form.insert_select(
        &settings.subcategory_control,
        vec![SelectOption::sentinel(&settings.sentinel_label)],
        "",
    );
    form
}

async fn wait_settled(events: &mut broadcast::Receiver<SyncEvent>, limit: Duration) -> Result<()> {
    tokio::time::timeout(limit, async {
        loop {
            match events.recv().await? {
                SyncEvent::Applied { .. } | SyncEvent::Cleared { .. } => return anyhow::Ok(()),
                SyncEvent::FetchFailed { reason, .. } => {
                    println!("  request failed: {reason}");
                    return anyhow::Ok(());
                }
                _ => continue,
            }
        }
    })
    .await
    .map_err(|_| anyhow!("no synchronization result within {limit:?}"))?
}

fn print_options(form: &InMemoryForm, settings: &SyncSettings, step: &str) {
    println!("{step}:");
    for option in form.options(&settings.subcategory_control).unwrap_or_default() {
        if option.is_sentinel() {
            println!("  [ ] {}", option.label);
        } else {
            println!("  [{}] {}", option.value, option.label);
        }
    }
}

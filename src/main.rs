use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_console::billing::{strip_bom, DateRange};
use token_console::cli::{Cli, Commands};
use token_console::config;
use token_console::gateway::{HttpGateway, TokenGateway};
use token_console::list::TokenListController;
use token_console::lookup::UserLookup;
use token_console::models::token::{Token, TokenStatus};
use token_console::models::user::{UserOption, Viewer};
use token_console::notification::TracingNotifier;
use token_console::preferences::FilePreferenceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "token_console=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();
    let mut cfg = config::load().context("failed to load configuration")?;
    if let Some(url) = &args.base_url {
        cfg.base_url = config::parse_base_url(url)?;
    }

    let viewer = Viewer::new(cfg.role);
    let gateway: Arc<dyn TokenGateway> =
        Arc::new(HttpGateway::new(&cfg).context("failed to build HTTP client")?);
    let prefs = Arc::new(FilePreferenceStore::open(&cfg.prefs_path));
    let notifier = Arc::new(TracingNotifier);

    let result = match args.command {
        Commands::List {
            page,
            size,
            keyword,
            sort,
            desc,
            user,
        } => {
            let mut list = TokenListController::new(viewer, gateway.clone(), prefs, notifier);
            if let Some(user_id) = user {
                let target = resolve_target(gateway.as_ref(), user_id).await;
                if !list.select_target(Some(target)) {
                    anyhow::bail!("--user requires the root role (set CONSOLE_ROLE=root)");
                }
            }
            if let Some(size) = size {
                list.set_page_size(size);
            }
            list.submit_search(&keyword);
            if let Some(column) = sort.as_deref() {
                list.set_sort(column);
                if desc {
                    // Second click on the same column flips to descending.
                    list.set_sort(column);
                }
            }
            list.set_page(page);
            list.settle().await;
            print_tokens(&list);
            Ok(())
        }
        Commands::Delete { id, user } => {
            let mut list = TokenListController::new(viewer, gateway.clone(), prefs, notifier);
            if let Some(user_id) = user {
                let target = resolve_target(gateway.as_ref(), user_id).await;
                if !list.select_target(Some(target)) {
                    anyhow::bail!("--user requires the root role (set CONSOLE_ROLE=root)");
                }
            }
            let outcome = list.delete_token(id).await;
            if !outcome.success {
                anyhow::bail!("delete failed: {}", outcome.message);
            }
            println!("token {} deleted", id);
            Ok(())
        }
        Commands::Status { id, status, user } => {
            let status: TokenStatus = status.parse().map_err(anyhow::Error::msg)?;
            let mut list = TokenListController::new(viewer, gateway.clone(), prefs, notifier);
            if let Some(user_id) = user {
                let target = resolve_target(gateway.as_ref(), user_id).await;
                if !list.select_target(Some(target)) {
                    anyhow::bail!("--user requires the root role (set CONSOLE_ROLE=root)");
                }
            }
            let outcome = list.set_token_status(id, status).await;
            if !outcome.success {
                anyhow::bail!("status update failed: {}", outcome.message);
            }
            println!("token {} is now {}", id, status.label());
            Ok(())
        }
        Commands::Users { keyword } => {
            let lookup = UserLookup::spawn(viewer, gateway.clone(), cfg.lookup_debounce);
            if !lookup.is_enabled() {
                anyhow::bail!("account lookup requires the root role (set CONSOLE_ROLE=root)");
            }
            let mut updates = lookup.subscribe();
            if !keyword.is_empty() {
                lookup.input(&keyword);
            }
            let state = updates
                .wait_for(|s| !s.loading && s.keyword == keyword)
                .await
                .context("lookup task stopped")?
                .clone();
            for option in &state.options {
                println!("{:>6}  {:<24} {}", option.id, option.username, option.display_name);
            }
            Ok(())
        }
        Commands::Groups => {
            let list = TokenListController::new(viewer, gateway.clone(), prefs, notifier);
            for option in list.group_options().await {
                println!("{:<16} {}", option.value, option.label);
            }
            Ok(())
        }
        Commands::Billing { start, end, export } => {
            let range = DateRange::parse(&start, &end)?;
            match export {
                Some(path) => {
                    let csv = gateway.export_billing_tag_csv(&range).await?;
                    std::fs::write(&path, &csv)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    let rows = strip_bom(&csv)
                        .split(|b| *b == b'\n')
                        .filter(|line| !line.is_empty())
                        .count()
                        .saturating_sub(1);
                    println!("wrote {} ({} billing tags)", path.display(), rows);
                }
                None => {
                    let report = gateway.billing_tag_report(&range).await?;
                    println!(
                        "{:<24} {:>10} {:>14} {:>12} {:>12} {:>14}",
                        "billing tag", "requests", "quota", "prompt", "completion", "time (ms)"
                    );
                    for stat in &report.statistics {
                        println!(
                            "{:<24} {:>10} {:>14} {:>12} {:>12} {:>14}",
                            stat.billing_tag,
                            stat.request_count,
                            stat.quota,
                            stat.prompt_tokens,
                            stat.completion_tokens,
                            stat.request_time
                        );
                        for usage in report.models_for(&stat.billing_tag) {
                            println!("    {:<32} {:>10}", usage.model_name, usage.request_count);
                        }
                    }
                    println!("total quota: {}", report.total_quota());
                    println!("export with --export {}", range.export_file_name());
                }
            }
            Ok(())
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Look the account up by id so the banner can show its name; fall back
/// to a bare id when the lookup fails or finds nothing.
async fn resolve_target(gateway: &dyn TokenGateway, user_id: i64) -> UserOption {
    match gateway.list_users(&user_id.to_string()).await {
        Ok(options) => options.into_iter().find(|o| o.id == user_id),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "could not resolve target account");
            None
        }
    }
    .unwrap_or_else(|| UserOption {
        id: user_id,
        username: user_id.to_string(),
        display_name: user_id.to_string(),
    })
}

fn print_tokens(list: &TokenListController) {
    let show_billing = list.columns().iter().any(|c| c.id == "billing_tag");
    if let Some(target) = &list.query().target {
        println!("viewing tokens of {}", target.label());
    }
    println!(
        "{:>6}  {:<24} {:<12} {:<12} {:<10} {:>12} {:>12}  {:<20} {:<20}",
        "id", "name", "group", if show_billing { "billing tag" } else { "" }, "status",
        "used", "remaining", "created", "expires"
    );
    for token in list.rows() {
        println!(
            "{:>6}  {:<24} {:<12} {:<12} {:<10} {:>12} {:>12}  {:<20} {:<20}",
            token.id,
            token.name,
            token.group,
            if show_billing { token.billing_tag().unwrap_or("-") } else { "" },
            token.status.label(),
            token.used_quota,
            token.remaining_label(),
            format_time(token, false),
            format_time(token, true),
        );
    }
    println!(
        "page {}/{} ({} tokens, {} per page)",
        list.query().page + 1,
        list.page_count().max(1),
        list.total_count(),
        list.query().page_size
    );
}

fn format_time(token: &Token, expiry: bool) -> String {
    let at = if expiry {
        match token.expires_at() {
            Some(at) => at,
            None => return "never".to_string(),
        }
    } else {
        match token.created_at() {
            Some(at) => at,
            None => return "-".to_string(),
        }
    };
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

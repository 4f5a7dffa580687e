use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use grid_sync::timing::{DEFAULT_TIMELINE_INDENT_PX, DEFAULT_TIMELINE_WIDTH_PX};
use grid_sync::viewport::OriginUpdate;
use grid_sync::{Bounds, GridCoordinate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use gridview::cli::{Cli, Command, FillArgs, WatchArgs};
use gridview::config::Config;
use gridview::controller::{InputEvent, parse_input_line};
use gridview::dispatcher::MutationDispatcher;
use gridview::logging;
use gridview::overlay::{self, format_overlay};
use gridview::session::{Session, SessionEvent};
use gridview::{GridApi, HttpGridApi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.logging.to_config()).context("initialising logging")?;
    let config = Config::from_args(&cli.connection).context("invalid connection settings")?;
    let http = HttpGridApi::new(config.server_url(), config.resource.clone());

    match cli.command {
        None => watch(config, http, WatchArgs::default()).await,
        Some(Command::Watch(args)) => watch(config, http, args).await,
        Some(Command::Fill(args)) => fill(http, args).await,
        Some(Command::Timing(args)) => {
            let routes = &config.session.route_override;
            match overlay::fetch_timing_overlay(&http, routes, &args.id).await? {
                Some(timeline) => print!(
                    "{}",
                    format_overlay(&timeline, DEFAULT_TIMELINE_WIDTH_PX, DEFAULT_TIMELINE_INDENT_PX)
                ),
                None => bail!("no region returned timing data for {}", args.id),
            }
            Ok(())
        }
        Some(Command::Region) => {
            let (session, _) = Session::detached(Arc::new(http), config.session);
            println!("{}", session.region_label().await);
            Ok(())
        }
    }
}

async fn fill(http: HttpGridApi, args: FillArgs) -> anyhow::Result<()> {
    let rect = Bounds::new(
        GridCoordinate::new(args.y1.min(args.y2), args.x1.min(args.x2)),
        GridCoordinate::new(args.y1.max(args.y2), args.x1.max(args.x2)),
    );
    let api: Arc<dyn GridApi> = Arc::new(http);
    if !MutationDispatcher::new(api).send_fill_rectangle(rect, args.status).await {
        bail!("fill-rectangle failed after retries");
    }
    println!("filled {} cells with {}", rect.cell_count(), args.status.as_str());
    Ok(())
}

async fn watch(config: Config, http: HttpGridApi, args: WatchArgs) -> anyhow::Result<()> {
    let (mut session, mut events) = Session::connect(http, config.session.clone());
    session.resize(args.width, args.height).await;
    if args.origin_x.is_some() || args.origin_y.is_some() {
        session
            .set_origin(OriginUpdate {
                x: args.origin_x,
                y: args.origin_y,
                ..OriginUpdate::default()
            })
            .await;
    }

    let region = session.region_label().await;
    let bounds = session.visible_bounds();
    println!(
        "region {region}: watching {}..{} ({} cells)",
        bounds.top_left,
        bounds.bottom_right,
        bounds.cell_count()
    );

    let refresher = session.run_refresh_loop(config.refresh_interval);
    let mut counts = session.store().subscribe_counts();
    let mut status = session.subscribe_status();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let deadline = session
            .command_deadline()
            .map(tokio::time::Instant::from_std);
        let idle = deadline.unwrap_or_else(tokio::time::Instant::now);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match parse_input_line(&line) {
                    Ok(inputs) => {
                        for input in inputs {
                            match input {
                                InputEvent::Hover(at) => session.hover(at),
                                InputEvent::Release(at) => session.release(at),
                                InputEvent::Key(key) => {
                                    session.handle_key(key).await;
                                }
                            }
                        }
                    }
                    Err(err) => warn!(target = "gridview.input", error = %err, "ignoring input line"),
                }
            }
            changed = counts.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *counts.borrow_and_update());
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                info!(target = "gridview.stream", status = current.as_str(), "connection status");
                println!("stream {}", current.as_str());
            }
            Some(event) = events.recv() => print_event(event),
            _ = tokio::time::sleep_until(idle), if deadline.is_some() => {
                session.expire_command(std::time::Instant::now());
            }
        }
    }

    info!(target = "gridview.session", summary = %session.summary(), "shutting down");
    refresher.stop().await;
    session.close().await;
    Ok(())
}

fn print_event(event: SessionEvent) {
    match event {
        SessionEvent::Overlay(timeline) => print!(
            "{}",
            format_overlay(&timeline, DEFAULT_TIMELINE_WIDTH_PX, DEFAULT_TIMELINE_INDENT_PX)
        ),
        SessionEvent::OverlayUnavailable { id, reason } => {
            println!("timing for {id} unavailable: {reason}")
        }
        SessionEvent::Details(record) => match serde_json::to_string_pretty(&record) {
            Ok(text) => println!("{text}"),
            Err(err) => warn!(target = "gridview.input", error = %err, "failed to render view row"),
        },
        SessionEvent::MutationFinished { action, ok } => {
            if !ok {
                println!("{action} failed");
            }
        }
        SessionEvent::Notice(message) => println!("{message}"),
    }
}

//! Live watch: run the sync engine and print status changes,
//! notifications and alarms until interrupted.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::Utc;
use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use fleetsync_api::FleetClient;
use fleetsync_core::{Alert, DisplayStatus, NotificationItem, SyncEngine, WebSocketConnector};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config::Settings;
use crate::error::CliError;
use crate::output;

const STATUS_TICK: Duration = Duration::from_secs(1);

/// How many printed notification ids are remembered.
const SEEN_CAPACITY: usize = 1024;

/// Ids of notifications already printed, forgetting the oldest past a
/// fixed capacity.
struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity,
        }
    }

    /// Returns `true` if `id` was not seen yet.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_owned());
        self.ids.insert(id.to_owned());
        true
    }
}

pub async fn handle(
    client: FleetClient,
    mut settings: Settings,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Server-wide preferences may override the poll cadence.
    match client.get_server().await {
        Ok(server) => settings.engine.apply_server_preferences(&server),
        Err(err) if err.is_transient() => {
            tracing::warn!(error = %err, "server preferences unavailable, using profile values");
        }
        Err(err) => return Err(err.into()),
    }

    let connector = WebSocketConnector::from_client(&client)?;
    let engine = SyncEngine::spawn(settings.engine, client, connector);
    if args.logs {
        engine.set_log_delivery(true);
    }
    engine.start();

    let color = output::should_color(global.color);
    let result = run_loop(&engine, &args, global, color).await;
    engine.shutdown().await;
    result
}

async fn run_loop(
    engine: &SyncEngine,
    args: &WatchArgs,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let store = engine.store();
    let mut notifications = store.subscribe_notifications();
    let mut logs = store.subscribe_logs();
    let mut alerts = engine.alerts();
    let mut seen = SeenIds::new(SEEN_CAPACITY);
    let mut last_status: Option<DisplayStatus> = None;
    let mut printed_logs = logs.borrow().clone();

    let mut tick = tokio::time::interval(STATUS_TICK);
    let deadline = args.duration.map(Duration::from_secs);
    let sleep = tokio::time::sleep(deadline.unwrap_or(Duration::MAX));
    tokio::pin!(sleep);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!("interrupted");
                return Ok(());
            }
            () = &mut sleep, if deadline.is_some() => return Ok(()),
            _ = tick.tick() => {
                let status = engine.display_status(Utc::now());
                if last_status != Some(status) {
                    last_status = Some(status);
                    emit(
                        global,
                        &format!(
                            "[{}] {} ({} devices)",
                            Utc::now().format("%H:%M:%S"),
                            output::status_label(status, color),
                            store.device_count()
                        ),
                    );
                }
            }
            changed = notifications.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = notifications.borrow_and_update().clone();
                for item in fresh_notifications(&current, &mut seen) {
                    emit(global, &format_notification(item, color));
                    store.dismiss_notification(&item.id);
                }
            }
            changed = logs.changed(), if args.logs => {
                if changed.is_err() {
                    return Ok(());
                }
                let lines = logs.borrow_and_update().clone();
                for line in new_log_lines(&printed_logs, &lines) {
                    emit(global, line);
                }
                printed_logs = lines;
            }
            alert = alerts.recv() => match alert {
                Ok(Alert::Audible { event_types }) => {
                    tracing::info!(types = ?event_types, "alarm");
                    if !global.quiet {
                        eprint!("\x07");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "alert receiver lagged");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

/// Notifications not printed yet, oldest first.
///
/// The store keeps the newest batch at the front, so the unseen tail is
/// walked in reverse.
fn fresh_notifications<'a>(
    current: &'a [NotificationItem],
    seen: &mut SeenIds,
) -> Vec<&'a NotificationItem> {
    current
        .iter()
        .rev()
        .filter(|item| item.show && seen.insert(&item.id))
        .collect()
}

/// Lines of `current` that were not in `previous`.
///
/// The log ring drops from the front and appends at the back, so the
/// answer is the shortest tail whose removal leaves a suffix of `previous`.
fn new_log_lines<'a>(previous: &[String], current: &'a [String]) -> &'a [String] {
    for kept in (0..=current.len()).rev() {
        if kept <= previous.len() && current[..kept] == previous[previous.len() - kept..] {
            return &current[kept..];
        }
    }
    current
}

fn format_notification(item: &NotificationItem, color: bool) -> String {
    if color {
        format!("{} {}", "»".cyan(), item.message)
    } else {
        format!("» {}", item.message)
    }
}

fn emit(global: &GlobalOpts, line: &str) {
    output::print_output(line, global.quiet);
}

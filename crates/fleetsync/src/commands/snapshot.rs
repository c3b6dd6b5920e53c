//! One-shot fetch of devices and their latest positions.

use serde::Serialize;
use tabled::Tabled;

use fleetsync_api::FleetClient;
use fleetsync_core::{DataStore, Device, DeviceStatus, FleetSource, Position};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// A device joined with its latest position.
#[derive(Debug, Serialize)]
struct DeviceView {
    #[serde(flatten)]
    device: Device,
    position: Option<Position>,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Lat")]
    lat: String,
    #[tabled(rename = "Lon")]
    lon: String,
    #[tabled(rename = "Speed")]
    speed: String,
    #[tabled(rename = "Fix")]
    fix: String,
}

fn status_text(status: DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Online => "online",
        DeviceStatus::Offline => "offline",
        DeviceStatus::Unknown => "unknown",
    }
}

fn to_row(view: &DeviceView) -> DeviceRow {
    let pos = view.position.as_ref();
    DeviceRow {
        id: view.device.id,
        name: view.device.name.clone(),
        status: status_text(view.device.status).into(),
        lat: pos.map(|p| format!("{:.5}", p.latitude)).unwrap_or_default(),
        lon: pos.map(|p| format!("{:.5}", p.longitude)).unwrap_or_default(),
        speed: pos.map(|p| format!("{:.1}", p.speed)).unwrap_or_default(),
        fix: pos
            .and_then(|p| p.fix_time)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into()),
    }
}

fn collect_views(store: &DataStore) -> Vec<DeviceView> {
    store
        .devices_snapshot()
        .iter()
        .map(|device| DeviceView {
            device: (**device).clone(),
            position: store.position(device.id).map(|p| (*p).clone()),
        })
        .collect()
}

pub async fn handle(client: &FleetClient, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = client.fetch_snapshot().await?;
    let store = DataStore::new();
    store.apply_snapshot(snapshot);
    tracing::debug!(
        devices = store.device_count(),
        positions = store.position_count(),
        "snapshot loaded"
    );

    let views = collect_views(&store);
    let out = output::render_list(global.output, &views, to_row, |v| v.device.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

//! Cross-region timing fan-out and the single-cell details lookup.

use futures::future::join_all;
use grid_sync::{CellRecord, GridCoordinate, TimingOverlay, TimingSample};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::transport::GridApi;

/// Peer routes: the explicit override when one is configured, otherwise
/// whatever the service advertises.
pub async fn resolve_routes<A>(api: &A, route_override: &[String]) -> ClientResult<Vec<String>>
where
    A: GridApi + ?Sized,
{
    if !route_override.is_empty() {
        return Ok(route_override.to_vec());
    }
    let routes = api.routes().await?;
    if routes.is_empty() {
        return Err(ClientError::NoRoutes);
    }
    Ok(routes)
}

/// Queries every route for `id` concurrently and waits for all of them,
/// successful or not. Failed or incomplete rows are left out.
pub async fn collect_samples<A>(api: &A, routes: &[String], id: &str) -> Vec<TimingSample>
where
    A: GridApi + ?Sized,
{
    let lookups = routes.iter().map(|route| async move {
        match api.view_row_at(route, id).await {
            Ok(record) => {
                let sample = TimingSample::from_record(&record);
                if sample.is_none() {
                    debug!(target = "gridview.overlay", %route, %id, "view row lacks timing fields");
                }
                sample
            }
            Err(err) => {
                warn!(target = "gridview.overlay", %route, %id, error = %err, "view row lookup failed");
                None
            }
        }
    });
    join_all(lookups).await.into_iter().flatten().collect()
}

/// Builds the timing overlay for `id`. `Ok(None)` means no region returned a
/// usable row.
pub async fn fetch_timing_overlay<A>(
    api: &A,
    route_override: &[String],
    id: &str,
) -> ClientResult<Option<TimingOverlay>>
where
    A: GridApi + ?Sized,
{
    let id = id.parse::<GridCoordinate>()?.to_string();
    let routes = resolve_routes(api, route_override).await?;
    let samples = collect_samples(api, &routes, &id).await;
    debug!(
        target = "gridview.overlay",
        %id,
        routes = routes.len(),
        samples = samples.len(),
        "timing samples collected"
    );
    Ok(TimingOverlay::compute(samples))
}

/// Raw view row for the details overlay.
pub async fn fetch_cell_details<A>(api: &A, id: &str) -> ClientResult<CellRecord>
where
    A: GridApi + ?Sized,
{
    api.view_row(id).await
}

/// Plain-text rendering of an overlay, one line per marker.
pub fn format_overlay(overlay: &TimingOverlay, width_px: u32, indent_px: u32) -> String {
    use std::fmt::Write as _;

    let layout = overlay.layout(width_px, indent_px);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "cell {} updated in {}",
        overlay.id,
        overlay.updated_region.as_deref().unwrap_or("?")
    );
    let _ = writeln!(
        out,
        "  endpoint -> entity  {:>6} ms  (reported {} ms{})  x={}",
        overlay.endpoint_to_entity_ms,
        overlay.reported_endpoint_to_entity_ms,
        if overlay.compensated { ", skew compensated" } else { "" },
        layout.endpoint_x
    );
    let _ = writeln!(out, "  entity               {:>6}      x={}", "", layout.updated_x);
    for (view, x) in overlay.views.iter().zip(&layout.view_xs) {
        let _ = writeln!(
            out,
            "  {}. entity -> view   {:>6} ms  {}  x={}",
            view.index,
            view.entity_to_view_ms,
            view.region.as_deref().unwrap_or("?"),
            x
        );
    }
    out
}

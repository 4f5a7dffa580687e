//! Write path: cell mutations with bounded fixed-delay retries.
//!
//! Failures are logged and reported as `false`; they never touch the local
//! projection. The push stream shows whether a write took effect.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grid_sync::{Bounds, CellStatus, GridCoordinate};
use tracing::{error, info, warn};

use crate::error::ClientResult;
use crate::transport::{CellMutation, FillRectangle, GridApi, MutationCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Single-cell and spanned updates.
    pub const POINT: RetryPolicy = RetryPolicy {
        attempts: 10,
        delay: Duration::from_millis(100),
    };

    /// Rectangle fills.
    pub const FILL: RetryPolicy = RetryPolicy {
        attempts: 5,
        delay: Duration::from_millis(200),
    };
}

#[derive(Clone)]
pub struct MutationDispatcher {
    api: Arc<dyn GridApi>,
    point: RetryPolicy,
    fill: RetryPolicy,
}

impl MutationDispatcher {
    pub fn new(api: Arc<dyn GridApi>) -> Self {
        Self {
            api,
            point: RetryPolicy::POINT,
            fill: RetryPolicy::FILL,
        }
    }

    pub fn with_policies(mut self, point: RetryPolicy, fill: RetryPolicy) -> Self {
        self.point = point;
        self.fill = fill;
        self
    }

    /// Sends one cell mutation. The center is derived from `id`; a malformed
    /// id is logged and nothing is sent. `status` is omitted for erase.
    pub async fn send_cell_update(
        &self,
        id: &str,
        status: Option<CellStatus>,
        command: MutationCommand,
        radius: i64,
    ) -> bool {
        let center = match id.parse::<GridCoordinate>() {
            Ok(center) => center,
            Err(err) => {
                warn!(target = "gridview.dispatch", %id, error = %err, "not sending mutation for malformed id");
                return false;
            }
        };
        let template = CellMutation {
            id: center.to_string(),
            status,
            client_at: Utc::now(),
            center_x: center.x(),
            center_y: center.y(),
            radius,
        };
        let (api, template) = (&self.api, &template);
        // every attempt carries its own send time
        retry(self.point, command.path(), &template.id, move || {
            let body = CellMutation {
                client_at: Utc::now(),
                ..template.clone()
            };
            async move { api.put_cell(command, &body).await }
        })
        .await
    }

    /// Fills the inclusive rectangle `rect` with `status`.
    pub async fn send_fill_rectangle(&self, rect: Bounds, status: CellStatus) -> bool {
        let label = format!("{}..{}", rect.top_left, rect.bottom_right);
        let api = &self.api;
        retry(self.fill, "fill-rectangle", &label, move || {
            let now = Utc::now();
            let body = FillRectangle {
                x1: rect.top_left.x(),
                y1: rect.top_left.y(),
                x2: rect.bottom_right.x(),
                y2: rect.bottom_right.y(),
                status,
                client_at: now,
                endpoint_at: now,
                region: String::new(),
            };
            async move { api.put_fill_rectangle(&body).await }
        })
        .await
    }
}

async fn retry<F, Fut>(policy: RetryPolicy, action: &str, subject: &str, mut op: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<()>>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        if attempt == 1 {
            info!(target = "gridview.dispatch", action, subject, "sending mutation");
        } else {
            warn!(target = "gridview.dispatch", action, subject, attempt, max = attempts, "retrying mutation");
        }

        match op().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(target = "gridview.dispatch", action, subject, attempt, error = %err, "mutation attempt failed");
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }
    error!(target = "gridview.dispatch", action, subject, attempts, "giving up on mutation");
    false
}

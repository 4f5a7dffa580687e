//! HTTP contract of the grid service.
//!
//! Everything the client reads or writes goes through [`GridApi`] so the
//! pagination walk, the mutation retries and the timing fan-out can be driven
//! against an in-memory double in tests. [`HttpGridApi`] is the reqwest-backed
//! implementation; it also opens the push stream, which has no test double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grid_sync::{Bounds, CellRecord, CellStatus, Page, Region};
use reqwest::Client;
use reqwest_eventsource::EventSource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Server-side semantics of a single-cell mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationCommand {
    UpdateStatus,
    SpanStatus,
    FillStatus,
    ClearStatus,
    EraseStatus,
    CreatePredator,
}

impl MutationCommand {
    pub fn path(self) -> &'static str {
        match self {
            MutationCommand::UpdateStatus => "update-status",
            MutationCommand::SpanStatus => "span-status",
            MutationCommand::FillStatus => "fill-status",
            MutationCommand::ClearStatus => "clear-status",
            MutationCommand::EraseStatus => "erase-status",
            MutationCommand::CreatePredator => "create-predator",
        }
    }
}

/// Body shared by every single-cell mutation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMutation {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CellStatus>,
    pub client_at: DateTime<Utc>,
    pub center_x: i64,
    pub center_y: i64,
    pub radius: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillRectangle {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
    pub status: CellStatus,
    pub client_at: DateTime<Utc>,
    /// Overwritten by the server.
    pub endpoint_at: DateTime<Utc>,
    /// Overwritten by the server.
    pub region: String,
}

#[async_trait]
pub trait GridApi: Send + Sync {
    /// One page of cells inside `region`. `page_token` is `"start"` for the
    /// first page.
    async fn fetch_page(&self, region: &Region, page_token: &str) -> ClientResult<Page>;

    async fn put_cell(&self, command: MutationCommand, body: &CellMutation) -> ClientResult<()>;

    async fn put_fill_rectangle(&self, body: &FillRectangle) -> ClientResult<()>;

    /// Single view row from the service this client is attached to.
    async fn view_row(&self, id: &str) -> ClientResult<CellRecord>;

    /// Single view row from a peer region (`host:port`).
    async fn view_row_at(&self, route: &str, id: &str) -> ClientResult<CellRecord>;

    async fn routes(&self) -> ClientResult<Vec<String>>;

    async fn region_label(&self) -> ClientResult<String>;
}

/// Peers on loopback are plain HTTP, everything else is TLS.
pub fn route_base_url(route: &str) -> String {
    let route = route.trim().trim_end_matches('/');
    if route.starts_with("localhost") || route.starts_with("127.0.0.1") {
        format!("http://{route}")
    } else {
        format!("https://{route}")
    }
}

#[derive(Clone, Debug)]
pub struct HttpGridApi {
    http: Client,
    base_url: String,
    resource: String,
}

impl HttpGridApi {
    pub fn new(base_url: impl Into<String>, resource: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let resource = resource.into().trim_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            resource,
        }
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.resource, tail)
    }

    pub fn stream_url(&self, bounds: Bounds) -> String {
        self.url(&format!(
            "stream/{}/{}/{}/{}",
            bounds.top_left.x(),
            bounds.top_left.y(),
            bounds.bottom_right.x(),
            bounds.bottom_right.y()
        ))
    }

    /// Opens the push stream for `bounds`. Reconnection is left to the caller.
    pub fn open_stream(&self, bounds: Bounds) -> ClientResult<EventSource> {
        let mut source = EventSource::new(self.http.get(self.stream_url(bounds)))
            .map_err(|err| ClientError::Stream(err.to_string()))?;
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));
        Ok(source)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> ClientResult<T> {
        let res = self.http.get(&url).send().await?;
        let text = success_text(res).await?;
        serde_json::from_str(&text).map_err(|err| ClientError::Malformed {
            url,
            reason: format!("{err}; payload={text}"),
        })
    }

    async fn put_json<T: Serialize + Sync>(&self, url: String, body: &T) -> ClientResult<()> {
        let res = self.http.put(&url).json(body).send().await?;
        success_text(res).await.map(|_| ())
    }
}

async fn success_text(res: reqwest::Response) -> ClientResult<String> {
    let status = res.status();
    if status.is_success() {
        Ok(res.text().await?)
    } else {
        let body = res.text().await.unwrap_or_default();
        Err(ClientError::UnexpectedStatus { status, body })
    }
}

#[async_trait]
impl GridApi for HttpGridApi {
    async fn fetch_page(&self, region: &Region, page_token: &str) -> ClientResult<Page> {
        let url = self.url(&format!(
            "paginated-list/{}/{}/{}/{}/{}",
            region.top_left.x(),
            region.top_left.y(),
            region.bottom_right.x(),
            region.bottom_right.y(),
            page_token
        ));
        debug!(target = "grid.http", %url, "fetching page");
        self.get_json(url).await
    }

    async fn put_cell(&self, command: MutationCommand, body: &CellMutation) -> ClientResult<()> {
        self.put_json(self.url(command.path()), body).await
    }

    async fn put_fill_rectangle(&self, body: &FillRectangle) -> ClientResult<()> {
        self.put_json(self.url("fill-rectangle"), body).await
    }

    async fn view_row(&self, id: &str) -> ClientResult<CellRecord> {
        self.get_json(self.url(&format!("view-row-by-id/{id}"))).await
    }

    async fn view_row_at(&self, route: &str, id: &str) -> ClientResult<CellRecord> {
        let url = format!(
            "{}/{}/view-row-by-id/{id}",
            route_base_url(route),
            self.resource
        );
        self.get_json(url).await
    }

    async fn routes(&self) -> ClientResult<Vec<String>> {
        self.get_json(self.url("routes")).await
    }

    async fn region_label(&self) -> ClientResult<String> {
        let res = self.http.get(self.url("region")).send().await?;
        Ok(success_text(res).await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_sync::GridCoordinate;

    #[test]
    fn loopback_routes_use_plain_http() {
        assert_eq!(route_base_url("localhost:9000"), "http://localhost:9000");
        assert_eq!(route_base_url("127.0.0.1:9001/"), "http://127.0.0.1:9001");
        assert_eq!(
            route_base_url("grid.eu-west.example.com"),
            "https://grid.eu-west.example.com"
        );
    }

    #[test]
    fn stream_url_uses_x_then_y() {
        let api = HttpGridApi::new("http://127.0.0.1:9000/", "/grid-cell/");
        let bounds = Bounds::new(GridCoordinate::new(-10, 20), GridCoordinate::new(5, 49));
        assert_eq!(
            api.stream_url(bounds),
            "http://127.0.0.1:9000/grid-cell/stream/20/-10/49/5"
        );
    }

    #[test]
    fn mutation_body_is_camel_case() {
        let body = CellMutation {
            id: "3x4".into(),
            status: None,
            client_at: Utc::now(),
            center_x: 4,
            center_y: 3,
            radius: 0,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["centerX"], 4);
        assert_eq!(value["centerY"], 3);
        assert!(value.get("status").is_none());
        assert!(value.get("clientAt").is_some());
    }
}

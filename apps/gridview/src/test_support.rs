use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grid_sync::{CellRecord, Page, Region};
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::error::{ClientError, ClientResult};
use crate::transport::{CellMutation, FillRectangle, GridApi, MutationCommand};

/// In-memory [`GridApi`] double. Pages are served in push order; once the
/// queue is empty page fetches fail.
#[derive(Default)]
pub struct MockGridApi {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    pages: VecDeque<Page>,
    page_calls: Vec<(Region, String)>,
    failing_puts: usize,
    put_attempts: usize,
    put_stamps: Vec<DateTime<Utc>>,
    cell_mutations: Vec<(MutationCommand, CellMutation)>,
    fills: Vec<FillRectangle>,
    view_rows: HashMap<String, CellRecord>,
    routes: Vec<String>,
    region: Option<String>,
}

fn unavailable(body: &str) -> ClientError {
    ClientError::UnexpectedStatus {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: body.to_string(),
    }
}

impl MockGridApi {
    pub fn push_page(&self, page: Page) {
        self.state.lock().pages.push_back(page);
    }

    /// The next `count` PUTs fail.
    pub fn fail_puts(&self, count: usize) {
        self.state.lock().failing_puts = count;
    }

    /// Registers a view row served for `route` (empty for the local service).
    pub fn insert_view_row(&self, route: &str, record: CellRecord) {
        self.state.lock().view_rows.insert(route.to_string(), record);
    }

    pub fn set_routes(&self, routes: &[&str]) {
        self.state.lock().routes = routes.iter().map(|r| r.to_string()).collect();
    }

    pub fn set_region(&self, region: &str) {
        self.state.lock().region = Some(region.to_string());
    }

    pub fn page_tokens(&self) -> Vec<String> {
        self.state.lock().page_calls.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn regions(&self) -> Vec<Region> {
        let state = self.state.lock();
        let mut regions: Vec<Region> = Vec::new();
        for (region, _) in &state.page_calls {
            if !regions.contains(region) {
                regions.push(*region);
            }
        }
        regions
    }

    pub fn put_attempts(&self) -> usize {
        self.state.lock().put_attempts
    }

    /// `clientAt` of every PUT attempt, failed ones included.
    pub fn put_stamps(&self) -> Vec<DateTime<Utc>> {
        self.state.lock().put_stamps.clone()
    }

    pub fn cell_mutations(&self) -> Vec<(MutationCommand, CellMutation)> {
        self.state.lock().cell_mutations.clone()
    }

    pub fn fills(&self) -> Vec<FillRectangle> {
        self.state.lock().fills.clone()
    }

    fn take_put_slot(&self, client_at: DateTime<Utc>) -> ClientResult<()> {
        let mut state = self.state.lock();
        state.put_attempts += 1;
        state.put_stamps.push(client_at);
        if state.failing_puts > 0 {
            state.failing_puts -= 1;
            return Err(unavailable("busy"));
        }
        Ok(())
    }
}

#[async_trait]
impl GridApi for MockGridApi {
    async fn fetch_page(&self, region: &Region, page_token: &str) -> ClientResult<Page> {
        let mut state = self.state.lock();
        state.page_calls.push((*region, page_token.to_string()));
        state.pages.pop_front().ok_or_else(|| unavailable("no page"))
    }

    async fn put_cell(&self, command: MutationCommand, body: &CellMutation) -> ClientResult<()> {
        self.take_put_slot(body.client_at)?;
        self.state.lock().cell_mutations.push((command, body.clone()));
        Ok(())
    }

    async fn put_fill_rectangle(&self, body: &FillRectangle) -> ClientResult<()> {
        self.take_put_slot(body.client_at)?;
        self.state.lock().fills.push(body.clone());
        Ok(())
    }

    async fn view_row(&self, id: &str) -> ClientResult<CellRecord> {
        self.view_row_at("", id).await
    }

    async fn view_row_at(&self, route: &str, id: &str) -> ClientResult<CellRecord> {
        self.state
            .lock()
            .view_rows
            .get(route)
            .filter(|record| record.id == id)
            .cloned()
            .ok_or_else(|| unavailable(route))
    }

    async fn routes(&self) -> ClientResult<Vec<String>> {
        Ok(self.state.lock().routes.clone())
    }

    async fn region_label(&self) -> ClientResult<String> {
        self.state
            .lock()
            .region
            .clone()
            .ok_or_else(|| unavailable("region"))
    }
}

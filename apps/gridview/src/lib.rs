//! Async client for the live grid: HTTP transport, snapshot pagination,
//! retried mutations, the push-stream worker, cross-region timing and the
//! session that ties them to one viewport.

pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod overlay;
pub mod pagination;
pub mod session;
pub mod store;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use error::{ClientError, ClientResult};
pub use session::{Session, SessionEvent};
pub use store::CellStore;
pub use transport::{GridApi, HttpGridApi};

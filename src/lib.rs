pub mod app;
pub mod auth;
pub mod bootstrap;
pub mod cisterns;
pub mod client;
pub mod config;
pub mod csrf;
pub mod deliveries;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod money;
pub mod products;
pub mod promos;
pub mod rates;
pub mod sales;
pub mod state;
pub mod stats;
pub mod storage;
pub mod ui;
pub mod users;

pub use app::router;
pub use auth::AuthContext;
pub use bootstrap::{BootstrapError, Catalog, PagePayload};
pub use client::{ActionOutcome, PosClient};
pub use ledger::{LedgerError, SaleLedger, SaleSubmission, Totals};
pub use state::AppState;
pub use storage::{load_data, resolve_data_path};

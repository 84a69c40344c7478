pub mod config;
pub mod contracts;
pub mod db;
pub mod pg_store;

pub use config::ServiceConfig;
pub use contracts::{
    DateQuery, EnsureLedgerRequest, OpeningBalanceRequest, PostingKind, PostingRequest,
    RangeQuery,
};
pub use db::{apply_schema, connect_database};
pub use pg_store::PgAccountingStore;

pub mod bootstrap;
pub mod engine;
pub mod error;
mod inventory;
mod opening;
pub mod outcome;
mod payments;
mod purchases;
pub mod reversal;
mod sales;

pub use bootstrap::Bootstrapper;
pub use engine::PostingEngine;
pub use error::{PostingError, PostingResult};
pub use outcome::{PostingOutcome, PostingResponse, SalesInvoicePosting, Summary};
pub use reversal::reversal_reference;

//! Bulk operation facade.
//!
//! ```no_run
//! # async fn demo() -> Result<(), stampede_bulk::AppError> {
//! use stampede_bulk::{BulkConfig, BulkIngestHandler, SessionCredentials};
//!
//! let creds = SessionCredentials::new("https://example.my.salesforce.com", "00D...")?;
//! let handler = BulkIngestHandler::connect(creds, BulkConfig::default())?;
//!
//! let csv = "LastName,Email\nDoe,doe@example.com\n";
//! let results = handler.sobject("Contact").insert(csv).await?;
//! println!("{}", results);
//! # Ok(())
//! # }
//! ```

mod handler;
mod ops;

pub use handler::{BulkIngestHandler, SObjectBulk};
pub use ops::IngestClientOps;

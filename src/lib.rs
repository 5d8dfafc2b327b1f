//! # sec-archive - bulk acquisition of SEC EDGAR quarterly filings
//!
//! Given a year, a quarter, and a set of form types, this crate enumerates
//! every filing submitted in that period from the publisher's quarterly
//! master index, selects the ones matching the requested forms and an
//! optional entity filter, and materializes each filing's files onto local
//! disk as either a directory tree or a tar archive. Runs are resumable
//! across invocations through an accession-keyed manifest, and the rate
//! limiter and retry policy are tuned to the publisher's fair-access rules.
//!
//! ## Basic usage
//!
//! ```no_run
//! use sec_archive::{Acquisition, FetchConfig, Fetcher, OutputMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FetchConfig::new("./data")
//!         .with_user_agent("MyApp contact@example.com")
//!         .with_output_mode(OutputMode::Files)
//!         .with_extensions(vec![".xml".to_string()]);
//!
//!     let fetcher = Fetcher::new(config)?;
//!     let input = Acquisition::Quarter {
//!         year: 2024,
//!         quarter: 1,
//!         forms: vec!["10-Q".to_string()],
//!     };
//!     let results = fetcher.acquire(input, &[], &[], None).await?;
//!     for result in results {
//!         println!("{}: {:?}", result.accession, result.status);
//!     }
//!     Ok(())
//! }
//! ```

mod acquisition;
mod config;
mod entities;
mod error;
mod fetcher;
mod filter;
mod forms;
mod http_client;
mod index;
mod manifest;
mod mirror;
mod rate_limiter;
mod scheduler;
mod storage;
mod tar_packager;

pub use acquisition::{Acquisition, Fetcher};
pub use config::{FetchConfig, OutputMode, TarProvider};
pub use entities::{normalize_entity_id, EntityResolver, Resolution};
pub use error::{FetchError, Result};
pub use fetcher::{FilingFetcher, FilingResult, FilingStatus};
pub use filter::FilingFilter;
pub use forms::FormCatalog;
pub use http_client::HttpClient;
pub use index::{fetch_master_index, load_quarter_rows, master_index_url, FilingRow};
pub use manifest::{Manifest, ManifestEntry};
pub use mirror::MirrorClient;
pub use rate_limiter::RateLimiter;
pub use scheduler::{ProgressObserver, Scheduler};
pub use tar_packager::{safe_extract, write_tar};

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

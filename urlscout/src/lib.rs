pub mod config;
pub mod errors;
pub mod input;
pub mod metrics;
pub mod output;
pub mod results;
pub mod search;

pub use config::{ConfigOverrides, SearchConfig};
pub use errors::{FetchError, SearchError, SearchResult};
pub use results::{ResultSet, TargetResult};

//! Bar exports: file discovery, parsing, date and session filtering.

mod bars;
mod dates;
mod loader;

pub use bars::Bars;
pub use dates::{parse_date, parse_timestamp};
pub use loader::{read_bars, DataLoader, DataMetadata, DataRequest, Gap, LoadedBars};

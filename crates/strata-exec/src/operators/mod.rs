//! Built-in operators.
//!
//! A deliberately small set: a source that scans a
//! `ColumnDataCollection`, sinks that collect or count rows, and a
//! row-predicate filter. The full operator library lives outside this
//! crate; these cover the executor's own tests and the table-data
//! plumbing.

mod filter;
mod scan;
mod sink;

pub use filter::{FilterPredicate, VectorFilter};
pub use scan::CollectionScanSource;
pub use sink::{CollectionSink, CollectionSinkState, CountingSink, CountingSinkState};

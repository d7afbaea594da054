//! Edge adapters: trigger events in, CSV bytes in and out.
//!
//! - [`event`]: object-created notification envelope and location extraction
//! - [`csv`]: payload parsing into a [`crate::types::DataSet`] and serialization back

pub mod csv;
pub mod event;

pub use self::csv::{parse_csv, write_csv};
pub use event::{ObjectCreatedEvent, extract_location, parse_event};

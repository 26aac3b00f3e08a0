pub mod directory;
pub mod types;

pub use directory::EventDirectory;
pub use types::{
    kind_by_name, parse_flags, EventIndex, EventOccurrence, EventSource, EventSummarySnapshot,
    SummaryScope,
};

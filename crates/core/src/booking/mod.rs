pub mod availability;
pub mod extractor;
pub mod policy;
pub mod service;
pub mod temporal;

pub use availability::{overlaps, sort_candidates, RoomSearchCriteria};
pub use extractor::{ExtractedFields, FieldExtractor};
pub use policy::BookingPolicy;
pub use service::BookingService;
pub use temporal::{parse_instant, TimeParseError};

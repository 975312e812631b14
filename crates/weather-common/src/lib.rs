//! Common types shared across the weather feed crates and services.

pub mod record;
pub mod table;
pub mod time;

pub use record::{
    is_plausible_temperature, FeedMode, Reading, WeatherRecord, PLAUSIBLE_MAX_CELSIUS,
    PLAUSIBLE_MIN_CELSIUS,
};
pub use table::TableView;
pub use time::{parse_feed_timestamp, TimeParseError, FEED_LOCAL_OFFSET_SECS};

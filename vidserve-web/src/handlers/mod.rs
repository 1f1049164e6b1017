//! HTTP request handlers organized by functionality

pub mod api;
pub mod records;
pub mod streaming;

// Re-export handler functions
pub use api::{DebugPaths, debug_paths, list_videos, root};
pub use records::{
    add_housing_measurement, add_shaft_measurement, add_user_entry, delete_shaft_measurements,
    delete_user_entries, list_shaft_measurements, list_user_entries, should_calibrate,
    update_shaft_measurement, update_user_entry,
};
pub use streaming::stream_video;

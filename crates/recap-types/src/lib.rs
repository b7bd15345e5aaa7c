pub mod api;
pub mod error;
pub mod models;
pub mod ports;
pub mod text;
pub mod ts;

pub use error::{DeliveryError, PlatformError};
pub use text::truncate_chars;
pub use ts::MessageTs;

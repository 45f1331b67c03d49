pub mod catalog;
pub mod events;
pub mod http;

pub use catalog::Catalog;
pub use events::EventPump;
pub use http::HttpHost;

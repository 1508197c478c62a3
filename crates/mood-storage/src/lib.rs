pub mod http;
pub mod local;
pub mod staging;

pub use http::HttpObjectStorage;
pub use local::LocalObjectStorage;
pub use staging::TempStaging;

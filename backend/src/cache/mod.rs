pub mod response;

pub use response::ResponseCache;

pub mod jwt;
pub mod logging;

pub use logging::LogController;
pub(crate) use logging::with_pretty_json_debug;

/// Collector module
///
/// This module groups the logic of one polling tick:
/// - Flattening a status snapshot into metric points (extractor)
/// - Running the paced query -> extract -> encode -> send loop (runner)
///
/// The collector sits between:
/// - The status source (MongoDB serverStatus)
/// - The Carbon sink connection
///
/// Design notes:
/// - Database and socket specifics MUST NOT live here
/// - Retry classification is done by the source and sink layers,
///   the runner only decides when to sleep and reconnect
pub mod extractor;
pub mod runner;

pub use extractor::{PathPattern, extract};
pub use runner::{Collector, TickReport};

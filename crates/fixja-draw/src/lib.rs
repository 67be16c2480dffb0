// Library root: the draw-generation engine.
//
// Pure computation only. Persistence is delegated to a `MatchSink`
// implementation supplied by the caller (see `generator::MatchSink`).

pub mod algorithms;
pub mod builder;
pub mod dates;
pub mod error;
pub mod format;
pub mod generator;
pub mod model;
pub mod points;
pub mod resolve;
pub mod schema;

pub use error::DrawError;

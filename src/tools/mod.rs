//! Helper tools working on annotation output.

pub mod merge;

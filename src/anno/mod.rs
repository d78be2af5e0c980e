//! Annotation of variants with genes and databases.

pub mod cnv;
pub mod db;
pub mod gene;
pub mod snv;

//! Code supporting the `db *` sub commands.

pub mod build_idx;
pub mod trans_index;

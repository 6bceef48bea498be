//! CLI command implementations

pub(crate) mod common;
pub(crate) mod list;
pub(crate) mod status;
pub(crate) mod upgrade;
pub(crate) mod validate;

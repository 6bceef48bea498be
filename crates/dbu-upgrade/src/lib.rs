//! dbu-upgrade - Schema upgrade engine for dbupgrade
//!
//! An upgrade plan is an ordered list of [`SchemaSpec`] steps, each holding
//! [`Task`]s that move the schema to the step's version. The [`Upgrader`]
//! validates the plan, reads the persisted schema version, runs the pending
//! steps one transaction at a time and checkpoints progress so an
//! interrupted run is detected on the next invocation.

pub mod error;
pub mod plan;
pub(crate) mod serde_helpers;
pub mod step;
pub mod task;
pub mod upgrader;

pub use error::{UpgradeError, UpgradeResult};
pub use plan::UpgradePlan;
pub use step::SchemaSpec;
pub use task::external::{DatabaseUpgradeTask, ExternalTaskRegistry};
pub use task::{Task, TaskKind, VendorTarget};
pub use upgrader::{UpgradePreview, UpgradeReport, UpgradeState, Upgrader};

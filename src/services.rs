pub mod repair_service;

pub use repair_service::{RepairError, RepairOutcome, RepairReport, RepairService};

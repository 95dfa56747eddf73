pub mod apply;
pub mod cronjob;
pub mod workload;

/// Field manager for server-side apply and value of the `managed-by` label.
pub(crate) const MANAGER_NAME: &str = "cronjob-manifest";

use serde::{Deserialize, Serialize};

/// Which audio a session captures.
///
/// Chosen once per start call and immutable for the lifetime of that run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum SourceSelector {
    /// Everything rendered to the default output endpoint.
    SystemLoopback,
    /// Only audio rendered by the process tree rooted at `pid`.
    ProcessIncludeLoopback(u32),
    /// Everything except audio rendered by the process tree rooted at `pid`.
    ProcessExcludeLoopback(u32),
    /// A capture endpoint by id, or the default input when `None`.
    Microphone(Option<String>),
}

impl SourceSelector {
    /// Build a loopback selector from include/exclude process lists.
    ///
    /// Process loopback targets a single process tree, so only the first id
    /// of whichever list is non-empty is used. The include list wins when
    /// both are given.
    pub fn from_process_lists(include: &[u32], exclude: &[u32]) -> Self {
        if let Some(&pid) = include.first() {
            if include.len() > 1 {
                log::warn!("process loopback supports one process; ignoring {} extra include ids", include.len() - 1);
            }
            return Self::ProcessIncludeLoopback(pid);
        }
        if let Some(&pid) = exclude.first() {
            if exclude.len() > 1 {
                log::warn!("process loopback supports one process; ignoring {} extra exclude ids", exclude.len() - 1);
            }
            return Self::ProcessExcludeLoopback(pid);
        }
        Self::SystemLoopback
    }

    /// Microphone selector; an empty id means the default device.
    pub fn microphone(device_id: Option<&str>) -> Self {
        Self::Microphone(device_id.filter(|id| !id.is_empty()).map(str::to_owned))
    }
}

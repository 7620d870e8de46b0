//! Discovery of V4L2 device nodes.

use std::path::PathBuf;

use log::debug;

/// A video device node present on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    /// Node index, as in `/dev/video<index>`.
    pub index: usize,
    /// Device node path.
    pub path: PathBuf,
    /// Name reported through sysfs, if readable.
    pub name: Option<String>,
}

/// List the `/dev/video*` nodes, ordered by index.
pub fn list_devices() -> Vec<DeviceNode> {
    let mut nodes: Vec<DeviceNode> = v4l::context::enum_devices()
        .into_iter()
        .map(|node| DeviceNode {
            index: node.index(),
            path: node.path().to_path_buf(),
            name: node.name(),
        })
        .collect();
    nodes.sort_by_key(|node| node.index);
    debug!("found {} video nodes", nodes.len());
    nodes
}

/// Nodes whose sysfs name contains `pattern`, e.g. `"vivid"`.
pub fn find_devices(pattern: &str) -> Vec<DeviceNode> {
    list_devices()
        .into_iter()
        .filter(|node| node.name.as_deref().is_some_and(|name| name.contains(pattern)))
        .collect()
}

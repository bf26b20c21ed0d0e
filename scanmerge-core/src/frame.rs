//! One scanner setup: its poses and the points it recorded

use serde::{Deserialize, Serialize};

use crate::pose::Pose;
use crate::scan_cloud::ScanCloud;

/// A parsed scan frame.
///
/// `scanner_pose` is the registered sensor position and axes; `cloud_pose`
/// maps the frame's local coordinates into the shared reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFrame {
    pub scanner_pose: Pose,
    pub cloud_pose: Pose,
    pub cloud: ScanCloud,
}

impl ScanFrame {
    pub fn new(scanner_pose: Pose, cloud_pose: Pose, cloud: ScanCloud) -> Self {
        Self {
            scanner_pose,
            cloud_pose,
            cloud,
        }
    }

    /// A bare cloud with identity poses
    pub fn from_cloud(cloud: ScanCloud) -> Self {
        Self::new(Pose::identity(), Pose::identity(), cloud)
    }

    /// Move the points into the shared reference frame using `cloud_pose`.
    ///
    /// The stored poses are not changed.
    pub fn align(&mut self) {
        self.cloud.transform(&self.cloud_pose);
    }
}

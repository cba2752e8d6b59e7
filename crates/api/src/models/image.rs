//! Images stored on the asset host.

use serde::{Deserialize, Serialize};

/// An image uploaded to the asset host.
///
/// `public_id` is the handle the host needs to delete the file again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedImage {
    pub url: String,
    pub public_id: String,
}

use std::path::Path;

use crate::archive::{DEPLOYMENTS_DIR, MANIFEST_EXT};
use crate::model::FsClass;

/// Classifies `path` by the directory it sits in directly.
pub fn classify(home: &Path, path: &Path) -> FsClass {
    let Some(parent) = path.parent() else {
        return FsClass::Unexpected;
    };
    if parent == home.join(DEPLOYMENTS_DIR) {
        if path.extension().is_some_and(|ext| ext == MANIFEST_EXT) {
            return FsClass::DeploymentFile;
        }
        return FsClass::Unexpected;
    }
    if parent == home {
        return FsClass::ConfigFile;
    }
    FsClass::Unexpected
}

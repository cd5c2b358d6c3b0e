use std::path::{Path, PathBuf};

pub const ROTA_DIR: &str = ".rota";
pub const ROTATION_FILE: &str = ".rota/rotation.yaml";

pub fn rota_dir(root: &Path) -> PathBuf {
    root.join(ROTA_DIR)
}

pub fn rotation_path(root: &Path) -> PathBuf {
    root.join(ROTATION_FILE)
}

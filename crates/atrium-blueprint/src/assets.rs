//! Asset tree scanning (§6: "`assets/**`: freely structured tree ... addressed
//! by scripts as `asset://<relative_path>`").

use std::path::{Path, PathBuf};

const RECOGNIZED_EXTENSIONS: &[&str] = &["glb", "gltf", "png", "jpg", "wav", "mp3", "ogg", "bin"];

/// A single asset discovered under a blueprint's `assets/` directory, keyed
/// by the relative path scripts use in an `asset://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub relative_path: String,
    pub size_bytes: u64,
}

/// Walk `<blueprint_dir>/assets` and list every file with a recognized
/// extension. An absent `assets/` directory yields an empty list, not an
/// error -- a blueprint with no assets is valid.
pub fn scan_assets(blueprint_dir: &Path) -> Vec<AssetEntry> {
    let root = blueprint_dir.join("assets");
    if !root.is_dir() {
        return Vec::new();
    }
    let mut entries = Vec::new();
    walk(&root, &root, &mut entries);
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    entries
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<AssetEntry>) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out);
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !RECOGNIZED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        out.push(AssetEntry {
            relative_path: relative.to_string_lossy().replace('\\', "/"),
            size_bytes: metadata.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("atrium-blueprint-assets-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn missing_assets_dir_yields_empty_list() {
        let dir = temp_dir("missing");
        assert!(scan_assets(&dir).is_empty());
    }

    #[test]
    fn finds_recognized_assets_and_skips_others() {
        let dir = temp_dir("scan");
        let assets = dir.join("assets").join("models");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("tree.glb"), b"glb").unwrap();
        fs::write(assets.join("notes.txt"), b"not an asset").unwrap();

        let found = scan_assets(&dir);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative_path, "models/tree.glb");
        fs::remove_dir_all(&dir).ok();
    }
}

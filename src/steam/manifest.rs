//! Per-title text VDF manifest (`appmanifest_<id>.acf`), spec §3.

use super::AppId;
use crate::vdf;
use std::path::Path;

/// A read-only snapshot of an installed title's manifest. Re-read per
/// operation (spec §3) — there is no caching layer here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    pub app_id: AppId,
    pub display_name: String,
    pub install_dir: String,
}

impl AppManifest {
    /// Read and parse one `appmanifest_<id>.acf` file. Returns `None` on
    /// any I/O or parse failure, or if required fields are missing — the
    /// caller (C2's `list_installed_games`) treats a single bad manifest
    /// as skippable rather than aborting the whole enumeration.
    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read(path).ok()?;
        let map = vdf::parse_text(&content).ok()?;
        let state = map.get("AppState")?.as_map()?;

        let app_id: AppId = state.get("appid")?.as_str()?.parse().ok()?;
        let display_name = state.get("name")?.as_str()?.to_string();
        let install_dir = state.get("installdir")?.as_str()?.to_string();

        Some(AppManifest {
            app_id,
            display_name,
            install_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("appmanifest_413150.acf");
        std::fs::write(
            &path,
            r#""AppState"
            {
                "appid" "413150"
                "name" "Stardew Valley"
                "installdir" "Stardew Valley"
            }"#,
        )
        .unwrap();

        let manifest = AppManifest::read(&path).unwrap();
        assert_eq!(manifest.app_id, 413150);
        assert_eq!(manifest.display_name, "Stardew Valley");
        assert_eq!(manifest.install_dir, "Stardew Valley");
    }

    #[test]
    fn missing_required_field_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("appmanifest_1.acf");
        std::fs::write(&path, r#""AppState" { "appid" "1" }"#).unwrap();
        assert!(AppManifest::read(&path).is_none());
    }

    #[test]
    fn malformed_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("appmanifest_1.acf");
        std::fs::write(&path, b"not vdf at all {{{").unwrap();
        assert!(AppManifest::read(&path).is_none());
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use logotrace::{InputLimits, TracingConfig, VectorDocument, VectorizeError, VectorizeResult};

use crate::cli::GlobalOptions;

/// Derive an SVG file path by changing the extension to "svg".
pub fn derive_svg_path(input: &Path) -> PathBuf {
    let mut path = input.to_path_buf();
    path.set_extension("svg");
    path
}

/// Pick where the document is written. An existing directory receives the
/// standard export file name.
pub fn resolve_output(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(dir) if dir.is_dir() => dir.join(VectorDocument::FILE_NAME),
        Some(path) => path.to_path_buf(),
        None => derive_svg_path(input),
    }
}

/// Load a JSON tracing profile, or the default profile when none is given.
pub fn load_profile(path: Option<&Path>) -> VectorizeResult<TracingConfig> {
    let Some(path) = path else {
        return Ok(TracingConfig::default());
    };
    let text = fs::read_to_string(path)?;
    TracingConfig::from_json(&text).map_err(|source| VectorizeError::Profile {
        path: path.to_path_buf(),
        source,
    })
}

pub fn input_limits(global: &GlobalOptions) -> InputLimits {
    InputLimits::default()
        .with_max_bytes(global.max_bytes)
        .with_max_dimension(global.max_dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_path_replaces_extension() {
        assert_eq!(
            derive_svg_path(Path::new("art/logo.png")),
            PathBuf::from("art/logo.svg")
        );
        assert_eq!(derive_svg_path(Path::new("logo")), PathBuf::from("logo.svg"));
    }

    #[test]
    fn output_directory_gets_export_name() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_output(Path::new("logo.png"), Some(dir.path()));
        assert_eq!(resolved, dir.path().join("vectorized-image.svg"));
    }

    #[test]
    fn explicit_output_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.svg");
        assert_eq!(resolve_output(Path::new("logo.png"), Some(&target)), target);
    }

    #[test]
    fn missing_output_derives_from_input() {
        assert_eq!(
            resolve_output(Path::new("logo.webp"), None),
            PathBuf::from("logo.svg")
        );
    }

    #[test]
    fn profile_overrides_some_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, r#"{"color_count": 4, "layering": "stacked"}"#).unwrap();

        let profile = load_profile(Some(&path)).unwrap();
        assert_eq!(profile.color_count, 4);
        assert_eq!(profile.layering, logotrace::Layering::Stacked);
        assert_eq!(profile.path_omit, TracingConfig::default().path_omit);
    }

    #[test]
    fn malformed_profile_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_profile(Some(&path)).unwrap_err();
        assert!(matches!(err, VectorizeError::Profile { .. }));
        assert_eq!(err.kind(), "profile");
    }

    #[test]
    fn no_profile_is_default() {
        assert_eq!(load_profile(None).unwrap(), TracingConfig::default());
    }
}

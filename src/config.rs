use std::path::{Path, PathBuf};

use crate::error::Error;

/// Default region end delimiter: the C# form.
pub const DEFAULT_REGION_END: &str = r"^\s*#endregion\b";

/// Default region start delimiter: the C# form, with the mandatory
/// `name` capture group.
pub const DEFAULT_REGION_START: &str = r"^\s*#region\s+(?P<name>\S+)\s*$";

/// Resolved run configuration: file values overlaid with CLI flags.
/// Exclude patterns are path prefixes relative to the docs root.
pub struct Config {
    /// Documentation tree root.
    pub docs_root: PathBuf,
    /// Path prefixes skipped when scanning the docs tree.
    pub exclude: Vec<String>,
    /// Stop scanning at the first structural error.
    pub fail_fast: bool,
    /// Fence tags counted as compilable. The first tag is used when
    /// rendering resolved snippets.
    pub fences: Vec<String>,
    /// Warn when pseudo blocks exceed this share of governed blocks.
    pub pseudo_warn_ratio: Option<f64>,
    /// Region end delimiter pattern.
    pub region_end: String,
    /// Region start delimiter pattern; must capture `name`.
    pub region_start: String,
    /// Samples source tree root.
    pub samples_root: PathBuf,
    /// Worker threads for document and samples scanning.
    pub workers: usize,
}

/// Raw TOML structure for `.snipsync.toml`.
#[derive(serde::Deserialize)]
struct SnipsyncTomlConfig {
    docs: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
    fail_fast: Option<bool>,
    fences: Option<Vec<String>>,
    pseudo_warn_ratio: Option<f64>,
    region: Option<RegionTomlConfig>,
    samples: Option<String>,
    workers: Option<usize>,
}

/// Raw `[region]` table for `.snipsync.toml`.
#[derive(serde::Deserialize)]
struct RegionTomlConfig {
    end: Option<String>,
    start: Option<String>,
}

impl Config {
    /// Load config from `.snipsync.toml` in the given root directory.
    /// Returns the defaults if the file doesn't exist. Returns an error
    /// if the file exists but is malformed: never silently falls back
    /// to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".snipsync.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::defaults()),
            Err(e) => return Err(Error::Io(e)),
        };

        let raw: SnipsyncTomlConfig = toml::from_str(&content)?;
        let mut config = Self::defaults();

        if let Some(docs) = raw.docs {
            config.docs_root = PathBuf::from(docs);
        }
        config.exclude = raw.exclude;
        if let Some(fail_fast) = raw.fail_fast {
            config.fail_fast = fail_fast;
        }
        if let Some(fences) = raw.fences {
            config.fences = fences;
        }
        config.pseudo_warn_ratio = raw.pseudo_warn_ratio;
        if let Some(region) = raw.region {
            if let Some(end) = region.end {
                config.region_end = end;
            }
            if let Some(start) = region.start {
                config.region_start = start;
            }
        }
        if let Some(samples) = raw.samples {
            config.samples_root = PathBuf::from(samples);
        }
        if let Some(workers) = raw.workers {
            config.workers = workers.max(1);
        }

        Ok(config)
    }

    /// The convention-over-configuration defaults: docs under `docs/`,
    /// samples under `docs/samples/`, C# fences and region delimiters.
    fn defaults() -> Self {
        Self {
            docs_root: PathBuf::from("docs"),
            exclude: Vec::new(),
            fail_fast: false,
            fences: vec!["csharp".to_string(), "cs".to_string()],
            pseudo_warn_ratio: None,
            region_end: DEFAULT_REGION_END.to_string(),
            region_start: DEFAULT_REGION_START.to_string(),
            samples_root: PathBuf::from("docs/samples"),
            workers: default_workers(),
        }
    }

    /// The fence tag used when rendering resolved snippet interiors.
    pub fn render_fence(&self) -> &str {
        self.fences.first().map_or("", String::as_str)
    }

    /// Check whether a docs-root-relative markdown path should be
    /// scanned. A path is skipped if it starts with any exclude prefix.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        !self.exclude.iter().any(|p| relative_path.starts_with(p.as_str()))
    }
}

/// Worker count default: one task per available core.
fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.docs_root, PathBuf::from("docs"));
        assert_eq!(config.samples_root, PathBuf::from("docs/samples"));
        assert_eq!(config.fences, vec!["csharp".to_string(), "cs".to_string()]);
        assert!(!config.fail_fast);
    }

    #[test]
    fn malformed_config_is_an_error_not_a_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".snipsync.toml"), "docs = [not toml").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn exclude_prefixes_filter_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".snipsync.toml"),
            "exclude = [\"archive/\", \"todo/\"]\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.should_scan("guide.md"));
        assert!(!config.should_scan("archive/old.md"));
        assert!(!config.should_scan("todo/2024-01.md"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".snipsync.toml"),
            "docs = \".\"\nsamples = \"samples\"\nfences = [\"rust\"]\nworkers = 2\n\n[region]\nstart = '^// region (?P<name>\\S+)$'\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.docs_root, PathBuf::from("."));
        assert_eq!(config.samples_root, PathBuf::from("samples"));
        assert_eq!(config.render_fence(), "rust");
        assert_eq!(config.workers, 2);
        assert_eq!(config.region_start, "^// region (?P<name>\\S+)$");
        assert_eq!(config.region_end, DEFAULT_REGION_END);
    }
}

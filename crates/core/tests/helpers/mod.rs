//! Test harness for end-to-end generator runs.
//!
//! Copies a fixture block library into a temp dir and runs the pipeline on it
//! in-process, starting from the library's `lib/` directory so that `include/`
//! and `grc/` are found by walking upward.

pub mod fixtures;

use blockgen_core::types::BlockDescriptor;
use blockgen_core::{run, FatalError, GeneratorConfig, RunOptions, RunOutput};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestProject {
    pub config: GeneratorConfig,
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestProject {
    /// Create a project from a named fixture directory.
    pub fn from_fixture(name: &str) -> Self {
        let fixture_src = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
        assert!(fixture_src.exists(), "Fixture '{name}' not found at {}", fixture_src.display());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        fixtures::copy_dir_recursive(&fixture_src, &root);
        std::fs::create_dir_all(root.join("lib")).expect("Failed to create lib dir");

        Self { config: GeneratorConfig::default(), _temp_dir: temp_dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add or replace a file inside the project.
    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) {
        fixtures::write_file(&self.root, rel, content);
    }

    pub fn try_run(&self, target: Option<&str>) -> Result<RunOutput, FatalError> {
        let options = RunOptions { roots: vec![self.root.join("lib")], target: target.map(str::to_string) };
        run(&options, &self.config)
    }

    pub fn run(&self) -> RunOutput {
        self.try_run(Some("gnuradio-demo")).expect("generator run failed")
    }
}

/// The descriptor registered at `path`.
pub fn descriptor<'a>(output: &'a RunOutput, path: &str) -> &'a BlockDescriptor {
    output
        .descriptors
        .iter()
        .find(|d| d.path == path)
        .unwrap_or_else(|| panic!("no descriptor at {path}; have {:?}", paths(output)))
}

pub fn paths(output: &RunOutput) -> Vec<&str> {
    output.descriptors.iter().map(|d| d.path.as_str()).collect()
}

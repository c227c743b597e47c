use std::path::PathBuf;

use tixi_rs::{LibraryConfig, TixiDocument};

use super::mocks::RecordingBackend;

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    /// Document whose wing definitions live in an external data file
    pub fn aircraft(&self) -> PathBuf {
        self.fixtures_dir.join("aircraft.xml")
    }

    pub fn wings_directory(&self) -> PathBuf {
        self.fixtures_dir.join("external")
    }

    pub fn aircraft_schema(&self) -> PathBuf {
        self.fixtures_dir.join("aircraft.xsd")
    }
}

/// A document bound to a recording backend through `import_from_string`
pub fn imported_document(
    backend: &RecordingBackend,
) -> TixiDocument<RecordingBackend> {
    let mut document = TixiDocument::with_backend(backend.clone());
    assert!(document.import_from_string("<plane><name>glider</name></plane>"));
    document
}

/// Library configuration for the real-library tests; honours `TIXI_LIBRARY_PATH`
pub fn native_library_config() -> LibraryConfig {
    LibraryConfig {
        path: std::env::var_os("TIXI_LIBRARY_PATH").map(PathBuf::from),
        ..LibraryConfig::default()
    }
}

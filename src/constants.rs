//! Constants shared across forgegraph modules.

/// Extension assumed when a coordinate does not carry `@extension`.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Prefix added to every group written to the synthetic repository.
///
/// Entries therefore never shadow real published coordinates.
pub const DUMMY_GROUP_PREFIX: &str = "fg_dummy_fg.";

/// Version of the synthetic repository descriptor format.
///
/// Bumping it changes the descriptor file name, so descriptors written by an
/// older release are ignored instead of being reused.
pub const IVY_METADATA_VERSION: u32 = 3;

/// Directory (relative to the build directory) holding the synthetic repository.
pub const DEFAULT_REPOSITORY_DIR: &str = "libs";

/// Manifest attribute flagging a jar as obfuscated.
pub const OBFUSCATED_ATTRIBUTE: &str = "Obfuscated";

/// Manifest attribute naming the tool that obfuscated a jar.
pub const OBFUSCATED_BY_ATTRIBUTE: &str = "Obfuscated-By";

/// Tool identity expected in [`OBFUSCATED_BY_ATTRIBUTE`].
pub const OBFUSCATED_BY_VALUE: &str = "ForgeGradle";

/// Location of the manifest inside a jar.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Name of the step manifest inside a runtime archive.
pub const RUNTIME_CONFIG_FILE: &str = "config.json";

/// Step whose output is exposed as the raw (compiled) jar unless configured otherwise.
pub const DEFAULT_RAW_STEP: &str = "rename";

/// Suffix of the file holding a task's up-to-date fingerprint.
pub const FINGERPRINT_EXTENSION: &str = "fingerprint";

/// Default number of tasks executed concurrently.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "forgegraph.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "FORGEGRAPH_CONFIG";

//! Host configuration.
//!
//! Browsers start the host with no useful arguments and an arbitrary working
//! directory, so configuration comes from a `host.toml` next to the executable
//! (or the file named by `HUB_HOST_CONFIG`). Every field has a default; a
//! missing file is not an error.
//!
//! ```toml
//! [worker]
//! program = "dart"
//! args = ["run", "bin/hub.dart"]
//! working_dir = "."
//! max_capture_bytes = 1048576
//!
//! [host]
//! dispatch = "concurrent"
//! max_message_bytes = 67108864
//! startup_log = "native_host_log.txt"
//! ```
//!
//! Relative paths resolve against the directory holding the config file, or
//! the install directory when there is no file.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::host::frame::{MAX_FROM_BROWSER, MAX_TO_BROWSER};
use crate::worker::WorkerCommand;

pub const CONFIG_ENV: &str = "HUB_HOST_CONFIG";
pub const CONFIG_FILE_NAME: &str = "host.toml";
pub const DEFAULT_STARTUP_LOG: &str = "native_host_log.txt";

/// Whether a dispatch must finish before the next frame is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One task per request; responses may arrive out of order.
    #[default]
    Concurrent,
    /// One request at a time, responses in request order.
    Serial,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSection {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub max_capture_bytes: usize,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dart"),
            args: vec!["run".to_owned(), "bin/hub.dart".to_owned()],
            working_dir: None,
            max_capture_bytes: MAX_TO_BROWSER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostSection {
    pub dispatch: DispatchMode,
    pub max_message_bytes: usize,
    pub startup_log: Option<PathBuf>,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::default(),
            max_message_bytes: MAX_FROM_BROWSER,
            startup_log: Some(PathBuf::from(DEFAULT_STARTUP_LOG)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub worker: WorkerSection,
    pub host: HostSection,
    /// Anchor for relative paths. `None` when it could not be determined.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Directory holding the running executable.
pub fn install_dir() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    exe.parent().map(Path::to_path_buf)
}

impl HostConfig {
    /// Defaults anchored at `base_dir`.
    pub fn with_base_dir(base_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str, base_dir: Option<PathBuf>) -> Result<Self, toml::de::Error> {
        let mut config: HostConfig = toml::from_str(raw)?;
        config.base_dir = base_dir;
        Ok(config)
    }

    /// Load a specific file. Relative paths inside it resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf);
        Self::from_toml_str(&raw, base_dir).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `$HUB_HOST_CONFIG`, else `host.toml` in the install directory, else defaults.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Self::load(Path::new(&path));
        }
        let install = install_dir();
        if let Some(candidate) = install.as_ref().map(|d| d.join(CONFIG_FILE_NAME)) {
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }
        Ok(Self::with_base_dir(install))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// The worker invocation, with relative paths anchored.
    ///
    /// A bare program name such as `dart` is left alone for `PATH` lookup.
    pub fn worker_command(&self) -> WorkerCommand {
        let program = if self.worker.program.components().count() > 1 {
            self.resolve(&self.worker.program)
        } else {
            self.worker.program.clone()
        };
        WorkerCommand {
            program,
            args: self.worker.args.clone(),
            working_dir: self.worker.working_dir.as_deref().map(|d| self.resolve(d)),
            max_capture_bytes: self.worker.max_capture_bytes,
        }
    }

    /// Where the startup line goes, or `None` when disabled or unanchored.
    pub fn startup_log_path(&self) -> Option<PathBuf> {
        let path = self.host.startup_log.as_deref()?;
        if path.as_os_str().is_empty() {
            return None;
        }
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }
        self.base_dir.as_ref().map(|base| base.join(path))
    }
}

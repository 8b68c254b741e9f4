//! Shared context for a harness run: configuration, launcher, artifact
//! cache and the installed tool version.

use crate::cache::LocalArtifactCache;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::invoker::discovery;
use crate::invoker::{ExecutionMode, Launcher, ProcessInvoker};
use crate::version::{ToolVersion, VersionRange};
use crate::verifier::Verifier;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    invoker: ProcessInvoker,
    cache: LocalArtifactCache,
    tool_version: ToolVersion,
}

impl Harness {
    /// Build from configuration alone, launching an isolated executable.
    ///
    /// # Errors
    ///
    /// `NoEmbeddedTool` when the configured mode is embedded, `ToolNotFound`
    /// or `ToolVersionUnknown` when discovery fails.
    pub fn from_config(config: HarnessConfig) -> Result<Self> {
        if config.mode == ExecutionMode::Embedded {
            return Err(HarnessError::NoEmbeddedTool);
        }
        let executable = discovery::resolve_executable(config.tool_executable.as_deref())?;
        Self::new(config, Launcher::isolated(executable))
    }

    /// Build with an explicit launcher.
    ///
    /// The tool version comes from `tool.version` when configured, otherwise
    /// from the embedded tool or a `--version` probe.
    ///
    /// # Errors
    ///
    /// Version discovery or parse failures.
    pub fn new(config: HarnessConfig, launcher: Launcher) -> Result<Self> {
        let tool_version = match (&config.tool_version, &launcher) {
            (Some(configured), _) => ToolVersion::parse(configured)?,
            (None, Launcher::Embedded(tool)) => ToolVersion::parse(&tool.version())?,
            (None, Launcher::Isolated { executable }) => discovery::probe_version(executable)?,
        };
        Ok(Self::with_version(config, launcher, tool_version))
    }

    #[must_use]
    pub fn with_version(config: HarnessConfig, launcher: Launcher, tool_version: ToolVersion) -> Self {
        info!(
            mode = %launcher.mode(),
            version = %tool_version,
            local_repo = %config.local_repo.display(),
            "Harness ready"
        );
        Self {
            cache: LocalArtifactCache::new(config.local_repo.clone()),
            invoker: ProcessInvoker::new(launcher),
            config,
            tool_version,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub const fn invoker(&self) -> &ProcessInvoker {
        &self.invoker
    }

    #[must_use]
    pub const fn cache(&self) -> &LocalArtifactCache {
        &self.cache
    }

    #[must_use]
    pub const fn tool_version(&self) -> &ToolVersion {
        &self.tool_version
    }

    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.invoker.mode()
    }

    /// Whether the installed tool falls in `range`.
    ///
    /// # Errors
    ///
    /// `InvalidRange` for malformed expressions.
    pub fn matches_version_range(&self, range: &str) -> Result<bool> {
        Ok(VersionRange::parse(range)?.contains(&self.tool_version))
    }

    /// Verifier rooted at `base_dir`.
    #[must_use]
    pub fn verifier(&self, base_dir: impl Into<PathBuf>) -> Verifier<'_> {
        Verifier::new(self, base_dir)
    }
}

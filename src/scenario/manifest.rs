//! Scenarios described as YAML data.
//!
//! ```yaml
//! fixtures: fixtures
//! scenarios:
//!   - name: mng-4720
//!     range: "[2.0.6,)"
//!     fixture: mng-4720
//!     delete-artifacts: [org.apache.maven.its.mng4720]
//!     shares: [org.apache.maven.its.plugins]
//!     settings: { template: settings-template.xml, output: settings.xml }
//!     args: [-s, settings.xml, validate]
//!     expect:
//!       - lines:
//!           - file: target/classpath.txt
//!             contains: [a-0.1.jar, c-0.1.jar]
//!             excludes: [b-0.1.jar]
//!       - when: "[4.0.0-beta-5,)"
//!         lines:
//!           - file: target/classpath.txt
//!             excludes: [d-0.1.jar]
//! ```

use super::{Scenario, ScenarioContext};
use crate::assertions::{assert_lines_contain, assert_lines_exclude};
use crate::error::{HarnessError, Result};
use crate::template::{FilterProperties, TextEncoding};
use crate::verifier::Verifier;
use crate::version::VersionRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SuiteManifest {
    #[serde(default)]
    pub name: Option<String>,
    /// Directory fixture names resolve against, relative to the manifest.
    #[serde(default)]
    pub fixtures: Option<PathBuf>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub disabled: Option<String>,
    #[serde(default)]
    pub serial: bool,
    #[serde(default)]
    pub fixture: Option<PathBuf>,
    /// Sub-directory of the fixture the main invocation runs in.
    #[serde(default)]
    pub project: Option<PathBuf>,
    #[serde(default)]
    pub autoclean: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub delete_directories: Vec<PathBuf>,
    #[serde(default)]
    pub delete_artifacts: Vec<String>,
    /// Cache groups installed into or resolved from without being cleaned.
    /// Together with `delete-artifacts` they keep the scenario out of the
    /// parallel pool when another scenario touches the same groups.
    #[serde(default)]
    pub shares: Vec<String>,
    #[serde(default)]
    pub settings: Option<SettingsSpec>,
    /// Invocations that run before the main one, e.g. installing a plugin.
    #[serde(default)]
    pub setup: Vec<InvocationStep>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub verify_error_free_log: bool,
    #[serde(default)]
    pub expect: Vec<Expectation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SettingsSpec {
    pub template: PathBuf,
    #[serde(default = "default_settings_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub properties: FilterProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct InvocationStep {
    #[serde(default)]
    pub project: Option<PathBuf>,
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub verify_error_free_log: bool,
}

/// Post-run checks, optionally conditional on the tool version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Expectation {
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub present: Vec<PathBuf>,
    #[serde(default)]
    pub absent: Vec<PathBuf>,
    #[serde(default)]
    pub lines: Vec<LinesExpectation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LinesExpectation {
    pub file: PathBuf,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

const fn default_true() -> bool {
    true
}

fn default_settings_output() -> PathBuf {
    PathBuf::from("settings.xml")
}

fn parse_encoding(name: Option<&str>) -> Result<TextEncoding> {
    name.map_or(Ok(TextEncoding::Utf8), str::parse)
}

impl SuiteManifest {
    /// Read a manifest file.
    ///
    /// # Errors
    ///
    /// `Manifest` for unreadable or malformed files.
    pub fn load(path: &Path) -> Result<Self> {
        let invalid = |reason: String| HarnessError::Manifest {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|err| invalid(err.to_string()))?;
        let manifest = Self::parse(&text).map_err(|err| invalid(err.to_string()))?;
        manifest.validate().map_err(|err| invalid(err.to_string()))?;
        Ok(manifest)
    }

    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// YAML errors.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Check names, ranges and encodings up front so problems surface
    /// before anything runs.
    ///
    /// # Errors
    ///
    /// The first problem found.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for spec in &self.scenarios {
            if spec.name.trim().is_empty() {
                return Err(HarnessError::Config("scenario without a name".to_string()));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(HarnessError::Config(format!(
                    "duplicate scenario name '{}'",
                    spec.name
                )));
            }
            if let Some(range) = &spec.range {
                VersionRange::parse(range)?;
            }
            if let Some(settings) = &spec.settings {
                parse_encoding(settings.encoding.as_deref())?;
            }
            for expectation in &spec.expect {
                if let Some(when) = &expectation.when {
                    VersionRange::parse(when)?;
                }
                for lines in &expectation.lines {
                    parse_encoding(lines.encoding.as_deref())?;
                }
            }
        }
        Ok(())
    }

    /// Turn every entry into a runnable [`Scenario`].
    ///
    /// Fixture paths resolve against `fixtures`, which in turn resolves
    /// against `manifest_dir`.
    ///
    /// # Errors
    ///
    /// `InvalidRange` for malformed ranges.
    pub fn into_scenarios(self, manifest_dir: &Path) -> Result<Vec<Scenario>> {
        let fixture_root = self
            .fixtures
            .as_ref()
            .map_or_else(|| manifest_dir.to_path_buf(), |dir| manifest_dir.join(dir));

        self.scenarios
            .into_iter()
            .map(|spec| spec.into_scenario(&fixture_root))
            .collect()
    }
}

impl ScenarioSpec {
    /// # Errors
    ///
    /// `InvalidRange` for a malformed range.
    pub fn into_scenario(self, fixture_root: &Path) -> Result<Scenario> {
        let range = self.range.clone();
        let description = self.description.clone();
        let disabled = self.disabled.clone();
        let fixture = self.fixture.as_ref().map(|f| fixture_root.join(f));
        let tags = self.tags.clone();
        let serial = self.serial;
        let name = self.name.clone();
        let groups: Vec<String> = self
            .delete_artifacts
            .iter()
            .chain(&self.shares)
            .cloned()
            .collect();

        let mut scenario = Scenario::new(name, move |ctx| self.run(ctx))
            .with_tags(tags)
            .serial(serial)
            .sharing_groups(groups);
        if let Some(range) = range {
            scenario = scenario.with_range(&range)?;
        }
        if let Some(description) = description {
            scenario = scenario.with_description(description);
        }
        if let Some(reason) = disabled {
            scenario = scenario.disabled(reason);
        }
        if let Some(fixture) = fixture {
            scenario = scenario.with_fixture(fixture);
        }
        Ok(scenario)
    }

    fn base_verifier<'h>(&self, ctx: &ScenarioContext<'h>, project: Option<&Path>) -> Result<Verifier<'h>> {
        let mut verifier = match project {
            Some(dir) => ctx.verifier_in(dir)?,
            None => ctx.verifier(),
        };
        if let Some(autoclean) = self.autoclean {
            verifier.set_autoclean(autoclean);
        }
        if let Some(secs) = self.timeout_secs {
            verifier.set_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        Ok(verifier)
    }

    fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<()> {
        for step in &self.setup {
            let mut verifier = self.base_verifier(ctx, step.project.as_deref())?;
            verifier.add_cli_arguments(step.args.iter().cloned());
            for (key, value) in &step.env {
                verifier.set_env(key.clone(), value.clone());
            }
            debug!(scenario = %self.name, args = ?step.args, "Running setup invocation");
            verifier.execute()?;
            if step.verify_error_free_log {
                verifier.verify_error_free_log()?;
            }
        }

        let mut verifier = self.base_verifier(ctx, self.project.as_deref())?;

        for dir in &self.delete_directories {
            verifier.delete_directory(dir)?;
        }
        for group in &self.delete_artifacts {
            verifier.delete_artifacts(group)?;
        }
        if let Some(settings) = &self.settings {
            verifier.filter_file(
                &settings.template,
                &settings.output,
                parse_encoding(settings.encoding.as_deref())?,
                &settings.properties,
            )?;
        }

        if !self.args.is_empty() {
            verifier.add_cli_arguments(self.args.iter().cloned());
            for (key, value) in &self.env {
                verifier.set_env(key.clone(), value.clone());
            }
            verifier.execute()?;
            if self.verify_error_free_log {
                verifier.verify_error_free_log()?;
            }
        }

        for expectation in &self.expect {
            if let Some(when) = &expectation.when {
                if !ctx.matches_version_range(when)? {
                    continue;
                }
            }
            check_expectation(&verifier, expectation)?;
        }
        Ok(())
    }
}

fn check_expectation(verifier: &Verifier<'_>, expectation: &Expectation) -> Result<()> {
    for path in &expectation.present {
        verifier.assert_file_present(path)?;
    }
    for path in &expectation.absent {
        verifier.assert_file_not_present(path)?;
    }
    for listing in &expectation.lines {
        let encoding = parse_encoding(listing.encoding.as_deref())?;
        let lines = verifier.load_lines(&listing.file, encoding)?;
        let source = verifier.base_dir().join(&listing.file);
        for entry in &listing.contains {
            assert_lines_contain(&lines, entry, &source)?;
        }
        for entry in &listing.excludes {
            assert_lines_exclude(&lines, entry, &source)?;
        }
    }
    Ok(())
}

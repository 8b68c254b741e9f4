//! On-disk fixture projects and harness construction for the suites.

use super::fake_tool::MiniMaven;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use toolcheck::Harness;
use toolcheck::config::HarnessConfig;
use toolcheck::invoker::Launcher;
use toolcheck::version::ToolVersion;

pub const SETTINGS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<settings>
  <localRepository>@localrepo@</localRepository>
  <profiles>
    <profile>
      <id>maven-core-it-repo</id>
      <repositories>
        <repository>
          <id>maven-core-it</id>
          <url>@baseurl@/repo</url>
        </repository>
      </repositories>
    </profile>
  </profiles>
  <activeProfiles>
    <activeProfile>maven-core-it-repo</activeProfile>
  </activeProfiles>
</settings>
"#;

fn pom(artifact: &str) -> String {
    format!(
        "<project>\n  <groupId>org.apache.maven.its</groupId>\n  <artifactId>{artifact}</artifactId>\n  <version>0.1</version>\n</project>\n"
    )
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("fixture parent")).expect("create fixture dir");
    fs::write(path, contents).expect("write fixture file");
}

/// Temporary tree holding fixtures, a work dir and a local repository.
pub struct FixtureRoot {
    pub temp_dir: TempDir,
    pub fixtures: PathBuf,
    pub work_dir: PathBuf,
    pub local_repo: PathBuf,
}

impl FixtureRoot {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        let fixtures = root.join("fixtures");

        write(&fixtures.join("mng-0449/settings-template.xml"), SETTINGS_TEMPLATE);
        write(&fixtures.join("mng-0449/lifecycle/pom.xml"), &pom("lifecycle"));
        write(&fixtures.join("mng-0449/direct/pom.xml"), &pom("direct"));

        write(&fixtures.join("mng-4720/settings-template.xml"), SETTINGS_TEMPLATE);
        write(&fixtures.join("mng-4720/pom.xml"), &pom("test"));

        for module in ["extension", "plugin", "project"] {
            write(&fixtures.join(format!("mng-2771/{module}/pom.xml")), &pom(module));
        }

        let local_repo = root.join("repo");
        fs::create_dir_all(&local_repo).expect("local repo");
        Self {
            fixtures,
            work_dir: root.join("work"),
            local_repo,
            temp_dir,
        }
    }

    pub fn fixture(&self, name: &str) -> PathBuf {
        self.fixtures.join(name)
    }

    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            local_repo: self.local_repo.clone(),
            work_dir: self.work_dir.clone(),
            ..HarnessConfig::default()
        }
    }

    /// Harness running [`MiniMaven`] in-process at `version`.
    pub fn embedded_harness(&self, version: &str) -> Harness {
        Harness::new(self.config(), Launcher::embedded(MiniMaven::new(version)))
            .expect("embedded harness")
    }

    /// Harness launching `executable` as a child process at a pinned version.
    pub fn isolated_harness(&self, executable: &Path, version: &str) -> Harness {
        Harness::with_version(
            self.config(),
            Launcher::isolated(executable),
            ToolVersion::parse(version).expect("tool version"),
        )
    }

    /// Seed the local repository with artifacts of `group`.
    pub fn seed_group(&self, group: &str, artifacts: &[&str]) {
        let group_dir = self.local_repo.join(group.replace('.', "/"));
        for artifact in artifacts {
            let dir = group_dir.join(artifact).join("0.1");
            write(&dir.join(format!("{artifact}-0.1.jar")), "jar");
            write(&dir.join(format!("{artifact}-0.1.pom")), &pom(artifact));
        }
    }
}

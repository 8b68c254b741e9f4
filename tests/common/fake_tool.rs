//! A tiny Maven look-alike used as the tool under test.
//!
//! It understands just enough of the command line to reproduce the
//! version-dependent behaviour the regression scenarios check:
//!
//! - `validate` and the `maven-it-plugin-a:touch` goal write
//!   `target/touch-release.txt` from 3.0-alpha-3 on, and
//!   `target/touch-snapshot.txt` before that.
//! - `validate` also writes `target/package.txt` and `target/classpath.txt`.
//!   The classpath drops `d-0.1.jar` from 4.0.0-beta-5 on unless
//!   `-Dmaven.resolver.dependencyManagerTransitivity=false` is passed.
//! - `install` drops a jar named after the project directory into the
//!   local repository; `verify` fails unless `extension` and `plugin` were
//!   installed first.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use toolcheck::invoker::EmbeddedTool;
use toolcheck::version::VersionRange;

pub const TOUCH_GOAL: &str = "org.apache.maven.its.mng0449:maven-it-plugin-a:touch";
/// Logs an `[ERROR]` line but lets the build succeed.
pub const LOG_ERROR_GOAL: &str = "org.apache.maven.its:maven-it-plugin-log:error";
pub const TRANSITIVITY_PROPERTY: &str = "maven.resolver.dependencyManagerTransitivity";
pub const ITS_GROUP_PATH: &str = "org/apache/maven/its";

#[derive(Debug, Clone)]
pub struct MiniMaven {
    version: String,
}

impl MiniMaven {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    fn in_range(&self, range: &str) -> bool {
        VersionRange::parse(range)
            .and_then(|r| r.matches_str(&self.version))
            .expect("fake tool range")
    }

    fn touch(&self, target: &Path) -> std::io::Result<()> {
        let name = if self.in_range("[3.0-alpha-3,)") {
            "touch-release.txt"
        } else {
            "touch-snapshot.txt"
        };
        fs::write(target.join(name), "touched\n")
    }

    fn classpath(&self, props: &BTreeMap<String, String>) -> Vec<&'static str> {
        let transitive = props.get(TRANSITIVITY_PROPERTY).map(String::as_str) != Some("false");
        let mut entries = vec!["a-0.1.jar", "c-0.1.jar"];
        if !(transitive && self.in_range("[4.0.0-beta-5,)")) {
            entries.push("d-0.1.jar");
        }
        entries
    }
}

#[derive(Default)]
struct ParsedArgs {
    goals: Vec<String>,
    props: BTreeMap<String, String>,
    settings: Option<String>,
    show_version: bool,
}

fn parse_args(args: &[String]) -> ParsedArgs {
    let mut parsed = ParsedArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-s" | "--settings" => parsed.settings = iter.next().cloned(),
            "--version" | "-v" => parsed.show_version = true,
            other if other.starts_with("-D") => {
                let (key, value) = other[2..].split_once('=').unwrap_or((&other[2..], "true"));
                parsed.props.insert(key.to_string(), value.to_string());
            }
            other if other.starts_with('-') => {}
            goal => parsed.goals.push(goal.to_string()),
        }
    }
    parsed
}

fn fail(out: &mut dyn Write, message: &str) -> i32 {
    let _ = writeln!(out, "[ERROR] {message}");
    let _ = writeln!(out, "[INFO] BUILD FAILURE");
    1
}

impl EmbeddedTool for MiniMaven {
    fn version(&self) -> String {
        self.version.clone()
    }

    fn run(
        &self,
        args: &[String],
        working_dir: &Path,
        _env: &BTreeMap<String, String>,
        out: &mut dyn Write,
    ) -> i32 {
        let parsed = parse_args(args);
        if parsed.show_version {
            let _ = writeln!(out, "Apache Maven {}", self.version);
            return 0;
        }

        let _ = writeln!(out, "[INFO] Scanning for projects...");
        if let Some(settings) = &parsed.settings {
            let path = working_dir.join(settings);
            match fs::read_to_string(&path) {
                Ok(text) if text.contains('@') => {
                    return fail(out, &format!("Unresolved placeholder in {}", path.display()));
                }
                Ok(_) => {}
                Err(_) => {
                    return fail(
                        out,
                        &format!("The specified user settings file does not exist: {}", path.display()),
                    );
                }
            }
        }
        if parsed.goals.is_empty() {
            return fail(out, "No goals have been specified for this build.");
        }

        let target = working_dir.join("target");
        let repo = parsed
            .props
            .get("maven.repo.local")
            .map(PathBuf::from)
            .unwrap_or_else(|| working_dir.join(".m2"));

        for goal in &parsed.goals {
            let _ = writeln!(out, "[INFO] --- {goal} ---");
            let step = match goal.as_str() {
                g if g == "clean" || g.ends_with(":clean") => match fs::remove_dir_all(&target) {
                    Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
                    _ => Ok(()),
                },
                "validate" => fs::create_dir_all(&target).and_then(|()| {
                    self.touch(&target)?;
                    fs::write(target.join("package.txt"), "package\n")?;
                    fs::write(target.join("classpath.txt"), self.classpath(&parsed.props).join("\n"))
                }),
                TOUCH_GOAL => fs::create_dir_all(&target).and_then(|()| self.touch(&target)),
                LOG_ERROR_GOAL => {
                    let _ = writeln!(out, "[ERROR] Parameter 'outputFile' is deprecated");
                    Ok(())
                }
                "install" => {
                    let artifact = working_dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let dir = repo.join(ITS_GROUP_PATH).join(&artifact).join("0.1");
                    let _ = writeln!(out, "[INFO] Installing {artifact} to {}", dir.display());
                    fs::create_dir_all(&dir)
                        .and_then(|()| fs::write(dir.join(format!("{artifact}-0.1.jar")), "jar"))
                }
                "verify" => {
                    for needed in ["extension", "plugin"] {
                        if !repo.join(ITS_GROUP_PATH).join(needed).exists() {
                            return fail(out, &format!("Missing installed artifact '{needed}'"));
                        }
                    }
                    Ok(())
                }
                other => return fail(out, &format!("Unknown lifecycle phase \"{other}\"")),
            };
            if let Err(err) = step {
                return fail(out, &err.to_string());
            }
        }

        let _ = writeln!(out, "[INFO] BUILD SUCCESS");
        0
    }
}

/// Shell script with the same surface as [`MiniMaven`] for isolated runs.
#[cfg(unix)]
pub fn write_script_tool(dir: &Path, version: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "Apache Maven {version} (fake)"
  exit 0
fi
echo "[INFO] Scanning for projects..."
for arg in "$@"; do
  case "$arg" in
    fail)
      echo "[ERROR] Failed to execute goal"
      echo "[INFO] BUILD FAILURE"
      exit 1
      ;;
    warn-error)
      echo "[ERROR] something looked wrong"
      ;;
    sleep)
      sleep 5
      ;;
    validate)
      mkdir -p target
      echo touched > target/touch-release.txt
      printf 'a-0.1.jar\nc-0.1.jar\n' > target/classpath.txt
      ;;
  esac
done
echo "[INFO] BUILD SUCCESS"
"#
    );
    let path = dir.join("mvn");
    fs::write(&path, script).expect("write script tool");
    let mut perms = fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script tool");
    path
}

//! Node project inspection
//!
//! Chooses the package manager from the lockfile and picks a dev-server launch
//! plan from `package.json` scripts and dependencies.

use crate::fs::FileSystem;
use crate::process::CommandSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const VITE_CONFIGS: &[&str] = &[
    "vite.config.ts",
    "vite.config.js",
    "vite.config.mts",
    "vite.config.mjs",
    "vite.config.cjs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManager {
    /// Picks the package manager matching the lockfile present in `dir`
    pub fn detect<F: FileSystem>(fs: &F, dir: &Path) -> Self {
        if fs.is_file(&dir.join("pnpm-lock.yaml")) {
            PackageManager::Pnpm
        } else if fs.is_file(&dir.join("yarn.lock")) {
            PackageManager::Yarn
        } else if fs.has_any_file(dir, &["bun.lockb", "bun.lock"]) {
            PackageManager::Bun
        } else {
            PackageManager::Npm
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Bun => "bun",
        }
    }

    /// Dependency installation command
    pub fn install(&self, dir: &Path, has_npm_lockfile: bool) -> CommandSpec {
        let cmd = CommandSpec::new(self.program()).current_dir(dir);
        match self {
            PackageManager::Npm if has_npm_lockfile => cmd.arg("ci"),
            _ => cmd.arg("install"),
        }
    }

    /// Runs a package binary, e.g. `npx vite`
    fn exec(&self, binary: &str) -> CommandSpec {
        match self {
            PackageManager::Npm => CommandSpec::new("npx").arg(binary),
            PackageManager::Yarn => CommandSpec::new("yarn").arg(binary),
            PackageManager::Pnpm => CommandSpec::new("pnpm").args(["exec", binary]),
            PackageManager::Bun => CommandSpec::new("bunx").arg(binary),
        }
    }

    fn run_script(&self, script: &str) -> CommandSpec {
        match self {
            PackageManager::Npm | PackageManager::Pnpm | PackageManager::Bun => {
                CommandSpec::new(self.program()).args(["run", script])
            }
            PackageManager::Yarn => CommandSpec::new("yarn").arg(script),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLaunchKind {
    Vite,
    Next,
    DevScript,
    StartScript,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLaunchPlan {
    pub kind: NodeLaunchKind,
    pub command: CommandSpec,
}

#[derive(Debug, Clone)]
pub struct NodeProject {
    pub dir: PathBuf,
    pub package_manager: PackageManager,
    pub has_npm_lockfile: bool,
    pub has_vite_config: bool,
    scripts: BTreeMap<String, String>,
    dependencies: Vec<String>,
}

impl NodeProject {
    pub fn load<F: FileSystem>(fs: &F, dir: &Path) -> Result<Self> {
        let manifest_path = dir.join("package.json");
        let raw = fs.read_to_string(&manifest_path)?;
        let manifest: PackageJson = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

        let dependencies = manifest
            .dependencies
            .keys()
            .chain(manifest.dev_dependencies.keys())
            .cloned()
            .collect();

        Ok(Self {
            dir: dir.to_path_buf(),
            package_manager: PackageManager::detect(fs, dir),
            has_npm_lockfile: fs.is_file(&dir.join("package-lock.json")),
            has_vite_config: fs.has_any_file(dir, VITE_CONFIGS),
            scripts: manifest.scripts,
            dependencies,
        })
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    pub fn install_command(&self) -> CommandSpec {
        self.package_manager.install(&self.dir, self.has_npm_lockfile)
    }

    /// Chooses how to start the dev server on `port`, bound to all interfaces.
    /// Returns `None` when the manifest offers nothing runnable.
    pub fn launch_plan(&self, port: u16) -> Option<NodeLaunchPlan> {
        let port_str = port.to_string();
        let pm = self.package_manager;

        let (kind, command) = if self.has_vite_config && self.has_script("dev") {
            (
                NodeLaunchKind::Vite,
                pm.exec("vite")
                    .args(["--host", "0.0.0.0", "--port", &port_str, "--strictPort"]),
            )
        } else if self.depends_on("next") && self.has_script("dev") {
            (
                NodeLaunchKind::Next,
                pm.exec("next").args(["dev", "-H", "0.0.0.0", "-p", &port_str]),
            )
        } else if self.has_script("dev") {
            (NodeLaunchKind::DevScript, pm.run_script("dev"))
        } else if self.has_script("start") {
            (
                NodeLaunchKind::StartScript,
                CommandSpec::new(pm.program()).arg("start"),
            )
        } else {
            return None;
        };

        let command = command
            .current_dir(&self.dir)
            .env("PORT", &port_str)
            .env("HOST", "0.0.0.0")
            .env("HOSTNAME", "0.0.0.0")
            .env("BROWSER", "none");

        Some(NodeLaunchPlan { kind, command })
    }
}

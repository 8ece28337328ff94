//! Python project inspection

use crate::config::InstallMode;
use crate::fs::FileSystem;
use crate::process::CommandSpec;
use std::path::{Path, PathBuf};

const DEPENDENCY_FILES: &[&str] = &[
    "requirements.txt",
    "requirements-dev.txt",
    "pyproject.toml",
    "Pipfile",
    "setup.py",
];

/// Which server drives a generic Python web app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFlavor {
    /// uvicorn (FastAPI, Starlette and other ASGI apps)
    Asgi,
    /// `flask run`
    Wsgi,
}

#[derive(Debug, Clone)]
pub struct PythonProject {
    pub dir: PathBuf,
    pub flavor: ServerFlavor,
    requirements: Option<&'static str>,
    installable: bool,
}

impl PythonProject {
    pub fn load<F: FileSystem>(fs: &F, dir: &Path) -> Self {
        let dependency_text = DEPENDENCY_FILES
            .iter()
            .filter_map(|name| fs.read_to_string(&dir.join(name)).ok())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase();

        let flavor = if dependency_text.contains("fastapi") {
            ServerFlavor::Asgi
        } else if dependency_text.contains("flask") {
            ServerFlavor::Wsgi
        } else {
            ServerFlavor::Asgi
        };

        let requirements = ["requirements.txt", "requirements-dev.txt"]
            .into_iter()
            .find(|name| fs.is_file(&dir.join(name)));

        Self {
            dir: dir.to_path_buf(),
            flavor,
            requirements,
            installable: fs.has_any_file(dir, &["pyproject.toml", "setup.py"]),
        }
    }

    fn pip(&self, mode: InstallMode) -> CommandSpec {
        CommandSpec::new("python3")
            .args(["-m", "pip", "install", "--no-input"])
            .args(mode.pip_flags().iter().copied())
            .current_dir(&self.dir)
    }

    /// Dependency installation, requirements file first, then the project itself
    pub fn install_commands(&self, mode: InstallMode) -> Vec<CommandSpec> {
        if let Some(requirements) = self.requirements {
            vec![self.pip(mode).args(["-r", requirements])]
        } else if self.installable {
            vec![self.pip(mode).arg(".")]
        } else {
            Vec::new()
        }
    }

    /// Makes sure the server binary for the detected flavor is present
    pub fn server_install_command(&self, mode: InstallMode) -> CommandSpec {
        match self.flavor {
            ServerFlavor::Asgi => self.pip(mode).arg("uvicorn"),
            ServerFlavor::Wsgi => self.pip(mode).arg("flask"),
        }
    }

    /// Starts the server for `target` (`module:attr`) on `port`
    pub fn serve_command(&self, target: &str, factory: bool, port: u16) -> CommandSpec {
        let port = port.to_string();
        let cmd = match self.flavor {
            ServerFlavor::Asgi => {
                let cmd = CommandSpec::new("python3")
                    .args(["-m", "uvicorn", target, "--host", "0.0.0.0", "--port", &port]);
                if factory {
                    cmd.arg("--factory")
                } else {
                    cmd
                }
            }
            ServerFlavor::Wsgi => CommandSpec::new("python3").args([
                "-m", "flask", "--app", target, "run", "--host", "0.0.0.0", "--port", &port,
            ]),
        };
        cmd.current_dir(&self.dir).env("PYTHONUNBUFFERED", "1")
    }

    pub fn django_migrate(&self) -> CommandSpec {
        CommandSpec::new("python3")
            .args(["manage.py", "migrate", "--noinput"])
            .current_dir(&self.dir)
    }

    pub fn django_runserver(&self, port: u16) -> CommandSpec {
        CommandSpec::new("python3")
            .args(["manage.py", "runserver"])
            .arg(format!("0.0.0.0:{}", port))
            .current_dir(&self.dir)
            .env("PYTHONUNBUFFERED", "1")
    }
}

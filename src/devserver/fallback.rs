use crate::process::CommandSpec;
use std::path::Path;

/// Directory listing server, the terminal state of every failed branch
pub fn static_server_command(dir: &Path, port: u16) -> CommandSpec {
    CommandSpec::new("python3")
        .args(["-m", "http.server"])
        .arg(port.to_string())
        .args(["--bind", "0.0.0.0", "--directory"])
        .arg(dir.to_string_lossy())
        .current_dir(dir)
}

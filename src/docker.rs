//! Docker Engine API access for the compose path

use crate::compose::NetworkJoiner;
use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::network::ConnectNetworkOptions;
use bollard::service::EndpointSettings;
use bollard::Docker;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Docker daemon unavailable: {0}")]
    Unavailable(#[source] BollardError),

    #[error("Docker API error: {0}")]
    Api(String),

    #[error("Volume {0} reports no mountpoint")]
    NoMountpoint(String),

    #[error("{path} is not under the workspace root {root}")]
    OutsideWorkspace { path: PathBuf, root: PathBuf },
}

impl From<BollardError> for DockerError {
    fn from(e: BollardError) -> Self {
        DockerError::Api(e.to_string())
    }
}

/// Resolves where a named volume lives on the engine's host
#[async_trait]
pub trait VolumeInspector: Send + Sync {
    async fn volume_mountpoint(&self, volume: &str) -> Result<PathBuf, DockerError>;
}

pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    pub fn connect() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults().map_err(DockerError::Unavailable)?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl VolumeInspector for DockerClient {
    async fn volume_mountpoint(&self, volume: &str) -> Result<PathBuf, DockerError> {
        let info = self.docker.inspect_volume(volume).await?;
        if info.mountpoint.is_empty() {
            return Err(DockerError::NoMountpoint(volume.to_string()));
        }
        debug!(volume, mountpoint = %info.mountpoint, "Resolved volume mountpoint");
        Ok(PathBuf::from(info.mountpoint))
    }
}

#[async_trait]
impl NetworkJoiner for DockerClient {
    async fn join(&self, network: &str, container: &str) -> Result<(), DockerError> {
        let options = ConnectNetworkOptions {
            container,
            endpoint_config: EndpointSettings::default(),
        };
        match self.docker.connect_network(network, options).await {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError { message, .. })
                if message.contains("already exists") =>
            {
                debug!(network, "Container already attached");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Maps a path inside the shared workspace volume to the engine host's view.
/// `/workspace/app` with the volume mounted at `/workspace` and a mountpoint
/// of `/var/lib/docker/volumes/rv/_data` becomes
/// `/var/lib/docker/volumes/rv/_data/app`.
pub fn host_path_for(local: &Path, workspace_root: &Path, mountpoint: &Path) -> Result<PathBuf, DockerError> {
    let relative = local
        .strip_prefix(workspace_root)
        .map_err(|_| DockerError::OutsideWorkspace {
            path: local.to_path_buf(),
            root: workspace_root.to_path_buf(),
        })?;
    Ok(mountpoint.join(relative))
}

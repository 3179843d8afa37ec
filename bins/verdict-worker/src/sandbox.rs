/// Sandbox Runner - Resource-Constrained Container Execution
///
/// **Core Responsibility:**
/// Run one command in an ephemeral container with CPU/memory/network/time
/// caps, feed stdin, and return captured stdout/stderr with the exit code.
///
/// **Critical Architectural Boundary:**
/// - The sandbox knows HOW to execute (Docker today)
/// - The sandbox does NOT know about test cases or verdicts
/// - The executor builds the command; the sandbox only runs it
///
/// Any implementation must guarantee:
/// 1. Respect the wall-clock deadline and flag expiry as `timed_out`
/// 2. Capture stdout/stderr separately
/// 3. Remove the container on every exit path before returning
use crate::demux::Demuxer;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions,
    KillContainerOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Per-invocation resource caps.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub memory_bytes: i64,
    pub cpu_period: i64,
    pub cpu_quota: i64,
    pub wall_time: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 512 * 1024 * 1024,
            cpu_period: 100_000,
            cpu_quota: 50_000,
            wall_time: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: String,
    pub cmd: Vec<String>,
    pub stdin: String,
    pub limits: ResourceLimits,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub timed_out: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("image unavailable: {image}")]
    ImageUnavailable {
        image: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error(transparent)]
    Engine(#[from] bollard::errors::Error),
}

/// Execution backend contract. Tests substitute an in-memory fake.
pub trait Sandbox {
    fn run(
        &self,
        spec: &RunSpec,
    ) -> impl std::future::Future<Output = Result<RunOutput, SandboxError>> + Send;
}

/// Removes the container if the run path unwinds before the explicit
/// removal happens. Disarmed once cleanup has run.
struct ContainerGuard {
    inner: Option<(Docker, String)>,
}

impl ContainerGuard {
    fn new(docker: Docker, container_id: String) -> Self {
        Self {
            inner: Some((docker, container_id)),
        }
    }

    fn disarm(mut self) {
        self.inner = None;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if let Some((docker, container_id)) = self.inner.take() {
            tokio::spawn(async move {
                let _ = docker
                    .remove_container(
                        &container_id,
                        Some(RemoveContainerOptions {
                            force: true,
                            ..Default::default()
                        }),
                    )
                    .await;
            });
        }
    }
}

/// Docker-backed sandbox.
///
/// One container per invocation: stdin attached, network disabled, memory
/// capped with swap pinned to the same value, CPU throttled by
/// period/quota, privileges locked down. The wall-clock deadline races the
/// output drain; on expiry the container is killed and whatever output was
/// captured is returned with `timed_out` set.
pub struct DockerSandbox {
    docker: Docker,
    pulled: Mutex<HashSet<String>>,
}

impl DockerSandbox {
    pub fn connect(socket: &str) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_socket(socket, 120, bollard::API_DEFAULT_VERSION)?;
        Ok(Self {
            docker,
            pulled: Mutex::new(HashSet::new()),
        })
    }

    /// Pull the image on first use; later invocations hit the cache.
    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        {
            let pulled = self.pulled.lock().await;
            if pulled.contains(image) {
                return Ok(());
            }
        }

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| SandboxError::ImageUnavailable {
                image: image.to_string(),
                source: e,
            })?;
        }

        self.pulled.lock().await.insert(image.to_string());
        Ok(())
    }

    async fn run_attached(
        &self,
        container_id: &str,
        spec: &RunSpec,
    ) -> Result<RunOutput, SandboxError> {
        let attach = self
            .docker
            .attach_container(
                container_id,
                Some(AttachContainerOptions::<String> {
                    stdin: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    logs: Some(true),
                    ..Default::default()
                }),
            )
            .await?;

        let AttachContainerResults {
            mut output,
            mut input,
        } = attach;

        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;

        // Feed the test input and close stdin so line readers see EOF.
        // Write errors are expected when the program exits without reading.
        let mut stdin = spec.stdin.clone();
        if !stdin.ends_with('\n') {
            stdin.push('\n');
        }
        let _ = input.write_all(stdin.as_bytes()).await;
        let _ = input.shutdown().await;

        let mut demux = Demuxer::new();
        let mut timed_out = false;

        let drain = async {
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(frame) => demux.feed(frame),
                    Err(_) => break,
                }
            }
        };

        if tokio::time::timeout(spec.limits.wall_time, drain).await.is_err() {
            timed_out = true;
            let _ = self
                .docker
                .kill_container(container_id, None::<KillContainerOptions<String>>)
                .await;
        }

        let mut exit_code = 0i64;
        let mut wait_stream = self.docker.wait_container(
            container_id,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        );
        match wait_stream.next().await {
            Some(Ok(response)) => exit_code = response.status_code,
            // The daemon reports non-zero exits through the wait body; the
            // client surfaces them as this error variant.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                exit_code = code
            }
            _ => {}
        }

        let (stdout, stderr) = demux.finish();

        Ok(RunOutput {
            stdout,
            stderr,
            exit_code,
            timed_out,
        })
    }

    async fn remove(&self, container_id: &str) {
        let _ = self
            .docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;
    }
}

impl Sandbox for DockerSandbox {
    async fn run(&self, spec: &RunSpec) -> Result<RunOutput, SandboxError> {
        self.ensure_image(&spec.image).await?;

        let container_name = format!("verdict-{}", uuid::Uuid::new_v4());

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(true),
            stdin_once: Some(true),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                memory: Some(spec.limits.memory_bytes),
                // memory_swap == memory disables swap entirely.
                memory_swap: Some(spec.limits.memory_bytes),
                cpu_period: Some(spec.limits.cpu_period),
                cpu_quota: Some(spec.limits.cpu_quota),
                security_opt: Some(vec!["no-new-privileges:true".to_string()]),
                cap_drop: Some(vec!["ALL".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await?;

        let guard = ContainerGuard::new(self.docker.clone(), created.id.clone());

        let result = self.run_attached(&created.id, spec).await;

        // Removal must complete before returning; the guard only covers
        // unwinds out of the attached run.
        self.remove(&created.id).await;
        guard.disarm();

        result
    }
}

#[cfg(test)]
pub mod testutil {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted in-memory sandbox: pops one canned response per `run`
    /// call, defaulting to an empty success when the script runs dry.
    pub struct FakeSandbox {
        responses: std::sync::Mutex<VecDeque<Result<RunOutput, SandboxError>>>,
    }

    impl FakeSandbox {
        pub fn new(responses: Vec<Result<RunOutput, SandboxError>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses.into()),
            }
        }

        pub fn ok(stdout: &str) -> Result<RunOutput, SandboxError> {
            Ok(RunOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            })
        }

        pub fn stderr(stderr: &str, exit_code: i64) -> Result<RunOutput, SandboxError> {
            Ok(RunOutput {
                stderr: stderr.to_string(),
                exit_code,
                ..Default::default()
            })
        }

        pub fn timeout() -> Result<RunOutput, SandboxError> {
            Ok(RunOutput {
                timed_out: true,
                ..Default::default()
            })
        }

        pub fn image_unavailable() -> Result<RunOutput, SandboxError> {
            Err(SandboxError::ImageUnavailable {
                image: "python:3.9-slim".to_string(),
                source: bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    message: "pull access denied".to_string(),
                },
            })
        }

        pub fn remaining(&self) -> usize {
            self.responses.lock().unwrap().len()
        }
    }

    impl Sandbox for FakeSandbox {
        async fn run(&self, _spec: &RunSpec) -> Result<RunOutput, SandboxError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(RunOutput::default()))
        }
    }
}

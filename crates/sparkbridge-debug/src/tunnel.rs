//! SSH local-port-forward tunnel to the driver's JDWP port.
//!
//! The debugger cannot reach the driver container directly; it sits on
//! a cluster-internal address. [`SparkBatchDebugSession`] connects to
//! the cluster's SSH endpoint, binds an ephemeral local port, and
//! bridges every accepted connection to the remote `host:port` over a
//! `direct-tcpip` channel. One session carries at most one forward.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, AuthResult, Config, Handle};
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg};
use sparkbridge_core::error::SparkError;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// How the session authenticates against the cluster's SSH endpoint.
#[derive(Clone)]
pub enum SshAuth {
    /// Password authentication.
    Password(String),
    /// Public-key authentication with an on-disk private key.
    PrivateKeyFile(PathBuf),
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuth::Password(_) => f.write_str("SshAuth::Password(***)"),
            SshAuth::PrivateKeyFile(path) => {
                f.debug_tuple("SshAuth::PrivateKeyFile").field(path).finish()
            }
        }
    }
}

struct TunnelHandler;

impl client::Handler for TunnelHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Cluster head nodes are provisioned on demand and carry no
        // stable host key a client could have learned beforehand; the
        // session trusts the endpoint the caller pointed it at.
        Ok(true)
    }
}

struct Forward {
    remote_host: String,
    remote_port: u16,
    local_port: u16,
    accept_task: JoinHandle<()>,
}

impl Drop for Forward {
    /// Stops the accept loop (and releases its bound listener) when
    /// the forward goes away, whether through [`SparkBatchDebugSession::close`]
    /// or by dropping the session without closing it.
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// An authenticated SSH session that can forward one local port to the
/// driver's debug port.
pub struct SparkBatchDebugSession {
    handle: Arc<Handle<TunnelHandler>>,
    forward: Option<Forward>,
}

impl SparkBatchDebugSession {
    /// Connect and authenticate against `host:port`.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        auth: &SshAuth,
    ) -> Result<Self, SparkError> {
        let config = Arc::new(Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            ..Config::default()
        });
        let mut handle = client::connect(config, (host, port), TunnelHandler)
            .await
            .map_err(|err| SparkError::Ssh(format!("connect to {host}:{port} failed: {err}")))?;

        let result = match auth {
            SshAuth::Password(password) => handle
                .authenticate_password(username, password)
                .await
                .map_err(|err| SparkError::Ssh(err.to_string()))?,
            SshAuth::PrivateKeyFile(path) => {
                let key = load_secret_key(path, None).map_err(|err| {
                    SparkError::Auth(format!(
                        "failed to load private key {}: {err}",
                        path.display()
                    ))
                })?;
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|err| SparkError::Ssh(err.to_string()))?
                    .flatten();
                handle
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(|err| SparkError::Ssh(err.to_string()))?
            }
        };

        match result {
            AuthResult::Success => {
                tracing::debug!(host, port, username, "SSH session authenticated");
                Ok(Self {
                    handle: Arc::new(handle),
                    forward: None,
                })
            }
            AuthResult::Failure { .. } => Err(SparkError::Auth(format!(
                "SSH authentication failed for {username}@{host}"
            ))),
        }
    }

    /// The local port of the active forward, if one is open.
    pub fn local_port(&self) -> Option<u16> {
        self.forward.as_ref().map(|forward| forward.local_port)
    }

    /// Bind an ephemeral local port and bridge connections to
    /// `remote_host:remote_port`.
    ///
    /// Calling again with the same target returns the existing local
    /// port; a different target is a configuration error, since one
    /// session carries exactly one forward.
    pub async fn forward_to_remote(
        &mut self,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<u16, SparkError> {
        if let Some(forward) = &self.forward {
            if forward.remote_host == remote_host && forward.remote_port == remote_port {
                return Ok(forward.local_port);
            }
            return Err(SparkError::Configuration(format!(
                "this session already forwards to {}:{}; open a new session for {remote_host}:{remote_port}",
                forward.remote_host, forward.remote_port,
            )));
        }

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_port = listener.local_addr()?.port();

        let handle = Arc::clone(&self.handle);
        let target_host = remote_host.to_string();
        let accept_task = tokio::spawn(async move {
            loop {
                let (local_socket, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(error = %err, "Tunnel listener stopped accepting");
                        break;
                    }
                };
                tracing::debug!(%peer, "Debugger attached to the local tunnel port");
                let handle = Arc::clone(&handle);
                let target_host = target_host.clone();
                tokio::spawn(bridge(
                    handle,
                    local_socket,
                    target_host,
                    remote_port,
                    local_port,
                ));
            }
        });

        self.forward = Some(Forward {
            remote_host: remote_host.to_string(),
            remote_port,
            local_port,
            accept_task,
        });
        tracing::info!(local_port, remote_host, remote_port, "Debug tunnel established");
        Ok(local_port)
    }

    /// Tear down the forward and disconnect. Both happen even if the
    /// remote side already dropped the connection.
    pub async fn close(mut self) {
        // Dropping the forward aborts its accept loop.
        self.forward.take();
        if let Err(err) = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "debug session closed", "en")
            .await
        {
            tracing::debug!(error = %err, "SSH disconnect failed");
        }
    }
}

/// Pump one accepted local connection through a `direct-tcpip` channel.
async fn bridge(
    handle: Arc<Handle<TunnelHandler>>,
    mut local_socket: tokio::net::TcpStream,
    remote_host: String,
    remote_port: u16,
    local_port: u16,
) {
    let channel = match handle
        .channel_open_direct_tcpip(
            remote_host.as_str(),
            u32::from(remote_port),
            "127.0.0.1",
            u32::from(local_port),
        )
        .await
    {
        Ok(channel) => channel,
        Err(err) => {
            tracing::warn!(
                error = %err,
                remote_host,
                remote_port,
                "Failed to open the forwarding channel",
            );
            return;
        }
    };

    let mut remote_stream = channel.into_stream();
    match tokio::io::copy_bidirectional(&mut local_socket, &mut remote_stream).await {
        Ok((sent, received)) => {
            tracing::debug!(sent, received, "Tunnel connection closed");
        }
        Err(err) => tracing::debug!(error = %err, "Tunnel connection ended with an error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_debug_output_redacts_the_password() {
        let auth = SshAuth::Password("hunter2".into());
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[tokio::test]
    async fn dropping_the_forward_stops_the_accept_loop() {
        let accept_task = tokio::spawn(std::future::pending::<()>());
        let monitor = accept_task.abort_handle();
        let forward = Forward {
            remote_host: "driver.internal".into(),
            remote_port: 6006,
            local_port: 50000,
            accept_task,
        };

        drop(forward);

        // Abort lands on the next scheduler tick.
        for _ in 0..10 {
            if monitor.is_finished() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("accept loop still running after the forward was dropped");
    }
}

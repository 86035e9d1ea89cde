//! Remote executors behind the engine's `RemoteExecutor` seam

mod rest;
mod ssh;

pub use rest::RestTransport;
pub use ssh::SshTransport;

use crate::config::ApplianceConfig;
use anyhow::Result;
use converge::{Invocation, RemoteExecutor, Response};
use log::debug;

/// Routes shell invocations over SSH and REST invocations over HTTPS
///
/// Each transport is opened on first use and kept for the rest of the run.
pub struct Dispatch {
    config: ApplianceConfig,
    ssh: Option<SshTransport>,
    rest: Option<RestTransport>,
}

impl Dispatch {
    pub fn new(config: ApplianceConfig) -> Self {
        Self {
            config,
            ssh: None,
            rest: None,
        }
    }

    fn ssh(&mut self) -> Result<&mut SshTransport> {
        if self.ssh.is_none() {
            debug!("Opening SSH session to {}:{}", self.config.host, self.config.ssh_port);
            self.ssh = Some(SshTransport::connect(&self.config)?);
        }
        self.ssh
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("SSH session unavailable"))
    }

    fn rest(&mut self) -> Result<&mut RestTransport> {
        if self.rest.is_none() {
            debug!("Logging in to {}", self.config.rest_base());
            self.rest = Some(RestTransport::login(&self.config)?);
        }
        self.rest
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("REST session unavailable"))
    }
}

impl RemoteExecutor for Dispatch {
    fn execute(&mut self, invocation: &Invocation) -> Result<Response> {
        match invocation {
            Invocation::Shell(command) => self.ssh()?.run(&command.line()),
            Invocation::Rest(call) => self.rest()?.send(call),
        }
    }
}

use crate::config::ApplianceConfig;
use anyhow::{Context, Result, bail};
use converge::{Body, Response};
use ssh2::{ExtendedData, Session};
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Authenticated SSH session to the appliance shell
pub struct SshTransport {
    session: Session,
}

impl SshTransport {
    pub fn connect(config: &ApplianceConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let addr = (config.host.as_str(), config.ssh_port)
            .to_socket_addrs()
            .with_context(|| format!("Could not resolve {}", config.host))?
            .next()
            .with_context(|| format!("No address for {}", config.host))?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .with_context(|| format!("Failed to connect to {addr}"))?;
        tcp.set_read_timeout(Some(timeout)).ok();
        tcp.set_write_timeout(Some(timeout)).ok();

        let mut session = Session::new().context("Failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.handshake().context("SSH handshake failed")?;

        if let Some(key) = config.private_key_text()? {
            session
                .userauth_pubkey_memory(&config.username, None, &key, None)
                .context("SSH public key authentication failed")?;
        } else if let Some(password) = &config.password {
            session
                .userauth_password(&config.username, password)
                .context("SSH password authentication failed")?;
        } else {
            bail!("No SSH credentials: configure a private_key or password");
        }

        if !session.authenticated() {
            bail!("SSH authentication failed for {}", config.username);
        }
        Ok(Self { session })
    }

    /// Run one command; stderr is merged into stdout, success is exit status 0
    pub fn run(&mut self, line: &str) -> Result<Response> {
        let mut channel = self.session.channel_session()?;
        channel.handle_extended_data(ExtendedData::Merge)?;
        channel.exec(line)?;

        let mut output = String::new();
        channel
            .read_to_string(&mut output)
            .context("Could not read command output")?;
        channel.wait_close()?;
        let status = channel.exit_status()?;

        Ok(Response {
            success: status == 0,
            body: Body::Text(output),
        })
    }
}

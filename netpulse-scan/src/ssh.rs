// ---------------------------------------------------------------------------
// SSH fact probe
// ---------------------------------------------------------------------------

use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use ssh2::Session;
use tracing::debug;

use netpulse_types::{DeviceFacts, SshCredentials, UNKNOWN_FACT};

use crate::ScanError;

/// Authenticated SSH probe that collects system facts from one host.
///
/// Host key verification is skipped: targets are whatever a scan sweep
/// found, so there is no prior key material to pin against. Every call
/// blocks on socket and channel I/O; the discovery engine runs probes
/// through `spawn_blocking` on its dedicated worker runtimes.
pub struct SshProber {
    timeout: Duration,
}

impl SshProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connect, authenticate and run the fact command set.
    ///
    /// Any session, auth or exec failure aborts the whole probe; a device
    /// row is never synthesized from partial facts.
    pub fn probe(&self, ip: Ipv4Addr, creds: &SshCredentials) -> Result<DeviceFacts, ScanError> {
        let session = self.open_session(ip, creds)?;

        let facts = DeviceFacts {
            hostname: exec(&session, "hostname")?,
            os: exec(&session, "uname -s")?,
            os_version: exec(&session, "uname -r")?,
            architecture: exec(&session, "uname -m")?,
            uptime: exec(&session, "uptime")?,
            cpu_info: exec(&session, "cat /proc/cpuinfo | grep 'model name' | head -1")?,
            memory_info: exec(&session, "free -h")?,
            disk_info: exec(&session, "df -h")?,
        };

        debug!(ip = %ip, hostname = %facts.hostname, "gathered device facts");
        Ok(facts)
    }

    /// Connection + auth check without running any commands.
    pub fn test_connection(&self, ip: Ipv4Addr, creds: &SshCredentials) -> bool {
        self.open_session(ip, creds).is_ok()
    }

    fn open_session(&self, ip: Ipv4Addr, creds: &SshCredentials) -> Result<Session, ScanError> {
        let addr = SocketAddr::new(IpAddr::V4(ip), creds.port);
        let tcp = TcpStream::connect_timeout(&addr, self.timeout)?;
        tcp.set_read_timeout(Some(self.timeout))?;
        tcp.set_write_timeout(Some(self.timeout))?;

        let mut session = Session::new()?;
        session.set_timeout(self.timeout.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session.handshake()?;

        // Key auth first when a key is on the profile, password otherwise.
        if let Some(key) = creds.private_key.as_deref() {
            if session
                .userauth_pubkey_memory(&creds.username, None, key, None)
                .is_err()
            {
                session.userauth_password(&creds.username, &creds.password)?;
            }
        } else {
            session.userauth_password(&creds.username, &creds.password)?;
        }

        if !session.authenticated() {
            return Err(ScanError::AuthRejected);
        }
        Ok(session)
    }
}

impl Default for SshProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Run one command and return its trimmed stdout, or `"unknown"` when the
/// host produced nothing.
fn exec(session: &Session, command: &str) -> Result<String, ScanError> {
    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    let mut output = String::new();
    channel.read_to_string(&mut output)?;
    channel.wait_close()?;

    let trimmed = output.trim();
    if trimmed.is_empty() {
        Ok(UNKNOWN_FACT.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

//! Host discovery via the lockfile.
//!
//! While running, the host writes a single line of the form
//! `name:pid:port:password:protocol` into its install directory. The port
//! and password are regenerated on every host start, so the file is the
//! only reliable way to find the local endpoint.

use std::path::Path;

use secrecy::SecretString;
use url::Url;

use crate::error::Error;

/// Username the host expects alongside the lockfile password.
pub const HOST_USERNAME: &str = "riot";

/// Parsed contents of the host lockfile.
#[derive(Debug, Clone)]
pub struct Lockfile {
    pub process_name: String,
    pub pid: u32,
    pub port: u16,
    pub password: SecretString,
    pub protocol: String,
}

impl Lockfile {
    /// Read and parse the lockfile at `path`.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Lockfile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&raw).map_err(|reason| Error::Lockfile {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Parse the `name:pid:port:password:protocol` line.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let fields: Vec<&str> = raw.trim().split(':').collect();
        let [name, pid, port, password, protocol] = fields.as_slice() else {
            return Err(format!("expected 5 ':'-separated fields, got {}", fields.len()));
        };

        let pid = pid
            .parse::<u32>()
            .map_err(|e| format!("invalid pid {pid:?}: {e}"))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port {port:?}: {e}"))?;
        if password.is_empty() {
            return Err("empty password".into());
        }

        Ok(Self {
            process_name: (*name).to_owned(),
            pid,
            port,
            password: SecretString::from((*password).to_owned()),
            protocol: (*protocol).to_owned(),
        })
    }

    /// Base URL of the host REST endpoint (loopback only).
    pub fn base_url(&self) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "{}://127.0.0.1:{}/",
            self.protocol, self.port
        ))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn parses_well_formed_line() {
        let lf = Lockfile::parse("LeagueClient:4242:51234:s3cr3t:https\n").unwrap();
        assert_eq!(lf.process_name, "LeagueClient");
        assert_eq!(lf.pid, 4242);
        assert_eq!(lf.port, 51234);
        assert_eq!(lf.password.expose_secret(), "s3cr3t");
        assert_eq!(
            lf.base_url().unwrap().as_str(),
            "https://127.0.0.1:51234/"
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = Lockfile::parse("LeagueClient:4242:51234").unwrap_err();
        assert!(err.contains("got 3"), "{err}");
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Lockfile::parse("x:1:notaport:pw:https").is_err());
        assert!(Lockfile::parse("x:1:70000:pw:https").is_err());
    }

    #[test]
    fn read_reports_path_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockfile");
        let err = Lockfile::read(&path).unwrap_err();
        assert!(matches!(err, Error::Lockfile { .. }));

        std::fs::write(&path, "Host:1:2999:pw:https").unwrap();
        assert_eq!(Lockfile::read(&path).unwrap().port, 2999);
    }
}

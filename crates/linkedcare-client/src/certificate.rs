//! Client certificate provisioning.
//!
//! A certificate is a combined PEM (certificate chain plus private key). The
//! [`Connector`](crate::Connector) owns its certificate source explicitly, so
//! several sessions with different certificates can coexist in one process.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::config::CertificateSettings;
use crate::error::{ClientError, Result};

const CERTIFICATE_MARKER: &str = "-----BEGIN CERTIFICATE-----";
const PRIVATE_KEY_MARKER: &str = "PRIVATE KEY-----";

/// A client certificate with its private key, as PEM.
#[derive(Clone)]
pub struct ClientCertificate {
    label: String,
    pem: Vec<u8>,
}

impl ClientCertificate {
    /// Wraps PEM bytes after checking that both a certificate and a key are present.
    pub fn from_pem(label: impl Into<String>, pem: Vec<u8>) -> Result<Self> {
        let label = label.into();
        let text = String::from_utf8_lossy(&pem);
        if !text.contains(CERTIFICATE_MARKER) {
            return Err(ClientError::certificate(format!(
                "{label}: no certificate block found"
            )));
        }
        if !text.contains(PRIVATE_KEY_MARKER) {
            return Err(ClientError::certificate(format!(
                "{label}: no private key block found"
            )));
        }
        Ok(Self { label, pem })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let pem = fs::read(path).map_err(|e| {
            ClientError::certificate(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_pem(path.display().to_string(), pem)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pem(&self) -> &[u8] {
        &self.pem
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("label", &self.label)
            .field("pem", &format_args!("<{} bytes>", self.pem.len()))
            .finish()
    }
}

/// A place certificates are selected from.
pub trait CertificateStore: Send + Sync {
    fn select(&self) -> Result<ClientCertificate>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// A single PEM file.
#[derive(Debug, Clone)]
pub struct PemFileStore {
    path: PathBuf,
}

impl PemFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CertificateStore for PemFileStore {
    fn select(&self) -> Result<ClientCertificate> {
        ClientCertificate::from_file(&self.path)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// A directory of `*.pem` files.
///
/// With several candidates the choice is, in order: the preferred name, an
/// interactive prompt when attended, otherwise the first file by name.
#[derive(Debug, Clone)]
pub struct PemDirectoryStore {
    dir: PathBuf,
    preferred: Option<String>,
    attended: bool,
}

impl PemDirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            preferred: None,
            attended: false,
        }
    }

    pub fn with_preferred(mut self, name: impl Into<String>) -> Self {
        self.preferred = Some(name.into());
        self
    }

    pub fn attended(mut self, attended: bool) -> Self {
        self.attended = attended;
        self
    }

    /// Candidate PEM files, sorted by path.
    pub fn candidates(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            ClientError::certificate(format!("cannot list {}: {e}", self.dir.display()))
        })?;
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pem"))
            })
            .collect();
        candidates.sort();
        Ok(candidates)
    }

    fn choose(&self, candidates: &[PathBuf]) -> Result<usize> {
        if let Some(name) = &self.preferred {
            return candidates
                .iter()
                .position(|path| matches_name(path, name))
                .ok_or_else(|| {
                    ClientError::certificate(format!(
                        "no certificate named {name} in {}",
                        self.dir.display()
                    ))
                });
        }
        if candidates.len() > 1 && self.attended {
            let stdin = io::stdin();
            return prompt_for_choice(candidates, &mut stdin.lock(), &mut io::stderr());
        }
        if candidates.len() > 1 {
            tracing::warn!(
                dir = %self.dir.display(),
                chosen = %candidates[0].display(),
                count = candidates.len(),
                "Several certificates available, using the first"
            );
        }
        Ok(0)
    }
}

impl CertificateStore for PemDirectoryStore {
    fn select(&self) -> Result<ClientCertificate> {
        let candidates = self.candidates()?;
        if candidates.is_empty() {
            return Err(ClientError::certificate(format!(
                "no .pem files in {}",
                self.dir.display()
            )));
        }
        let index = self.choose(&candidates)?;
        ClientCertificate::from_file(&candidates[index])
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

fn matches_name(path: &Path, name: &str) -> bool {
    path.file_name().is_some_and(|n| n == name) || path.file_stem().is_some_and(|s| s == name)
}

/// Lists `candidates` on `output` and reads a 1-based choice from `input`.
pub fn prompt_for_choice(
    candidates: &[PathBuf],
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<usize> {
    let io_err = |e: io::Error| ClientError::certificate(format!("certificate prompt failed: {e}"));

    writeln!(output, "Select a client certificate:").map_err(io_err)?;
    for (i, path) in candidates.iter().enumerate() {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        writeln!(output, "  [{}] {name}", i + 1).map_err(io_err)?;
    }
    write!(output, "> ").map_err(io_err)?;
    output.flush().map_err(io_err)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(io_err)?;
    match line.trim().parse::<usize>() {
        Ok(n) if (1..=candidates.len()).contains(&n) => Ok(n - 1),
        _ => Err(ClientError::certificate(format!(
            "invalid certificate choice: {:?}",
            line.trim()
        ))),
    }
}

/// Builds the configured certificate source, if any.
pub fn store_from_settings(settings: &CertificateSettings) -> Option<Box<dyn CertificateStore>> {
    if let Some(file) = &settings.file {
        return Some(Box::new(PemFileStore::new(file)));
    }
    let dir = settings.directory.as_ref()?;
    let attended = settings
        .attended
        .unwrap_or_else(|| io::stdin().is_terminal());
    let mut store = PemDirectoryStore::new(dir).attended(attended);
    if let Some(name) = &settings.name {
        store = store.with_preferred(name);
    }
    Some(Box::new(store))
}

//! Sandbox-escape check: can the app write where it must not?
//!
//! On a trustworthy device the protected directory rejects the create, which
//! is the expected, clean outcome. A create + write + remove cycle that
//! succeeds is the anomaly.
//!
//! The artifact is owned by a [`ScopedArtifact`] guard from the moment it
//! exists. Every exit path, including a panic inside the payload write,
//! removes it before the probe returns.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::Rng;

use super::Probe;
use crate::config::WritabilitySpec;
use crate::error::ProbeError;
use crate::types::{Evidence, ProbeCategory};

const ARTIFACT_PREFIX: &str = ".fortdocs-integrity-";
const PAYLOAD: &[u8] = b"fortdocs";

/// Filesystem operations used by [`WritabilityProbe`].
///
/// The default [`StdArtifactFs`] talks to the real filesystem; tests swap in
/// implementations that fail at chosen points.
pub trait ArtifactFs: Send + Sync + 'static {
    /// Create `path`, failing if it already exists.
    fn create_new(&self, path: &Path) -> io::Result<File>;

    /// Write the probe payload into a freshly created artifact.
    fn write_payload(&self, file: &mut File) -> io::Result<()>;

    /// Remove the artifact.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`ArtifactFs`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdArtifactFs;

impl ArtifactFs for StdArtifactFs {
    fn create_new(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new().write(true).create_new(true).open(path)
    }

    fn write_payload(&self, file: &mut File) -> io::Result<()> {
        file.write_all(PAYLOAD)?;
        file.sync_all()
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Whether a failed create means the sandbox rejected the write, as opposed
/// to the directory being missing or otherwise unusable.
fn is_write_refusal(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EROFS)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// An artifact that is removed when the guard goes out of scope, unless
/// [`ScopedArtifact::release`] already removed it.
struct ScopedArtifact<'a> {
    fs: &'a dyn ArtifactFs,
    path: PathBuf,
    file: Option<File>,
    armed: bool,
}

impl<'a> ScopedArtifact<'a> {
    fn create(fs: &'a dyn ArtifactFs, path: PathBuf) -> io::Result<Self> {
        let file = fs.create_new(&path)?;
        Ok(Self {
            fs,
            path,
            file: Some(file),
            armed: true,
        })
    }

    fn write_payload(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => self.fs.write_payload(file),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }

    /// Close and remove the artifact. On failure the guard stays armed and
    /// retries once more on drop.
    fn release(mut self) -> io::Result<()> {
        self.file.take();
        self.fs.remove(&self.path)?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for ScopedArtifact<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.file.take();
            if let Err(err) = self.fs.remove(&self.path) {
                tracing::warn!(kind = ?err.kind(), "Writability artifact cleanup failed");
            }
        }
    }
}

/// Attempts a write into a directory that should reject it.
pub struct WritabilityProbe {
    name: String,
    weight: f64,
    directory: PathBuf,
    fs: Box<dyn ArtifactFs>,
}

impl WritabilityProbe {
    /// Probe writes into `directory` using the real filesystem.
    pub fn new(name: impl Into<String>, weight: f64, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            weight,
            directory: directory.into(),
            fs: Box::new(StdArtifactFs),
        }
    }

    /// Replace the filesystem backend.
    #[must_use]
    pub fn with_fs(mut self, fs: impl ArtifactFs) -> Self {
        self.fs = Box::new(fs);
        self
    }

    pub(crate) fn from_spec(spec: &WritabilitySpec) -> Self {
        Self::new(spec.name.clone(), spec.weight, spec.directory.clone())
    }

    fn artifact_path(&self) -> PathBuf {
        let nonce: u64 = rand::thread_rng().gen();
        self.directory.join(format!(
            "{ARTIFACT_PREFIX}{}-{nonce:016x}",
            std::process::id()
        ))
    }
}

impl std::fmt::Debug for WritabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritabilityProbe")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl Probe for WritabilityProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::WritePermissionAnomaly
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn probe(&self) -> Result<Evidence, ProbeError> {
        let mut artifact = match ScopedArtifact::create(self.fs.as_ref(), self.artifact_path()) {
            Ok(artifact) => artifact,
            Err(err) if is_write_refusal(&err) => {
                return Ok(Evidence::clean(&self.name, self.category(), "write_denied"))
            },
            // A missing or unusable directory proves nothing about the sandbox.
            Err(err) => return Err(err.into()),
        };

        let written = artifact.write_payload();
        let released = artifact.release();

        match (written, released) {
            (_, Err(err)) => {
                tracing::warn!(probe = %self.name, kind = ?err.kind(), "Artifact removal failed");
                Ok(Evidence::inconclusive(&self.name, self.category()))
            },
            (Err(_), Ok(())) => Err(ProbeError::PartialWrite),
            (Ok(()), Ok(())) => Ok(Evidence::detected(
                &self.name,
                self.category(),
                1.0,
                "protected_location_writable",
            )),
        }
    }
}

//! Debugger and instrumentation indicators for the current process.
//!
//! Indicator sources:
//!
//! - `TracerPid` in `<proc>/self/status` (Linux/Android)
//! - instrumentation libraries in `<proc>/self/maps` (Linux/Android)
//! - instrumentation servers listening on loopback (all platforms)
//!
//! Sources that do not exist on the running platform are skipped. If no
//! source is available at all the probe reports `Unsupported`, which the
//! registry records as neutral evidence.
//!
//! Higher false-positive risk than the filesystem probes, so it ships
//! disabled and must be enabled in the policy.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use super::Probe;
use crate::config::ProcessAnomalySpec;
use crate::error::ProbeError;
use crate::types::{Evidence, ProbeCategory};

const PORT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// An open loopback port is circumstantial; a tracer or mapped library is not.
const PORT_CONFIDENCE: f64 = 0.5;

/// Looks for an attached tracer and known instrumentation frameworks.
#[derive(Debug, Clone)]
pub struct ProcessAnomalyProbe {
    name: String,
    weight: f64,
    proc_root: PathBuf,
    library_markers: Vec<String>,
    loopback_ports: Vec<u16>,
}

impl ProcessAnomalyProbe {
    /// Create a probe with no markers or ports; see the builder methods.
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            proc_root: PathBuf::from("/proc"),
            library_markers: Vec::new(),
            loopback_ports: Vec::new(),
        }
    }

    /// Substrings searched for (case-insensitively) in mapped library paths.
    #[must_use]
    pub fn with_library_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.library_markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// Loopback ports probed for instrumentation servers.
    #[must_use]
    pub fn with_loopback_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.loopback_ports = ports.into_iter().collect();
        self
    }

    /// Root of the procfs mount.
    #[must_use]
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    pub(crate) fn from_spec(spec: &ProcessAnomalySpec) -> Self {
        Self::new(spec.name.clone(), spec.weight)
            .with_library_markers(&spec.library_markers)
            .with_loopback_ports(spec.loopback_ports.iter().copied())
    }

    /// `Some(true)` if a non-zero `TracerPid` is reported, `None` if the
    /// status file is unavailable.
    fn tracer_attached(&self) -> Option<bool> {
        let status = std::fs::read_to_string(self.proc_root.join("self/status")).ok()?;
        let tracer = status
            .lines()
            .find_map(|line| line.strip_prefix("TracerPid:"))?
            .trim()
            .parse::<u32>()
            .ok()?;
        Some(tracer != 0)
    }

    fn instrumentation_mapped(&self) -> Option<bool> {
        if self.library_markers.is_empty() {
            return None;
        }
        let maps = std::fs::read(self.proc_root.join("self/maps")).ok()?;
        let maps = String::from_utf8_lossy(&maps).to_lowercase();
        Some(self.library_markers.iter().any(|m| maps.contains(m.as_str())))
    }

    fn instrumentation_port_open(&self) -> Option<bool> {
        if self.loopback_ports.is_empty() {
            return None;
        }
        Some(self.loopback_ports.iter().any(|port| {
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, *port));
            TcpStream::connect_timeout(&addr, PORT_CONNECT_TIMEOUT).is_ok()
        }))
    }
}

impl Probe for ProcessAnomalyProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::ProcessAnomaly
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn probe(&self) -> Result<Evidence, ProbeError> {
        let checks = [
            ("tracer_attached", 1.0, self.tracer_attached()),
            ("instrumentation_mapped", 1.0, self.instrumentation_mapped()),
            (
                "instrumentation_port_open",
                PORT_CONFIDENCE,
                self.instrumentation_port_open(),
            ),
        ];

        if checks.iter().all(|(_, _, outcome)| outcome.is_none()) {
            return Err(ProbeError::Unsupported);
        }

        let found: Vec<_> = checks
            .iter()
            .filter(|(_, _, outcome)| *outcome == Some(true))
            .collect();
        if found.is_empty() {
            return Ok(Evidence::clean(
                &self.name,
                self.category(),
                "indicators=none",
            ));
        }

        let confidence = found.iter().map(|(_, c, _)| *c).fold(0.0, f64::max);
        let names: Vec<&str> = found.iter().map(|(name, _, _)| *name).collect();
        tracing::debug!(probe = %self.name, indicators = ?names, "Process anomaly indicators");
        Ok(Evidence::detected(
            &self.name,
            self.category(),
            confidence,
            format!("indicators={}", names.join(",")),
        ))
    }
}

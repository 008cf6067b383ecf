//! Evidence ordering and concurrency of the probe registry.

use std::time::{Duration, Instant};

use rand::Rng;

use fortdocs_integrity::{Evidence, Probe, ProbeCategory, ProbeError, ProbeRegistry};

struct Delayed {
    name: &'static str,
    delay: Duration,
}

impl Probe for Delayed {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::FilesystemAnomaly
    }

    fn weight(&self) -> f64 {
        0.3
    }

    fn probe(&self) -> Result<Evidence, ProbeError> {
        std::thread::sleep(self.delay);
        Ok(Evidence::clean(self.name, self.category(), "artifacts_found=0/1"))
    }
}

#[tokio::test]
async fn registration_order_survives_random_delays() {
    let mut rng = rand::thread_rng();

    for run in 0..50 {
        let mut registry = ProbeRegistry::new();
        for name in ["A", "B", "C"] {
            registry.register(Delayed {
                name,
                delay: Duration::from_millis(rng.gen_range(0..25)),
            });
        }

        let evidence = registry.run_all(Duration::from_secs(5)).await;
        let names: Vec<_> = evidence
            .iter()
            .map(|item| item.evidence.probe_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"], "run {run}");
    }
}

#[tokio::test]
async fn probes_run_concurrently() {
    let mut registry = ProbeRegistry::new();
    for name in ["A", "B", "C"] {
        registry.register(Delayed {
            name,
            delay: Duration::from_millis(200),
        });
    }

    let started = Instant::now();
    let evidence = registry.run_all(Duration::from_secs(5)).await;
    assert_eq!(evidence.len(), 3);
    assert!(
        started.elapsed() < Duration::from_millis(550),
        "took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn timed_out_probe_keeps_its_slot() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(Delayed {
            name: "A",
            delay: Duration::ZERO,
        })
        .register(Delayed {
            name: "B",
            delay: Duration::from_millis(400),
        })
        .register(Delayed {
            name: "C",
            delay: Duration::ZERO,
        });

    let evidence = registry.run_all(Duration::from_millis(80)).await;
    assert_eq!(evidence[1].evidence.probe_name, "B");
    assert_eq!(evidence[1].evidence.detail, "probe_error:timeout");
    assert_eq!(evidence[1].weight, 0.3);
    assert_eq!(evidence[2].evidence.detail, "artifacts_found=0/1");
}

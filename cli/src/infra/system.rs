//! Host metrics via `sysinfo`.

use std::path::Path;

use anyhow::{Context, Result};
use sysinfo::{Disks, System};

use crate::application::ports::SystemProbe;
use crate::domain::health::{ResourceUsage, percent};

pub struct SysinfoProbe;

impl SystemProbe for SysinfoProbe {
    async fn resource_usage(&self) -> Result<ResourceUsage> {
        tokio::task::spawn_blocking(sample)
            .await
            .context("resource sampling task panicked")
    }
}

fn sample() -> ResourceUsage {
    let mut sys = System::new_all();
    sys.refresh_all();
    // CPU usage needs two samples at least MINIMUM_CPU_UPDATE_INTERVAL apart.
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();

    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());
    let disk_percent = root.map_or(0.0, |d| {
        percent(d.total_space().saturating_sub(d.available_space()), d.total_space())
    });

    ResourceUsage {
        cpu_percent: f64::from(sys.global_cpu_info().cpu_usage()),
        memory_percent: percent(sys.used_memory(), sys.total_memory()),
        disk_percent,
    }
}

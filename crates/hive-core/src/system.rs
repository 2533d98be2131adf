use std::{fs, path::Path, sync::OnceLock, time::Instant};

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize worker start time.
pub fn init_uptime() {
    START_TIME.get_or_init(Instant::now);
}

/// Get worker uptime in seconds.
pub fn uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_secs()
}

/// Get platform (OS family).
#[inline]
pub fn platform() -> &'static str {
    std::env::consts::OS
}

/// Get architecture.
#[inline]
pub fn arch() -> &'static str {
    std::env::consts::ARCH
}

pub fn hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

/// Derive an identity for this worker.
///
/// Pod name inside Kubernetes, container id inside Docker, otherwise a fresh
/// `worker-<uuid>`; the last one is new for every process.
pub fn resolve_worker_id() -> String {
    if is_kubernetes()
        && let Some(name) = hostname()
    {
        return name;
    }
    if let Some(container_id) = parse_container_id_from_cgroup() {
        return container_id;
    }
    format!("worker-{}", uuid::Uuid::new_v4())
}

/// Get OS distribution info (Linux only, best effort).
///
/// Returns OS name from `/etc/os-release` or generic platform name.
pub fn os_info() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = fs::read_to_string("/etc/os-release") {
            for line in content.lines() {
                if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                    return name.trim_matches('"').to_string();
                }
            }
        }
    }

    platform().to_string()
}

fn is_kubernetes() -> bool {
    std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
        || Path::new("/var/run/secrets/kubernetes.io/serviceaccount").exists()
}

fn parse_container_id_from_cgroup() -> Option<String> {
    let cgroup = fs::read_to_string("/proc/self/cgroup").ok()?;
    container_id_from_cgroup(&cgroup)
}

fn container_id_from_cgroup(cgroup: &str) -> Option<String> {
    for line in cgroup.lines() {
        if let Some(docker_part) = line.split('/').find(|s| s.starts_with("docker-")) {
            let id = docker_part
                .trim_start_matches("docker-")
                .trim_end_matches(".scope");
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
        if let Some(id) = line
            .split("/docker/")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
        {
            return Some(id.to_owned());
        }
    }
    None
}

//! System telemetry - addresses, load, temperature and device info files.
//!
//! A background [`Sampler`] keeps one long-lived worker per metric and
//! waits a bounded time for each, so one slow or broken source never holds
//! up the others and a hung source never piles up threads.
//! Results land in a [`TelemetryCache`]; the renderer only ever reads the
//! latest snapshot, never waits on a probe.
//!
//! Anything that cannot be read becomes `None` and is drawn as `N/A`.

use core::cell::RefCell;
use core::fmt;
use std::ffi::{CStr, CString};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::String;
use log::{debug, info, warn};

use crate::config;
use crate::error::Error;

/// Formatted MAC address, `AA:BB:CC:DD:EE:FF`.
pub type MacString = String<17>;

/// Individually sampled metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Ip,
    Mac,
    Cpu,
    Memory,
    Disk,
    Temperature,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Ip,
        Metric::Mac,
        Metric::Cpu,
        Metric::Memory,
        Metric::Disk,
        Metric::Temperature,
    ];

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Ip => "IP",
            Metric::Mac => "MAC",
            Metric::Cpu => "CPU",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
            Metric::Temperature => "temperature",
        };
        f.write_str(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Snapshot types
// ═══════════════════════════════════════════════════════════════════════════

/// Static identity text shown on the Date/Version page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String<21>,
    pub version: String<16>,
    pub schema: String<16>,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            model: truncated(config::DEFAULT_MODEL),
            version: truncated(config::DEFAULT_VERSION),
            schema: truncated(config::DEFAULT_SCHEMA),
        }
    }
}

impl DeviceInfo {
    /// Read `model`, `update` and `schema` from `dir`.
    ///
    /// Missing, unreadable or blank files keep their default.
    pub fn read(dir: &Path) -> Self {
        let mut info = Self::default();
        if let Some(model) = read_trimmed(&dir.join("model")) {
            info.model = truncated(&model);
        }
        if let Some(version) = read_trimmed(&dir.join("update")) {
            info.version = truncated(&version);
        }
        if let Some(schema) = read_trimmed(&dir.join("schema")) {
            info.schema = truncated(&schema);
        }
        info
    }

    /// `V{version}S{schema}`.
    pub fn version_line(&self) -> String<34> {
        let mut line = String::new();
        let _ = fmt::Write::write_fmt(
            &mut line,
            format_args!("V{}S{}", self.version, self.schema),
        );
        line
    }
}

/// SoC temperature bands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThermalStatus {
    Cool,
    Normal,
    Warm,
    Hot,
    /// 80 °C and above - the line flashes.
    Critical,
}

impl ThermalStatus {
    pub fn classify(celsius: i32) -> Self {
        match celsius {
            c if c < 40 => ThermalStatus::Cool,
            c if c < 60 => ThermalStatus::Normal,
            c if c < 70 => ThermalStatus::Warm,
            c if c < 80 => ThermalStatus::Hot,
            _ => ThermalStatus::Critical,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ThermalStatus::Cool => "Cool",
            ThermalStatus::Normal => "Normal",
            ThermalStatus::Warm => "Warm",
            ThermalStatus::Hot => "Hot",
            ThermalStatus::Critical => "TURN OFF",
        }
    }

    pub const fn flashes(self) -> bool {
        matches!(self, ThermalStatus::Critical)
    }
}

/// Latest value of every metric; `None` = unavailable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub ip: Option<Ipv4Addr>,
    pub mac: Option<MacString>,
    pub cpu_percent: Option<u8>,
    pub memory_percent: Option<u8>,
    pub disk_percent: Option<u8>,
    pub temperature_c: Option<i32>,
    pub device: DeviceInfo,
}

impl SystemSnapshot {
    pub fn thermal_status(&self) -> Option<ThermalStatus> {
        self.temperature_c.map(ThermalStatus::classify)
    }
}

/// Anything that can hand the renderer a telemetry snapshot without blocking.
pub trait TelemetrySource {
    fn latest(&self) -> SystemSnapshot;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for &T {
    fn latest(&self) -> SystemSnapshot {
        (**self).latest()
    }
}

/// Snapshot shared between the sampler thread and the renderer.
pub struct TelemetryCache {
    inner: Mutex<CriticalSectionRawMutex, RefCell<SystemSnapshot>>,
}

impl TelemetryCache {
    pub fn new(initial: SystemSnapshot) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(initial)),
        }
    }

    pub fn store(&self, snapshot: SystemSnapshot) {
        self.inner.lock(|cell| *cell.borrow_mut() = snapshot);
    }
}

impl TelemetrySource for TelemetryCache {
    fn latest(&self) -> SystemSnapshot {
        self.inner.lock(|cell| cell.borrow().clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Failure tracking
// ═══════════════════════════════════════════════════════════════════════════

/// Change in a metric's failure run worth logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakChange {
    /// The metric has now failed `threshold` samples in a row.
    Sustained(u32),
    /// The metric read successfully after a sustained failure.
    Recovered(u32),
}

/// Consecutive-failure counters, one per metric.
#[derive(Clone, Debug)]
pub struct FailureStreaks {
    counts: [u32; Metric::ALL.len()],
    threshold: u32,
}

impl FailureStreaks {
    pub fn new(threshold: u32) -> Self {
        Self {
            counts: [0; Metric::ALL.len()],
            threshold: threshold.max(1),
        }
    }

    pub fn count(&self, metric: Metric) -> u32 {
        self.counts[metric.slot()]
    }

    /// Record one sample outcome.
    pub fn record(&mut self, metric: Metric, ok: bool) -> Option<StreakChange> {
        let count = &mut self.counts[metric.slot()];
        if ok {
            let previous = core::mem::take(count);
            return (previous >= self.threshold).then_some(StreakChange::Recovered(previous));
        }
        *count = count.saturating_add(1);
        (*count == self.threshold).then_some(StreakChange::Sustained(*count))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Sampler
// ═══════════════════════════════════════════════════════════════════════════

/// Cumulative jiffies from the aggregate `cpu` line of `/proc/stat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Busy share between `earlier` and `self`, in percent.
    pub fn usage_since(&self, earlier: &CpuTimes) -> Option<u8> {
        let total = self.total.checked_sub(earlier.total)?;
        let busy = self.busy.checked_sub(earlier.busy)?;
        if total == 0 {
            return None;
        }
        Some(((busy * 100 + total / 2) / total).min(100) as u8)
    }
}

/// Periodically probes every metric and publishes to a [`TelemetryCache`].
pub struct Sampler {
    timeout: Duration,
    info_dir: PathBuf,
    last_cpu: Option<CpuTimes>,
    streaks: FailureStreaks,
    ip: ProbeWorker<Ipv4Addr>,
    mac: ProbeWorker<MacString>,
    cpu: ProbeWorker<CpuTimes>,
    memory: ProbeWorker<u8>,
    disk: ProbeWorker<u8>,
    temperature: ProbeWorker<i32>,
}

impl Sampler {
    /// Start one probe worker per metric.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            timeout,
            info_dir: PathBuf::from(config::DEVICE_INFO_DIR),
            last_cpu: None,
            streaks: FailureStreaks::new(config::TELEMETRY_FAILURE_WARN_STREAK),
            ip: ProbeWorker::spawn(Metric::Ip, read_ip)?,
            mac: ProbeWorker::spawn(Metric::Mac, read_mac)?,
            cpu: ProbeWorker::spawn(Metric::Cpu, || {
                parse_cpu_times(&read_to_string(config::PROC_STAT_PATH)?)
                    .ok_or(Error::Telemetry(Metric::Cpu))
            })?,
            memory: ProbeWorker::spawn(Metric::Memory, || {
                parse_meminfo_percent(&read_to_string(config::PROC_MEMINFO_PATH)?)
                    .ok_or(Error::Telemetry(Metric::Memory))
            })?,
            disk: ProbeWorker::spawn(Metric::Disk, read_disk_percent)?,
            temperature: ProbeWorker::spawn(Metric::Temperature, || {
                parse_temperature(&read_to_string(config::THERMAL_ZONE_PATH)?)
                    .ok_or(Error::Telemetry(Metric::Temperature))
            })?,
        })
    }

    /// Sample forever, publishing after each pass. Meant for a dedicated thread.
    pub fn run(mut self, cache: &TelemetryCache, period: Duration) -> ! {
        info!("Telemetry sampler running (every {:?})", period);
        loop {
            let snapshot = self.sample();
            cache.store(snapshot);
            std::thread::sleep(period);
        }
    }

    /// Probe every metric once.
    pub fn sample(&mut self) -> SystemSnapshot {
        let timeout = self.timeout;

        let ip = self.ip.poll(timeout);
        let ip = self.observe(Metric::Ip, ip);
        let mac = self.mac.poll(timeout);
        let mac = self.observe(Metric::Mac, mac);
        let cpu = self.cpu.poll(timeout).and_then(|now| {
            // First sample has no baseline; report unavailable once.
            let earlier = self.last_cpu.replace(now);
            earlier
                .and_then(|earlier| now.usage_since(&earlier))
                .ok_or(Error::Telemetry(Metric::Cpu))
        });
        let cpu = self.observe(Metric::Cpu, cpu);
        let memory = self.memory.poll(timeout);
        let memory = self.observe(Metric::Memory, memory);
        let disk = self.disk.poll(timeout);
        let disk = self.observe(Metric::Disk, disk);
        let temperature = self.temperature.poll(timeout);
        let temperature = self.observe(Metric::Temperature, temperature);

        SystemSnapshot {
            ip,
            mac,
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            temperature_c: temperature,
            device: DeviceInfo::read(&self.info_dir),
        }
    }

    fn observe<T>(&mut self, metric: Metric, result: Result<T, Error>) -> Option<T> {
        let ok = result.is_ok();
        match self.streaks.record(metric, ok) {
            Some(StreakChange::Sustained(count)) => {
                warn!("Telemetry: {} unavailable for {} samples", metric, count)
            }
            Some(StreakChange::Recovered(count)) => {
                info!("Telemetry: {} recovered after {} failed samples", metric, count)
            }
            None => {}
        }
        result
            .map_err(|e| debug!("Telemetry: {}", e))
            .ok()
    }
}

/// A long-lived thread that runs one probe on request.
///
/// At most one request is outstanding. While a probe hangs, further polls
/// report [`Error::Timeout`] without queueing another run. The thread exits
/// once the worker is dropped and its current probe returns.
pub struct ProbeWorker<T> {
    metric: Metric,
    requests: mpsc::SyncSender<()>,
    results: mpsc::Receiver<Result<T, Error>>,
    outstanding: bool,
}

impl<T: Send + 'static> ProbeWorker<T> {
    pub fn spawn<F>(metric: Metric, mut probe: F) -> Result<Self, Error>
    where
        F: FnMut() -> Result<T, Error> + Send + 'static,
    {
        let (requests, request_rx) = mpsc::sync_channel::<()>(1);
        let (result_tx, results) = mpsc::sync_channel(1);
        std::thread::Builder::new()
            .name(format!("probe-{}", metric))
            .spawn(move || {
                while request_rx.recv().is_ok() {
                    if result_tx.send(probe()).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self {
            metric,
            requests,
            results,
            outstanding: false,
        })
    }

    /// Run the probe and wait at most `timeout` for its answer.
    pub fn poll(&mut self, timeout: Duration) -> Result<T, Error> {
        if self.outstanding {
            match self.results.try_recv() {
                // The overdue answer is stale; ask again below.
                Ok(_) => self.outstanding = false,
                Err(mpsc::TryRecvError::Empty) => return Err(Error::Timeout(self.metric)),
                Err(mpsc::TryRecvError::Disconnected) => return Err(Error::Telemetry(self.metric)),
            }
        }

        self.requests
            .try_send(())
            .map_err(|_| Error::Telemetry(self.metric))?;
        self.outstanding = true;
        match self.results.recv_timeout(timeout) {
            Ok(result) => {
                self.outstanding = false;
                result
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::Timeout(self.metric)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Telemetry(self.metric)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Probes
// ═══════════════════════════════════════════════════════════════════════════

fn read_to_string(path: &str) -> Result<std::string::String, Error> {
    Ok(std::fs::read_to_string(path)?)
}

fn read_trimmed(path: &Path) -> Option<std::string::String> {
    let text = std::fs::read_to_string(path).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Copy `s` into a fixed-capacity string, dropping whatever does not fit.
fn truncated<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// IPv4 of the primary interface, else the outbound-route address, else loopback.
fn read_ip() -> Result<Ipv4Addr, Error> {
    Ok(interface_ipv4(config::PRIMARY_INTERFACE)
        .or_else(route_ipv4)
        .unwrap_or(Ipv4Addr::LOCALHOST))
}

fn route_ipv4() -> Option<Ipv4Addr> {
    // Connecting a UDP socket sends nothing; it only selects a source address.
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(config::ROUTE_PROBE_ADDR).ok()?;
    match socket.local_addr().ok()? {
        SocketAddr::V4(addr) => Some(*addr.ip()),
        SocketAddr::V6(_) => None,
    }
}

fn interface_ipv4(name: &str) -> Option<Ipv4Addr> {
    let mut head: *mut libc::ifaddrs = core::ptr::null_mut();
    // SAFETY: getifaddrs fills `head` with a list we free below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return None;
    }

    let mut found = None;
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` is a live node of the list returned above.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;
        if entry.ifa_addr.is_null() || entry.ifa_name.is_null() {
            continue;
        }
        // SAFETY: non-null pointers into the same list.
        let (ifname, family) = unsafe {
            (
                CStr::from_ptr(entry.ifa_name),
                i32::from((*entry.ifa_addr).sa_family),
            )
        };
        if family == libc::AF_INET && ifname.to_bytes() == name.as_bytes() {
            // SAFETY: AF_INET entries carry a sockaddr_in.
            let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
            found = Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
            break;
        }
    }

    // SAFETY: `head` came from getifaddrs and is freed exactly once.
    unsafe { libc::freeifaddrs(head) };
    found
}

fn read_mac() -> Result<MacString, Error> {
    [config::PRIMARY_INTERFACE, config::FALLBACK_INTERFACE]
        .iter()
        .filter_map(|ifname| {
            std::fs::read_to_string(format!("/sys/class/net/{}/address", ifname)).ok()
        })
        .find_map(|raw| normalize_mac(&raw))
        .ok_or(Error::Telemetry(Metric::Mac))
}

fn read_disk_percent() -> Result<u8, Error> {
    let path = CString::new(config::DISK_MOUNT_POINT)
        .map_err(|_| Error::Telemetry(Metric::Disk))?;
    // SAFETY: statvfs is plain old data; zeroed is a valid initial value.
    let mut stats: libc::statvfs = unsafe { core::mem::zeroed() };
    // SAFETY: `path` is NUL-terminated and `stats` is a valid out-pointer.
    if unsafe { libc::statvfs(path.as_ptr(), &mut stats) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    disk_percent(
        stats.f_blocks as u64,
        stats.f_bfree as u64,
        stats.f_bavail as u64,
    )
    .ok_or(Error::Telemetry(Metric::Disk))
}

// ═══════════════════════════════════════════════════════════════════════════
// Parsers
// ═══════════════════════════════════════════════════════════════════════════

/// Aggregate CPU times from `/proc/stat` contents.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|line| line.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|field| field.parse().ok())
        .collect::<Option<_>>()?;
    if fields.len() < 4 {
        return None;
    }
    // user nice system idle iowait irq softirq steal ...
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total: u64 = fields.iter().take(8).sum();
    Some(CpuTimes {
        busy: total - idle,
        total,
    })
}

/// Used memory percentage from `/proc/meminfo` contents.
pub fn parse_meminfo_percent(meminfo: &str) -> Option<u8> {
    let field = |key: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|line| line.starts_with(key))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:").or_else(|| field("MemFree:"))?;
    if total == 0 || available > total {
        return None;
    }
    Some(((total - available) * 100 / total) as u8)
}

/// Whole degrees C from a thermal zone reading (millidegrees above 1000).
pub fn parse_temperature(raw: &str) -> Option<i32> {
    let value: i32 = raw.trim().parse().ok()?;
    Some(if value > 1000 { value / 1000 } else { value })
}

/// Upper-case, colon-separated MAC from a sysfs `address` file.
pub fn normalize_mac(raw: &str) -> Option<MacString> {
    let raw = raw.trim();
    let valid = raw.len() == 17
        && raw.char_indices().all(|(i, c)| {
            if i % 3 == 2 {
                c == ':'
            } else {
                c.is_ascii_hexdigit()
            }
        });
    if !valid {
        return None;
    }
    let mut mac = MacString::new();
    for c in raw.chars() {
        mac.push(c.to_ascii_uppercase()).ok()?;
    }
    Some(mac)
}

/// `df`-style usage: used / (used + available to unprivileged users), rounded up.
pub fn disk_percent(blocks: u64, free: u64, available: u64) -> Option<u8> {
    let used = blocks.checked_sub(free)?;
    let usable = used + available;
    if usable == 0 {
        return None;
    }
    Some(((used * 100).div_ceil(usable)).min(100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const STAT_A: &str = "cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 50 0 50 400 0 0 0 0 0 0\n";
    const STAT_B: &str = "cpu  150 0 150 900 0 0 0 0 0 0\ncpu0 75 0 75 450 0 0 0 0 0 0\n";

    #[test]
    fn cpu_usage_from_two_samples() {
        let a = parse_cpu_times(STAT_A).unwrap();
        let b = parse_cpu_times(STAT_B).unwrap();
        assert_eq!(a, CpuTimes { busy: 200, total: 1000 });
        assert_eq!(b.usage_since(&a), Some(50));
        // Same sample twice: no elapsed time.
        assert_eq!(a.usage_since(&a), None);
        // Counter went backwards.
        assert_eq!(a.usage_since(&b), None);
    }

    #[test]
    fn cpu_parse_rejects_garbage() {
        assert!(parse_cpu_times("").is_none());
        assert!(parse_cpu_times("cpu  1 2").is_none());
        assert!(parse_cpu_times("cpu  a b c d").is_none());
    }

    #[test]
    fn meminfo_percent() {
        let meminfo = "MemTotal:        1000 kB\nMemFree:          100 kB\nMemAvailable:     250 kB\n";
        assert_eq!(parse_meminfo_percent(meminfo), Some(75));
        let old_kernel = "MemTotal:        1000 kB\nMemFree:          400 kB\n";
        assert_eq!(parse_meminfo_percent(old_kernel), Some(60));
        assert_eq!(parse_meminfo_percent("MemTotal: 0 kB\nMemFree: 0 kB\n"), None);
        assert_eq!(parse_meminfo_percent("nothing here"), None);
    }

    #[test]
    fn temperature_units() {
        assert_eq!(parse_temperature("45123\n"), Some(45));
        assert_eq!(parse_temperature("52"), Some(52));
        assert_eq!(parse_temperature("hot"), None);
    }

    #[test]
    fn thermal_bands() {
        assert_eq!(ThermalStatus::classify(39), ThermalStatus::Cool);
        assert_eq!(ThermalStatus::classify(40), ThermalStatus::Normal);
        assert_eq!(ThermalStatus::classify(65), ThermalStatus::Warm);
        assert_eq!(ThermalStatus::classify(79), ThermalStatus::Hot);
        assert_eq!(ThermalStatus::classify(80), ThermalStatus::Critical);
        assert_eq!(ThermalStatus::Critical.label(), "TURN OFF");
        assert!(ThermalStatus::Critical.flashes());
        assert!(!ThermalStatus::Hot.flashes());
    }

    #[test]
    fn mac_normalisation() {
        assert_eq!(
            normalize_mac("02:4b:c1:0a:ff:3e\n").as_deref(),
            Some("02:4B:C1:0A:FF:3E")
        );
        assert!(normalize_mac("").is_none());
        assert!(normalize_mac("02-4b-c1-0a-ff-3e").is_none());
        assert!(normalize_mac("zz:4b:c1:0a:ff:3e").is_none());
    }

    #[test]
    fn disk_usage_rounds_up_like_df() {
        // 1000 blocks, 600 free, 550 available to users: used 400 / 950.
        assert_eq!(disk_percent(1000, 600, 550), Some(43));
        assert_eq!(disk_percent(100, 0, 0), Some(100));
        assert_eq!(disk_percent(0, 0, 0), None);
        assert_eq!(disk_percent(10, 20, 5), None);
    }

    #[test]
    fn worker_times_out_then_answers_again() {
        let mut slow = ProbeWorker::spawn(Metric::Cpu, || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(1u8)
        })
        .unwrap();
        assert!(matches!(
            slow.poll(Duration::from_millis(20)),
            Err(Error::Timeout(Metric::Cpu))
        ));

        let mut fast = ProbeWorker::spawn(Metric::Disk, || Ok(7u8)).unwrap();
        assert_eq!(fast.poll(Duration::from_millis(500)).unwrap(), 7);
        assert_eq!(fast.poll(Duration::from_millis(500)).unwrap(), 7);

        // Once the overdue run lands, the next poll gets a fresh answer.
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(slow.poll(Duration::from_millis(500)).unwrap(), 1);
    }

    #[test]
    fn hung_source_is_not_run_again_until_it_returns() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = mpsc::channel::<()>();
        let counter = Arc::clone(&calls);
        let mut worker = ProbeWorker::spawn(Metric::Disk, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            gate.recv().map_err(|_| Error::Telemetry(Metric::Disk))?;
            Ok(42u8)
        })
        .unwrap();

        for _ in 0..20 {
            assert!(matches!(
                worker.poll(Duration::from_millis(5)),
                Err(Error::Timeout(Metric::Disk))
            ));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Unblock the stuck run and the one after it.
        release.send(()).unwrap();
        release.send(()).unwrap();
        let mut answer = worker.poll(Duration::from_millis(500));
        for _ in 0..50 {
            if answer.is_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
            answer = worker.poll(Duration::from_millis(500));
        }
        assert_eq!(answer.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn worker_passes_errors_through() {
        let mut failing = ProbeWorker::<u8>::spawn(Metric::Mac, || {
            Err(Error::Telemetry(Metric::Mac))
        })
        .unwrap();
        assert!(matches!(
            failing.poll(Duration::from_millis(200)),
            Err(Error::Telemetry(Metric::Mac))
        ));
    }

    #[test]
    fn failure_streak_warns_once_and_reports_recovery() {
        let mut streaks = FailureStreaks::new(3);
        assert_eq!(streaks.record(Metric::Disk, false), None);
        assert_eq!(streaks.record(Metric::Disk, false), None);
        assert_eq!(streaks.record(Metric::Disk, false), Some(StreakChange::Sustained(3)));
        assert_eq!(streaks.record(Metric::Disk, false), None);
        assert_eq!(streaks.count(Metric::Disk), 4);
        // Other metrics are independent.
        assert_eq!(streaks.count(Metric::Ip), 0);
        assert_eq!(streaks.record(Metric::Disk, true), Some(StreakChange::Recovered(4)));
        assert_eq!(streaks.count(Metric::Disk), 0);
    }

    #[test]
    fn short_failure_run_recovers_silently() {
        let mut streaks = FailureStreaks::new(3);
        streaks.record(Metric::Temperature, false);
        assert_eq!(streaks.record(Metric::Temperature, true), None);
    }

    #[test]
    fn device_info_reads_files_with_fallbacks() {
        let dir = std::env::temp_dir().join(format!("nanohat-info-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model"), "  Studio Deck X \n").unwrap();
        std::fs::write(dir.join("update"), "\n").unwrap();
        std::fs::write(dir.join("schema"), "214").unwrap();

        let info = DeviceInfo::read(&dir);
        assert_eq!(info.model.as_str(), "Studio Deck X");
        assert_eq!(info.version.as_str(), "0");
        assert_eq!(info.version_line().as_str(), "V0S214");

        std::fs::remove_dir_all(&dir).unwrap();
        let defaults = DeviceInfo::read(&dir);
        assert_eq!(defaults.model.as_str(), "MC-DJ Player");
        assert_eq!(defaults.version_line().as_str(), "V0S100");
    }

    #[test]
    fn long_model_names_are_truncated() {
        let s: String<21> = truncated("An Extremely Long Model Name Indeed");
        assert_eq!(s.len(), 21);
    }

    #[test]
    fn cache_returns_latest_store() {
        let cache = TelemetryCache::new(SystemSnapshot::default());
        assert_eq!(cache.latest().cpu_percent, None);
        cache.store(SystemSnapshot {
            cpu_percent: Some(12),
            ..SystemSnapshot::default()
        });
        assert_eq!((&cache).latest().cpu_percent, Some(12));
    }
}

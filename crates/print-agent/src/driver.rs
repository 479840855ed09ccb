//! Printer drivers.
//!
//! [`PrinterDriver`] is the hardware boundary of the agent. [`SystemDriver`]
//! talks to the OS spooler, USB printer devices and network printers;
//! [`MockDriver`] records jobs in memory.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::DeviceError;

/// USB interface class of printers.
pub const USB_CLASS_PRINTER: u8 = 0x07;

/// Raw printing port of network receipt printers.
pub const DEFAULT_NETWORK_PORT: u16 = 9100;

/// Vendors of common thermal receipt printers, including the USB-serial
/// bridges they often ship with.
pub const KNOWN_PRINTER_VENDORS: &[(u16, &str)] = &[
    (0x04B8, "Epson"),
    (0x0519, "Star Micronics"),
    (0x0DD4, "Custom"),
    (0x0FE6, "Bematech"),
    (0x0483, "Elgin"),
    (0x1504, "Citizen"),
    (0x1FC9, "HOIN"),
    (0x6868, "Generic POS"),
    (0x0416, "Winbond"),
    (0x0493, "SNBC"),
    (0x20D1, "Daruma"),
    (0x0B00, "Sweda"),
    (0x0525, "Generic Thermal"),
    (0x1A86, "QinHeng"),
    (0x067B, "Prolific"),
];

pub fn known_vendor(vendor_id: u16) -> Option<&'static str> {
    KNOWN_PRINTER_VENDORS
        .iter()
        .find(|(id, _)| *id == vendor_id)
        .map(|(_, name)| *name)
}

/// A printer registered with the OS spooler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterDescriptor {
    pub name: String,
    /// Spooler state, e.g. "idle", "printing" or "disabled".
    pub status: String,
    pub is_default: bool,
}

/// A printer found by USB enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbPrinterDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
    pub is_known_vendor: bool,
}

impl UsbPrinterDescriptor {
    /// Name usable as a print target, e.g. `usb:04b8:0202`.
    pub fn target_name(&self) -> String {
        PrintTarget::Usb {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
        .to_string()
    }
}

/// Where a job is sent.
///
/// Printer names select the transport: `usb:VVVV:PPPP` for a USB device,
/// `tcp://host[:port]` for a network printer and anything else for a spooler
/// queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintTarget {
    Spooler(String),
    Usb { vendor_id: u16, product_id: u16 },
    Network { host: String, port: u16 },
}

impl PrintTarget {
    pub fn parse(name: &str) -> Self {
        let name = name.trim();

        if let Some(ids) = name.strip_prefix("usb:") {
            if let Some((vendor, product)) = ids.split_once(':') {
                if let (Ok(vendor_id), Ok(product_id)) =
                    (u16::from_str_radix(vendor, 16), u16::from_str_radix(product, 16))
                {
                    return Self::Usb {
                        vendor_id,
                        product_id,
                    };
                }
            }
        }

        if let Some(addr) = name.strip_prefix("tcp://") {
            let (host, port) = match addr.rsplit_once(':') {
                Some((host, port)) => match port.parse() {
                    Ok(port) => (host, port),
                    Err(_) => (addr, DEFAULT_NETWORK_PORT),
                },
                None => (addr, DEFAULT_NETWORK_PORT),
            };
            return Self::Network {
                host: host.to_string(),
                port,
            };
        }

        Self::Spooler(name.to_string())
    }
}

impl fmt::Display for PrintTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spooler(name) => f.write_str(name),
            Self::Usb {
                vendor_id,
                product_id,
            } => write!(f, "usb:{:04x}:{:04x}", vendor_id, product_id),
            Self::Network { host, port } => write!(f, "tcp://{}:{}", host, port),
        }
    }
}

/// Rendered bytes bound for one printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub target: PrintTarget,
    pub data: Vec<u8>,
    /// Shown in logs, e.g. the order label.
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintStatus {
    Success,
    Error,
}

/// Outcome of a single print attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintResult {
    pub status: PrintStatus,
    pub error_message: Option<String>,
}

impl PrintResult {
    pub fn success() -> Self {
        Self {
            status: PrintStatus::Success,
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: PrintStatus::Error,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PrintStatus::Success
    }
}

impl From<Result<(), DeviceError>> for PrintResult {
    fn from(result: Result<(), DeviceError>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Access to printer hardware.
///
/// `print` makes exactly one attempt; retrying is left to the caller.
#[async_trait]
pub trait PrinterDriver: Send + Sync {
    /// Printers known to the OS spooler.
    async fn list_system_printers(&self) -> Result<Vec<PrinterDescriptor>, DeviceError>;

    /// Printers attached over USB, whether or not the spooler knows them.
    async fn list_usb_printers(&self) -> Result<Vec<UsbPrinterDescriptor>, DeviceError>;

    /// Check that a USB printer is present without printing anything.
    async fn test_connection(&self, vendor_id: u16, product_id: u16) -> Result<(), DeviceError>;

    async fn print(&self, job: &PrintJob) -> PrintResult;

    /// Driver name for logging.
    fn name(&self) -> &str;
}

/// Timeouts used by [`SystemDriver`].
#[derive(Debug, Clone)]
pub struct SystemDriverConfig {
    /// Root of the USB device tree.
    pub usb_devices_dir: PathBuf,
    /// Directory of USB printer class devices (`lp0`, `lp1`, ...).
    pub usb_printer_class_dir: PathBuf,
    /// Directory holding the printer device nodes.
    pub dev_dir: PathBuf,
    pub spooler_timeout: Duration,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for SystemDriverConfig {
    fn default() -> Self {
        Self {
            usb_devices_dir: PathBuf::from("/sys/bus/usb/devices"),
            usb_printer_class_dir: PathBuf::from("/sys/class/usbmisc"),
            dev_dir: PathBuf::from("/dev/usb"),
            spooler_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Driver for the local machine: CUPS spooler, `usblp` devices and raw TCP.
#[derive(Debug, Clone, Default)]
pub struct SystemDriver {
    config: SystemDriverConfig,
}

impl SystemDriver {
    pub fn new(config: SystemDriverConfig) -> Self {
        Self { config }
    }

    async fn print_spooler(&self, queue: &str, data: &[u8]) -> Result<(), DeviceError> {
        if queue.is_empty() {
            return Err(DeviceError::NotFound("no printer name".to_string()));
        }

        let mut child = Command::new("lp")
            .args(["-o", "raw", "-d", queue])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeviceError::Connection(format!("failed to run lp: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data).await?;
            stdin.shutdown().await?;
        }

        let output = tokio::time::timeout(self.config.spooler_timeout, child.wait_with_output())
            .await
            .map_err(|_| DeviceError::Timeout(self.config.spooler_timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DeviceError::Print(if stderr.is_empty() {
                format!("lp exited with {}", output.status)
            } else {
                stderr
            }));
        }

        debug!(queue = %queue, stdout = %String::from_utf8_lossy(&output.stdout).trim(), "Spooler accepted job");
        Ok(())
    }

    async fn print_usb(&self, vendor_id: u16, product_id: u16, data: &[u8]) -> Result<(), DeviceError> {
        let class_dir = self.config.usb_printer_class_dir.clone();
        let node = tokio::task::spawn_blocking(move || find_usb_printer_node(&class_dir, vendor_id, product_id))
            .await
            .map_err(|e| DeviceError::Connection(e.to_string()))?
            .ok_or_else(|| {
                DeviceError::NotFound(format!("usb printer {:04x}:{:04x}", vendor_id, product_id))
            })?;
        let path = self.config.dev_dir.join(node);

        let write = async {
            let mut device = tokio::fs::OpenOptions::new().write(true).open(&path).await?;
            device.write_all(data).await?;
            device.flush().await?;
            Ok::<_, std::io::Error>(())
        };

        tokio::time::timeout(self.config.write_timeout, write)
            .await
            .map_err(|_| DeviceError::Timeout(self.config.write_timeout))?
            .map_err(|e| DeviceError::Connection(format!("{}: {}", path.display(), e)))
    }

    async fn print_network(&self, host: &str, port: u16, data: &[u8]) -> Result<(), DeviceError> {
        let mut stream = tokio::time::timeout(
            self.config.connect_timeout,
            tokio::net::TcpStream::connect((host, port)),
        )
        .await
        .map_err(|_| DeviceError::Timeout(self.config.connect_timeout))?
        .map_err(|e| DeviceError::Connection(format!("{}:{}: {}", host, port, e)))?;

        let write = async {
            stream.write_all(data).await?;
            stream.shutdown().await
        };

        tokio::time::timeout(self.config.write_timeout, write)
            .await
            .map_err(|_| DeviceError::Timeout(self.config.write_timeout))?
            .map_err(|e| DeviceError::Print(format!("{}:{}: {}", host, port, e)))
    }
}

#[async_trait]
impl PrinterDriver for SystemDriver {
    async fn list_system_printers(&self) -> Result<Vec<PrinterDescriptor>, DeviceError> {
        let output = tokio::time::timeout(
            self.config.spooler_timeout,
            Command::new("lpstat").args(["-p", "-d"]).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| DeviceError::Timeout(self.config.spooler_timeout))?
        .map_err(|e| DeviceError::Enumeration(format!("failed to run lpstat: {}", e)))?;

        // lpstat exits non-zero when no printers are installed.
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_lpstat(&stdout))
    }

    async fn list_usb_printers(&self) -> Result<Vec<UsbPrinterDescriptor>, DeviceError> {
        let root = self.config.usb_devices_dir.clone();
        let printers = tokio::task::spawn_blocking(move || scan_usb_devices(&root))
            .await
            .map_err(|e| DeviceError::Enumeration(e.to_string()))??;
        info!(count = printers.len(), "USB printers found");
        Ok(printers)
    }

    /// The printer must be enumerated and its device node must open for
    /// writing. Nothing is written.
    async fn test_connection(&self, vendor_id: u16, product_id: u16) -> Result<(), DeviceError> {
        let printers = self.list_usb_printers().await?;
        if !printers
            .iter()
            .any(|p| p.vendor_id == vendor_id && p.product_id == product_id)
        {
            return Err(DeviceError::NotFound(format!(
                "usb printer {:04x}:{:04x}",
                vendor_id, product_id
            )));
        }

        let class_dir = self.config.usb_printer_class_dir.clone();
        let node = tokio::task::spawn_blocking(move || find_usb_printer_node(&class_dir, vendor_id, product_id))
            .await
            .map_err(|e| DeviceError::Connection(e.to_string()))?
            .ok_or_else(|| {
                DeviceError::Connection(format!(
                    "usb printer {:04x}:{:04x} has no printer device",
                    vendor_id, product_id
                ))
            })?;
        let path = self.config.dev_dir.join(node);

        tokio::time::timeout(
            self.config.connect_timeout,
            tokio::fs::OpenOptions::new().write(true).open(&path),
        )
        .await
        .map_err(|_| DeviceError::Timeout(self.config.connect_timeout))?
        .map_err(|e| DeviceError::Connection(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "USB printer device opened");
        Ok(())
    }

    async fn print(&self, job: &PrintJob) -> PrintResult {
        info!(printer = %job.target, label = %job.label, bytes = job.data.len(), "Sending print job");

        let result = match &job.target {
            PrintTarget::Spooler(queue) => self.print_spooler(queue, &job.data).await,
            PrintTarget::Usb {
                vendor_id,
                product_id,
            } => self.print_usb(*vendor_id, *product_id, &job.data).await,
            PrintTarget::Network { host, port } => self.print_network(host, *port, &job.data).await,
        };

        if let Err(ref e) = result {
            warn!(printer = %job.target, label = %job.label, error = %e, "Print job failed");
        }
        result.into()
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// Parse `lpstat -p -d` output.
pub fn parse_lpstat(output: &str) -> Vec<PrinterDescriptor> {
    let default = output.lines().find_map(|line| {
        line.strip_prefix("system default destination:")
            .map(|name| name.trim().to_string())
    });

    output
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("printer ")?;
            let (name, state) = rest.split_once(' ')?;
            let status = if state.starts_with("disabled") {
                "disabled"
            } else if state.contains("now printing") {
                "printing"
            } else if state.contains("idle") {
                "idle"
            } else {
                "unknown"
            };
            Some(PrinterDescriptor {
                name: name.to_string(),
                status: status.to_string(),
                is_default: default.as_deref() == Some(name),
            })
        })
        .collect()
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(name))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_hex_attr(dir: &Path, name: &str) -> Option<u16> {
    read_attr(dir, name).and_then(|value| u16::from_str_radix(&value, 16).ok())
}

/// Whether any interface of a USB device has the printer class.
fn has_printer_interface(device_dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(device_dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        // Interface directories are named like "1-1.4:1.0".
        entry.file_name().to_string_lossy().contains(':')
            && read_attr(&entry.path(), "bInterfaceClass")
                .and_then(|class| u8::from_str_radix(&class, 16).ok())
                == Some(USB_CLASS_PRINTER)
    })
}

/// List USB devices under a sysfs-style tree that are printers or come from
/// a known thermal printer vendor.
pub fn scan_usb_devices(root: &Path) -> Result<Vec<UsbPrinterDescriptor>, DeviceError> {
    let entries = std::fs::read_dir(root)
        .map_err(|e| DeviceError::Enumeration(format!("{}: {}", root.display(), e)))?;

    let mut printers = Vec::new();
    for entry in entries.flatten() {
        let dir = entry.path();
        let (Some(vendor_id), Some(product_id)) =
            (read_hex_attr(&dir, "idVendor"), read_hex_attr(&dir, "idProduct"))
        else {
            continue;
        };

        let vendor = known_vendor(vendor_id);
        if vendor.is_none() && !has_printer_interface(&dir) {
            continue;
        }

        printers.push(UsbPrinterDescriptor {
            vendor_id,
            product_id,
            manufacturer: read_attr(&dir, "manufacturer")
                .or_else(|| vendor.map(str::to_string))
                .unwrap_or_else(|| "Unknown".to_string()),
            product: read_attr(&dir, "product").unwrap_or_else(|| "Thermal Printer".to_string()),
            is_known_vendor: vendor.is_some(),
        });
    }

    printers.sort_by_key(|p| (p.vendor_id, p.product_id));
    printers.dedup_by_key(|p| (p.vendor_id, p.product_id));
    Ok(printers)
}

/// Find the `lpN` node of a USB printer in the usbmisc class directory.
///
/// Each `lpN` entry links to the printer interface, whose parent directory
/// holds the device ids.
pub fn find_usb_printer_node(class_dir: &Path, vendor_id: u16, product_id: u16) -> Option<String> {
    let entries = std::fs::read_dir(class_dir).ok()?;
    let mut nodes: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("lp") {
                return None;
            }
            let device = entry.path().join("device").join("..");
            (read_hex_attr(&device, "idVendor") == Some(vendor_id)
                && read_hex_attr(&device, "idProduct") == Some(product_id))
            .then_some(name)
        })
        .collect();
    nodes.sort();
    nodes.into_iter().next()
}

#[derive(Debug, Default)]
struct MockState {
    system_printers: Vec<PrinterDescriptor>,
    usb_printers: Vec<UsbPrinterDescriptor>,
    fail_enumeration: bool,
    failures: VecDeque<String>,
    jobs: Vec<PrintJob>,
}

/// In-memory driver for tests.
///
/// Every job is recorded, including the ones scripted to fail.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_system_printer(self, name: &str, is_default: bool) -> Self {
        self.state().system_printers.push(PrinterDescriptor {
            name: name.to_string(),
            status: "idle".to_string(),
            is_default,
        });
        self
    }

    pub fn with_usb_printer(self, vendor_id: u16, product_id: u16) -> Self {
        self.state().usb_printers.push(UsbPrinterDescriptor {
            vendor_id,
            product_id,
            manufacturer: known_vendor(vendor_id).unwrap_or("Unknown").to_string(),
            product: "Thermal Printer".to_string(),
            is_known_vendor: known_vendor(vendor_id).is_some(),
        });
        self
    }

    /// Make enumeration calls fail.
    pub fn fail_enumeration(&self) {
        self.state().fail_enumeration = true;
    }

    /// Make the next print attempt fail with `message`.
    pub fn fail_next(&self, message: &str) {
        self.state().failures.push_back(message.to_string());
    }

    pub fn jobs(&self) -> Vec<PrintJob> {
        self.state().jobs.clone()
    }

    pub fn job_count(&self) -> usize {
        self.state().jobs.len()
    }
}

#[async_trait]
impl PrinterDriver for MockDriver {
    async fn list_system_printers(&self) -> Result<Vec<PrinterDescriptor>, DeviceError> {
        let state = self.state();
        if state.fail_enumeration {
            return Err(DeviceError::Enumeration("mock enumeration failure".to_string()));
        }
        Ok(state.system_printers.clone())
    }

    async fn list_usb_printers(&self) -> Result<Vec<UsbPrinterDescriptor>, DeviceError> {
        let state = self.state();
        if state.fail_enumeration {
            return Err(DeviceError::Enumeration("mock enumeration failure".to_string()));
        }
        Ok(state.usb_printers.clone())
    }

    async fn test_connection(&self, vendor_id: u16, product_id: u16) -> Result<(), DeviceError> {
        let found = self
            .state()
            .usb_printers
            .iter()
            .any(|p| p.vendor_id == vendor_id && p.product_id == product_id);
        if found {
            Ok(())
        } else {
            Err(DeviceError::NotFound(format!(
                "usb printer {:04x}:{:04x}",
                vendor_id, product_id
            )))
        }
    }

    async fn print(&self, job: &PrintJob) -> PrintResult {
        let mut state = self.state();
        state.jobs.push(job.clone());
        match state.failures.pop_front() {
            Some(message) => PrintResult::error(message),
            None => PrintResult::success(),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

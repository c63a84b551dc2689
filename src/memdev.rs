// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::transport::{DevNodeTransport, Transport};
use crate::{Config, Error, Mailbox, Result};

/// Smallest mailbox payload a device may implement.
// CXL 2.0, 8.2.8.4.3, Payload Size
const MIN_PAYLOAD_MAX: usize = 256;

/// A CXL memory device, as found at discovery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Memdev {
    id: u32,
    devname: String,
    node: PathBuf,
    major: u32,
    minor: u32,
    pmem_size: u64,
    ram_size: u64,
    payload_max: usize,
    lsa_size: usize,
    firmware_version: String,
}

impl Memdev {
    pub fn builder(id: u32) -> MemdevBuilder {
        MemdevBuilder::new(id)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn devname(&self) -> &str {
        &self.devname
    }

    /// Path of the mailbox character node.
    pub fn node(&self) -> &Path {
        &self.node
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn pmem_size(&self) -> u64 {
        self.pmem_size
    }

    pub fn ram_size(&self) -> u64 {
        self.ram_size
    }

    pub fn payload_max(&self) -> usize {
        self.payload_max
    }

    pub fn lsa_size(&self) -> usize {
        self.lsa_size
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }
}

pub struct MemdevBuilder {
    id: u32,
    devname: Option<String>,
    node: Option<PathBuf>,
    major: u32,
    minor: u32,
    pmem_size: u64,
    ram_size: u64,
    payload_max: usize,
    lsa_size: usize,
    firmware_version: String,
}

impl MemdevBuilder {
    fn new(id: u32) -> Self {
        Self {
            id,
            devname: None,
            node: None,
            major: 0,
            minor: 0,
            pmem_size: 0,
            ram_size: 0,
            payload_max: MIN_PAYLOAD_MAX,
            lsa_size: 0,
            firmware_version: String::new(),
        }
    }

    pub fn devname(&mut self, devname: impl Into<String>) -> &mut Self {
        self.devname = Some(devname.into());
        self
    }

    pub fn node(&mut self, node: impl Into<PathBuf>) -> &mut Self {
        self.node = Some(node.into());
        self
    }

    pub fn dev(&mut self, major: u32, minor: u32) -> &mut Self {
        self.major = major;
        self.minor = minor;
        self
    }

    pub fn pmem_size(&mut self, size: u64) -> &mut Self {
        self.pmem_size = size;
        self
    }

    pub fn ram_size(&mut self, size: u64) -> &mut Self {
        self.ram_size = size;
        self
    }

    pub fn payload_max(&mut self, size: usize) -> &mut Self {
        self.payload_max = size;
        self
    }

    pub fn lsa_size(&mut self, size: usize) -> &mut Self {
        self.lsa_size = size;
        self
    }

    pub fn firmware_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.firmware_version = version.into();
        self
    }

    /// Unset names default to `mem<id>`, with the node under the default
    /// device root.
    pub fn build(&self) -> Memdev {
        let devname = self
            .devname
            .clone()
            .unwrap_or_else(|| format!("mem{}", self.id));
        let node = self
            .node
            .clone()
            .unwrap_or_else(|| Config::default().node_path(&devname));
        Memdev {
            id: self.id,
            devname,
            node,
            major: self.major,
            minor: self.minor,
            pmem_size: self.pmem_size,
            ram_size: self.ram_size,
            payload_max: self.payload_max,
            lsa_size: self.lsa_size,
            firmware_version: self.firmware_version.clone(),
        }
    }
}

/// Something that can enumerate memdevs.
pub trait DeviceSource {
    fn discover(&self, config: &Config) -> Result<Vec<Memdev>>;
}

/// A fixed list of memdevs.
#[derive(Clone, Debug, Default)]
pub struct StaticSource(pub Vec<Memdev>);

impl DeviceSource for StaticSource {
    fn discover(&self, _config: &Config) -> Result<Vec<Memdev>> {
        Ok(self.0.clone())
    }
}

/// Memdevs exported by the kernel under the CXL bus in sysfs.
#[derive(Clone, Copy, Debug, Default)]
pub struct SysfsSource;

impl SysfsSource {
    fn probe(config: &Config, id: u32, devname: &str, dir: &Path) -> Result<Memdev> {
        let dev = read_attr(dir, "dev")?;
        let (major, minor) = parse_dev(&dev).ok_or_else(|| Error::Discovery {
            path: dir.join("dev"),
            reason: format!("invalid device number '{dev}'"),
        })?;
        let payload_max = read_number(dir, "payload_max")?;

        let mut builder = Memdev::builder(id);
        builder
            .devname(devname)
            .node(config.node_path(devname))
            .dev(major, minor)
            .payload_max(payload_max as usize);

        // optional attributes
        if let Ok(size) = read_number(dir, "pmem/size") {
            builder.pmem_size(size);
        }
        if let Ok(size) = read_number(dir, "ram/size") {
            builder.ram_size(size);
        }
        if let Ok(size) = read_number(dir, "label_storage_size") {
            builder.lsa_size(size as usize);
        }
        if let Ok(version) = read_attr(dir, "firmware_version") {
            builder.firmware_version(version);
        }
        Ok(builder.build())
    }
}

impl DeviceSource for SysfsSource {
    fn discover(&self, config: &Config) -> Result<Vec<Memdev>> {
        let root = config.sysfs_root();
        let entries = fs::read_dir(root).map_err(|e| Error::Discovery {
            path: root.to_owned(),
            reason: e.to_string(),
        })?;

        let mut memdevs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(id) = parse_id(name, config.memdev_prefix()) else {
                continue;
            };
            match Self::probe(config, id, name, &entry.path()) {
                Ok(memdev) => memdevs.push(memdev),
                Err(e) => debug!("{name}: skipped: {e}"),
            }
        }
        memdevs.sort_by_key(Memdev::id);
        Ok(memdevs)
    }
}

fn parse_id(name: &str, prefix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_dev(dev: &str) -> Option<(u32, u32)> {
    let (major, minor) = dev.split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn read_attr(dir: &Path, attr: &str) -> Result<String> {
    let path = dir.join(attr);
    match fs::read_to_string(&path) {
        Ok(s) => Ok(s.trim().to_owned()),
        Err(e) => Err(Error::Discovery {
            path,
            reason: e.to_string(),
        }),
    }
}

fn read_number(dir: &Path, attr: &str) -> Result<u64> {
    let s = read_attr(dir, attr)?;
    parse_number(&s).ok_or_else(|| Error::Discovery {
        path: dir.join(attr),
        reason: format!("invalid number '{s}'"),
    })
}

/// Library context: configuration, discovery and the memdev registry.
///
/// Memdevs are enumerated once, on first use, and live as long as the
/// context.
pub struct Context {
    config: Config,
    source: Box<dyn DeviceSource>,
    transport: Box<dyn Transport>,
    memdevs: OnceCell<Vec<Memdev>>,
}

impl Context {
    /// Discover through sysfs and talk to the kernel's memdev nodes.
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, Box::new(SysfsSource), Box::new(DevNodeTransport::new()))
    }

    pub fn with_parts(
        config: Config,
        source: Box<dyn DeviceSource>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            config,
            source,
            transport,
            memdevs: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// All memdevs, sorted as discovered. A duplicate id keeps the first
    /// memdev seen.
    pub fn memdevs(&self) -> Result<&[Memdev]> {
        if let Some(memdevs) = self.memdevs.get() {
            return Ok(memdevs);
        }

        let mut memdevs: Vec<Memdev> = Vec::new();
        for memdev in self.source.discover(&self.config)? {
            if memdevs.iter().any(|m| m.id() == memdev.id()) {
                warn!("{}: duplicate memdev id {}", memdev.devname(), memdev.id());
                continue;
            }
            debug!(
                "{}: added, payload max {}, lsa {}",
                memdev.devname(),
                memdev.payload_max(),
                memdev.lsa_size()
            );
            memdevs.push(memdev);
        }
        Ok(self.memdevs.get_or_init(|| memdevs))
    }

    pub fn memdev(&self, id: u32) -> Result<&Memdev> {
        self.memdevs()?
            .iter()
            .find(|m| m.id() == id)
            .ok_or(Error::NoDevice(id))
    }

    pub fn memdev_by_name(&self, devname: &str) -> Result<Option<&Memdev>> {
        Ok(self.memdevs()?.iter().find(|m| m.devname() == devname))
    }

    pub fn mailbox<'a>(&'a self, memdev: &'a Memdev) -> Mailbox<'a> {
        Mailbox::new(memdev, self.transport.as_ref())
    }
}

// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const DEFAULT_DEV_ROOT: &str = "/dev/cxl";
const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/cxl/devices";
const DEFAULT_MEMDEV_PREFIX: &str = "mem";

pub const ENV_DEV_ROOT: &str = "CXL_DEV_ROOT";
pub const ENV_SYSFS_ROOT: &str = "CXL_SYSFS_ROOT";

/// Where memory devices are discovered and where their mailbox nodes live.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    dev_root: PathBuf,
    sysfs_root: PathBuf,
    memdev_prefix: String,
}

impl Config {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        Default::default()
    }

    /// Defaults overlaid with `CXL_DEV_ROOT` and `CXL_SYSFS_ROOT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut builder = Self::builder();
        if let Some(dev) = lookup(ENV_DEV_ROOT) {
            builder.dev_root(dev);
        }
        if let Some(sysfs) = lookup(ENV_SYSFS_ROOT) {
            builder.sysfs_root(sysfs);
        }
        builder.build()
    }

    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }

    pub fn memdev_prefix(&self) -> &str {
        &self.memdev_prefix
    }

    /// Mailbox character device for `devname`.
    pub fn node_path(&self, devname: &str) -> PathBuf {
        self.dev_root.join(devname)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

pub struct ConfigBuilder {
    dev_root: PathBuf,
    sysfs_root: PathBuf,
    memdev_prefix: String,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            dev_root: PathBuf::from(DEFAULT_DEV_ROOT),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            memdev_prefix: DEFAULT_MEMDEV_PREFIX.into(),
        }
    }
}

impl ConfigBuilder {
    pub fn dev_root(&mut self, dev_root: impl Into<PathBuf>) -> &mut Self {
        self.dev_root = dev_root.into();
        self
    }

    pub fn sysfs_root(&mut self, sysfs_root: impl Into<PathBuf>) -> &mut Self {
        self.sysfs_root = sysfs_root.into();
        self
    }

    pub fn memdev_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.memdev_prefix = prefix.into();
        self
    }

    pub fn build(&self) -> Config {
        Config {
            dev_root: self.dev_root.clone(),
            sysfs_root: self.sysfs_root.clone(),
            memdev_prefix: self.memdev_prefix.clone(),
        }
    }
}

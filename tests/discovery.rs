// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
mod common;

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use cxl_mbox::{Config, Context, DeviceSource, Error, Memdev, SysfsSource};

use crate::common::{CountingSource, KERNEL_COMMANDS, MockKernel, setup, transport};

fn write_attr(dir: &Path, attr: &str, value: &str) {
    let path = dir.join(attr);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, value).unwrap();
}

fn add_memdev(root: &Path, name: &str, attrs: &[(&str, &str)]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for (attr, value) in attrs {
        write_attr(&dir, attr, value);
    }
}

#[test]
fn sysfs_walk() {
    setup();

    let root = tempfile::tempdir().unwrap();
    add_memdev(
        root.path(),
        "mem10",
        &[("dev", "250:10\n"), ("payload_max", "1024\n")],
    );
    add_memdev(
        root.path(),
        "mem0",
        &[
            ("dev", "250:0\n"),
            ("payload_max", "4096\n"),
            ("pmem/size", "0x10000000\n"),
            ("ram/size", "0\n"),
            ("label_storage_size", "131072\n"),
            ("firmware_version", "BWFW 1.0\n"),
        ],
    );
    // no device number
    add_memdev(root.path(), "mem1", &[("payload_max", "4096\n")]);
    // unparseable device number
    add_memdev(
        root.path(),
        "mem2",
        &[("dev", "bogus\n"), ("payload_max", "4096\n")],
    );
    // not a memdev
    add_memdev(root.path(), "memory", &[("dev", "1:1\n")]);
    add_memdev(root.path(), "decoder0.0", &[]);

    let config = Config::builder()
        .sysfs_root(root.path())
        .dev_root("/run/cxl")
        .build();
    let memdevs = SysfsSource.discover(&config).unwrap();

    let ids: Vec<u32> = memdevs.iter().map(Memdev::id).collect();
    assert_eq!(ids, [0, 10]);

    let mem0 = &memdevs[0];
    assert_eq!(mem0.devname(), "mem0");
    assert_eq!(mem0.node(), Path::new("/run/cxl/mem0"));
    assert_eq!((mem0.major(), mem0.minor()), (250, 0));
    assert_eq!(mem0.payload_max(), 4096);
    assert_eq!(mem0.pmem_size(), 0x1000_0000);
    assert_eq!(mem0.ram_size(), 0);
    assert_eq!(mem0.lsa_size(), 131072);
    assert_eq!(mem0.firmware_version(), "BWFW 1.0");

    let mem10 = &memdevs[1];
    assert_eq!(mem10.lsa_size(), 0);
    assert_eq!(mem10.firmware_version(), "");
}

#[test]
fn missing_sysfs_root() {
    setup();

    let root = tempfile::tempdir().unwrap();
    let config = Config::builder()
        .sysfs_root(root.path().join("absent"))
        .build();
    let err = SysfsSource.discover(&config).unwrap_err();
    assert!(matches!(err, Error::Discovery { .. }));
    assert_eq!(err.errno(), nix::errno::Errno::ENODEV);
}

#[test]
fn registry_memoized_and_deduplicated() {
    setup();

    let calls = Rc::new(Cell::new(0));
    let source = CountingSource {
        memdevs: vec![
            Memdev::builder(1).devname("mem1").build(),
            Memdev::builder(0).devname("mem0").build(),
            Memdev::builder(1).devname("mem1-dup").build(),
        ],
        calls: calls.clone(),
    };
    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    let ctx = Context::with_parts(Config::new(), Box::new(source), Box::new(transport(&kernel)));

    let names: Vec<&str> = ctx.memdevs().unwrap().iter().map(Memdev::devname).collect();
    assert_eq!(names, ["mem1", "mem0"]);
    assert_eq!(ctx.memdevs().unwrap().len(), 2);
    assert_eq!(calls.get(), 1);

    assert_eq!(ctx.memdev(1).unwrap().devname(), "mem1");
    assert!(matches!(ctx.memdev(7), Err(Error::NoDevice(7))));
    assert_eq!(ctx.memdev_by_name("mem0").unwrap().map(Memdev::id), Some(0));
    assert!(ctx.memdev_by_name("mem1-dup").unwrap().is_none());
    assert_eq!(calls.get(), 1);
}

#[test]
fn env_overrides() {
    let config = Config::from_lookup(|key| match key {
        "CXL_DEV_ROOT" => Some("/tmp/dev".into()),
        _ => None,
    });
    assert_eq!(config.dev_root(), Path::new("/tmp/dev"));
    assert_eq!(config.sysfs_root(), Path::new("/sys/bus/cxl/devices"));
    assert_eq!(config.node_path("mem3"), Path::new("/tmp/dev/mem3"));
}

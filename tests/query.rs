// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
mod common;

use cxl_mbox::cxl::{CommandId, PayloadSize};
use cxl_mbox::transport::Transport;
use cxl_mbox::{Command, Error, QueryStatus, State};
use nix::errno::Errno;

use crate::common::{
    GET_HEALTH_INFO, GET_SUPPORTED_LOGS, IDENTIFY, KERNEL_COMMANDS, MockKernel, null_memdev,
    setup, transport,
};

#[test]
fn query_is_idempotent() {
    setup();

    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::GetHealthInfo);
    cmd.query().unwrap();
    let first = (cmd.index(), cmd.query_status());
    cmd.query().unwrap();
    assert_eq!((cmd.index(), cmd.query_status()), first);
    assert_eq!(first, (Some(4), QueryStatus::Ok));

    // two phases, run once
    assert_eq!(kernel.queries(), [0, 7]);
}

#[test]
fn fresh_commands_agree() {
    setup();

    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut a = Command::new(&t, &memdev, CommandId::Identify);
    let mut b = Command::new(&t, &memdev, CommandId::Identify);
    a.query().unwrap();
    b.query().unwrap();
    assert_eq!(a.index(), b.index());
    assert_eq!(a.size_out(), b.size_out());
}

#[test]
fn enumerate_five() {
    setup();

    let kernel = MockKernel::new(&[
        (IDENTIFY, 0, 0x43),
        (GET_SUPPORTED_LOGS, 0, -1),
        (GET_HEALTH_INFO, 0, 0x12),
        (11, 0, 0x10),
        (12, 0x0c, 0),
    ]);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let probe = t.enumerate(&memdev, 0).unwrap();
    assert_eq!(probe.count, 5);
    assert!(probe.commands.is_empty());

    let list = t.enumerate(&memdev, probe.count).unwrap();
    assert_eq!(list.commands.len(), 5);
    assert_eq!(list.commands[3].id, 11);
    assert_eq!(list.commands[4].size_in(), PayloadSize::Fixed(0x0c));

    assert_eq!(kernel.queries(), [0, 5]);
}

#[test]
fn enumerate_none() {
    setup();

    let kernel = MockKernel::new(&[]);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::Identify);
    assert!(matches!(cmd.query(), Err(Error::Unsupported(_))));
    assert_eq!(cmd.query_status(), QueryStatus::Unsupported);
    assert_eq!(cmd.index(), None);
    // no second phase for an empty list
    assert_eq!(kernel.queries(), [0]);
}

#[test]
fn first_match_binds() {
    setup();

    let kernel = MockKernel::new(&[
        (GET_SUPPORTED_LOGS, 0, -1),
        (GET_HEALTH_INFO, 0, 0x12),
        (GET_HEALTH_INFO, 0, 0x40),
    ]);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::GetHealthInfo);
    cmd.query().unwrap();
    assert_eq!(cmd.index(), Some(1));
    assert_eq!(cmd.size_out(), PayloadSize::Fixed(0x12));
}

#[test]
fn declared_input_size_is_allocated() {
    setup();

    let kernel = MockKernel::new(&[(GET_SUPPORTED_LOGS, 64, 0)]);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::GetSupportedLogs);
    cmd.query().unwrap();
    cmd.build().unwrap();
    assert_eq!(cmd.state(), State::Built);
    assert_eq!(cmd.input().map(<[u8]>::len), Some(64));
    assert!(cmd.output_buffer().is_none());

    cmd.submit().unwrap();
    let sent = kernel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].input.len(), 64);
    assert_eq!(sent[0].output_len, 0);
}

#[test]
fn variable_output_takes_payload_max() {
    setup();

    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::GetSupportedLogs);
    cmd.query().unwrap();
    cmd.build().unwrap();
    assert_eq!(cmd.output_buffer().map(<[u8]>::len), Some(memdev.payload_max()));
}

#[test]
fn oversize_caller_buffer() {
    setup();

    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut big = vec![0u8; memdev.payload_max() + 1];
    let mut cmd = Command::new(&t, &memdev, CommandId::GetSupportedLogs);
    cmd.query().unwrap();
    assert!(matches!(
        cmd.set_output_payload(&mut big),
        Err(Error::PayloadTooLarge { size: 257, max: 256 })
    ));
    assert!(matches!(
        cmd.set_input_payload(vec![0u8; 300]),
        Err(Error::PayloadTooLarge { size: 300, .. })
    ));
    assert_eq!(kernel.sends(), 0);
}

#[test]
fn submit_without_query() {
    setup();

    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::Identify);
    let err = cmd.submit().unwrap_err();
    assert!(matches!(err, Error::NotQueried(_)));
    assert_eq!(err.errno(), nix::errno::Errno::EINVAL);
    assert!(kernel.queries().is_empty());
    assert_eq!(kernel.sends(), 0);
}

#[test]
fn unsupported_submit() {
    setup();

    let kernel = MockKernel::new(&[(IDENTIFY, 0, 0x43)]);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::GetLsa);
    assert!(cmd.query().is_err());
    let err = cmd.submit().unwrap_err();
    assert_eq!(err.errno(), nix::errno::Errno::EOPNOTSUPP);
    assert_eq!(kernel.sends(), 0);
}

#[test]
fn count_probe_error_aborts() {
    setup();

    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    kernel.fail_query(0, Errno::ENOTTY);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::Identify);
    let err = cmd.query().unwrap_err();
    assert!(matches!(err, Error::Transport(Errno::ENOTTY)));
    assert_eq!(err.errno(), Errno::ENOTTY);
    assert_eq!(cmd.query_status(), QueryStatus::NotRun);
    assert_eq!(kernel.queries(), [0]);

    cmd.query().unwrap();
    assert_eq!(cmd.query_status(), QueryStatus::Ok);
    assert_eq!(kernel.queries(), [0, 0, 7]);
}

#[test]
fn list_fetch_error_aborts() {
    setup();

    let kernel = MockKernel::new(&KERNEL_COMMANDS);
    kernel.fail_query(1, Errno::ENOTTY);
    let t = transport(&kernel);
    let memdev = null_memdev(0);

    let mut cmd = Command::new(&t, &memdev, CommandId::GetHealthInfo);
    assert!(matches!(cmd.query(), Err(Error::Transport(Errno::ENOTTY))));
    assert_eq!(cmd.query_status(), QueryStatus::NotRun);
    assert_eq!(cmd.index(), None);
    assert!(matches!(cmd.submit(), Err(Error::NotQueried(_))));

    // a retry runs both phases again
    cmd.query().unwrap();
    assert_eq!(cmd.index(), Some(4));
    assert_eq!(kernel.queries(), [0, 7, 0, 7]);
    assert_eq!(kernel.sends(), 0);
}

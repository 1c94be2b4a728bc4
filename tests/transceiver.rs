// can-transceiver/tests/transceiver.rs
//
// Integration tests for the CAN transceiver.
//
// The tests on a live bus need a virtual CAN interface named "vcan0" and
// are only built with the `vcan_tests` feature:
//
//   $ sudo ip link add dev vcan0 type vcan
//   $ sudo ip link set up vcan0
//   $ cargo test --features=vcan_tests

use can_transceiver::{DeviceConfig, ErrorKind, SetupStage, Transceiver};

#[cfg(feature = "vcan_tests")]
use can_transceiver::{EmbeddedFrame, Frame, RxState};
#[cfg(feature = "vcan_tests")]
use serial_test::serial;
#[cfg(feature = "vcan_tests")]
use std::{sync::mpsc, time::Duration};

// The virtual CAN interface to use for tests.
#[cfg(feature = "vcan_tests")]
const VCAN: &str = "vcan0";

#[test]
fn test_nonexistent_device() {
    let cfg = DeviceConfig::write_only("invalid", 0x100).unwrap();
    let err = Transceiver::open(cfg).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(err.to_string().contains("invalid"));
}

#[test]
fn test_nonexistent_device_reader() {
    let cfg = DeviceConfig::read_only("nosuchcan9", 0x301, |_| {}).unwrap();

    match Transceiver::open(cfg) {
        Err(can_transceiver::Error::Resource { stage, .. }) => {
            // Sandboxed hosts may not even allow creating the socket
            assert!(matches!(
                stage,
                SetupStage::CreateSocket | SetupStage::ResolveInterface
            ));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
#[serial]
#[cfg(feature = "vcan_tests")]
fn vcan_end_to_end() {
    let (tx, rx) = mpsc::channel();

    let cfg = DeviceConfig::read_only(VCAN, 0x301, move |frame| {
        let _ = tx.send(*frame);
    })
    .unwrap()
    .with_read_timeout(Duration::from_millis(100))
    .unwrap();
    let mut reader = Transceiver::open(cfg).unwrap();
    reader.read().unwrap();

    let writer = Transceiver::open(DeviceConfig::write_only(VCAN, 0x302).unwrap()).unwrap();
    let peer = Transceiver::open(DeviceConfig::write_only(VCAN, 0x301).unwrap()).unwrap();

    // Filtered out, by the kernel
    writer.send(&[0x01]).unwrap();
    peer.send(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();

    let frame = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(frame.raw_id(), 0x301);
    assert_eq!(frame.data(), &[0xAA, 0xBB, 0xCC, 0xDD]);

    reader.stop().unwrap();
    assert_eq!(reader.state(), RxState::Stopped);
    assert!(rx.try_recv().is_err());
}

#[test]
#[serial]
#[cfg(feature = "vcan_tests")]
fn vcan_extended_end_to_end() {
    let (tx, rx) = mpsc::channel();

    let cfg = DeviceConfig::read_only(VCAN, 0x1234_5678, move |frame| {
        let _ = tx.send(*frame);
    })
    .unwrap();
    let mut reader = Transceiver::open(cfg).unwrap();
    reader.read().unwrap();

    let peer = Transceiver::open(DeviceConfig::write_only(VCAN, 0x1234_5678).unwrap()).unwrap();
    peer.send(&[]).unwrap();

    let frame = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(frame.is_extended());
    assert_eq!(frame.raw_id(), 0x1234_5678);
    assert_eq!(frame.dlc(), 0);
}

#[test]
#[serial]
#[cfg(feature = "vcan_tests")]
fn vcan_read_write() {
    let (tx, rx) = mpsc::channel();

    // Two ends of a link: each reads what the other writes
    let a = DeviceConfig::read_write(
        VCAN,
        0x101,
        move |frame| {
            let _ = tx.send(*frame);
        },
        0x100,
    )
    .unwrap();
    let mut a = Transceiver::open(a).unwrap();

    let b = DeviceConfig::read_write(VCAN, 0x100, |_| {}, 0x101).unwrap();
    let b = Transceiver::open(b).unwrap();

    a.read().unwrap();
    a.send(&[0x01]).unwrap();
    b.send(&[0x02]).unwrap();

    let frame = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(frame.raw_id(), 0x101);
    assert_eq!(frame.data(), &[0x02]);

    a.stop().unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
#[serial]
#[cfg(feature = "vcan_tests")]
fn vcan_stop_is_bounded() {
    let cfg = DeviceConfig::read_only(VCAN, 0x7FF, |_| {})
        .unwrap()
        .with_read_timeout(Duration::from_millis(100))
        .unwrap();
    let mut dev = Transceiver::open(cfg).unwrap();
    dev.read().unwrap();
    assert!(dev.is_running());

    let start = std::time::Instant::now();
    dev.stop().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}

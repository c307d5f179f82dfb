use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use sysgpio::{
    Direction, EdgeDetect, GpioError, HostSysfs, MockSysfs, PinHandle, SysfsIo, SysfsPaths,
};

const ROOT: &str = "/mock/sys/class/gpio";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mock_pin(number: u32, direction: Direction) -> (Arc<MockSysfs>, PinHandle) {
    init_logger();
    let fs = Arc::new(MockSysfs::new(ROOT));
    let pin = PinHandle::new(fs.clone(), ROOT, number, direction);
    (fs, pin)
}

fn paths() -> SysfsPaths {
    SysfsPaths::new(ROOT)
}

#[test]
fn release_without_init_is_a_noop() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);

    pin.release();
    pin.release();

    assert!(!pin.is_exported());
    assert!(fs.writes().is_empty());
}

#[test]
fn release_twice_unexports_once() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);
    pin.init(false).expect("init");

    pin.release();
    pin.release();

    assert_eq!(fs.writes_to(&paths().unexport()), 1);
    assert!(fs.exported_pins().is_empty());
}

#[test]
fn second_init_releases_before_exporting_again() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);
    pin.init(false).expect("first init");
    let before = fs.writes().len();

    pin.init(false).expect("second init");

    let between: Vec<PathBuf> = fs.writes()[before..]
        .iter()
        .map(|(path, _)| path.clone())
        .collect();
    assert_eq!(
        between,
        vec![paths().unexport(), paths().export(), paths().direction(7)]
    );
    assert_eq!(fs.exported_pins(), vec![7]);
    assert!(pin.is_exported());
}

#[test]
fn read_decodes_only_ascii_one_as_high() {
    let (fs, mut pin) = mock_pin(3, Direction::In);
    pin.init(false).expect("init");
    let value = paths().value(3);

    fs.set_contents(&value, b"1\n");
    assert_eq!(pin.read().unwrap(), 1);

    fs.set_contents(&value, b"0\n");
    assert_eq!(pin.read().unwrap(), 0);

    fs.set_contents(&value, b"x");
    assert_eq!(pin.read().unwrap(), 0);
}

#[test]
fn write_emits_a_single_ascii_digit() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);
    pin.init(false).expect("init");
    let value = paths().value(7);

    pin.write(1).expect("write 1");
    pin.write(0).expect("write 0");

    let written: Vec<Vec<u8>> = fs
        .writes()
        .into_iter()
        .filter(|(path, _)| *path == value)
        .map(|(_, data)| data)
        .collect();
    assert_eq!(written, vec![b"1".to_vec(), b"0".to_vec()]);
}

#[test]
fn write_rejects_out_of_range_values() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);
    pin.init(false).expect("init");

    let err = pin.write(2).unwrap_err();
    assert!(matches!(err, GpioError::InvalidValue(_)));
    assert_eq!(fs.writes_to(&paths().value(7)), 0);
}

#[test]
fn write_on_input_pin_is_rejected() {
    let (fs, mut pin) = mock_pin(4, Direction::In);
    pin.init(false).expect("init");

    let err = pin.write(1).unwrap_err();
    assert!(matches!(err, GpioError::InvalidState(_)));
    assert_eq!(fs.writes_to(&paths().value(4)), 0);
}

#[test]
fn read_and_write_require_export() {
    let (fs, pin) = mock_pin(7, Direction::Out);

    assert!(matches!(pin.read(), Err(GpioError::NotExported(7))));
    assert!(matches!(pin.write(1), Err(GpioError::NotExported(7))));
    assert!(fs.writes().is_empty());
}

#[test]
fn edge_enabled_init_writes_both_after_direction() {
    let (fs, mut pin) = mock_pin(5, Direction::In);

    pin.init(true).expect("init");

    let order: Vec<PathBuf> = fs.writes().into_iter().map(|(path, _)| path).collect();
    assert_eq!(
        order,
        vec![paths().export(), paths().direction(5), paths().edge(5)]
    );
    assert_eq!(fs.contents(&paths().edge(5)).unwrap(), b"both");
    assert!(pin.edge_enabled());
    assert_eq!(pin.edge(), EdgeDetect::Both);
}

#[test]
fn init_without_edge_leaves_edge_untouched() {
    let (fs, mut pin) = mock_pin(5, Direction::In);

    pin.init(false).expect("init");

    assert_eq!(fs.writes_to(&paths().edge(5)), 0);
    assert!(!pin.edge_enabled());
}

#[test]
fn init_with_rising_edge_writes_rising() {
    let (fs, mut pin) = mock_pin(5, Direction::In);

    pin.init_with_edge(EdgeDetect::Rising).expect("init");

    assert_eq!(fs.contents(&paths().edge(5)).unwrap(), b"rising");
}

#[test]
fn export_failure_leaves_pin_unexported() {
    let (fs, mut pin) = mock_pin(9, Direction::Out);
    fs.write(&paths().export(), b"9").expect("foreign export");

    let err = pin.init(false).unwrap_err();
    match err {
        GpioError::Export { pin: 9, source } => {
            assert_eq!(source.kind(), ErrorKind::ResourceBusy)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!pin.is_exported());

    // a never-exported handle must not unexport the foreign owner's pin
    pin.release();
    assert_eq!(fs.writes_to(&paths().unexport()), 0);
    assert_eq!(fs.exported_pins(), vec![9]);
}

#[test]
fn config_failure_can_be_cleaned_up_by_release() {
    let (fs, mut pin) = mock_pin(6, Direction::In);
    fs.fail_path(&paths().edge(6));

    let err = pin.init(true).unwrap_err();
    assert!(matches!(
        err,
        GpioError::Configure {
            pin: 6,
            attribute: "edge",
            ..
        }
    ));
    assert!(!pin.is_exported());
    assert_eq!(fs.exported_pins(), vec![6]);

    pin.release();
    assert!(fs.exported_pins().is_empty());
}

#[test]
fn reinit_after_config_failure_recovers() {
    let (fs, mut pin) = mock_pin(6, Direction::Out);
    fs.fail_path(&paths().direction(6));
    assert!(pin.init(false).is_err());

    fs.clear_failure(&paths().direction(6));
    pin.init(false).expect("retry");

    assert!(pin.is_exported());
    assert_eq!(fs.exported_pins(), vec![6]);
}

#[test]
fn unexport_failure_is_absorbed() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);
    pin.init(false).expect("init");
    fs.fail_path(&paths().unexport());

    pin.release();

    assert!(!pin.is_exported());
    assert_eq!(fs.writes_to(&paths().unexport()), 1);
}

#[test]
fn value_io_failure_is_reported() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);
    pin.init(false).expect("init");
    fs.fail_path(&paths().value(7));

    assert!(matches!(pin.read(), Err(GpioError::Io { pin: 7, .. })));
    assert!(matches!(pin.write(1), Err(GpioError::Io { pin: 7, .. })));
}

#[test]
fn drop_unexports() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);
    pin.init(false).expect("init");

    drop(pin);

    assert!(fs.exported_pins().is_empty());
}

#[test]
fn output_pin_round_trip_and_release() {
    let (fs, mut pin) = mock_pin(7, Direction::Out);

    pin.init(false).expect("init");
    pin.write(1).expect("write");
    assert_eq!(pin.read().unwrap(), 1);

    pin.release();
    assert!(fs.exported_pins().is_empty());
}

#[test]
fn host_sysfs_writes_and_reads_attributes() {
    init_logger();
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = SysfsPaths::new(dir.path());
    std::fs::write(paths.export(), b"").unwrap();
    std::fs::write(paths.unexport(), b"").unwrap();
    std::fs::create_dir(paths.pin_dir(12)).unwrap();
    std::fs::write(paths.direction(12), b"in").unwrap();
    std::fs::write(paths.value(12), b"0").unwrap();

    let mut pin = PinHandle::new(Arc::new(HostSysfs), dir.path(), 12, Direction::Out);
    assert_eq!(pin.label(), None);
    pin.init(false).expect("init");
    assert_eq!(std::fs::read(paths.export()).unwrap(), b"12");
    assert_eq!(std::fs::read(paths.direction(12)).unwrap(), b"out");

    pin.write(1).expect("write");
    assert_eq!(std::fs::read(paths.value(12)).unwrap(), b"1");
    assert_eq!(pin.read().unwrap(), 1);

    pin.release();
    assert_eq!(std::fs::read(paths.unexport()).unwrap(), b"12");
}

#[test]
fn host_sysfs_does_not_create_missing_attributes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("export");

    let err = HostSysfs.write(&missing, b"1").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!missing.exists());
}

#[test]
fn host_sysfs_export_failure_maps_to_export_error() {
    init_logger();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pin = PinHandle::new(Arc::new(HostSysfs), dir.path(), 1, Direction::In);

    assert!(matches!(pin.init(false), Err(GpioError::Export { pin: 1, .. })));
    assert!(!pin.is_exported());
}

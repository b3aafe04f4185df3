use smunwind::ProcMaps;
use std::io::Write;

#[test]
fn reads_maps_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "5581c2a00000-5581c2c00000 r-xp 00000000 fd:01 393219 /usr/lib/firefox/libxul.so"
    )
    .unwrap();
    writeln!(file, "7f1c00000000-7f1c00100000 rwxp 00000000 00:00 0").unwrap();
    file.flush().unwrap();

    let maps = ProcMaps::from_file(file.path()).unwrap();
    assert_eq!(maps.regions(), [0x5581c2a00000..0x5581c2c00000]);
    assert!(maps.contains(0x5581c2b00000));
    assert!(!maps.contains(0x7f1c00000800));
}

#[test]
fn missing_maps_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = ProcMaps::from_file(dir.path().join("maps")).unwrap_err();
    assert!(format!("{err}").contains("failed to read memory map"), "{err}");
}

#[test]
#[cfg(target_os = "linux")]
fn own_process() {
    let maps = ProcMaps::load(std::process::id()).unwrap();
    let pc = own_process as fn() as usize as u64;
    assert!(maps.contains(pc));
}

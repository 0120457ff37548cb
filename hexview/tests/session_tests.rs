#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use hexview::{
    HexSession, OperationEvent, OperationKind, OperationResult, SessionError, Settings,
    TextSelection, TextSurface,
};
use hexviewlib::{DigestRegistry, HexDecoder, HexEncoder, LayoutConfig};
use rand::Rng;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn settings(bytes_per_line: usize) -> Settings {
    Settings {
        group_bits: 16,
        bytes_per_line,
        ..Settings::default()
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    (0..len).map(|_| rng.random()).collect()
}

fn md5_hex(data: &[u8]) -> String {
    let mut digest = DigestRegistry::default().create("md5").unwrap();
    digest.update(data).unwrap();
    digest.hexdigest()
}

fn open_and_wait(session: &mut HexSession, path: &Path) -> OperationResult {
    session.open(path).unwrap();
    let (kind, outcome) = session.wait().unwrap();
    assert_eq!(kind, OperationKind::Render);
    outcome
}

#[test]
fn test_open_renders_file_in_background() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bin");
    let data = random_bytes(10_000);
    fs::write(&path, &data).unwrap();
    let mut session = HexSession::new(settings(16)).unwrap();

    // Act
    let outcome = open_and_wait(&mut session, &path);

    // Assert
    let OperationResult::Rendered { lines, bytes, .. } = outcome else {
        panic!("expected a rendered outcome");
    };
    assert_eq!(bytes, 10_000);
    assert_eq!(lines, 625);
    assert!(session.is_loaded());
    assert!(!session.is_busy());
    assert_eq!(session.source(), Some(path.as_path()));

    let encoder = HexEncoder::new(&LayoutConfig {
        bits_per_group: 16,
        bytes_per_line: 16,
        lowercase_hex: true,
    })
    .unwrap();
    assert_eq!(session.surface().text(), encoder.render(&data, 0));
}

#[test]
fn test_poll_reports_progress_then_finishes() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, random_bytes(64 * 1024)).unwrap();
    let mut session = HexSession::new(settings(24)).unwrap();
    session.open(&path).unwrap();

    // Act
    let finished = loop {
        match session.poll() {
            Some(OperationEvent::Progress(kind, progress)) => {
                assert_eq!(kind, OperationKind::Render);
                assert!(progress.percent() <= 100);
                std::thread::yield_now();
            }
            Some(OperationEvent::Finished(kind, outcome)) => break (kind, outcome),
            None => panic!("render disappeared"),
        }
    };

    // Assert
    assert!(matches!(finished, (OperationKind::Render, OperationResult::Rendered { .. })));
    assert!(session.poll().is_none());
    assert!(session.is_loaded());
}

#[test]
fn test_second_operation_is_refused_while_busy() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, random_bytes(4096)).unwrap();
    let mut session = HexSession::new(settings(16)).unwrap();
    session.open(&path).unwrap();

    // Act
    let second = session.open(&path);

    // Assert
    assert!(matches!(
        second,
        Err(SessionError::AlreadyRunning(OperationKind::Render))
    ));
    assert_eq!(
        second.unwrap_err().to_string(),
        "HexViewer is already converting"
    );
    assert!(session.wait().is_some());
}

#[test]
fn test_file_above_limit_is_refused() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.bin");
    fs::write(&path, vec![0u8; 2500]).unwrap();
    let mut session = HexSession::new(Settings {
        max_file_size_kb: 2,
        ..Settings::default()
    })
    .unwrap();

    // Act
    let result = session.open(&path);

    // Assert
    assert!(matches!(
        result,
        Err(SessionError::FileTooLarge {
            size_kb: 2,
            max_kb: 2
        })
    ));
    assert!(!session.is_busy());
    assert!(!session.is_loaded());
}

#[test]
fn test_cancel_without_operation_fails() {
    let session = HexSession::new(Settings::default()).unwrap();
    assert!(matches!(session.cancel(), Err(SessionError::NoActiveOperation)));
}

#[test]
fn test_edit_export_and_checksum_round_trip() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("firmware.bin");
    let target = dir.path().join("patched.bin");
    let mut data = random_bytes(100);
    fs::write(&source, &data).unwrap();

    let mut session = HexSession::new(settings(16)).unwrap();
    open_and_wait(&mut session, &source);
    let location = session.find_address(0x21).unwrap();
    let last = session
        .layout()
        .column_for_byte_index(location.byte_index + 1);

    // Act
    session
        .edit(
            &TextSelection::new(location.line, location.column..last + 2),
            "cafe",
        )
        .unwrap();
    session.export(&target).unwrap();
    let (kind, exported) = session.wait().unwrap();

    // Assert
    data[0x21] = 0xca;
    data[0x22] = 0xfe;
    assert_eq!(kind, OperationKind::Export);
    let OperationResult::Exported {
        bytes, checksum, ..
    } = exported
    else {
        panic!("expected an exported outcome");
    };
    assert_eq!(bytes, 100);
    assert_eq!(fs::read(&target).unwrap(), data);
    assert_eq!(checksum, Some(("md5".to_string(), md5_hex(&data))));
    assert!(!session.is_dirty());

    session.checksum(Some("sha256")).unwrap();
    let (_, checksummed) = session.wait().unwrap();
    let mut sha = DigestRegistry::default().create("sha256").unwrap();
    sha.update(&data).unwrap();
    assert!(matches!(
        checksummed,
        OperationResult::Checksummed { algorithm, hexdigest }
            if algorithm == "sha256" && hexdigest == sha.hexdigest()
    ));
}

#[test]
fn test_reformat_keeps_bytes() {
    // Arrange
    let data = random_bytes(77);
    let text = HexEncoder::new(&LayoutConfig {
        bits_per_group: 8,
        bytes_per_line: 8,
        lowercase_hex: true,
    })
    .unwrap()
    .render(&data, 0x1000);
    let mut session = HexSession::new(Settings {
        group_bits: 8,
        bytes_per_line: 8,
        ..Settings::default()
    })
    .unwrap();
    session.load_text(&text).unwrap();

    // Act
    session.reformat(32, 32).unwrap();

    // Assert
    assert_eq!(session.surface().line_count(), 3);
    assert!(session.surface().line(0).unwrap().starts_with("00001000:"));
    let decoder = HexDecoder::new(&LayoutConfig {
        bits_per_group: 32,
        bytes_per_line: 32,
        lowercase_hex: true,
    })
    .unwrap();
    assert_eq!(decoder.decode_text(&session.surface().text()).unwrap(), data);
}

#[test]
fn test_unknown_algorithm_falls_back_to_md5() {
    // Arrange
    let session = HexSession::new(Settings::default()).unwrap();

    // Act
    let hexdigest = session.hash_text(Some("snefru"), "abc").unwrap();

    // Assert
    assert_eq!(hexdigest, "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn test_failed_reformat_keeps_layout() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, random_bytes(40)).unwrap();
    let mut session = HexSession::new(settings(16)).unwrap();
    open_and_wait(&mut session, &path);
    let text = session.surface().text();
    fs::remove_file(&path).unwrap();

    // Act
    let result = session.reformat(32, 32);

    // Assert
    assert!(result.is_err());
    assert_eq!(session.settings().group_bits, 16);
    assert_eq!(session.settings().bytes_per_line, 16);
    assert_eq!(session.layout().bytes_per_line(), 16);
    assert_eq!(session.surface().text(), text);
    assert!(!session.is_busy());
}

#[test]
fn test_export_switches_source_to_written_file() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("original.bin");
    let target = dir.path().join("copy.bin");
    fs::write(&source, [0u8; 8]).unwrap();
    let mut session = HexSession::new(settings(8)).unwrap();
    open_and_wait(&mut session, &source);
    session.edit(&TextSelection::caret(0, 11), "7f").unwrap();

    // Act
    session.export(&target).unwrap();
    session.wait().unwrap();
    session.reload().unwrap();
    session.wait().unwrap();

    // Assert
    assert_eq!(session.source(), Some(target.as_path()));
    assert!(session.surface().line(0).unwrap().starts_with("00000000:  7f00 "));
    assert_eq!(fs::read(&source).unwrap(), [0u8; 8]);
}

use mapharvest_proxy::{load_from_path, ProxyError, ProxyRotator};
use std::io::Write;

#[test]
fn test_two_entries_threshold_one_cycles_back() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    writeln!(file, "# test pool").expect("write");
    writeln!(file, "192.168.1.10:3128:alice:one").expect("write");
    writeln!(file, "192.168.1.11:3128:bob:two").expect("write");

    let credentials = load_from_path(file.path()).expect("load credentials");
    assert_eq!(credentials.len(), 2);

    let mut rotator = ProxyRotator::new(credentials, 1);
    let first = rotator.current().expect("credential").clone();

    rotator.record_request();
    assert_eq!(rotator.current().expect("credential").address(), "192.168.1.11");

    rotator.record_request();
    assert_eq!(rotator.current().expect("credential"), &first);
}

#[test]
fn test_file_with_only_malformed_lines_yields_empty_pool() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    writeln!(file, "not-a-credential").expect("write");
    writeln!(file, "1.2.3.4:80").expect("write");

    let credentials = load_from_path(file.path()).expect("load credentials");
    assert!(credentials.is_empty());

    let rotator = ProxyRotator::new(credentials, 14);
    assert!(matches!(rotator.current(), Err(ProxyError::NoCredentials)));
}

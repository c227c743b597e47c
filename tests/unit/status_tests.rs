//! Status registry tests through the public API

use std::collections::HashSet;

use tixi_rs::StatusCode;

#[test]
fn test_registry_is_a_bijection_over_known_codes() {
    let mut names = HashSet::new();
    for (index, status) in StatusCode::ALL.iter().enumerate() {
        let code = index as i32;
        assert_eq!(status.code(), code);
        assert_eq!(StatusCode::from_code(code), *status);
        assert!(names.insert(status.name()), "duplicate name {}", status.name());
    }
    assert_eq!(names.len(), 32);
}

#[test]
fn test_lookup_never_comes_back_empty() {
    for code in [-100, -1, 32, 33, 1000] {
        match StatusCode::from_code(code) {
            StatusCode::Unknown(raw) => assert_eq!(raw, code),
            other => panic!("Expected Unknown for {}, got {:?}", code, other),
        }
    }
}

#[test]
fn test_selected_codes() {
    assert_eq!(StatusCode::from_code(0), StatusCode::Success);
    assert_eq!(StatusCode::from_code(4), StatusCode::NotSchemaCompliant);
    assert_eq!(StatusCode::from_code(8), StatusCode::ElementNotFound);
    assert_eq!(StatusCode::from_code(13), StatusCode::OpenFailed);
    assert_eq!(StatusCode::from_code(31), StatusCode::UnknownStorageMode);
}

#[test]
fn test_display_includes_code() {
    assert_eq!(StatusCode::OpenFailed.to_string(), "OPEN_FAILED (13)");
    assert_eq!(StatusCode::from_code(-7).to_string(), "UNKNOWN(-7)");
}

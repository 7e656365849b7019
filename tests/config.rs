use std::fs;

use doc_review::ReviewConfig;

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("review.json");
    fs::write(
        &path,
        r#"{"ocr": {"language": "deu", "dpi": 300}, "analysis": {"temperature": 0.0}}"#,
    )
    .unwrap();

    let config = ReviewConfig::load(Some(&path)).unwrap();
    assert_eq!(config.ocr.language, "deu");
    assert_eq!(config.ocr.dpi, 300);
    assert_eq!(config.ocr.tesseract_cmd, "tesseract");
    assert_eq!(config.analysis.temperature, 0.0);
}

#[test]
fn test_invalid_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ReviewConfig::load(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("broken.json"));

    let err = ReviewConfig::load(Some(&dir.path().join("missing.json"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zero.json");
    fs::write(&path, r#"{"ocr": {"dpi": 0}}"#).unwrap();

    assert!(ReviewConfig::load(Some(&path)).is_err());
}

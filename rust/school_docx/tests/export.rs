mod common;

use common::{document_xml, full_payload_json};
use pretty_assertions::assert_eq;
use school_docx::delivery::{CACHE_CONTROL, DOCX_CONTENT_TYPE};
use school_docx::scaffold::starter_template;
use school_docx::{export, EngineConfig, ExportError, PayloadError, RenderError, TemplateCache};

fn starter_cache() -> TemplateCache {
    TemplateCache::preloaded(starter_template().unwrap())
}

#[test]
fn successful_export_sets_download_headers() {
    let body = serde_json::to_vec(&full_payload_json(4)).unwrap();
    let response = export(&starter_cache(), &body, &EngineConfig::default()).unwrap();

    assert_eq!(response.header("content-type"), Some(DOCX_CONTENT_TYPE));
    assert_eq!(response.header("Cache-Control"), Some(CACHE_CONTROL));
    assert_eq!(
        response.header("Content-Length"),
        Some(response.body.len().to_string().as_str())
    );

    let disposition = response.header("Content-Disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\""), "{disposition}");
    assert!(disposition.contains("filename*=UTF-8''%D0%9F%D1%80%D0%BE%D0%B5%D0%BA%D1%82_"));

    assert!(document_xml(&response.body).contains("Влияние музыки на память"));
    assert!(response.warnings.is_empty());
}

#[test]
fn missing_topic_falls_back_to_default_name() {
    let response = export(
        &starter_cache(),
        r#"{"title": {"student": "Петров Пётр"}}"#.as_bytes(),
        &EngineConfig::default(),
    )
    .unwrap();
    let disposition = response.header("Content-Disposition").unwrap();
    assert!(disposition.ends_with("_project.docx"), "{disposition}");
    assert!(!response.warnings.is_empty());
}

#[test]
fn bad_bodies_are_client_errors() {
    let cache = starter_cache();
    let config = EngineConfig::default();

    let bodies: [&[u8]; 6] = [b"", b"   ", b"null", b"[]", b"{}", b"\"text\""];
    for body in bodies {
        let err = export(&cache, body, &config).unwrap_err();
        assert!(matches!(err, ExportError::Payload(PayloadError::Empty)), "{err:?}");
        assert_eq!(err.status_code(), 400);
    }

    let err = export(&cache, b"{\"topic\": ", &config).unwrap_err();
    assert!(matches!(err, ExportError::Payload(PayloadError::InvalidJson(_))));
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.to_string(), "Invalid JSON payload");
}

#[test]
fn missing_template_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TemplateCache::new(dir.path().join("a.docx"), dir.path().join("b.docx"));

    let err = export(&cache, r#"{"topic": "Вода"}"#.as_bytes(), &EngineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Render(RenderError::TemplateMissing { .. })
    ));
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().starts_with("Template not found. Tried: "));
}

//! Browser tests for the bindings.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Object, Reflect, Uint8Array};
use lopdf::{Dictionary, Document, Object as PdfObject, Stream, dictionary};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

use folio_core::OperationRequest;
use folio_wasm::{Workbench, inspect_pdf, parse_page_ranges_js, version};

wasm_bindgen_test_configure!(run_in_browser);

fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages);
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        PdfObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn files(name: &str, bytes: &[u8]) -> Array {
    let file = Object::new();
    Reflect::set(&file, &"name".into(), &name.into()).unwrap();
    Reflect::set(&file, &"bytes".into(), &Uint8Array::from(bytes)).unwrap();
    Array::of1(&file)
}

fn rotate_request() -> JsValue {
    serde_wasm_bindgen::to_value(&OperationRequest::Rotate {
        angle: 90,
        pages: None,
    })
    .unwrap()
}

fn get(value: &JsValue, key: &str) -> JsValue {
    Reflect::get(value, &key.into()).unwrap()
}

#[wasm_bindgen_test]
fn test_version() {
    assert!(!version().is_empty());
}

#[wasm_bindgen_test]
fn test_inspect_pdf() {
    let info = inspect_pdf(sample_pdf(2), None).unwrap();
    assert_eq!(get(&info, "page_count").as_f64(), Some(2.0));
}

#[wasm_bindgen_test]
fn test_parse_page_ranges_error_shape() {
    let error = parse_page_ranges_js("3-1", None).unwrap_err();
    assert_eq!(get(&error, "kind").as_string().as_deref(), Some("validation"));
    assert_eq!(get(&error, "retryable").as_bool(), Some(false));
}

#[wasm_bindgen_test]
async fn test_run_resolves_with_files() {
    let workbench = Workbench::new(JsValue::UNDEFINED).unwrap();
    let promise = workbench.run(files("doc.pdf", &sample_pdf(3)), rotate_request()).unwrap();
    let result = JsFuture::from(promise).await.unwrap();

    let outputs = Array::from(&get(&result, "files"));
    assert_eq!(outputs.length(), 1);
    let output = outputs.get(0);
    assert_eq!(get(&output, "name").as_string().as_deref(), Some("doc_rotated.pdf"));
    assert_eq!(get(&output, "page_count").as_f64(), Some(3.0));
    assert_eq!(workbench.progress(), 1.0);
}

#[wasm_bindgen_test]
async fn test_newer_run_supersedes_older() {
    let workbench = Workbench::new(JsValue::UNDEFINED).unwrap();
    let first = workbench.run(files("a.pdf", &sample_pdf(1)), rotate_request()).unwrap();
    let second = workbench.run(files("b.pdf", &sample_pdf(1)), rotate_request()).unwrap();

    let error = JsFuture::from(first).await.unwrap_err();
    assert_eq!(get(&error, "kind").as_string().as_deref(), Some("cancelled"));
    assert!(JsFuture::from(second).await.is_ok());
}

#[wasm_bindgen_test]
fn test_publish_replaces_and_releases_url() {
    let workbench = Workbench::new(JsValue::UNDEFINED).unwrap();
    let first = workbench.publish(b"%PDF-1.7 one").unwrap();
    let second = workbench.publish(b"%PDF-1.7 two").unwrap();

    assert_ne!(first, second);
    assert_eq!(workbench.download_url(), Some(second));
    workbench.release();
    assert_eq!(workbench.download_url(), None);
}

#[wasm_bindgen_test]
fn test_invalid_config_is_rejected() {
    let config = Object::new();
    let batch = Object::new();
    Reflect::set(&batch, &"load_batch_size".into(), &0.into()).unwrap();
    Reflect::set(&config, &"batch".into(), &batch).unwrap();
    assert!(Workbench::new(config.into()).is_err());
}

use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use svgshot::dom::Document;
use svgshot::{MarkupRenderer, OutputKind, Pipeline, RasterConfig, RenderOptions};

fn golden_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("tests/goldens/expected");
    p.push(name);
    p
}

#[tokio::test]
async fn golden_raster_matches_fixture() {
    let page = fs::read_to_string("tests/goldens/pages/badge.svg").expect("read fixture");
    let css = fs::read_to_string("tests/goldens/pages/badge.css").expect("read stylesheet");

    let mut document = Document::new();
    document.add_stylesheet(&css);
    let config = RasterConfig {
        load_system_fonts: false,
        ..Default::default()
    };
    let pipeline = Pipeline::with_config(MarkupRenderer, document.into_shared(), &config);
    let options = RenderOptions {
        output: OutputKind::Blob,
        scale: 2.0,
        ignore_all_selectors: vec![".debug-grid".into()],
        ..Default::default()
    };
    let artifact = pipeline
        .render_vector_as_image(page.as_str(), &options)
        .await
        .expect("render");
    let blob = artifact.as_blob().expect("blob output");

    let img = image::load_from_memory(&blob.bytes).expect("decode png").to_rgba8();
    assert_eq!(img.dimensions(), (240, 80));

    // Sampled pixels are always checked; antialiasing and compositing may move a channel by one or two
    let samples = fs::read_to_string(golden_path("badge.json")).expect("read sampled pixels");
    let samples: serde_json::Value = serde_json::from_str(&samples).expect("Invalid JSON");
    for s in samples.as_array().expect("sample list") {
        let at = s["at"].as_array().unwrap();
        let (x, y) = (at[0].as_u64().unwrap() as u32, at[1].as_u64().unwrap() as u32);
        let actual = img.get_pixel(x, y).0;
        let expected: Vec<u8> = s["rgba"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_u64().unwrap() as u8)
            .collect();
        let close = if expected[3] == 0 {
            actual[3] == 0
        } else {
            actual.iter().zip(&expected).all(|(a, e)| a.abs_diff(*e) <= 2)
        };
        assert!(
            close,
            "pixel ({}, {}) is {:?}, expected {:?} ({})",
            x,
            y,
            actual,
            expected,
            s["what"]
        );
    }

    // Digest the decoded pixels so encoder metadata changes don't churn the golden
    let digest = hex::encode(Sha256::digest(img.as_raw()));
    let expected_path = golden_path("badge.sha256");
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::write(&expected_path, &digest).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }
    if expected_path.exists() {
        let exp = fs::read_to_string(&expected_path).expect("unable to read golden");
        assert_eq!(digest, exp.trim());
    }
}

#[tokio::test]
async fn excluded_elements_leave_no_pixels() {
    // A magenta line through the middle is dropped by the ignore selector
    let page = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="20"><path class="debug-grid" d="M0 10 H20" stroke="#ff00ff" stroke-width="4"/></svg>"##;
    let pipeline = Pipeline::with_config(
        MarkupRenderer,
        Document::shared(),
        &RasterConfig {
            load_system_fonts: false,
            ..Default::default()
        },
    );
    let options = RenderOptions {
        output: OutputKind::Blob,
        ignore_all_selectors: vec![".debug-grid".into()],
        ..Default::default()
    };
    let artifact = pipeline.render_vector_as_image(page, &options).await.unwrap();
    let img = image::load_from_memory(&artifact.as_blob().unwrap().bytes)
        .unwrap()
        .to_rgba8();
    assert!(img.pixels().all(|p| p.0[3] == 0));
}

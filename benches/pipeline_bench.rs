use criterion::{criterion_group, criterion_main, Criterion};

use svgshot::dom::parse::parse_markup;
use svgshot::dom::Document;
use svgshot::rendering::{inline_styles, sanitize, serialize, Exclusions, StyledClone};
use svgshot::{
    CascadeResolver, ImageFormat, MarkupRenderer, OutputKind, Pipeline, RasterConfig,
    RenderOptions,
};

fn chart(bars: usize) -> String {
    let mut svg = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="200"><g class="plot">"#,
    );
    for i in 0..bars {
        svg.push_str(&format!(
            r#"<rect class="bar" x="{}" y="{}" width="3" height="{}"/>"#,
            i * 4,
            200 - i % 180,
            i % 180
        ));
    }
    svg.push_str(r#"</g><g class="debug"><path d="M0 100 H400"/></g></svg>"#);
    svg
}

fn bench_normalize(c: &mut Criterion) {
    let mut doc = Document::new();
    doc.add_stylesheet(".bar { fill: steelblue } .plot > .bar:first-child { fill: tomato }");
    let body = doc.body().unwrap();
    let svg = parse_markup(&mut doc, body, &chart(100)).unwrap();
    let resolver = CascadeResolver::new();

    c.bench_function("clone_inline_serialize_100", |b| {
        b.iter(|| {
            let mut clone = StyledClone::capture(&doc, svg).unwrap();
            inline_styles(&doc, svg, &resolver, &mut clone, &Exclusions::default()).unwrap();
            serialize(&clone)
        })
    });

    let ignore = vec![svgshot::dom::SelectorList::parse(".debug").unwrap()];
    c.bench_function("sanitize_100", |b| {
        b.iter(|| {
            let mut clone = StyledClone::capture(&doc, svg).unwrap();
            sanitize(&mut clone, &ignore)
        })
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let config = RasterConfig {
        load_system_fonts: false,
        ..Default::default()
    };
    let pipeline = Pipeline::with_config(MarkupRenderer, Document::shared(), &config);
    let markup = chart(50);

    for format in [ImageFormat::Png, ImageFormat::Jpeg] {
        let options = RenderOptions {
            format,
            output: OutputKind::Blob,
            scale: 2.0,
            ignore_all_selectors: vec![".debug".into()],
            ..Default::default()
        };
        c.bench_function(&format!("render_vector_as_image_{}", format), |b| {
            b.iter(|| {
                rt.block_on(pipeline.render_vector_as_image(markup.as_str(), &options))
                    .unwrap()
            })
        });
    }
}

criterion_group!(benches, bench_normalize, bench_pipeline);
criterion_main!(benches);

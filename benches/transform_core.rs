use criterion::{black_box, criterion_group, criterion_main, Criterion};
use robomigrate::discovery::classify;
use robomigrate::model::{FileRole, TransformMode};
use robomigrate::paths::PathRewriter;
use robomigrate::transform::extract::extract_steps;
use robomigrate::transform::TransformEngine;
use robomigrate::validate::validate;

fn synthetic_steps(step_count: usize) -> String {
    let mut out = String::from("package com.acme.steps;\n\npublic class CheckoutSteps {\n");
    for i in 0..step_count {
        out.push_str(&format!(
            "    @When(\"user adds item {{int}} to cart {i}\")\n    public void addItem{i}(int quantity) {{\n        driver.findElement(By.id(\"item-{i}\")).click();\n        driver.findElement(By.name(\"qty-{i}\")).sendKeys(String.valueOf(quantity));\n    }}\n\n"
        ));
    }
    out.push_str("}\n");
    out
}

fn bench_extract_steps(c: &mut Criterion) {
    let source = synthetic_steps(200);
    c.bench_function("extract_steps_200", |b| {
        b.iter(|| {
            let steps = extract_steps(black_box(&source)).expect("extract");
            black_box(steps.len());
        });
    });
}

fn bench_generate_and_validate(c: &mut Criterion) {
    let source = synthetic_steps(200);
    let engine = TransformEngine::new(TransformMode::Enhanced, "", PathRewriter::new("robot"));
    c.bench_function("generate_step_definitions_200", |b| {
        b.iter(|| {
            let (content, _) = engine
                .generate("src/test/java/steps/CheckoutSteps.java", FileRole::StepDefinition, black_box(&source))
                .expect("generate");
            black_box(content.len());
        });
    });

    let (generated, _) = engine
        .generate("src/test/java/steps/CheckoutSteps.java", FileRole::StepDefinition, &source)
        .expect("generate");
    c.bench_function("validate_generated_200", |b| {
        b.iter(|| black_box(validate(black_box(&generated)).valid));
    });
}

fn bench_classify(c: &mut Criterion) {
    let paths: Vec<String> = (0..10_000)
        .map(|i| match i % 4 {
            0 => format!("src/test/java/steps/Feature{i:05}Steps.java"),
            1 => format!("src/test/java/pages/Screen{i:05}Page.java"),
            2 => format!("src/test/resources/features/flow_{i:05}.feature"),
            _ => format!("docs/notes_{i:05}.md"),
        })
        .collect();
    c.bench_function("classify_10k_paths", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(classify(path));
            }
        });
    });
}

criterion_group!(transform_core, bench_extract_steps, bench_generate_and_validate, bench_classify);
criterion_main!(transform_core);

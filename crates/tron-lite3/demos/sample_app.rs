//! 示例程序：构建、保存、重新加载文档并输出 JSON
//!
//! 运行: `cargo run -p tron-lite3 --example sample_app [config.toml]`

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use tron_common::{init_logging, DocConfig};
use tron_lite3::{snapshot, Document, RootKind, Value, ROOT};

fn example_basic(dir: &Path) -> Result<()> {
    let mut doc = Document::new(RootKind::Object)?;
    doc.set_str(ROOT, "event", "lap_complete")?;
    doc.set_i64(ROOT, "lap", 55)?;
    doc.set_f64(ROOT, "time_sec", 88.427)?;
    doc.set_bool(ROOT, "fastest_lap", true)?;
    doc.set_bytes(ROOT, "raw_payload", &[1, 2, 3])?;
    doc.delete(ROOT, "fastest_lap")?;

    let path = dir.join("example_basic.tron");
    doc.save(&path)?;
    let reloaded = Document::from_file(&path)
        .with_context(|| format!("reloading {}", path.display()))?;
    println!("Example 1 (basic) as JSON:");
    println!("{}", reloaded.to_json(ROOT, true)?);
    Ok(())
}

fn example_from_json(dir: &Path) -> Result<()> {
    let text = r#"{
        "user": {"id": 12345, "name": "Jane Doe"},
        "roles": ["admin", "editor"],
        "active": true,
        "quota": 12.5
    }"#;
    let doc = Document::from_json(text)?;

    let path = dir.join("example_from_json.tron.sealed");
    std::fs::write(&path, snapshot::seal(&doc))?;
    let reloaded = snapshot::unseal(&std::fs::read(&path)?)?;
    println!("\nExample 2 (JSON round-trip) as JSON:");
    println!("{}", reloaded.to_json(ROOT, true)?);
    Ok(())
}

fn example_features() -> Result<()> {
    let mut doc = Document::new(RootKind::Object)?;
    let headers = doc.set_obj(ROOT, "headers")?;
    doc.set_str(headers, "content-type", "application/json")?;
    doc.set_str(headers, "x-request-id", "req_9f8e2a")?;

    let tags = doc.set_arr(ROOT, "tags")?;
    doc.arr_append_str(tags, "alpha")?;
    doc.arr_append_str(tags, "beta")?;
    doc.arr_append_bool(tags, true)?;

    println!("\nExample 3 (features) exists: {}", doc.exists(ROOT, "headers")?);
    println!("headers type: {}", doc.get_type(ROOT, "headers")?);
    println!("tags[0]: {}", doc.arr_get_str(tags, 0)?);
    println!("raw buflen: {}", doc.buflen());
    println!("as JSON:\n{}", doc.to_json(ROOT, true)?);
    Ok(())
}

fn example_value_tree() -> Result<()> {
    let request: Value = [
        ("method", Value::from("POST")),
        ("duration_ms", Value::from(47)),
    ]
    .into_iter()
    .collect();
    let payload: Value = [
        ("request", request),
        (
            "flags",
            Value::from(vec![
                Value::from(true),
                Value::from(false),
                Value::Null,
                Value::from(5),
                Value::from(7.5),
                Value::from("alpha"),
            ]),
        ),
    ]
    .into_iter()
    .collect();

    let doc = Document::from_value(&payload)?;
    println!("\nExample 4 (value tree) as JSON:");
    println!("{}", doc.to_json(ROOT, true)?);
    println!("\nExample 5 (back to a value tree):");
    println!("{:?}", doc.to_value(ROOT)?);
    Ok(())
}

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => DocConfig::from_file(Path::new(&path)).context("loading config")?,
        None => DocConfig::default(),
    };
    init_logging(&config.log);

    let dir = std::env::temp_dir();
    info!("Writing sample documents to {:?}", dir);

    example_basic(&dir)?;
    example_from_json(&dir)?;
    example_features()?;
    example_value_tree()?;
    Ok(())
}

//! Walkthrough of a two-partition Veil store.
//!
//! Creates a store holding a "real" and a "decoy" document, decrypts both,
//! shows what a wrong password gets you, then rewrites one partition and
//! checks the other is untouched.
//!
//! Run with:
//!   cargo run --example demo --release

use std::time::Instant;

use serde_json::json;

use veil_store::{CryptoStore, Document, KdfParams, Partition, StoreConfig, StoreError};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]==================================={RESET}");
    println!("{BOLD}  {title}{RESET}");
}

fn show(label: &str, doc: &Document) {
    let rendered = match doc {
        Document::Json(v) => v.to_string(),
        Document::Text(t) => t.clone(),
        Document::Binary(b) => format!("<{} bytes>", b.len()),
    };
    println!("  {GREEN}{label:<10}{RESET} {rendered}");
}

fn main() -> Result<(), StoreError> {
    let engine = CryptoStore::new(StoreConfig {
        threshold: 3,
        id_space_size: 2_000,
        // Demo speed. Real stores keep the default Argon2id cost.
        kdf: KdfParams::insecure_fast(),
        ..StoreConfig::default()
    })?;

    section(1, "Create a store with two partitions");
    let real = Document::Json(json!({"vault": "main", "seed_words": 24, "location": "safe #2"}));
    let decoy = Document::Text("Shopping: coffee, oat milk, batteries.".into());
    let started = Instant::now();
    let store = engine.create(&[
        Partition::new("real-key", "correct horse", real.clone()),
        Partition::new("decoy-key", "battery staple", decoy),
    ])?;
    println!(
        "  {} shares in {} rows, built in {:?}",
        store.shares.len(),
        store.metadata.chunk_total,
        started.elapsed()
    );

    section(2, "Decrypt each partition");
    show("real", &engine.decrypt(&store, b"real-key", b"correct horse")?);
    show("decoy", &engine.decrypt(&store, b"decoy-key", b"battery staple")?);

    section(3, "Wrong password");
    match engine.decrypt(&store, b"real-key", b"correct h0rse") {
        Ok(doc) => show("garbage", &doc),
        Err(e) => println!("  {DIM}{e}{RESET}"),
    }

    section(4, "Rewrite the decoy");
    let new_decoy = Document::Text("Shopping: tea.".into());
    let updated = engine.update(&store, b"decoy-key", b"battery staple", &new_decoy)?;
    show("decoy", &engine.decrypt(&updated, b"decoy-key", b"battery staple")?);
    let still_real = engine.decrypt(&updated, b"real-key", b"correct horse")?;
    show("real", &still_real);
    assert_eq!(still_real, real);

    println!();
    Ok(())
}

/// Form Source Tracer - Shows the flow through Normalize → Extract → Fields
///
/// Usage: cargo run --bin trace_parser <source-file> [--config <path>]
use formedible_core::ParserConfig;
use formedible_dsl::{normalize, render, to_source, FormedibleParser, SourceTokens};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin trace_parser <source-file> [--config <path>]");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  RUST_LOG=formedible_dsl=debug cargo run --bin trace_parser reply.md");
    std::process::exit(1);
}

fn header(title: &str) {
    println!("╔═══════════════════════════════════════════════════════════════");
    println!("║ {}", title);
    println!("╚═══════════════════════════════════════════════════════════════\n");
}

fn section(title: &str) {
    println!("{}", title);
    println!("─────────────────────────────────────────────────────────────");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (source_path, config_path) = match args.as_slice() {
        [source] => (source, None),
        [source, flag, config] if flag == "--config" => (source, Some(config)),
        _ => usage(),
    };

    let config = match config_path {
        Some(path) => ParserConfig::from_path(Path::new(path)),
        None => ParserConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load parser config: {}", e);
            std::process::exit(1);
        }
    };

    let content = match fs::read_to_string(source_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {}", source_path, e);
            std::process::exit(1);
        }
    };

    header("FORMEDIBLE SOURCE TRACER");

    println!("📝 INPUT ({} bytes):", content.len());
    println!("{}", content);
    println!();

    section("🔍 NORMALIZED CANDIDATE:");
    match normalize(&content) {
        Ok(normalized) => {
            println!("Origin: {:?}", normalized.origin);
            println!("Position: line {}, column {}", normalized.line, normalized.column);
            let names: Vec<&str> = normalized.bindings.names().collect();
            if !names.is_empty() {
                println!("Bindings: {}", names.join(", "));
            }
            println!("{}", normalized.candidate);
            println!();

            section("🧩 TOP-LEVEL ENTRIES:");
            let tokens = SourceTokens::lex_at(&normalized.candidate, normalized.line, normalized.column);
            match tokens.expr().as_object() {
                Ok(object) => {
                    for entry in &object.entries {
                        println!("{:<12} {:?}", entry.key, entry.kind);
                    }
                }
                Err(e) => println!("❌ {}", e),
            }
            println!();
        }
        Err(e) => {
            println!("❌ {}", e);
            println!();
        }
    }

    let parser = FormedibleParser::new(config);
    section("⚙️  STAGES:");
    let result = parser.parse_with_observer(&content, |stage| println!("→ {}", stage));
    println!();

    match result {
        Ok(outcome) => {
            section("🌳 PARSED CONFIG:");
            match serde_json::to_string_pretty(&outcome.config) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("❌ Failed to serialize config: {}", e),
            }
            println!();

            if outcome.has_warnings() {
                section("⚠️  WARNINGS:");
                for warning in &outcome.warnings {
                    println!("[{}] {}", warning.kind.as_str(), warning.message);
                }
                println!();
            }

            section("🔄 ROUND-TRIP SOURCE:");
            println!("{}", to_source(&outcome.config));
            println!();

            println!("Digest: {}", outcome.source_digest);
            println!("✅ Parse succeeded!");
        }
        Err(e) => {
            section("❌ PARSE ERROR:");
            if parser.config().ai_error_messages {
                println!("[{}] {}", e.kind, e.message);
            } else {
                println!("[{}] {}", e.kind, render(&e, parser.config()));
            }
        }
    }
}

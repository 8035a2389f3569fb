//! Output formatting utilities for CLI

use crate::config::AppConfig;
use crate::models::ScoredDocument;
use crate::rag::ChatResponse;

pub use crate::models::truncate_str;

/// Print an answer with its sources
pub fn print_chat_response(response: &ChatResponse) {
    if !response.success {
        print_error(response.error.as_deref().unwrap_or("Unknown error"));
        return;
    }

    println!("\n📝 Answer:");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", response.answer);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if response.sources.is_empty() {
        return;
    }
    println!("\n📚 Sources ({}):", response.sources.len());
    for (idx, source) in response.sources.iter().enumerate() {
        println!("  {}. {}", idx + 1, source.link);
        println!("     {}", truncate_str(&source.text, 100));
    }
}

/// Print ranked retrieval results
pub fn print_search_results(results: &[ScoredDocument], verbose: bool) {
    println!("\n✅ Found {} documents:\n", results.len());

    for (idx, result) in results.iter().enumerate() {
        println!("{}. [{}] {}", idx + 1, result.kind, result.id);
        match result.dense_score {
            Some(dense) => println!("   Score: {:.3} | Dense: {:.3}", result.score, dense),
            None => println!("   Score: {:.3}", result.score),
        }
        let preview = if verbose {
            result.text.clone()
        } else {
            truncate_str(&result.text, 150)
        };
        println!("   Text: {preview}");
        if let Some(link) = result.source.link() {
            println!("   Link: {link}");
        }
        println!();
    }
}

/// Print configuration with secrets masked
pub fn print_config(config: &AppConfig) {
    let config = config.masked();
    println!("📋 ThreadRAG Configuration:");
    println!();

    println!("🗄️  Store:");
    println!("  Backend: {:?}", config.store.backend);
    println!("  URL: {}", config.store.url);
    println!("  Collection: {}", config.store.collection);
    println!("  Snapshot path: {}", config.store.snapshot_path);
    println!("  Max connections: {}", config.store.max_connections);
    println!("  Connection timeout: {}s", config.store.connection_timeout);
    println!();

    println!("🧠 Embeddings:");
    println!("  Provider: {:?}", config.embeddings.provider);
    println!("  Endpoint: {}", config.embeddings.endpoint);
    println!("  Model: {}", config.embeddings.model);
    println!("  Dimension: {}", config.embeddings.dimension);
    println!("  Sparse weights: {}", config.embeddings.return_sparse);
    println!("  Timeout: {}s", config.embeddings.timeout_secs);
    println!();

    println!("🤖 LLM:");
    println!("  Provider: {}", config.llm.provider);
    println!("  Endpoint: {}", config.llm.endpoint);
    println!("  Model: {}", config.llm.model);
    println!("  Key: {}", config.llm.api_key.as_deref().unwrap_or("(not set)"));
    println!("  Temperature: {}", config.llm.temperature);
    println!("  Max tokens: {}", config.llm.max_tokens);
    println!("  Timeout: {}s", config.llm.timeout_secs);
    println!();

    println!("🔍 Retrieval:");
    println!("  Top k: {}", config.retrieval.top_k);
    match config.retrieval.min_score {
        Some(floor) => println!("  Min score: {floor}"),
        None => println!("  Min score: (none)"),
    }
    println!("  Hybrid: {}", config.retrieval.use_hybrid);
    println!(
        "  Weights: dense {} / sparse {}",
        config.retrieval.dense_weight, config.retrieval.sparse_weight
    );
    println!();

    println!("💬 Answering:");
    println!("  Min confidence: {}", config.answer.min_confidence);
    println!("  Snippet chars: {}", config.answer.snippet_chars);
    println!("  Max context chars: {}", config.answer.max_context_chars);
    println!();

    println!("🌐 Server: {}:{} (CORS {})", config.server.host, config.server.port, config.server.cors);
    println!("📝 Logging: {} (backtrace {})", config.logging.level, config.logging.backtrace);
}

/// Print colored output functions
pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    println!("❌ {msg}");
}

pub fn print_prompt(msg: &str) {
    print!("{msg}");
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

//! Question answering and search handlers

use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

use crate::app::AppContext;
use crate::cli::output::print_chat_response;
use crate::cli::output::print_error;
use crate::cli::output::print_info;
use crate::cli::output::print_prompt;
use crate::cli::output::print_search_results;
use crate::cli::output::print_warning;
use crate::errors::ThreadRagError;
use crate::Result;

/// Handle `ask <question>`
pub async fn handle_ask(context: &AppContext, question: &str) -> Result<()> {
    println!("🤖 ThreadRAG");
    println!("===========\n");
    println!("Question: {question}");

    let response = context.policy.answer(question).await?;
    print_chat_response(&response);
    Ok(())
}

/// Handle `chat`: read questions from stdin until `exit`/`quit` or EOF
pub async fn handle_chat(context: &AppContext) -> Result<()> {
    println!("🤖 ThreadRAG chat");
    println!("=================");
    print_info("Type your question and press Enter. Type 'exit' or 'quit' to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt("\n❓ You: ");
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match context.policy.answer(question).await {
            Ok(response) => print_chat_response(&response),
            Err(ThreadRagError::InvalidRequest(message)) => print_warning(&message),
            Err(e) => print_error(&e.to_string()),
        }
    }

    print_info("👋 Bye!");
    Ok(())
}

/// Handle `search <query>`
pub async fn handle_search(
    context: &AppContext,
    query: &str,
    top_k: Option<usize>,
    verbose: bool,
) -> Result<()> {
    println!("🔍 ThreadRAG Search");
    println!("===================\n");
    println!("Query: {query}");

    let results = context.retriever.retrieve(query, top_k).await?;
    if results.is_empty() {
        print_warning("No documents found");
        return Ok(());
    }

    print_search_results(&results, verbose);
    Ok(())
}

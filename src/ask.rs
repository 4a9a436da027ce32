//! The `ask` and `chat` commands.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use docqa_core::history::AnswerHistory;
use docqa_core::{AnswerRecord, QaEngine, QueryOptions};

use crate::app::build_engine;
use crate::config::Config;

/// Colour band for a confidence percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn for_percent(pct: f32) -> Self {
        if pct > 75.0 {
            ConfidenceBand::High
        } else if pct > 50.0 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    fn ansi(self) -> &'static str {
        match self {
            ConfidenceBand::High => "\x1b[32m",
            ConfidenceBand::Medium => "\x1b[38;5;208m",
            ConfidenceBand::Low => "\x1b[31m",
        }
    }
}

fn format_confidence(confidence: f32, color: bool) -> String {
    let pct = confidence * 100.0;
    let text = format!("{:.1}%", pct);
    if color {
        format!("{}{}\x1b[0m", ConfidenceBand::for_percent(pct).ansi(), text)
    } else {
        text
    }
}

fn print_answer(answer: &AnswerRecord) {
    if answer.is_empty_corpus() {
        println!("{}", answer.answer_text());
        return;
    }
    let color = atty::is(atty::Stream::Stdout);
    println!("Answer: {}", answer.answer_text());
    println!("Source: {}", answer.source);
    println!("Source sentence: {}", answer.passage);
    println!("Confidence: {}", format_confidence(answer.confidence, color));
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    k: Option<usize>,
    no_compose: bool,
    json: bool,
) -> Result<()> {
    let engine = build_engine(config).await?;
    let answer = engine
        .query_with(
            question,
            QueryOptions {
                k,
                compose: !no_compose,
            },
        )
        .await?;

    if json {
        let response = answer.to_response(config.retrieval.excerpt_chars);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

/// Outcome of one line typed into the chat loop.
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand<'a> {
    Quit,
    History,
    Clear,
    Skip,
    Ask(&'a str),
}

fn parse_chat_line(line: &str) -> ChatCommand<'_> {
    match line.trim() {
        "" => ChatCommand::Skip,
        ":quit" | ":q" | ":exit" => ChatCommand::Quit,
        ":history" => ChatCommand::History,
        ":clear" => ChatCommand::Clear,
        question => ChatCommand::Ask(question),
    }
}

pub async fn run_chat(config: &Config, k: Option<usize>) -> Result<()> {
    let engine = build_engine(config).await?;
    println!("Ask a question (:history, :clear, :quit).");

    let mut history = AnswerHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_chat_line(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Skip => continue,
            ChatCommand::Clear => {
                history.clear();
                println!("History cleared.");
            }
            ChatCommand::History => print_history(&history),
            ChatCommand::Ask(question) => {
                if let Some(answer) = ask_once(&engine, question, k).await {
                    print_answer(&answer);
                    history.record(answer);
                }
            }
        }
        println!();
    }
    Ok(())
}

async fn ask_once(engine: &QaEngine, question: &str, k: Option<usize>) -> Option<AnswerRecord> {
    match engine.query(question, k).await {
        Ok(answer) => Some(answer),
        Err(e) => {
            eprintln!("error: {}", e);
            None
        }
    }
}

fn print_history(history: &AnswerHistory) {
    if history.is_empty() {
        println!("No questions asked yet.");
        return;
    }
    for record in history.iter() {
        println!(
            "Q: {}\nA: {} ({}, {})",
            record.query,
            record.answer_text(),
            record.source,
            format_confidence(record.confidence, false)
        );
    }
}

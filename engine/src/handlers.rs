//! Command handlers for CLI operations
//!
//! - ask: resolve one query
//! - chat: interactive loop over one orchestrator
//! - status: strategy choice and capability inventory
//! - history: tail of the interaction log

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::agent::{EventLog, Event, Orchestrator, QueryResponse, StatsReport};
use crate::config::Config;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// One line typed in a chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Exit,
    Stats,
    Reset,
    Empty,
    Query(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => ChatInput::Empty,
            "salir" | "exit" | "quit" => ChatInput::Exit,
            "/stats" => ChatInput::Stats,
            "/reset" => ChatInput::Reset,
            _ => ChatInput::Query(trimmed.to_string()),
        }
    }
}

/// Resolve a single query
pub async fn handle_ask(query: String, config: &Config, format: OutputFormat) -> Result<()> {
    let mut agent = Orchestrator::from_config(config).context("Failed to start EcoAgent")?;
    let response = agent.process(&query).await;
    print_response(&response, format)
}

/// Interactive session until the user types an exit word or closes stdin
pub async fn handle_chat(config: &Config, format: OutputFormat) -> Result<()> {
    let mut agent = Orchestrator::from_config(config).context("Failed to start EcoAgent")?;
    let status = agent.status();

    if let OutputFormat::Text = format {
        println!("🌱 EcoAgent ({}) listo. Escribe tu consulta.", status.model_type);
        println!("   /stats muestra estadísticas, /reset las reinicia, 'salir' termina.");
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        if let OutputFormat::Text = format {
            stdout.write_all("👤 > ".as_bytes()).await?;
            stdout.flush().await?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => break,
            ChatInput::Stats => print_stats(&agent.get_stats(), format)?,
            ChatInput::Reset => {
                agent.reset_stats();
                if let OutputFormat::Text = format {
                    println!("Estadísticas reiniciadas.");
                }
            }
            ChatInput::Query(query) => {
                let response = agent.process(&query).await;
                print_response(&response, format)?;
            }
        }
    }

    if let OutputFormat::Text = format {
        println!("¡Hasta luego!");
    }
    Ok(())
}

/// Show the strategy choice and inventory
pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let agent = Orchestrator::from_config(config).context("Failed to start EcoAgent")?;
    let status = agent.status();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Text => {
            println!("EcoAgent status:");
            println!("  Model type:      {}", status.model_type);
            println!("  Reasoner:        {}", status.reasoner);
            println!("  Retriever:       {} ({} documents)", status.retriever, status.documents);
            println!("  Max iterations:  {}", status.max_iterations);
            if let Some(path) = &status.log_file {
                println!("  Interaction log: {}", path.display());
            }
            println!("  Capabilities ({}):", status.capabilities.len());
            for name in &status.capabilities {
                println!("    - {}", name);
            }
        }
    }
    Ok(())
}

/// Show the last `limit` interaction-log entries
pub async fn handle_history(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let path = &config.core.log_file;
    let entries = if path.exists() {
        EventLog::read_entries(path)
            .with_context(|| format!("Failed to read interaction log {}", path.display()))?
    } else {
        Vec::new()
    };
    let start = entries.len().saturating_sub(limit);
    let recent = &entries[start..];

    match format {
        OutputFormat::Json => {
            let output = json!({ "log_file": path, "entries": recent });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if recent.is_empty() {
                println!("No interactions recorded in {}", path.display());
                return Ok(());
            }
            println!("Interaction log (last {} entries):", recent.len());
            println!();
            for entry in recent {
                let stamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
                match &entry.event {
                    Event::Action {
                        capability_name,
                        args,
                        ..
                    } => println!("{}  action  {} {:?}", stamp, capability_name, args.as_slice()),
                    Event::Finish { output, .. } => {
                        let first_line = output.lines().next().unwrap_or_default();
                        println!("{}  finish  {}", stamp, first_line);
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_response(response: &QueryResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Text => {
            println!();
            println!("🤖 {}", response.response);
            println!();
            if response.is_success() {
                println!("✓ {} iteration(s)", response.iterations);
            } else {
                println!("✗ Query ended with an error after {} iteration(s)", response.iterations);
            }
            println!();
        }
    }
    Ok(())
}

fn print_stats(report: &StatsReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            println!("📊 Estadísticas:");
            println!("  Interacciones totales: {}", report.total_interactions);
            println!("  Exitosas:              {}", report.successful_interactions);
            println!("  Tasa de error:         {:.1}%", report.error_rate * 100.0);
            println!("  Capacidades:           {}", report.tools_available);
            println!(
                "  Recuperación:          {}",
                if report.retrieval_available { "disponible" } else { "no disponible" }
            );
            println!("  Modelo:                {}", report.model_type);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_input_parse() {
        assert_eq!(ChatInput::parse("  "), ChatInput::Empty);
        assert_eq!(ChatInput::parse("SALIR"), ChatInput::Exit);
        assert_eq!(ChatInput::parse("quit\n"), ChatInput::Exit);
        assert_eq!(ChatInput::parse("/stats"), ChatInput::Stats);
        assert_eq!(ChatInput::parse("/Reset "), ChatInput::Reset);
        assert_eq!(
            ChatInput::parse("  ¿Política de audio? "),
            ChatInput::Query("¿Política de audio?".to_string())
        );
    }
}

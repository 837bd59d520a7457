use std::{net::SocketAddr, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{
    config::Overrides,
    error,
    server::{DEFAULT_BIND, DEFAULT_TIMEOUT_SECS},
    service::QueryService,
};

#[derive(Debug, Parser)]
#[command(
    name = "askbert",
    about = "Answer questions from a knowledge base by semantic similarity"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to the knowledge base (default: corpus.redb in the data dir)
    #[arg(long, global = true)]
    pub corpus: Option<PathBuf>,

    /// Override the embedding model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Maximum squared distance accepted as a match
    #[arg(long, global = true)]
    pub threshold: Option<f32>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            model: self.model.clone(),
            threshold: self.threshold,
            corpus: self.corpus.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP chat endpoint
    Serve(ServeArgs),
    /// Answer a single question and exit
    Ask(AskArgs),
    /// Start MCP server for AI agent integration
    Mcp,
    /// Show the resolved configuration and knowledge base statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Serve --

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Seconds allowed per question before answering "unavailable"
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Output the answer and match details as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskArgs {
    /// Answer the question and print the reply to `out`.
    ///
    /// An internal failure is logged and printed as the unavailable
    /// message; the return value is then `false`.
    pub fn run(
        &self,
        service: &QueryService,
        out: &mut impl std::io::Write,
    ) -> error::Result<bool> {
        let (answer, outcome) = match service.answer(&self.question) {
            Ok(reply) => (reply.answer, Some(reply.outcome)),
            Err(e) => {
                tracing::error!(error = %e, "failed to answer question");
                (service.messages().unavailable.clone(), None)
            }
        };

        if self.json {
            let line = serde_json::json!({
                "question": self.question,
                "answer": answer,
                "outcome": outcome,
            });
            writeln!(out, "{line}")?;
        } else {
            writeln!(out, "{answer}")?;
        }
        Ok(outcome.is_some())
    }
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "askbert",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::{
        config::Messages,
        test_util::{inconsistent_service, scenario_service},
    };

    fn ask(question: &str, json: bool) -> AskArgs {
        AskArgs {
            question: question.to_string(),
            json,
        }
    }

    #[test]
    fn ask_prints_the_answer() {
        let (service, _) = scenario_service();
        let mut out = Vec::new();

        let ok = ask("What's your name?", false)
            .run(&service, &mut out)
            .unwrap();

        assert!(ok);
        assert_eq!(String::from_utf8(out).unwrap(), "I am Bot.\n");
    }

    #[test]
    fn ask_json_includes_outcome() {
        let (service, _) = scenario_service();
        let mut out = Vec::new();

        ask("How old are you?", true).run(&service, &mut out).unwrap();

        let line: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["answer"], "I am ageless.");
        assert_eq!(line["outcome"]["kind"], "matched");
    }

    #[test]
    fn ask_internal_error_prints_unavailable() {
        let service = inconsistent_service();
        let mut out = Vec::new();

        let ok = ask("the weather today", false)
            .run(&service, &mut out)
            .unwrap();

        assert!(!ok);
        assert_eq!(
            String::from_utf8(out).unwrap().trim_end(),
            Messages::default().unavailable
        );
    }

    #[test]
    fn ask_json_internal_error_has_no_outcome() {
        let service = inconsistent_service();
        let mut out = Vec::new();

        let ok = ask("the weather today", true).run(&service, &mut out).unwrap();

        assert!(!ok);
        let line: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["answer"], Messages::default().unavailable);
        assert!(line["outcome"].is_null());
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::parse_from(["askbert", "serve"]);
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.bind, "127.0.0.1:5000".parse().unwrap());
                assert_eq!(args.timeout_secs, 10);
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn global_flags_become_overrides() {
        let cli = Cli::parse_from([
            "askbert",
            "ask",
            "What is your name?",
            "--threshold",
            "0.3",
            "--model",
            "/models/minilm",
            "--corpus",
            "faq.redb",
        ]);
        let overrides = cli.overrides();

        assert_eq!(overrides.threshold, Some(0.3));
        assert_eq!(overrides.model.as_deref(), Some("/models/minilm"));
        assert_eq!(overrides.corpus, Some(PathBuf::from("faq.redb")));
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.question, "What is your name?");
                assert!(!args.json);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["askbert", "-q", "-v", "status"]);
        assert!(result.is_err());
    }
}

use std::{sync::Arc, time::Duration};

use askbert::{
    CorpusDb,
    DataDir,
    KnowledgeBase,
    LiveService,
    ModelManager,
    QueryService,
    ServiceConfig,
    cli::{Cli, Command},
    error,
    mcp::run_mcp,
    observer::TracingObserver,
    server::run_server,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ASKBERT_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config = ServiceConfig::resolve(&data_dir, &cli.overrides())?;

    match cli.command {
        Command::Serve(args) => {
            let live = load_live(config)?;
            run_server(
                live,
                args.bind,
                Duration::from_secs(args.timeout_secs),
            )?;
        }
        Command::Ask(args) => {
            let service = load_service(&config)?;
            if !args.run(&service, &mut std::io::stdout().lock())? {
                std::process::exit(1);
            }
        }
        Command::Mcp => {
            run_mcp(load_live(config)?)?;
        }
        Command::Status(args) => {
            cmd_status(&data_dir, &config, args.json)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

/// Load the model and the knowledge base. Either failing is fatal.
fn load_service(config: &ServiceConfig) -> error::Result<QueryService> {
    let model = ModelManager::load(&config.model_id)?;
    QueryService::from_config(
        config,
        Arc::new(model),
        Arc::new(TracingObserver),
    )
}

fn load_live(config: ServiceConfig) -> error::Result<Arc<LiveService>> {
    let service = load_service(&config)?;
    Ok(Arc::new(LiveService::new(service, config)))
}

fn cmd_status(
    data_dir: &DataDir,
    config: &ServiceConfig,
    json: bool,
) -> error::Result<()> {
    let knowledge_base = if config.corpus_path.is_file() {
        Some(KnowledgeBase::load(&CorpusDb::open(&config.corpus_path)?)?)
    } else {
        None
    };
    let entries = knowledge_base.as_ref().map_or(0, |kb| kb.len());
    let dimension = knowledge_base.as_ref().map(|kb| kb.dimension());
    let corpus_model = knowledge_base
        .as_ref()
        .and_then(|kb| kb.model_id())
        .map(str::to_string);

    if json {
        let out = serde_json::json!({
            "data_dir": data_dir.root(),
            "corpus": config.corpus_path,
            "corpus_present": knowledge_base.is_some(),
            "entries": entries,
            "dimension": dimension,
            "corpus_model": corpus_model,
            "model": config.model_id,
            "threshold": config.threshold,
        });
        println!("{out}");
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Model: {}", config.model_id);
        println!("Threshold: {}", config.threshold);
        match &knowledge_base {
            Some(kb) => {
                println!("Corpus: {}", config.corpus_path.display());
                println!("Entries: {}", kb.len());
                println!("Dimension: {}", kb.dimension());
                if let Some(model) = kb.model_id() {
                    println!("Embedded with: {model}");
                }
            }
            None => {
                println!("Corpus: {} (missing)", config.corpus_path.display());
            }
        }
    }
    Ok(())
}

//! askbert - answer questions from a fixed knowledge base by semantic
//! similarity.
//!
//! Each question is embedded with a sentence-transformer
//! ([candle](https://github.com/huggingface/candle) BERT, mean pooled and
//! L2-normalized) and compared against the embedded questions of the
//! knowledge base. When the nearest stored question is close enough its
//! answer is returned, otherwise a fixed fallback message is.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use askbert::{
//!     DataDir,
//!     ModelManager,
//!     QueryService,
//!     ServiceConfig,
//!     config::Overrides,
//!     observer::TracingObserver,
//! };
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config = ServiceConfig::resolve(&data_dir, &Overrides::default())
//!     .unwrap();
//! let model = ModelManager::load(&config.model_id).unwrap();
//!
//! let service =
//!     QueryService::from_config(&config, Arc::new(model), Arc::new(TracingObserver))
//!         .unwrap();
//!
//! let reply = service.answer("What is your name?").unwrap();
//! println!("{}", reply.answer);
//! ```

pub mod cli;
pub mod config;
pub mod corpus_db;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod index;
pub mod knowledge_base;
pub mod live;
pub mod mcp;
pub mod model_manager;
pub mod observer;
pub mod policy;
pub mod server;
pub mod service;

#[cfg(test)]
mod test_util;

pub use config::{Messages, ServiceConfig};
pub use corpus_db::CorpusDb;
pub use data_dir::DataDir;
pub use embedding::{Embedder, Embedding};
pub use error::{Error, Result};
pub use index::{FlatIndex, Neighbor};
pub use knowledge_base::KnowledgeBase;
pub use live::LiveService;
pub use model_manager::ModelManager;
pub use policy::MatchPolicy;
pub use service::{QueryService, Reply, ReplyOutcome};

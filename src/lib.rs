//! Feed ranking and recommendation engine for public notebook feeds.
//!
//! Embedded library: a presentation layer owns a [`FeedSession`] per
//! viewing user and calls its interaction entry points; the session
//! records events, maintains collaborative-filtering similarity state,
//! recomputes composite ranking scores and exposes the sorted feed.
//! Durable persistence goes through an injected [`DocumentStore`]
//! collaborator and never blocks the ranking path.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::RankingConfig;
pub use db::{Document, DocumentStore, FeedRepository, InMemoryDocumentStore, QueryOp, WriteOp};
pub use error::{FeedError, Result};
pub use models::{Comment, FeedItem, Interaction, InteractionType};
pub use services::{
    FeedRanker, FeedSession, InteractionStore, RankingListener, ScorePredictor, SimilarityEngine,
    SimilarityMatrix,
};

pub mod engine;
pub mod profile;
pub mod service;

pub use engine::{ContentBasedEngine, Engine, PopularityEngine};
pub use service::{
    annotate_reason, build_engine, clamp_limit, EngineContext, EngineKind, RecommendationService, RecommenderConfig,
};

pub mod prelude {
    pub use super::{Engine, EngineContext, EngineKind, RecommendationService, RecommenderConfig};
}

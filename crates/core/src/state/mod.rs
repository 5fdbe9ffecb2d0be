pub mod db;
pub mod kv;
pub mod project;

pub use db::StudioDb;

pub use kv::{keys, load_json, save_json, KeyValueStore, MemoryStore, SqliteStore};
pub use project::{
    BusinessModel, DataPolicy, FeaturePriority, FeatureSpec, MarketValidation, Monetization,
    ProjectData, TechPreferences, slugify,
};

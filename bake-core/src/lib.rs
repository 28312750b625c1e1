//! # Bake Core
//!
//! Engine for classifying real-time-platform materials and orchestrating
//! texture bakes over their shading graphs.
//! Designed for use by CLI tools and host integrations.
//!
//! ## Architecture
//!
//! - [`graph`] - Shading-graph model (nodes, typed sockets, links)
//! - [`scene`] - Materials, mesh entities, renderer context
//! - [`classify`] - Naming/taxonomy classification and texture requirements
//! - [`uv_conflict`] - Shared-UV conflict detection across mesh entities
//! - [`uv_chain`] - UV-transform chain detection in shading graphs
//! - [`bake`] - Transactional bake orchestrator
//! - [`report`] - Report generation from analysis results
//! - [`session_log`] - Local log of classify/bake actions

pub mod bake;
pub mod classify;
pub mod graph;
pub mod image_io;
pub mod report;
pub mod scene;
pub mod session_log;
pub mod uv_chain;
pub mod uv_conflict;

// Re-export main types for convenient access
pub use bake::{
    bake_all, bake_material, configure_channel_passes, default_output_dir, BakeHost, BakeOutcome,
    BakeReport, BakeSession, BakeSettings, BakeTarget, BatchBakeSummary, BatchFailure,
    PreviewBakeHost,
};
pub use classify::{
    base_name, classify, derive_texture_requirements, naming_issues, needs_second_texture,
    recommend_suffix, repair_name, BakeChannel, Classification, NamingIssue, TaxonomySuffix,
    TextureRequirement,
};
pub use graph::{InputSocket, Link, Node, NodeHandle, NodeKind, ShadingGraph, SocketType, SocketValue};
pub use image_io::{BakedImage, ColorDepth, FileImageSaver, ImageFormat, ImageSaver};
pub use report::{scene_report, MaterialReport, ReportBuilder, SceneReport};
pub use scene::{
    BakePassConfig, BlendMode, Material, MeshData, MeshEntity, RenderDevice, RendererContext,
    Scene, Selection, UvLayer,
};
pub use session_log::{
    default_log_path, export_session_log_text, load_session_log, record_bake, record_batch_bake,
    record_classification, record_name_repair, save_session_log, SessionAction, SessionEntry,
    SessionLog,
};
pub use uv_chain::{detect_uv_transform_chain, UvChain, UvChainReport};
pub use uv_conflict::{detect_uv_conflict, UvConflictReport};

/// Common result type for bake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    #[error("Classification inconsistency: {0}")]
    Classification(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Bake failed: {0}")]
    Bake(String),

    #[error("{0}")]
    Other(String),
}

pub mod config;
pub mod docx;
pub mod extract;
pub mod form;
pub mod history;
pub mod ibid;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod style;
pub mod ui;

pub use config::Config;
pub use model::{CitationKind, CitationMetadata, RunReport};
pub use pipeline::Processor;
pub use resolver::{Resolver, ResolverSettings};

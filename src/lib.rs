//! Renders the PortableInfobox XML markup dialect into themed HTML infoboxes.
//!
//! A template author writes `<infobox>` markup whose nodes pull their values
//! from template arguments. [`Controller`] parses that markup, resolves each
//! node against the arguments through the host's [`ExternalParser`] and
//! [`FileRepository`], and renders the non-empty result with sailfish
//! templates. The resolved render data is also collected for persistence
//! through [`DataService`].

pub mod common;
pub mod config;
pub mod controller;
pub mod data_service;
pub mod external;
pub mod lru_limiter;
pub mod node;
pub mod parsing_helper;
pub mod render;
pub mod render_data;
pub mod sanitize;
pub mod validate;
pub mod xml;

pub use config::Config;
pub use controller::{Controller, InfoboxOutput};
pub use data_service::{DataService, MemoryCache, MemoryPageProps, ObjectCache, PageProps};
pub use external::{ExternalParser, FileRepository, PlainParser, StaticFiles};
pub use render_data::{InfoboxRecord, PARSER_TAG_VERSION, RenderData};

//! Host-agnostic core for the attune embeddable accessibility widget.
//!
//! A browser (or test) host supplies a [`document::DocumentSurface`]
//! and a [`session::KeyValueStorage`]; the [`session::WidgetSession`]
//! drives token validation, profile activation, keyword highlighting,
//! and settings persistence through a [`session::SettingsApi`]
//! transport such as [`http::HttpSettingsApi`].

pub mod document;
pub mod highlight;
pub mod http;
pub mod profile;
pub mod session;

pub use document::{DocumentSurface, PageDocument};
pub use http::HttpSettingsApi;
pub use profile::ProfileId;
pub use session::{SessionPhase, WidgetSession};

//! Beatmap mirror abstraction
//!
//! This module provides the registry of download mirrors and the HTTP client
//! seam the race engine talks through.
//!
//! A mirror is nothing more than a name and a URL shape: given a set ID and
//! the download options it produces the URL to GET. Mirror URL shapes are
//! configuration data, so the built-in list lives in [`builtin`] and callers
//! may register their own [`Mirror`] implementations.
//!
//! # Example
//!
//! ```ignore
//! use mapsync::mirror::{MirrorOptions, MirrorRegistry, ReqwestClient};
//!
//! let registry = MirrorRegistry::builtin();
//! let client = ReqwestClient::new()?;
//! for mirror in registry.iter() {
//!     println!("{}", mirror.build_url(1234, &MirrorOptions::default()));
//! }
//! ```

mod builtin;
mod http;
mod registry;
mod types;

pub use builtin::{UrlMirror, VideoFlag};
pub use http::{AsyncHttpClient, BodyStream, BoxFuture, HttpResponse, ReqwestClient};
pub use registry::{MirrorRegistry, RegistryError};
pub use types::{Mirror, MirrorError, MirrorOptions};

#[cfg(test)]
pub use http::tests::{ScriptedHttpClient, ScriptedResponse};

//! # Catalog Module
//!
//! Unifies track identity across the three payload origins (remote
//! catalog results, locally cached payloads and user-imported files) into
//! one addressable entity space, and resolves ids into concrete playable
//! audio references.
//!
//! The remote catalog API is consumed as a black box over HTTP
//! ([`CatalogClient`]); the [`CatalogResolver`] layers local-first
//! resolution with session-stable memoization on top.

pub mod client;
pub mod error;
pub mod models;
pub mod resolver;

pub use client::{CatalogClient, RemoteCatalog};
pub use error::{CatalogError, Result};
pub use models::{AudioSource, RadioStation, Track, TrackId};
pub use resolver::{
    CatalogResolver, PlayableAudio, Resolution, ResolvedTrack, TrackResolver,
};

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rendering, translation and caching of chart manifests.

pub mod cache;
pub mod render;
pub mod translate;

pub use cache::ManifestCache;
pub use render::{split_documents, HelmTemplateRenderer, Renderer};
pub use translate::{translate_all, TranslatedObject};

//! Capa CMS: caché, obtención deduplicada, configuración del sitio y layout dinámico.

pub mod cache;
pub mod clock;
pub mod component_config;
pub mod config_loader;
pub mod error;
pub mod fetcher;
pub mod layout;
pub mod site_config;

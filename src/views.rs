//! Plantillas HTML (askama). Los fragmentos de sección se insertan ya
//! renderizados en el layout y en la página.

use askama::Template;
use tracing::error;

use crate::cms::site_config::SiteConfig;
use crate::sections::{BannerData, CarouselLineasData, HeroData, ProductosDestacadosData};

/// Renderiza una plantilla; si falla, lo registra y devuelve una cadena vacía.
pub fn render_or_log<T: Template>(template: &T) -> String {
    template.render().unwrap_or_else(|e| {
        error!("Error renderizando plantilla: {}", e);
        String::new()
    })
}

/// Página completa: cabecera SEO, variables de marca y cuerpo.
#[derive(Template)]
#[template(path = "page.html")]
pub struct PageView<'a> {
    pub title: &'a str,
    pub config: &'a SiteConfig,
    pub body: &'a str,
}

#[derive(Template)]
#[template(path = "placeholder.html")]
pub struct PlaceholderView<'a> {
    pub message: &'a str,
}

pub struct SectionSlot {
    pub key: String,
    pub renderer: String,
    pub html: String,
}

#[derive(Template)]
#[template(path = "sections.html")]
pub struct SectionsView<'a> {
    pub slots: &'a [SectionSlot],
}

#[derive(Template)]
#[template(path = "sections/hero.html")]
pub struct HeroView<'a> {
    pub data: &'a HeroData,
}

#[derive(Template)]
#[template(path = "sections/carousel_lineas.html")]
pub struct CarouselLineasView<'a> {
    pub data: &'a CarouselLineasData,
}

#[derive(Template)]
#[template(path = "sections/banner.html")]
pub struct BannerView<'a> {
    pub data: &'a BannerData,
    pub parallax: bool,
}

#[derive(Template)]
#[template(path = "sections/productos_destacados.html")]
pub struct ProductosDestacadosView<'a> {
    pub data: &'a ProductosDestacadosData,
}

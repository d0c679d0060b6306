//! Secciones de la home y su vínculo con el layout dinámico.
//!
//! Los registros llegan con el formato del CMS (`txt_titulo`, `lista_slides`,
//! `img_fondo`...). Cada sección acepta también su propia forma ya mapeada
//! (`title`, `slides`, `imageSrc`...), de modo que un registro puede venir
//! en cualquiera de las dos.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cms::layout::{
    default_props, ComponentProps, LayoutBinding, PropBuilder, PropContext, SectionRenderer,
};
use crate::models::ContentRecord;
use crate::views::{self, BannerView, CarouselLineasView, HeroView, ProductosDestacadosView};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Slide {
    pub image_src: String,
    pub image_alt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroData {
    pub slides: Vec<Slide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_alt: Option<String>,
    pub title: String,
    pub subtitle: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Linea {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub image_src: String,
    pub image_alt: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CarouselLineasData {
    pub section_title: String,
    pub lineas: Vec<Linea>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallax: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BannerData {
    pub image_src: String,
    pub image_alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BannerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Producto {
    pub id: String,
    pub name: String,
    pub image_src: String,
    pub image_alt: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductosDestacadosData {
    pub section_title: String,
    pub products: Vec<Producto>,
}

fn text(raw: &Map<String, Value>, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn non_empty(raw: &Map<String, Value>, key: &str) -> Option<String> {
    text(raw, key).filter(|s| !s.is_empty())
}

fn list<'a>(raw: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    raw.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn slugify(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

/// Deserializa la forma ya mapeada si `marker` está presente.
fn mapped<T: DeserializeOwned>(raw: &Map<String, Value>, marker: &str) -> Option<T> {
    let present = raw.get(marker).is_some_and(|v| !v.is_null());
    present
        .then(|| serde_json::from_value(Value::Object(raw.clone())).ok())
        .flatten()
}

impl HeroData {
    pub fn from_cms(raw: &Map<String, Value>) -> Self {
        if let Some(data) = mapped(raw, "slides") {
            return data;
        }
        Self {
            slides: list(raw, "lista_slides")
                .map(|s| Slide {
                    image_src: text(s, "img_src").unwrap_or_default(),
                    image_alt: text(s, "txt_alt").unwrap_or_default(),
                })
                .collect(),
            logo_image: non_empty(raw, "logoImage"),
            logo_alt: non_empty(raw, "logoAlt"),
            title: text(raw, "txt_titulo").unwrap_or_default(),
            subtitle: text(raw, "txt_subtitulo").unwrap_or_default(),
        }
    }
}

impl CarouselLineasData {
    pub fn from_cms(raw: &Map<String, Value>) -> Self {
        if let Some(data) = mapped(raw, "sectionTitle") {
            return data;
        }
        Self {
            section_title: text(raw, "txt_titulo_seccion").unwrap_or_default(),
            lineas: list(raw, "lista_lineas")
                .enumerate()
                .map(|(i, item)| {
                    let name = text(item, "txt_nombre");
                    Linea {
                        id: format!("linea-{i}"),
                        slug: name.as_deref().map(slugify).unwrap_or_default(),
                        image_src: text(item, "img_linea").unwrap_or_default(),
                        image_alt: text(item, "txt_alt_optional")
                            .or_else(|| name.clone())
                            .unwrap_or_default(),
                        href: text(item, "link_url").unwrap_or_default(),
                        name: name.unwrap_or_default(),
                    }
                })
                .collect(),
        }
    }
}

impl BannerData {
    pub fn from_cms(raw: &Map<String, Value>) -> Self {
        if let Some(data) = mapped(raw, "imageSrc") {
            return data;
        }
        let link_url = raw
            .get("link_destino")
            .and_then(Value::as_object)
            .and_then(|link| non_empty(link, "url"));
        let config = raw
            .get("_configuracion")
            .and_then(Value::as_object)
            .map(|c| BannerConfig {
                parallax: c.get("parallax").and_then(Value::as_bool),
            });
        Self {
            image_src: text(raw, "img_fondo").unwrap_or_default(),
            image_alt: text(raw, "txt_alt_optional").unwrap_or_default(),
            title: text(raw, "txt_titulo"),
            href: link_url.or_else(|| text(raw, "link_url")),
            config,
        }
    }
}

impl ProductosDestacadosData {
    pub fn from_cms(raw: &Map<String, Value>) -> Self {
        if let Some(data) = mapped(raw, "sectionTitle") {
            return data;
        }
        Self {
            section_title: text(raw, "txt_titulo_seccion").unwrap_or_default(),
            products: list(raw, "lista_productos")
                .enumerate()
                .map(|(i, item)| {
                    let name = text(item, "txt_nombre");
                    Producto {
                        id: format!("producto-{i}"),
                        image_src: text(item, "img_producto").unwrap_or_default(),
                        image_alt: text(item, "txt_alt_optional")
                            .or_else(|| name.clone())
                            .unwrap_or_default(),
                        href: text(item, "link_url").unwrap_or_default(),
                        name: name.unwrap_or_default(),
                    }
                })
                .collect(),
        }
    }
}

/// Secciones conocidas de la home. El conjunto es cerrado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeSection {
    Hero,
    CarouselLineas,
    Banner,
    ProductosDestacados,
}

fn to_map<T: Serialize>(data: &T) -> Map<String, Value> {
    match serde_json::to_value(data) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn from_props<T: DeserializeOwned>(props: &ComponentProps) -> Option<T> {
    if props.data.is_empty() {
        return None;
    }
    serde_json::from_value(Value::Object(props.data.clone())).ok()
}

impl HomeSection {
    pub const ALL: [HomeSection; 4] = [
        HomeSection::Hero,
        HomeSection::CarouselLineas,
        HomeSection::Banner,
        HomeSection::ProductosDestacados,
    ];

    /// Etiqueta de tipo en el CMS.
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Hero => "home_hero",
            Self::CarouselLineas => "home_carousel_lineas",
            Self::Banner => "home_banner",
            Self::ProductosDestacados => "home_productos_destacados",
        }
    }

    /// Nombre del renderizador en el layout.
    pub fn renderer_name(self) -> &'static str {
        match self {
            Self::Hero => "home-hero",
            Self::CarouselLineas => "home-carousel-lineas",
            Self::Banner => "home-banner",
            Self::ProductosDestacados => "home-productos-destacados",
        }
    }

    pub fn from_renderer_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.renderer_name() == name)
    }

    /// Convierte los datos crudos del CMS a la forma que espera la sección.
    pub fn map_cms_data(self, raw: &Map<String, Value>) -> Map<String, Value> {
        match self {
            Self::Hero => to_map(&HeroData::from_cms(raw)),
            Self::CarouselLineas => to_map(&CarouselLineasData::from_cms(raw)),
            Self::Banner => to_map(&BannerData::from_cms(raw)),
            Self::ProductosDestacados => to_map(&ProductosDestacadosData::from_cms(raw)),
        }
    }
}

impl SectionRenderer for HomeSection {
    fn render(&self, props: &ComponentProps) -> Option<String> {
        let html = match self {
            Self::Hero => views::render_or_log(&HeroView {
                data: &from_props::<HeroData>(props)?,
            }),
            Self::CarouselLineas => views::render_or_log(&CarouselLineasView {
                data: &from_props::<CarouselLineasData>(props)?,
            }),
            Self::Banner => {
                let data = from_props::<BannerData>(props)?;
                let parallax = props
                    .config()
                    .get::<bool>("parallax")
                    .or_else(|| data.config.as_ref().and_then(|c| c.parallax))
                    .unwrap_or(false);
                views::render_or_log(&BannerView {
                    data: &data,
                    parallax,
                })
            }
            Self::ProductosDestacados => views::render_or_log(&ProductosDestacadosView {
                data: &from_props::<ProductosDestacadosData>(props)?,
            }),
        };
        Some(html)
    }
}

/// Vínculo de la home: cada tipo del CMS con su renderizador.
pub fn home_binding() -> LayoutBinding {
    HomeSection::ALL
        .into_iter()
        .fold(LayoutBinding::new(), |binding, section| {
            binding
                .bind(section.type_tag(), section.renderer_name())
                .register(section.renderer_name(), Arc::new(section))
        })
}

/// Props de la home: los datos crudos se mapean a la forma de cada sección.
pub fn home_prop_builder() -> PropBuilder {
    Arc::new(|name: &str, record: &ContentRecord, ctx: &PropContext<'_>| {
        let mut props = default_props(name, record, ctx);
        match HomeSection::from_renderer_name(name) {
            Some(section) => props.data = section.map_cms_data(&record.data),
            None => debug!("Renderizador '{}' sin mapeo; datos sin transformar", name),
        }
        props
    })
}

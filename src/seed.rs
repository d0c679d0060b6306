//! Registros simulados del CMS para la página "Inicio". Los sirve el propio
//! servidor en `/api/public/v1/cms-components` cuando no hay un CMS externo.

use chrono::Utc;
use serde_json::{json, Value};

use crate::cms::layout::DEFAULT_PAGE;
use crate::models::{CmsClient, ComponentsPayload, ContentFilters, ContentRecord, RecordStatus};

pub fn seed_client() -> CmsClient {
    CmsClient {
        id: "palo-alto-1".to_string(),
        name: "Bodega Palo Alto".to_string(),
        slug: "palo-alto".to_string(),
    }
}

fn component(kind: &str, name: &str, order: u32, mut data: Value, now: &str) -> ContentRecord {
    if let Value::Object(map) = &mut data {
        map.insert("_orden".to_string(), json!(order));
    }
    ContentRecord {
        id: format!("mock-{kind}-{order}"),
        name: Some(name.to_string()),
        kind: kind.to_string(),
        page: DEFAULT_PAGE.to_string(),
        data: match data {
            Value::Object(map) => map,
            _ => Default::default(),
        },
        status: RecordStatus::Published,
        is_active: true,
        is_visible: true,
        description: None,
        created_at: Some(now.to_string()),
        updated_at: Some(now.to_string()),
        client_name: Some(seed_client().name),
    }
}

/// Componentes de la home en formato CMS.
pub fn seed_components() -> Vec<ContentRecord> {
    let now = Utc::now().to_rfc3339();
    vec![
        component(
            "home_hero",
            "Hero inicio",
            1,
            json!({
                "lista_slides": [
                    { "img_src": "/images/home/hero-1.jpg", "txt_alt": "Viñedos al pie de la cordillera" },
                    { "img_src": "/images/home/hero-2.jpg", "txt_alt": "Cosecha en la finca" },
                    { "img_src": "/images/home/hero-3.jpg", "txt_alt": "Sala de barricas" }
                ],
                "logoImage": "/images/logo-palo-alto.svg",
                "logoAlt": "Palo Alto",
                "txt_titulo": "Bodega Palo Alto",
                "txt_subtitulo": "Mendoza, Argentina"
            }),
            &now,
        ),
        component(
            "home_carousel_lineas",
            "Carousel líneas",
            2,
            json!({
                "txt_titulo_seccion": "Nuestras líneas",
                "lista_lineas": [
                    { "txt_nombre": "Gran Reserva", "img_linea": "/images/lineas/gran-reserva.jpg", "link_url": "/vinos/gran-reserva" },
                    { "txt_nombre": "Reserva", "img_linea": "/images/lineas/reserva.jpg", "link_url": "/vinos/reserva" },
                    { "txt_nombre": "Varietales", "img_linea": "/images/lineas/varietales.jpg", "link_url": "/vinos/varietales" },
                    { "txt_nombre": "Destilados", "img_linea": "/images/lineas/destilados.jpg", "txt_alt_optional": "Línea de destilados", "link_url": "/destileria" }
                ]
            }),
            &now,
        ),
        component(
            "home_banner",
            "Banner raíces",
            3,
            json!({
                "img_fondo": "/images/home/banner-raices.jpg",
                "txt_alt_optional": "Viñas antiguas de la finca",
                "txt_titulo": "Nuestras raíces",
                "link_destino": { "url": "/bodega", "label": "Conocé la bodega" },
                "_configuracion": { "parallax": true }
            }),
            &now,
        ),
        component(
            "home_banner",
            "Banner vinos",
            4,
            json!({
                "img_fondo": "/images/home/banner-vinos.jpg",
                "txt_alt_optional": "Copas de vino tinto",
                "txt_titulo": "Vinos de altura",
                "link_url": "/vinos"
            }),
            &now,
        ),
        component(
            "home_productos_destacados",
            "Productos destacados",
            5,
            json!({
                "txt_titulo_seccion": "Productos destacados",
                "lista_productos": [
                    { "txt_nombre": "Malbec Gran Reserva", "img_producto": "/images/productos/malbec-gr.png", "link_url": "/vinos/malbec-gran-reserva" },
                    { "txt_nombre": "Cabernet Franc Reserva", "img_producto": "/images/productos/cabernet-franc.png", "link_url": "/vinos/cabernet-franc-reserva" },
                    { "txt_nombre": "Gin de Montaña", "img_producto": "/images/productos/gin.png", "link_url": "/destileria/gin" }
                ]
            }),
            &now,
        ),
    ]
}

/// Respuesta del endpoint simulado aplicando los filtros recibidos.
pub fn components_payload(filters: &ContentFilters) -> ComponentsPayload {
    ComponentsPayload {
        components: seed_components()
            .into_iter()
            .filter(|r| filters.matches(r))
            .collect(),
        client: Some(seed_client()),
    }
}

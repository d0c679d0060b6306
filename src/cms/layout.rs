//! Layout dinámico: decide qué se pinta a partir de la configuración y del
//! contenido, ordena los registros de la página y los entrega a sus
//! renderizadores.
//!
//! Estados (se evalúan en cada render, sin estado persistido):
//!   - `ConfigPending`: la configuración aún no se ha resuelto.
//!   - `ContentPending`: el contenido está cargando o falló (`records = None`).
//!   - `Empty`: no queda ningún registro renderizable para la página.
//!   - `Ready`: hay al menos un registro con renderizador.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cms::component_config::{component_config, ComponentConfig};
use crate::cms::config_loader::SiteConfigState;
use crate::cms::fetcher::ContentState;
use crate::models::ContentRecord;
use crate::views;

/// Página que se pinta cuando no se indica ninguna.
pub const DEFAULT_PAGE: &str = "Inicio";

/// Props de un renderizador. `overrides` viene de la configuración anidada
/// del registro y tiene prioridad sobre los campos calculados.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentProps {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Map<String, Value>,
    pub overrides: Map<String, Value>,
}

impl ComponentProps {
    /// Valor efectivo de un campo: primero `overrides`, luego los campos base.
    pub fn field(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        match key {
            "loading" => Some(Value::Bool(self.loading)),
            "error" => Some(self.error.clone().map_or(Value::Null, Value::String)),
            "data" => Some(Value::Object(self.data.clone())),
            _ => None,
        }
    }

    pub fn config(&self) -> ComponentConfig {
        ComponentConfig::from_map(self.overrides.clone())
    }
}

/// Renderizador de una sección. `None` significa "no hay nada que pintar".
pub trait SectionRenderer: Send + Sync {
    fn render(&self, props: &ComponentProps) -> Option<String>;
}

/// Contexto que recibe el constructor de props.
pub struct PropContext<'a> {
    pub loading: bool,
    pub error: Option<&'a str>,
    pub content: &'a ContentState,
}

pub type PropBuilder =
    Arc<dyn Fn(&str, &ContentRecord, &PropContext<'_>) -> ComponentProps + Send + Sync>;

/// Props por defecto: `{loading, error, data}` más la configuración anidada como overrides.
pub fn default_props(_renderer_name: &str, record: &ContentRecord, ctx: &PropContext<'_>) -> ComponentProps {
    ComponentProps {
        loading: ctx.loading,
        error: ctx.error.map(str::to_string),
        data: record.data.clone(),
        overrides: component_config(record),
    }
}

/// Vínculo entre etiquetas de tipo, nombres de renderizador y renderizadores.
#[derive(Clone, Default)]
pub struct LayoutBinding {
    type_to_renderer: HashMap<String, String>,
    renderers: HashMap<String, Arc<dyn SectionRenderer>>,
}

impl LayoutBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, type_tag: &str, renderer_name: &str) -> Self {
        self.type_to_renderer
            .insert(type_tag.to_string(), renderer_name.to_string());
        self
    }

    pub fn register(mut self, renderer_name: &str, renderer: Arc<dyn SectionRenderer>) -> Self {
        self.renderers.insert(renderer_name.to_string(), renderer);
        self
    }

    /// Nombre y renderizador para una etiqueta, si ambos existen.
    pub fn resolve(&self, type_tag: &str) -> Option<(&str, &Arc<dyn SectionRenderer>)> {
        let name = self.type_to_renderer.get(type_tag)?;
        let renderer = self.renderers.get(name)?;
        Some((name.as_str(), renderer))
    }

    /// Etiquetas vinculadas a un nombre sin renderizador registrado.
    pub fn unresolved(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .type_to_renderer
            .iter()
            .filter(|(_, name)| !self.renderers.contains_key(*name))
            .map(|(tag, _)| tag.as_str())
            .collect();
        tags.sort_unstable();
        tags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind<'a> {
    Config,
    Content,
    Empty { page: &'a str },
}

/// Marcador de carga o de vacío proporcionado por quien monta el layout.
#[derive(Clone)]
pub enum Placeholder {
    Render(Arc<dyn Fn(PlaceholderKind<'_>) -> String + Send + Sync>),
    Static(String),
}

impl Placeholder {
    fn show(&self, kind: PlaceholderKind<'_>) -> String {
        match self {
            Self::Render(f) => f(kind),
            Self::Static(html) => html.clone(),
        }
    }
}

/// Registro listo para pintarse.
pub struct RenderItem<'a> {
    /// `type-id`, estable ante reordenaciones.
    pub key: String,
    pub renderer_name: &'a str,
    pub record: &'a ContentRecord,
    renderer: &'a Arc<dyn SectionRenderer>,
}

pub enum LayoutState<'a> {
    ConfigPending,
    ContentPending,
    Empty,
    Ready(Vec<RenderItem<'a>>),
}

impl LayoutState<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfigPending => "config-pending",
            Self::ContentPending => "content-pending",
            Self::Empty => "empty",
            Self::Ready(_) => "ready",
        }
    }
}

fn compare_order(a: &ContentRecord, b: &ContentRecord) -> Ordering {
    match (a.order_hint(), b.order_hint()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Registros de `page` ordenados por su pista de orden. La ordenación es
/// estable: los empates conservan el orden de llegada.
pub fn order_page_records<'a>(records: &'a [ContentRecord], page: &str) -> Vec<&'a ContentRecord> {
    let mut selected: Vec<&ContentRecord> = records.iter().filter(|r| r.page == page).collect();
    selected.sort_by(|a, b| compare_order(a, b));
    selected
}

/// Función pura del estado del layout.
pub fn resolve_layout<'a>(
    config: &SiteConfigState,
    content: &'a ContentState,
    page: &str,
    binding: &'a LayoutBinding,
) -> LayoutState<'a> {
    if config.loading && config.config.is_none() {
        return LayoutState::ConfigPending;
    }
    let records = match (&content.records, content.loading) {
        (Some(records), false) => records,
        _ => return LayoutState::ContentPending,
    };

    let items: Vec<RenderItem<'a>> = order_page_records(records, page)
        .into_iter()
        .filter_map(|record| {
            let Some((renderer_name, renderer)) = binding.resolve(&record.kind) else {
                debug!("Tipo '{}' sin renderizador; se omite", record.kind);
                return None;
            };
            Some(RenderItem {
                key: format!("{}-{}", record.kind, record.id),
                renderer_name,
                record,
                renderer,
            })
        })
        .collect();

    if items.is_empty() {
        LayoutState::Empty
    } else {
        LayoutState::Ready(items)
    }
}

/// Layout dinámico de una página.
#[derive(Clone)]
pub struct DynamicLayout {
    page: String,
    binding: LayoutBinding,
    prop_builder: Option<PropBuilder>,
    loading: Option<Placeholder>,
    empty: Option<Placeholder>,
}

impl DynamicLayout {
    pub fn new(page: &str, binding: LayoutBinding) -> Self {
        Self {
            page: page.to_string(),
            binding,
            prop_builder: None,
            loading: None,
            empty: None,
        }
    }

    /// El mismo layout para otra página.
    pub fn for_page(&self, page: &str) -> Self {
        Self {
            page: page.to_string(),
            ..self.clone()
        }
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn with_prop_builder(mut self, builder: PropBuilder) -> Self {
        self.prop_builder = Some(builder);
        self
    }

    pub fn with_loading(mut self, placeholder: Placeholder) -> Self {
        self.loading = Some(placeholder);
        self
    }

    pub fn with_empty(mut self, placeholder: Placeholder) -> Self {
        self.empty = Some(placeholder);
        self
    }

    pub fn state<'a>(&'a self, config: &SiteConfigState, content: &'a ContentState) -> LayoutState<'a> {
        resolve_layout(config, content, &self.page, &self.binding)
    }

    /// Pinta la página; siempre devuelve algo visible (contenido o marcador).
    pub fn render(&self, config: &SiteConfigState, content: &ContentState) -> String {
        let state = self.state(config, content);
        debug!("Layout de '{}' en estado {}", self.page, state.name());
        match state {
            LayoutState::ConfigPending => self.placeholder(&self.loading, PlaceholderKind::Config),
            LayoutState::ContentPending => self.placeholder(&self.loading, PlaceholderKind::Content),
            LayoutState::Empty => self.placeholder(&self.empty, PlaceholderKind::Empty { page: &self.page }),
            LayoutState::Ready(items) => self.render_items(&items, content),
        }
    }

    fn render_items(&self, items: &[RenderItem<'_>], content: &ContentState) -> String {
        let ctx = PropContext {
            loading: content.loading,
            error: content.error.as_deref(),
            content,
        };

        let slots: Vec<views::SectionSlot> = items
            .iter()
            .filter_map(|item| {
                let props = match &self.prop_builder {
                    Some(build) => build(item.renderer_name, item.record, &ctx),
                    None => default_props(item.renderer_name, item.record, &ctx),
                };
                let html = item.renderer.render(&props)?;
                Some(views::SectionSlot {
                    key: item.key.clone(),
                    renderer: item.renderer_name.to_string(),
                    html,
                })
            })
            .collect();

        if slots.is_empty() {
            return self.placeholder(&self.empty, PlaceholderKind::Empty { page: &self.page });
        }
        views::render_or_log(&views::SectionsView { slots: &slots })
    }

    fn placeholder(&self, custom: &Option<Placeholder>, kind: PlaceholderKind<'_>) -> String {
        if let Some(placeholder) = custom {
            return placeholder.show(kind);
        }
        let message = match kind {
            PlaceholderKind::Config => "Cargando configuración...".to_string(),
            PlaceholderKind::Content => "Cargando componentes...".to_string(),
            PlaceholderKind::Empty { page } => {
                format!("No hay componentes configurados para la página \"{page}\".")
            }
        };
        if matches!(kind, PlaceholderKind::Empty { .. }) {
            warn!("Página '{}' sin componentes renderizables", self.page);
        }
        views::render_or_log(&views::PlaceholderView { message: &message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::fetcher::tests::record;
    use crate::cms::site_config::SiteConfig;
    use serde_json::json;

    /// Renderizador de prueba: pinta el nombre y el título de los datos.
    struct Echo(&'static str);

    impl SectionRenderer for Echo {
        fn render(&self, props: &ComponentProps) -> Option<String> {
            let title = props.data.get("title").and_then(Value::as_str).unwrap_or("-");
            Some(format!("<p>{}:{}</p>", self.0, title))
        }
    }

    struct Nothing;

    impl SectionRenderer for Nothing {
        fn render(&self, _props: &ComponentProps) -> Option<String> {
            None
        }
    }

    fn binding() -> LayoutBinding {
        LayoutBinding::new()
            .bind("a", "renderer-a")
            .register("renderer-a", Arc::new(Echo("a")))
    }

    fn config_ready() -> SiteConfigState {
        SiteConfigState {
            config: Some(SiteConfig::default_config()),
            loading: false,
            error: None,
        }
    }

    fn content(records: Vec<ContentRecord>) -> ContentState {
        ContentState {
            records: Some(records),
            loading: false,
            error: None,
        }
    }

    fn ready_ids(state: LayoutState<'_>) -> Vec<String> {
        match state {
            LayoutState::Ready(items) => items.iter().map(|i| i.record.id.clone()).collect(),
            other => panic!("se esperaba Ready, llegó {}", other.name()),
        }
    }

    #[test]
    fn records_are_ordered_by_hint_then_arrival() {
        let content = content(vec![
            record("1", "a", "P", json!({ "_orden": 2 })),
            record("2", "a", "P", json!({ "_orden": 1 })),
            record("3", "a", "P", json!({})),
        ]);
        let binding = binding();
        let state = resolve_layout(&config_ready(), &content, "P", &binding);
        assert_eq!(ready_ids(state), vec!["2", "1", "3"]);
    }

    #[test]
    fn unhinted_records_keep_arrival_order() {
        let content = content(vec![
            record("x", "a", "P", json!({})),
            record("y", "a", "P", json!({ "order": 5 })),
            record("z", "a", "P", json!({})),
            record("w", "a", "P", json!({ "order": 5 })),
        ]);
        let binding = binding();
        let state = resolve_layout(&config_ready(), &content, "P", &binding);
        assert_eq!(ready_ids(state), vec!["y", "w", "x", "z"]);
    }

    #[test]
    fn empty_list_is_empty_and_null_is_pending() {
        let binding = binding();
        let empty = content(vec![]);
        assert!(matches!(
            resolve_layout(&config_ready(), &empty, "P", &binding),
            LayoutState::Empty
        ));

        let unresolved = ContentState {
            records: None,
            loading: false,
            error: Some("Error 500: Internal Server Error".into()),
        };
        assert!(matches!(
            resolve_layout(&config_ready(), &unresolved, "P", &binding),
            LayoutState::ContentPending
        ));

        let loading = ContentState::default();
        assert!(matches!(
            resolve_layout(&config_ready(), &loading, "P", &binding),
            LayoutState::ContentPending
        ));
    }

    #[test]
    fn other_pages_do_not_count() {
        let content = content(vec![record("1", "a", "Bodega", json!({}))]);
        let binding = binding();
        assert!(matches!(
            resolve_layout(&config_ready(), &content, "Inicio", &binding),
            LayoutState::Empty
        ));
    }

    #[test]
    fn config_pending_takes_precedence() {
        let pending = SiteConfigState {
            config: None,
            loading: true,
            error: None,
        };
        let content = content(vec![record("1", "a", "P", json!({}))]);
        let binding = binding();
        assert!(matches!(
            resolve_layout(&pending, &content, "P", &binding),
            LayoutState::ConfigPending
        ));

        let reloading = SiteConfigState {
            loading: true,
            ..config_ready()
        };
        assert!(matches!(
            resolve_layout(&reloading, &content, "P", &binding),
            LayoutState::Ready(_)
        ));
    }

    #[test]
    fn unmapped_types_are_skipped_without_disturbing_others() {
        let content = content(vec![
            record("1", "a", "P", json!({ "_orden": 3 })),
            record("2", "desconocido", "P", json!({ "_orden": 1 })),
            record("3", "b", "P", json!({ "_orden": 2 })),
            record("4", "a", "P", json!({ "_orden": 4 })),
        ]);
        let binding = binding().bind("b", "renderer-b");
        assert_eq!(binding.unresolved(), vec!["b"]);

        let state = resolve_layout(&config_ready(), &content, "P", &binding);
        assert_eq!(ready_ids(state), vec!["1", "4"]);
    }

    #[test]
    fn only_unmapped_records_means_empty() {
        let content = content(vec![record("1", "desconocido", "P", json!({}))]);
        let layout = DynamicLayout::new("P", binding());
        assert!(matches!(layout.state(&config_ready(), &content), LayoutState::Empty));
        assert!(layout
            .render(&config_ready(), &content)
            .contains("No hay componentes configurados para la página &quot;P&quot;."));
    }

    #[test]
    fn default_props_spread_nested_config_as_overrides() {
        let r = record(
            "1",
            "a",
            "P",
            json!({ "title": "Raíces", "_configuracion": { "loading": true, "parallax": true } }),
        );
        let content = content(vec![r.clone()]);
        let ctx = PropContext {
            loading: false,
            error: Some("fallo parcial"),
            content: &content,
        };

        let props = default_props("renderer-a", &r, &ctx);
        assert!(!props.loading);
        assert_eq!(props.error.as_deref(), Some("fallo parcial"));
        assert_eq!(props.data["title"], json!("Raíces"));
        assert_eq!(props.field("loading"), Some(json!(true)));
        assert_eq!(props.field("error"), Some(json!("fallo parcial")));
        assert!(props.config().get_or("parallax", false));
        assert_eq!(props.field("inexistente"), None);
    }

    #[test]
    fn ready_layout_renders_keyed_sections_and_surfaces_errors() {
        let mut state = content(vec![
            record("2", "a", "P", json!({ "title": "segundo", "_orden": 2 })),
            record("1", "a", "P", json!({ "title": "primero", "_orden": 1 })),
        ]);
        state.error = Some("aviso".into());

        let seen_errors = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen_errors.clone();
        let layout = DynamicLayout::new("P", binding()).with_prop_builder(Arc::new(
            move |name: &str, record: &ContentRecord, ctx: &PropContext<'_>| {
                sink.lock().unwrap().push((name.to_string(), ctx.error.map(str::to_string)));
                default_props(name, record, ctx)
            },
        ));

        let html = layout.render(&config_ready(), &state);
        let first = html.find("a:primero").unwrap();
        let second = html.find("a:segundo").unwrap();
        assert!(first < second);
        assert!(html.contains(r#"data-cms-key="a-1""#));
        assert!(html.contains(r#"data-cms-key="a-2""#));
        assert_eq!(
            seen_errors.lock().unwrap()[0],
            ("renderer-a".to_string(), Some("aviso".to_string()))
        );
    }

    #[test]
    fn renderer_returning_nothing_is_skipped() {
        let binding = binding()
            .bind("vacio", "renderer-vacio")
            .register("renderer-vacio", Arc::new(Nothing));
        let content = content(vec![
            record("1", "vacio", "P", json!({})),
            record("2", "a", "P", json!({ "title": "visible" })),
        ]);
        let html = DynamicLayout::new("P", binding).render(&config_ready(), &content);
        assert!(html.contains("a:visible"));
        assert!(!html.contains("vacio-1"));
    }

    #[test]
    fn page_where_every_renderer_declines_shows_the_empty_placeholder() {
        let binding = binding()
            .bind("vacio", "renderer-vacio")
            .register("renderer-vacio", Arc::new(Nothing));
        let content = content(vec![
            record("1", "vacio", "P", json!({})),
            record("2", "vacio", "P", json!({})),
        ]);
        let layout = DynamicLayout::new("P", binding);
        assert!(matches!(layout.state(&config_ready(), &content), LayoutState::Ready(_)));

        let html = layout.render(&config_ready(), &content);
        assert!(html.contains("No hay componentes configurados"));
        assert!(html.contains("P"));

        let custom = layout.with_empty(Placeholder::Static("<b>vacío</b>".into()));
        assert_eq!(custom.render(&config_ready(), &content), "<b>vacío</b>");
    }

    #[test]
    fn placeholders_default_static_and_custom() {
        let layout = DynamicLayout::new("P", binding());
        let pending = ContentState::default();
        assert!(layout.render(&config_ready(), &pending).contains("Cargando componentes..."));

        let no_config = SiteConfigState {
            config: None,
            loading: true,
            error: None,
        };
        assert!(layout.render(&no_config, &pending).contains("Cargando configuración..."));

        let layout = layout
            .with_loading(Placeholder::Render(Arc::new(|kind: PlaceholderKind<'_>| format!("<i>{kind:?}</i>"))))
            .with_empty(Placeholder::Static("<b>vacío</b>".into()));
        assert_eq!(layout.render(&no_config, &pending), "<i>Config</i>");
        assert_eq!(layout.render(&config_ready(), &pending), "<i>Content</i>");
        assert_eq!(layout.render(&config_ready(), &content(vec![])), "<b>vacío</b>");
    }

    #[test]
    fn for_page_keeps_the_binding() {
        let layout = DynamicLayout::new("Inicio", binding());
        let winery = layout.for_page("Bodega");
        assert_eq!(winery.page(), "Bodega");
        let content = content(vec![record("1", "a", "Bodega", json!({}))]);
        assert!(matches!(winery.state(&config_ready(), &content), LayoutState::Ready(_)));
    }
}

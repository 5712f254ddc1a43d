use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use portable_infobox::{
    Config, Controller, DataService, InfoboxRecord, MemoryCache, MemoryPageProps, PlainParser,
    StaticFiles, controller, data_service, node::Params, parsing_helper,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};
use tokio::net::TcpListener;

/// The server configuration file.
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ServerConfig {
    /// The infobox rendering configuration.
    #[serde(flatten)]
    infobox: Config,
    /// The media files known to the server.
    files: StaticFiles,
}

/// The text a page was last rendered from, kept so that stale data can be
/// regenerated.
#[derive(Clone)]
struct PageSource {
    text: String,
    arguments: Params,
    template: bool,
}

struct InfoboxState {
    config: Config,
    files: StaticFiles,
    props: MemoryPageProps,
    cache: MemoryCache,
    pages: Mutex<HashMap<u64, PageSource>>,
}

type AppState = Arc<InfoboxState>;

impl InfoboxState {
    /// Renders every infobox in a page and returns the collected records.
    fn render_page(&self, source: &PageSource) -> Vec<InfoboxRecord> {
        let markups = if source.template {
            parsing_helper::transcluded_infoboxes(&source.text)
        } else {
            let text = parsing_helper::remove_nowiki_pre(&source.text);
            parsing_helper::get_infoboxes(&text)
                .into_iter()
                .map(str::to_string)
                .collect()
        };

        let mut controller = Controller::new(&PlainParser, &self.files, &self.config);
        for markup in markups {
            if let Err(err) = controller.render_markup(&markup, &source.arguments) {
                log::info!("Skipping infobox which failed to render: {err}");
            }
        }
        controller.into_output().infoboxes
    }

    /// Creates a data service for a page which can regenerate its data from
    /// the last submitted page text.
    fn data_service(&self, page_id: u64) -> DataService<'_> {
        DataService::new(page_id, &self.props, &self.cache, &self.config).with_reparser(
            move || {
                let source = self
                    .pages
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&page_id)
                    .cloned();
                source
                    .map(|source| self.render_page(&source))
                    .unwrap_or_default()
            },
        )
    }
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error(transparent)]
    Render(#[from] controller::Error),
    #[error(transparent)]
    Data(#[from] data_service::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::error!("{self}");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
struct InfoboxRequest {
    /// The content of the `<infobox>` tag.
    text: String,
    /// The tag attributes.
    params: Option<Params>,
    /// The template arguments.
    #[serde(default)]
    arguments: Params,
    #[serde(default)]
    template_view: bool,
}

#[derive(Serialize)]
struct InfoboxResponse {
    html: String,
}

async fn render_infobox(
    State(state): State<AppState>,
    Json(request): Json<InfoboxRequest>,
) -> Result<Json<InfoboxResponse>, ApiError> {
    let time = Instant::now();
    let mut controller = Controller::new(&PlainParser, &state.files, &state.config);
    let html = controller.render_infobox(
        &request.text,
        request.params.as_ref(),
        &request.arguments,
        request.template_view,
    )?;
    log::debug!("Rendered infobox in {:.2?}", time.elapsed());
    Ok(Json(InfoboxResponse { html }))
}

#[derive(Deserialize)]
struct PageRequest {
    /// The page wikitext.
    text: String,
    #[serde(default)]
    arguments: Params,
    /// Whether the page is a template, whose infoboxes are only the ones it
    /// shows when transcluded.
    #[serde(default)]
    template: bool,
}

async fn save_page(
    State(state): State<AppState>,
    Path(page_id): Path<u64>,
    Json(request): Json<PageRequest>,
) -> Result<Json<Vec<InfoboxRecord>>, ApiError> {
    let source = PageSource {
        text: request.text,
        arguments: request.arguments,
        template: request.template,
    };
    let records = state.render_page(&source);
    log::info!("Page {page_id} has {} infoboxes", records.len());

    state
        .pages
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(page_id, source);
    state.data_service(page_id).replace(records.clone())?;
    Ok(Json(records))
}

async fn get_page(
    State(state): State<AppState>,
    Path(page_id): Path<u64>,
) -> Result<Json<Vec<InfoboxRecord>>, ApiError> {
    let mut service = state.data_service(page_id);
    Ok(Json(service.get_data()?.to_vec()))
}

async fn get_page_images(
    State(state): State<AppState>,
    Path(page_id): Path<u64>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.data_service(page_id).images()?))
}

fn usage<T>(err: &'static str) -> anyhow::Result<T> {
    let exe = std::env::args().next().unwrap_or_default();
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("Usage: {exe} [options]\n");
    println!("Options:");
    println!("    --listen: Web server bind (default: 127.0.0.1:3000)");
    println!("    --config: JSON configuration file\n");
    println!("The log level is controlled by the RUST_LOG environment variable.");
    Err(anyhow::Error::msg(err))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = pico_args::Arguments::from_env();
    let listen = args
        .opt_value_from_str("--listen")?
        .unwrap_or_else(|| "127.0.0.1:3000".to_string());
    let config_path: Option<String> = args.opt_value_from_str("--config")?;

    if !args.finish().is_empty() {
        return usage("Unknown extra arguments passed");
    }

    let ServerConfig { infobox, files } = match config_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        None => ServerConfig::default(),
    };

    let state = Arc::new(InfoboxState {
        cache: MemoryCache::new(infobox.cache_memory),
        config: infobox,
        files,
        props: MemoryPageProps::default(),
        pages: Mutex::new(HashMap::new()),
    });

    let app = Router::new()
        .route("/api/infobox", post(render_infobox))
        .route("/api/page/{id}", get(get_page).post(save_page))
        .route("/api/page/{id}/images", get(get_page_images))
        .with_state(state);

    let listener = TcpListener::bind(&listen).await?;
    log::info!("Listening at {listen}");

    axum::serve(listener, app).await.map_err(Into::into)
}

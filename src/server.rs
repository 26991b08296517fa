use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::archive::{archive_file_name, write_archive};
use crate::batch::{generate_invoices, load_template};
use crate::configuration::ServerConfiguration;
use crate::error::ContextError;
use crate::spreadsheet::read_records;

const SPREADSHEET_FIELD: &str = "excel_file";
const TEMPLATE_FIELD: &str = "template_file";
/// Extensions the spreadsheet reader recognizes, the first one is assumed otherwise.
const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Both Excel and Template files are required")]
    MissingFiles,

    #[error("No file selected")]
    NoFileSelected,

    #[error("The uploaded file {0:?} is empty")]
    EmptyFile(String),

    #[error("The upload exceeds the limit of {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("{0}")]
    Processing(#[from] ContextError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFiles
            | Self::NoFileSelected
            | Self::EmptyFile(_)
            | Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Processing(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Failed to generate the invoices: {}", self);
        } else {
            log::warn!("Rejected the upload: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared state of the handlers, the configuration is passed explicitly to every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub configuration: Arc<ServerConfiguration>,
}

impl AppState {
    pub fn new(configuration: ServerConfiguration) -> Self {
        AppState {
            configuration: Arc::new(configuration),
        }
    }
}

/// A directory private to one request. It is removed with everything inside it
/// when dropped, on every exit path, and failures to remove it are ignored.
#[derive(Debug)]
pub struct StagingArea {
    directory: TempDir,
}

impl StagingArea {
    /// Creates the directory under `root`, or under the system temporary directory.
    pub fn new(root: Option<&Path>) -> Result<Self, ContextError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("invoicr-");
        let directory = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|error| {
                    ContextError::with_error(
                        format!("Failed to create the staging root {:?}", root),
                        &error,
                    )
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|error| {
            ContextError::with_error("Failed to create the staging directory", &error)
        })?;

        Ok(StagingArea { directory })
    }

    pub fn path(&self) -> &Path {
        self.directory.path()
    }

    /// Writes the bytes to a file of the given name inside the staging directory.
    pub fn stage(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf, ContextError> {
        let path = self.path().join(file_name);
        std::fs::write(&path, contents).map_err(|error| {
            ContextError::with_error(format!("Failed to stage the file {:?}", file_name), &error)
        })?;
        Ok(path)
    }
}

/// A file part of the multipart request.
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub contents: Bytes,
}

impl Upload {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.file_name.is_empty() {
            return Err(ServiceError::NoFileSelected);
        }
        if self.contents.is_empty() {
            return Err(ServiceError::EmptyFile(self.file_name.clone()));
        }
        Ok(())
    }

    /// The extension the staged spreadsheet is given so that its format can be detected.
    fn spreadsheet_extension(&self) -> &'static str {
        let extension = Path::new(&self.file_name)
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase());
        SPREADSHEET_EXTENSIONS
            .into_iter()
            .find(|known| extension.as_deref() == Some(*known))
            .unwrap_or(SPREADSHEET_EXTENSIONS[0])
    }
}

/// The generated archive, ready to be sent.
#[derive(Debug)]
pub struct InvoiceArchive {
    pub file_name: String,
    pub contents: Vec<u8>,
}

pub fn router(state: AppState) -> Router {
    let maximum_upload_bytes = state.configuration.maximum_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .layer(DefaultBodyLimit::max(maximum_upload_bytes))
        .with_state(state)
}

/// Binds the configured address and serves requests until the process is stopped.
pub async fn serve(configuration: ServerConfiguration) -> Result<(), ContextError> {
    let address = configuration.address.clone();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|error| {
            ContextError::with_error(format!("Failed to bind the address {}", address), &error)
        })?;
    log::info!("Listening on http://{}", address);

    axum::serve(listener, router(AppState::new(configuration)))
        .await
        .map_err(|error| ContextError::with_error("The server stopped unexpectedly", &error))
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn generate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServiceError> {
    let multipart = multipart.map_err(|rejection| {
        log::debug!("The request is not a multipart upload: {}", rejection);
        ServiceError::MissingFiles
    })?;
    let (spreadsheet, template) =
        collect_uploads(multipart, state.configuration.maximum_upload_bytes).await?;
    let (Some(spreadsheet), Some(template)) = (spreadsheet, template) else {
        return Err(ServiceError::MissingFiles);
    };
    spreadsheet.validate()?;
    template.validate()?;
    log::info!(
        "Generating the invoices of {:?} onto {:?}",
        spreadsheet.file_name,
        template.file_name
    );

    let configuration = Arc::clone(&state.configuration);
    let now = chrono::Local::now().naive_local();
    let archive = tokio::task::spawn_blocking(move || {
        process_upload(&configuration, &spreadsheet, &template, now)
    })
    .await
    .map_err(|error| ServiceError::Internal(error.to_string()))??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", archive.file_name),
            ),
        ],
        archive.contents,
    )
        .into_response())
}

/// Reads the two file parts of the request. Parts sent without a file name are
/// plain form fields and are not considered uploads.
async fn collect_uploads(
    mut multipart: Multipart,
    maximum_upload_bytes: usize,
) -> Result<(Option<Upload>, Option<Upload>), ServiceError> {
    let multipart_error = |error: axum::extract::multipart::MultipartError| {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServiceError::PayloadTooLarge(maximum_upload_bytes)
        } else {
            ServiceError::InvalidUpload(error.body_text())
        }
    };

    let (mut spreadsheet, mut template) = (None, None);
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let slot = match field.name() {
            Some(SPREADSHEET_FIELD) => &mut spreadsheet,
            Some(TEMPLATE_FIELD) => &mut template,
            _ => continue,
        };
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let contents = field.bytes().await.map_err(multipart_error)?;
        *slot = Some(Upload {
            file_name,
            contents,
        });
    }

    Ok((spreadsheet, template))
}

/// Stages the uploads, generates one invoice per spreadsheet row and packs them
/// into an archive. The staging directory is gone once this returns.
pub fn process_upload(
    configuration: &ServerConfiguration,
    spreadsheet: &Upload,
    template: &Upload,
    now: chrono::NaiveDateTime,
) -> Result<InvoiceArchive, ContextError> {
    let staging_area = StagingArea::new(configuration.staging_directory.as_deref())?;
    let spreadsheet_path = staging_area.stage(
        &format!("spreadsheet.{}", spreadsheet.spreadsheet_extension()),
        &spreadsheet.contents,
    )?;
    let template_path = staging_area.stage("template.pdf", &template.contents)?;

    let records = read_records(&spreadsheet_path)?;
    let template_document = load_template(&template_path)?;
    let generated_invoices = generate_invoices(
        &records,
        &template_document,
        &staging_area.path().join("invoices"),
        |_| {},
    )?;

    let file_name = archive_file_name(now);
    let archive_path = staging_area.path().join(&file_name);
    let files: Vec<PathBuf> = generated_invoices
        .into_iter()
        .map(|invoice| invoice.path)
        .collect();
    write_archive(&files, &archive_path)?;
    let contents = std::fs::read(&archive_path).map_err(|error| {
        ContextError::with_error("Failed to read the generated archive", &error)
    })?;
    log::info!("Generated {} invoices into {}", files.len(), file_name);

    Ok(InvoiceArchive {
        file_name,
        contents,
    })
}

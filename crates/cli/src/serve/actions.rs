//! Document actions available to signed-in users.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use camel_eval::{DocumentContext, GatewayError, WorkspaceOrVersion};
use serde::{Deserialize, Serialize};

use super::json_error;
use super::session::CurrentIdentity;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct ElementPath {
    did: String,
    wv: String,
    wvid: String,
    eid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FilePath {
    did: String,
    wv: String,
    wvid: String,
    eid: String,
    #[serde(rename = "fileName")]
    file_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ActionParams {
    configuration: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoredFile {
    name: String,
    contents: String,
}

#[derive(Debug, Serialize)]
struct FilesResponse {
    files: Vec<StoredFile>,
}

/// Platform document, workspace, version and element ids are alphanumeric.
fn is_platform_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

impl ElementPath {
    fn context(
        self,
        identity: CurrentIdentity,
        params: &ActionParams,
    ) -> Result<DocumentContext, Response> {
        let kind = self.wv.parse::<WorkspaceOrVersion>().map_err(|_| {
            json_error(StatusCode::NOT_FOUND, "unknown workspace or version segment")
                .into_response()
        })?;
        let ids = [&self.did, &self.wvid, &self.eid];
        if !ids.iter().all(|id| is_platform_id(id)) {
            return Err(json_error(StatusCode::NOT_FOUND, "malformed document id").into_response());
        }
        Ok(
            DocumentContext::new(self.did, kind, self.wvid, self.eid, identity.0)
                .with_configuration(params.configuration.as_deref()),
        )
    }
}

impl FilePath {
    fn split(self) -> (ElementPath, String) {
        let element = ElementPath {
            did: self.did,
            wv: self.wv,
            wvid: self.wvid,
            eid: self.eid,
        };
        (element, self.file_name)
    }
}

/// HTTP status for a resolver failure.
pub(crate) fn error_status(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
        GatewayError::Schema(_) | GatewayError::Transport { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// GET /action/d/{did}/{wv}/{wvid}/e/{eid}/panel
pub(crate) async fn handle_panel(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(path): Path<ElementPath>,
    Query(params): Query<ActionParams>,
) -> Response {
    let context = match path.context(identity, &params) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state.resolver.list_file_names(&context).await {
        Ok(names) => Html(render_panel(&names, context.configuration())).into_response(),
        Err(e) => {
            tracing::warn!(document = %context.document_id, error = %e, "could not list files");
            (error_status(&e), Html(render_panel_error(&e))).into_response()
        }
    }
}

/// GET /action/d/{did}/{wv}/{wvid}/e/{eid}/f/{fileName}/download
pub(crate) async fn handle_download(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(path): Path<FilePath>,
    Query(params): Query<ActionParams>,
) -> Response {
    let (element, file_name) = path.split();
    let context = match element.context(identity, &params) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state.resolver.get_file_contents(&context, &file_name).await {
        Ok(contents) => (
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (CONTENT_DISPOSITION, attachment_disposition(&file_name)),
            ],
            contents,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(
                document = %context.document_id,
                file = %file_name,
                error = %e,
                "download failed"
            );
            json_error(error_status(&e), &e.to_string()).into_response()
        }
    }
}

/// GET /action/d/{did}/{wv}/{wvid}/e/{eid}/files
pub(crate) async fn handle_files(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(path): Path<ElementPath>,
    Query(params): Query<ActionParams>,
) -> Response {
    let context = match path.context(identity, &params) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state.resolver.get_all_file_contents(&context).await {
        Ok(files) => {
            let files = files
                .into_iter()
                .map(|(name, contents)| StoredFile { name, contents })
                .collect();
            Json(FilesResponse { files }).into_response()
        }
        Err(e) => {
            tracing::warn!(document = %context.document_id, error = %e, "could not read files");
            json_error(error_status(&e), &e.to_string()).into_response()
        }
    }
}

// ──────────────────────────────────────────────
// Rendering
// ──────────────────────────────────────────────

fn attachment_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_panel(names: &[String], configuration: Option<&str>) -> String {
    let query = configuration
        .map(|c| format!("?configuration={}", urlencoding::encode(c)))
        .unwrap_or_default();

    let mut body = String::new();
    if names.is_empty() {
        body.push_str("<p>No files are stored in this element.</p>\n");
    } else {
        body.push_str("<ul>\n");
        for name in names {
            // Relative to .../e/{eid}/panel
            let href = format!("f/{}/download{query}", urlencoding::encode(name));
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                escape_html(&href),
                escape_html(name)
            ));
        }
        body.push_str("</ul>\n");
    }
    page("Files", &body)
}

fn render_panel_error(error: &GatewayError) -> String {
    let hint = match error {
        GatewayError::Auth(_) => {
            "<p><a href=\"/oauth/signin\" target=\"_blank\">Sign in again</a></p>\n"
        }
        _ => "",
    };
    page(
        "Files",
        &format!(
            "<p class=\"error\">{}</p>\n{hint}",
            escape_html(&error.to_string())
        ),
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n"
    )
}

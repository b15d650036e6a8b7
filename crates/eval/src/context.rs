//! Coordinates of the document state a script runs against.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use camel_session::Identity;

/// Placeholder the platform substitutes when an element has no configuration.
pub const NO_CONFIGURATION_SENTINEL: &str = "{$configuration}";

/// Whether the document is addressed at a workspace or an immutable version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceOrVersion {
    Workspace,
    Version,
}

impl WorkspaceOrVersion {
    /// Path segment used by the platform API.
    pub fn as_segment(self) -> &'static str {
        match self {
            WorkspaceOrVersion::Workspace => "w",
            WorkspaceOrVersion::Version => "v",
        }
    }
}

impl fmt::Display for WorkspaceOrVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported workspace-or-version kind '{0}' (expected 'w' or 'v')")]
pub struct ParseKindError(pub String);

impl FromStr for WorkspaceOrVersion {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "w" | "workspace" => Ok(WorkspaceOrVersion::Workspace),
            "v" | "version" => Ok(WorkspaceOrVersion::Version),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

/// One document/workspace-or-version/element combination plus the identity
/// whose tokens authorize calls against it.
///
/// Immutable for the duration of one request.
#[derive(Clone)]
pub struct DocumentContext {
    pub document_id: String,
    pub kind: WorkspaceOrVersion,
    pub workspace_or_version_id: String,
    pub element_id: String,
    configuration: Option<String>,
    pub identity: Arc<Identity>,
}

impl DocumentContext {
    pub fn new(
        document_id: impl Into<String>,
        kind: WorkspaceOrVersion,
        workspace_or_version_id: impl Into<String>,
        element_id: impl Into<String>,
        identity: Arc<Identity>,
    ) -> Self {
        DocumentContext {
            document_id: document_id.into(),
            kind,
            workspace_or_version_id: workspace_or_version_id.into(),
            element_id: element_id.into(),
            configuration: None,
            identity,
        }
    }

    /// Attach a serialized configuration. The platform's "no configuration"
    /// placeholder and the empty string both mean none.
    pub fn with_configuration(mut self, configuration: Option<&str>) -> Self {
        self.configuration = normalize_configuration(configuration);
        self
    }

    pub fn configuration(&self) -> Option<&str> {
        self.configuration.as_deref()
    }

    /// Path of the FeatureScript evaluation endpoint for this element.
    ///
    /// Identifiers are percent-encoded so each stays a single path segment.
    pub fn featurescript_path(&self) -> String {
        format!(
            "/v5/partstudios/d/{}/{}/{}/e/{}/featurescript",
            urlencoding::encode(&self.document_id),
            self.kind,
            urlencoding::encode(&self.workspace_or_version_id),
            urlencoding::encode(&self.element_id)
        )
    }

    /// Query parameters for the evaluation endpoint.
    pub fn query(&self) -> Vec<(String, String)> {
        self.configuration
            .iter()
            .map(|c| ("configuration".to_string(), c.clone()))
            .collect()
    }
}

impl fmt::Debug for DocumentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentContext")
            .field("document_id", &self.document_id)
            .field("kind", &self.kind)
            .field("workspace_or_version_id", &self.workspace_or_version_id)
            .field("element_id", &self.element_id)
            .field("configuration", &self.configuration)
            .field("user", &self.identity.profile().id)
            .finish()
    }
}

fn normalize_configuration(configuration: Option<&str>) -> Option<String> {
    match configuration.map(str::trim) {
        None | Some("") | Some(NO_CONFIGURATION_SENTINEL) => None,
        Some(c) => Some(c.to_string()),
    }
}

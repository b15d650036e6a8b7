//! File resolution across the two storage-schema generations.
//!
//! The CAM feature stores generated files as variables in the Part Studio:
//! - current schema: a `camelState` map whose `files` entry maps file name
//!   to contents
//! - legacy schema: a `camelFileIndex` map from file name to the name of
//!   another variable holding the contents
//!
//! Every operation tries the schemas in [`SCHEMA_ORDER`] and treats a
//! document with neither as having no files. Legacy documents may cost a
//! second round trip to dereference variables.

use crate::client::Evaluator;
use crate::context::DocumentContext;
use crate::error::{EvalError, GatewayError};
use crate::script::{build_script, fallback_body, map_literal, string_literal};
use crate::value::TypedValue;

/// Variable holding the current-schema state map.
pub const CURRENT_STATE_VARIABLE: &str = "camelState";

/// Variable holding the legacy name-to-variable index.
pub const LEGACY_INDEX_VARIABLE: &str = "camelFileIndex";

/// Resolution order: newest generation first.
pub const SCHEMA_ORDER: [Schema; 2] = [Schema::Current, Schema::Legacy];

const SCHEMA_KEY: &str = "schema";

/// A file-storage schema generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Current,
    Legacy,
}

impl Schema {
    pub fn name(self) -> &'static str {
        match self {
            Schema::Current => "current",
            Schema::Legacy => "legacy",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        SCHEMA_ORDER.into_iter().find(|s| s.name() == name)
    }

    /// Expression for this schema's name-keyed map. Throws when absent.
    fn map_expression(self) -> String {
        match self {
            Schema::Current => format!(
                "getVariable(context, {})[\"files\"]",
                string_literal(CURRENT_STATE_VARIABLE)
            ),
            Schema::Legacy => format!(
                "getVariable(context, {})",
                string_literal(LEGACY_INDEX_VARIABLE)
            ),
        }
    }

    /// Returns the file names stored under this schema.
    fn list_fragment(self) -> String {
        format!("return keys({});", self.map_expression())
    }

    /// Returns `{schema, content}` (current) or `{schema, variable}` (legacy)
    /// when `name_literal` is present under this schema.
    fn lookup_fragment(self, name_literal: &str) -> String {
        let field = match self {
            Schema::Current => "content",
            Schema::Legacy => "variable",
        };
        let answer = map_literal(&[
            (quoted(SCHEMA_KEY), quoted(self.name())),
            (quoted(field), "found".to_string()),
        ]);
        format!(
            "var found = {}[{}]; if (found is string) {{ return {}; }}",
            self.map_expression(),
            name_literal,
            answer
        )
    }

    /// Returns `{schema, files}` (current) or `{schema, index}` (legacy).
    fn all_files_fragment(self) -> String {
        let field = match self {
            Schema::Current => "files",
            Schema::Legacy => "index",
        };
        let answer = map_literal(&[
            (quoted(SCHEMA_KEY), quoted(self.name())),
            (quoted(field), "stored".to_string()),
        ]);
        format!(
            "var stored = {}; if (stored is map) {{ return {}; }}",
            self.map_expression(),
            answer
        )
    }
}

fn quoted(s: &str) -> String {
    format!("\"{s}\"")
}

// ──────────────────────────────────────────────
// Scripts
// ──────────────────────────────────────────────

/// Lists file names: current keys, then legacy keys, then `[]`.
pub fn list_file_names_script() -> String {
    let attempts: Vec<String> = SCHEMA_ORDER.iter().map(|s| s.list_fragment()).collect();
    build_script(&fallback_body(&attempts, "return [];"))
}

/// Locates one file; throws (null result) when no schema has it.
pub fn lookup_script(file_name: &str) -> String {
    let name = string_literal(file_name);
    let attempts: Vec<String> = SCHEMA_ORDER
        .iter()
        .map(|s| s.lookup_fragment(&name))
        .collect();
    build_script(&fallback_body(&attempts, "throw \"File not found\";"))
}

/// Returns whichever schema's map is present, or `{schema: "none"}`.
pub fn all_files_script() -> String {
    let attempts: Vec<String> = SCHEMA_ORDER
        .iter()
        .map(|s| s.all_files_fragment())
        .collect();
    let none = map_literal(&[(quoted(SCHEMA_KEY), quoted("none"))]);
    build_script(&fallback_body(&attempts, &format!("return {none};")))
}

/// Reads one legacy content variable.
pub fn dereference_script(variable: &str) -> String {
    build_script(&format!(
        "return getVariable(context, {});",
        string_literal(variable)
    ))
}

/// Reads every legacy content variable into one name-to-contents map.
/// Throws (null result) when any indexed variable is missing.
pub fn dereference_all_script(index: &[(String, String)]) -> String {
    let mut body = String::from("var files = {}; ");
    for (name, variable) in index {
        body.push_str(&format!(
            "files[{}] = getVariable(context, {}); ",
            string_literal(name),
            string_literal(variable)
        ));
    }
    body.push_str("return files;");
    build_script(&body)
}

/// Legacy variable names are FeatureScript identifiers.
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ──────────────────────────────────────────────
// FileResolver
// ──────────────────────────────────────────────

/// Reads files stored in a document through an [`Evaluator`].
///
/// Every failure leaves this type as a [`GatewayError`].
pub struct FileResolver<E> {
    evaluator: E,
}

impl<E: Evaluator> FileResolver<E> {
    pub fn new(evaluator: E) -> Self {
        FileResolver { evaluator }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Names of all stored files, in the order the document reports them.
    pub async fn list_file_names(
        &self,
        context: &DocumentContext,
    ) -> Result<Vec<String>, GatewayError> {
        let value = self.run(context, &list_file_names_script()).await?;
        let items = value
            .as_ref()
            .and_then(TypedValue::as_array)
            .ok_or_else(|| schema_error("file listing is not an array", value.as_ref()))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| schema_error("file name is not a string", Some(item)))
            })
            .collect()
    }

    /// Contents of one file.
    pub async fn get_file_contents(
        &self,
        context: &DocumentContext,
        file_name: &str,
    ) -> Result<String, GatewayError> {
        let not_found = || GatewayError::NotFound(file_name.to_string());

        let answer = self
            .run(context, &lookup_script(file_name))
            .await?
            .ok_or_else(not_found)?;
        let Ok(schema) = answer_schema(&answer) else {
            tracing::debug!(
                file = file_name,
                tag = %answer.tag(),
                "lookup answer names no known schema"
            );
            return Err(not_found());
        };

        let content = match schema {
            Schema::Current => answer.map_get("content").cloned(),
            Schema::Legacy => {
                let variable = answer
                    .map_get("variable")
                    .and_then(TypedValue::as_str)
                    .ok_or_else(not_found)?;
                check_variable_name(variable)?;
                tracing::debug!(file = file_name, variable, "dereferencing legacy file variable");
                self.run(context, &dereference_script(variable)).await?
            }
        };

        match content {
            Some(TypedValue::String(text)) => Ok(text),
            _ => Err(not_found()),
        }
    }

    /// Every stored file as `(name, contents)`, sorted by name.
    pub async fn get_all_file_contents(
        &self,
        context: &DocumentContext,
    ) -> Result<Vec<(String, String)>, GatewayError> {
        let answer = self
            .run(context, &all_files_script())
            .await?
            .ok_or_else(|| schema_error("file index lookup returned nothing", None))?;

        let schema_name = answer
            .map_get(SCHEMA_KEY)
            .and_then(TypedValue::as_str)
            .ok_or_else(|| schema_error("file index answer without schema", Some(&answer)))?;
        if schema_name == "none" {
            return Ok(Vec::new());
        }

        let mut files = match answer_schema(&answer)? {
            Schema::Current => {
                let stored = answer
                    .map_get("files")
                    .ok_or_else(|| schema_error("current schema without files", Some(&answer)))?;
                string_pairs(stored)?
            }
            Schema::Legacy => {
                let stored = answer
                    .map_get("index")
                    .ok_or_else(|| schema_error("legacy schema without index", Some(&answer)))?;
                let index = string_pairs(stored)?;
                self.dereference_all(context, &index).await?
            }
        };
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    async fn dereference_all(
        &self,
        context: &DocumentContext,
        index: &[(String, String)],
    ) -> Result<Vec<(String, String)>, GatewayError> {
        if index.is_empty() {
            return Ok(Vec::new());
        }
        for (_, variable) in index {
            check_variable_name(variable)?;
        }
        tracing::debug!(files = index.len(), "dereferencing legacy file index");

        let value = self
            .run(context, &dereference_all_script(index))
            .await?
            .ok_or_else(|| schema_error("legacy dereference returned nothing", None))?;
        string_pairs(&value)
    }

    async fn run(
        &self,
        context: &DocumentContext,
        script: &str,
    ) -> Result<Option<TypedValue>, GatewayError> {
        self.evaluator
            .evaluate(context, script)
            .await
            .map_err(|e: EvalError| {
                tracing::warn!(
                    document = %context.document_id,
                    error = %e,
                    "featurescript evaluation failed"
                );
                GatewayError::from(e)
            })
    }
}

fn answer_schema(answer: &TypedValue) -> Result<Schema, GatewayError> {
    answer
        .map_get(SCHEMA_KEY)
        .and_then(TypedValue::as_str)
        .and_then(Schema::from_name)
        .ok_or_else(|| schema_error("unrecognized schema in response", Some(answer)))
}

fn check_variable_name(variable: &str) -> Result<(), GatewayError> {
    if is_valid_variable_name(variable) {
        Ok(())
    } else {
        Err(GatewayError::Schema(format!(
            "malformed file index entry '{variable}'"
        )))
    }
}

/// A map whose keys and values are all strings.
fn string_pairs(value: &TypedValue) -> Result<Vec<(String, String)>, GatewayError> {
    let entries = value
        .as_map()
        .ok_or_else(|| schema_error("expected a map of files", Some(value)))?;
    entries
        .iter()
        .map(|(k, v)| match (k.as_str(), v.as_str()) {
            (Some(k), Some(v)) => Ok((k.to_string(), v.to_string())),
            _ => Err(schema_error("file map entry is not string to string", Some(value))),
        })
        .collect()
}

fn schema_error(what: &str, value: Option<&TypedValue>) -> GatewayError {
    match value {
        Some(v) => GatewayError::Schema(format!("{what} (got {})", v.tag())),
        None => GatewayError::Schema(what.to_string()),
    }
}

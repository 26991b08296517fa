use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// Maximum size of an upload accepted by the HTTP service (16 MiB).
pub const DEFAULT_MAXIMUM_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Everything the batch and service modes need to know, passed explicitly to each
/// run or request instead of living in process-wide state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Spreadsheet read by the `generate` command.
    pub spreadsheet_path: PathBuf,
    /// Template document read by the `generate` command.
    pub template_path: PathBuf,
    /// Directory where the `generate` command writes the invoices.
    pub output_directory: PathBuf,
    pub server: ServerConfiguration,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfiguration {
    /// Socket address the service binds to.
    pub address: String,
    pub maximum_upload_bytes: usize,
    /// Root under which per-request staging directories are created,
    /// the system temporary directory when absent.
    pub staging_directory: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            spreadsheet_path: PathBuf::from("invoices.xlsx"),
            template_path: PathBuf::from("template.pdf"),
            output_directory: PathBuf::from("invoices"),
            server: ServerConfiguration::default(),
        }
    }
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        ServerConfiguration {
            address: "127.0.0.1:5001".into(),
            maximum_upload_bytes: DEFAULT_MAXIMUM_UPLOAD_BYTES,
            staging_directory: None,
        }
    }
}

impl Configuration {
    /// Loads the configuration from a JSON file, every missing field keeps its default.
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to read the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;
        let configuration: Configuration = serde_json::from_str(&configuration_file_contents)
            .map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to parse the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;

        Ok(configuration)
    }
}

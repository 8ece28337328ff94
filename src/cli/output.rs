//! Output formatting for the inspection commands
//!
//! Each report renders either as pretty JSON (machine-readable) or as a short
//! human-readable block.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::compose::{Endpoint, RewritePlan};
use crate::detection::ProjectStrategy;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// Human-readable formatted text
    Human,
}

/// What `detect` found
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub path: PathBuf,
    pub strategy: ProjectStrategy,
    pub marker: Option<PathBuf>,
    /// Command line the dev server would be started with, when known up front
    pub launch: Option<String>,
    pub notes: Vec<String>,
}

#[derive(Serialize)]
struct PlanView<'a> {
    manifest: &'a PathBuf,
    override_file: &'a PathBuf,
    manifest_backup: &'a Option<PathBuf>,
    host_mode_services: &'a [String],
    database_service: &'a str,
    cache_service: &'a str,
    patched_env_files: &'a [PathBuf],
    overrides: &'a crate::compose::OverrideDocument,
}

#[derive(Serialize)]
struct EndpointView<'a> {
    service: &'a str,
    host: &'a str,
    port: u16,
    address: String,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_detection(&self, report: &DetectionReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(report).context("Failed to serialize detection report to JSON")
            }
            OutputFormat::Human => {
                let mut out = String::new();
                writeln!(out, "Repository: {}", report.path.display())?;
                writeln!(out, "Strategy:   {}", report.strategy)?;
                if let Some(marker) = &report.marker {
                    writeln!(out, "Marker:     {}", marker.display())?;
                }
                if let Some(launch) = &report.launch {
                    writeln!(out, "Launch:     {}", launch)?;
                }
                for note in &report.notes {
                    writeln!(out, "  - {}", note)?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_plan(&self, plan: &RewritePlan) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let view = PlanView {
                    manifest: &plan.manifest_path,
                    override_file: &plan.override_path,
                    manifest_backup: &plan.manifest_backup,
                    host_mode_services: &plan.host_mode_services,
                    database_service: &plan.roles.database,
                    cache_service: &plan.roles.cache,
                    patched_env_files: &plan.patched_env_files,
                    overrides: &plan.override_doc,
                };
                serde_json::to_string_pretty(&view).context("Failed to serialize rewrite plan to JSON")
            }
            OutputFormat::Human => {
                let mut out = String::new();
                writeln!(out, "Manifest:  {}", plan.manifest_path.display())?;
                writeln!(out, "Override:  {}", plan.override_path.display())?;
                writeln!(
                    out,
                    "Roles:     database={} cache={}",
                    plan.roles.database, plan.roles.cache
                )?;
                if plan.override_doc.is_empty() {
                    writeln!(out, "Patched services: none")?;
                } else {
                    let names: Vec<&str> = plan.override_doc.services.keys().map(String::as_str).collect();
                    writeln!(out, "Patched services: {}", names.join(", "))?;
                }
                if !plan.host_mode_services.is_empty() {
                    writeln!(
                        out,
                        "Host networking removed: {}",
                        plan.host_mode_services.join(", ")
                    )?;
                }
                if let Some(backup) = &plan.manifest_backup {
                    writeln!(out, "Manifest backup: {}", backup.display())?;
                }
                for env_file in &plan.patched_env_files {
                    writeln!(out, "Patched env file: {}", env_file.display())?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_endpoint(&self, endpoint: &Endpoint) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let view = EndpointView {
                    service: &endpoint.service,
                    host: &endpoint.host,
                    port: endpoint.port,
                    address: endpoint.to_string(),
                };
                serde_json::to_string_pretty(&view).context("Failed to serialize endpoint to JSON")
            }
            OutputFormat::Human => Ok(format!("Web UI: {} (service {})\n", endpoint, endpoint.service)),
        }
    }
}

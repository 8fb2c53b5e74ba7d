// Request pipeline: body bytes -> ChartRequest -> PlotInstruction -> image -> data URL

use crate::data;
use crate::error::{ChartError, Result};
use crate::fallback::FallbackProvider;
use crate::graph;
use crate::ir::PlotInstruction;
use crate::request::ChartRequest;
use crate::{OutputFormat, RenderOptions};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use tracing::{debug, info};

/// Parse and validate a request body.
pub fn parse_request(body: &[u8]) -> Result<ChartRequest> {
    ChartRequest::from_json_slice(body)
}

/// Load the request's table and resolve it into a plot instruction.
///
/// An unusable `tableData` is not an error: the resolver is handed no table
/// and draws from `fallback`.
pub fn build_instruction(request: &ChartRequest, fallback: &FallbackProvider) -> Result<PlotInstruction> {
    let table = request.table_data.as_ref().and_then(data::load);
    match &table {
        Some(t) => debug!(
            "Loaded table with {} rows and columns {:?}",
            t.row_count(),
            t.column_names()
        ),
        None => info!(
            "No usable table data for {} chart, using placeholder data",
            request.kind
        ),
    }
    crate::resolve::resolve(request, table.as_ref(), fallback)
}

/// Resolve and render a request to image bytes.
pub fn render_chart(request: &ChartRequest, options: &RenderOptions) -> Result<Vec<u8>> {
    let fallback = FallbackProvider::random();
    let instruction = build_instruction(request, &fallback)?;
    render_instruction(&instruction, options)
}

pub fn render_instruction(instruction: &PlotInstruction, options: &RenderOptions) -> Result<Vec<u8>> {
    graph::render(instruction, options).map_err(|e| ChartError::RenderingFailure(format!("{:#}", e)))
}

/// `data:` URL for the encoded image.
pub fn encode_data_url(bytes: &[u8], format: OutputFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
}

/// Row records with every cell kept as a string, shaped like `tableData`.
pub fn rows_to_table_data(headers: &[String], rows: &[Vec<String>]) -> Value {
    let records = rows
        .iter()
        .map(|row| {
            let record = headers
                .iter()
                .zip(row)
                .map(|(h, v)| (h.clone(), Value::String(v.clone())))
                .collect::<serde_json::Map<_, _>>();
            Value::Object(record)
        })
        .collect();
    Value::Array(records)
}

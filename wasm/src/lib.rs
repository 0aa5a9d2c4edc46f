use serde::Deserialize;
use subflow_layout::{LayoutConfig, parse_config};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOptions {
    pretty: Option<bool>,
}

fn build_config(config_json: Option<&str>) -> Result<LayoutConfig, String> {
    match config_json {
        Some(raw) if !raw.trim().is_empty() => parse_config(raw).map_err(|error| error.to_string()),
        _ => Ok(LayoutConfig::default()),
    }
}

// Options share the config document, so they accept the same JSON5 syntax.
fn build_options(config_json: Option<&str>) -> Result<LayoutOptions, String> {
    match config_json {
        Some(raw) if !raw.trim().is_empty() => {
            json5::from_str(raw).map_err(|error| error.to_string())
        }
        _ => Ok(LayoutOptions::default()),
    }
}

fn layout(run_json: &str, config_json: Option<&str>) -> Result<String, String> {
    let config = build_config(config_json)?;
    let options = build_options(config_json)?;
    subflow_layout::layout_run_json(run_json, &config, options.pretty.unwrap_or(false))
        .map_err(|error| error.to_string())
}

/// Lays out a run record (JSON) and returns the layout result as JSON.
/// `config_json` holds optional `LayoutConfig` overrides.
#[wasm_bindgen]
pub fn layout_run_json(run_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
    layout(run_json, config_json.as_deref()).map_err(|error| JsValue::from_str(&error))
}

//! WASM bindings for the Liquid toolchain.
//!
//! Exposes `parse()`, `validate()` and `print()` to JavaScript via
//! wasm-bindgen. Results are returned as plain JS objects.

use liquid_analyzer::{CustomDefinitions, ValidationResult, Validator};
use liquid_parser::ParseResult;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Parse Liquid source.
///
/// Returns `{ ast: Node[], errors: { message, loc }[] }`. Never throws on
/// malformed templates; errors are reported alongside the partial AST.
#[wasm_bindgen]
pub fn parse(source: &str) -> Result<JsValue, JsError> {
    to_js(&native_parse(source))
}

/// Validate Liquid source.
///
/// `custom_tags` and `custom_filters` are arrays of names accepted in
/// addition to the standard Shopify tables. Non-string entries are ignored.
/// Returns `{ valid, errors, warnings }`.
#[wasm_bindgen]
pub fn validate(
    source: &str,
    custom_tags: &js_sys::Array,
    custom_filters: &js_sys::Array,
) -> Result<JsValue, JsError> {
    let custom = CustomDefinitions {
        tags: strings(custom_tags),
        filters: strings(custom_filters),
        ..CustomDefinitions::default()
    };
    to_js(&native_validate(source, &custom))
}

/// Parse and print back to normalized Liquid source.
#[wasm_bindgen]
pub fn print(source: &str) -> String {
    liquid_parser::ast_to_string(&native_parse(source).ast)
}

/// Get the toolchain version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn native_parse(source: &str) -> ParseResult {
    liquid_parser::parse(source)
}

fn native_validate(source: &str, custom: &CustomDefinitions) -> ValidationResult {
    Validator::new().validate_with(source, custom)
}

fn strings(array: &js_sys::Array) -> Vec<String> {
    array.iter().filter_map(|v| v.as_string()).collect()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsError::new(&e.to_string()))
}

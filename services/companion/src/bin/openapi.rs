//! services/companion/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the companion's REST API to a file
//! (default `openapi.json`, or the first argument).

use companion_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("OpenAPI specification generated at {}", path);
    Ok(())
}

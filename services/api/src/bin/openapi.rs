//! services/api/src/bin/openapi.rs
//!
//! Exports the OpenAPI 3.0 document for the REST API. With no arguments the
//! JSON goes to stdout; an optional path argument writes it to a file instead.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let json = ApiDoc::openapi().to_pretty_json()?;

    match std::env::args().nth(1) {
        Some(path) => {
            std::fs::write(&path, json)?;
            eprintln!("OpenAPI document written to {}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}

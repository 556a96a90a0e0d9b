//! Prints the VisaGuide OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p visaguide-api --bin generate-openapi > openapi.json

use visaguide_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}

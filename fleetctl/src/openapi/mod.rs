//! OpenAPI documentation for the management API, served at `/admin/openapi.json` and rendered
//! at `/admin/docs`.

mod admin;

pub use admin::AdminApiDoc;

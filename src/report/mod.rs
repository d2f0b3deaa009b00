//! Report rendering.

mod generator;

pub use generator::{
    default_recommendations, generate_json_report, generate_markdown_report, write_report,
    ReportOptions,
};

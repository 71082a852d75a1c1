//! Template processing module

mod processor;
mod service_unit;

pub use processor::TemplateProcessor;
pub use service_unit::ServiceUnitTemplate;

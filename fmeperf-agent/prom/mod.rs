pub mod fme;

pub use fme::FmeMetricExporter;

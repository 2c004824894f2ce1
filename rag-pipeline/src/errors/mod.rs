pub mod pipeline_error;

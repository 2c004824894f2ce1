pub mod llm_error;

pub mod curriculum_error;

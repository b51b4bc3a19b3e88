pub mod format_output;
pub mod invoke_model;
pub mod validate_input;

pub use format_output::FormatOutputNode;
pub use invoke_model::InvokeModelNode;
pub use validate_input::ValidateInputNode;

pub mod codecli;
pub mod shell;
pub mod stream_json;

pub use codecli::CodeCliAgent;
pub use shell::ShellCommandRunner;
pub use stream_json::StreamJsonDecoder;

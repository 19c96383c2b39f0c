mod file;
mod position;
mod render;

pub use file::SourceFile;
pub use position::LineCol;
pub use position::LineIndex;
pub use position::Span;
pub use render::Diagnostic;
pub use render::DiagnosticRenderer;
pub use render::Severity;

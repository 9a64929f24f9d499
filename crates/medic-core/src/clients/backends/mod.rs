//! Built-in client backend implementations.

mod claude_desktop;
mod cursor;
mod windsurf;

pub use claude_desktop::ClaudeDesktopBackend;
pub use cursor::CursorBackend;
pub use windsurf::WindsurfBackend;

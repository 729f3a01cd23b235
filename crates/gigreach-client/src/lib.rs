pub mod browser;
pub mod compose;
pub mod mailer;

pub use browser::{ChromiumSession, ChromiumSessionManager};
pub use compose::LlmComposer;
pub use mailer::HttpMailer;

pub mod email;
pub mod html;
pub mod redact;

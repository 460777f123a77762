pub mod concurrency;
pub mod credentials;
pub mod dispatcher;
pub mod envelope;
pub mod logger;
pub mod pipeline;
pub mod settings;
pub mod validation;

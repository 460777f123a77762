pub mod api {
    pub const BASE_URL: &str = "https://app.bentonow.com";
    pub const SITE_QUERY_PARAM: &str = "site_uuid";
    pub const USER_AGENT: &str = concat!("bento-ops/", env!("CARGO_PKG_VERSION"));
    pub const TIMEOUT_MS: u64 = 30_000;
    pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
}

pub mod endpoints {
    pub const BATCH_SUBSCRIBERS: &str = "/api/v1/batch/subscribers";
    pub const BATCH_EVENTS: &str = "/api/v1/batch/events";
    pub const BATCH_EMAILS: &str = "/api/v1/batch/emails";
    pub const BATCH_BROADCASTS: &str = "/api/v1/batch/broadcasts";
    pub const FETCH_SUBSCRIBERS: &str = "/api/v1/fetch/subscribers";
    pub const FETCH_COMMANDS: &str = "/api/v1/fetch/commands";
    pub const FETCH_BROADCASTS: &str = "/api/v1/fetch/broadcasts";
    pub const STATS_SITE: &str = "/api/v1/stats/site";
    pub const STATS_SEGMENT: &str = "/api/v1/stats/segment";
    pub const STATS_REPORT: &str = "/api/v1/stats/report";
    pub const EXPERIMENTAL_VALIDATION: &str = "/api/v1/experimental/validation";
    pub const EXPERIMENTAL_BLACKLIST: &str = "/api/v1/experimental/blacklist.json";
    pub const EXPERIMENTAL_MODERATION: &str = "/api/v1/experimental/content_moderation";
    pub const EXPERIMENTAL_GENDER: &str = "/api/v1/experimental/gender";
    pub const EXPERIMENTAL_GEOLOCATION: &str = "/api/v1/experimental/geolocation";
}

pub mod concurrency {
    pub const MAX_IN_FLIGHT: usize = 5;
}

pub mod retry {
    pub const MAX_RETRIES: usize = 3;
    pub const BASE_DELAY_MS: u64 = 1_000;
    pub const MAX_DELAY_MS: u64 = 30_000;
    pub const JITTER: f64 = 0.1;
    pub const RATE_LIMIT_DELAY_MS: u64 = 60_000;
    pub const STATUS_CODES: &[u16] = &[500, 502, 503, 504];
}

pub mod limits {
    pub const EMAIL_LENGTH: usize = 254;
    pub const EMAIL_LOCAL_LENGTH: usize = 64;
    pub const EMAIL_DOMAIN_LENGTH: usize = 253;
    pub const EMAIL_LABEL_LENGTH: usize = 63;
    pub const NAME_LENGTH: usize = 100;
    pub const TAG_LENGTH: usize = 100;
    pub const MAX_TAGS: usize = 50;
    pub const FIELD_KEY_LENGTH: usize = 100;
    pub const FIELD_VALUE_LENGTH: usize = 1_000;
    pub const MAX_FIELDS: usize = 100;
    pub const EVENT_TYPE_LENGTH: usize = 100;
    pub const SUBJECT_LENGTH: usize = 255;
    pub const BROADCAST_NAME_LENGTH: usize = 255;
    pub const HTML_LENGTH: usize = 500_000;
    pub const MODERATION_CONTENT_LENGTH: usize = 10_000;
    pub const DOMAIN_LENGTH: usize = 253;
    pub const IP_LENGTH: usize = 45;
    pub const USER_AGENT_LENGTH: usize = 512;
    pub const IDENTIFIER_LENGTH: usize = 128;
    pub const MAX_BATCH_SIZE_PER_HOUR: u64 = 1_000_000;
}

pub mod redaction {
    pub const EMAIL_MARKER: &str = "[REDACTED_EMAIL]";
    pub const SECRET_MARKER: &str = "[REDACTED]";
}

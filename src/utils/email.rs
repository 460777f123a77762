use crate::constants::limits::{
    EMAIL_DOMAIN_LENGTH, EMAIL_LABEL_LENGTH, EMAIL_LENGTH, EMAIL_LOCAL_LENGTH,
};

const LOCAL_SPECIALS: &str = "!#$%&'*+/=?^_`{|}~.-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailIssue {
    Empty,
    TooLong,
    MissingAt,
    MultipleAt,
    LocalPartLength,
    LocalPartCharacters,
    DotPlacement,
    ConsecutiveDots,
    DomainLength,
    DomainLabel,
    TopLevelDomain,
}

impl EmailIssue {
    pub fn describe(self) -> &'static str {
        match self {
            EmailIssue::Empty => "is empty",
            EmailIssue::TooLong => "exceeds 254 characters",
            EmailIssue::MissingAt => "is missing an @ separator",
            EmailIssue::MultipleAt => "contains more than one @",
            EmailIssue::LocalPartLength => "has a local part that is empty or longer than 64 characters",
            EmailIssue::LocalPartCharacters => "has invalid characters before the @",
            EmailIssue::DotPlacement => "starts or ends a part with a dot",
            EmailIssue::ConsecutiveDots => "contains consecutive dots",
            EmailIssue::DomainLength => "has a domain that is empty or too long",
            EmailIssue::DomainLabel => "has an invalid domain label",
            EmailIssue::TopLevelDomain => "has an invalid top-level domain",
        }
    }
}

pub fn sanitize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn check_email(email: &str) -> Result<(), EmailIssue> {
    if email.is_empty() {
        return Err(EmailIssue::Empty);
    }
    if email.len() > EMAIL_LENGTH {
        return Err(EmailIssue::TooLong);
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return Err(EmailIssue::MissingAt);
    };
    if parts.next().is_some() {
        return Err(EmailIssue::MultipleAt);
    }

    if local.is_empty() || local.len() > EMAIL_LOCAL_LENGTH {
        return Err(EmailIssue::LocalPartLength);
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || LOCAL_SPECIALS.contains(c))
    {
        return Err(EmailIssue::LocalPartCharacters);
    }
    if local.starts_with('.') || local.ends_with('.') {
        return Err(EmailIssue::DotPlacement);
    }
    if local.contains("..") || domain.contains("..") {
        return Err(EmailIssue::ConsecutiveDots);
    }

    if domain.is_empty() || domain.len() > EMAIL_DOMAIN_LENGTH {
        return Err(EmailIssue::DomainLength);
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(EmailIssue::DotPlacement);
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(EmailIssue::TopLevelDomain);
    }
    for label in &labels {
        let valid = !label.is_empty()
            && label.len() <= EMAIL_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(EmailIssue::DomainLabel);
        }
    }
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EmailIssue::TopLevelDomain);
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    check_email(email).is_ok()
}

use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub const MIN_ACCESS_TOKEN_LENGTH: usize = 16;
pub const MAX_ACCESS_TOKEN_LENGTH: usize = 128;

pub fn generate_access_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length.clamp(MIN_ACCESS_TOKEN_LENGTH, MAX_ACCESS_TOKEN_LENGTH))
        .map(char::from)
        .collect()
}

/// Cheap shape check so obviously bogus links never reach the database.
pub fn looks_like_access_token(token: &str) -> bool {
    (MIN_ACCESS_TOKEN_LENGTH..=MAX_ACCESS_TOKEN_LENGTH).contains(&token.len())
        && token.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_alphanumeric_and_distinct() {
        let a = generate_access_token(32);
        let b = generate_access_token(32);
        assert_eq!(a.len(), 32);
        assert!(looks_like_access_token(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn lengths_are_clamped_to_what_links_accept() {
        assert_eq!(generate_access_token(4).len(), MIN_ACCESS_TOKEN_LENGTH);
        let long = generate_access_token(200);
        assert_eq!(long.len(), MAX_ACCESS_TOKEN_LENGTH);
        assert!(looks_like_access_token(&long));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(!looks_like_access_token("short"));
        assert!(!looks_like_access_token("has spaces in it and more text"));
        assert!(!looks_like_access_token("../../etc/passwd-but-long-enough"));
    }
}

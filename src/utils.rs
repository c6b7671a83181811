use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_TOKEN: AtomicU32 = AtomicU32::new(1);

/// Generates a monotonically increasing token for correlating a request
/// with its eventual response (spec §3). Token 0 is never issued so it can
/// be reserved as a sentinel by callers that don't care about correlation.
pub fn generate_token() -> u32 {
    NEXT_TOKEN.fetch_add(1, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_strictly_increasing() {
        let a = generate_token();
        let b = generate_token();
        assert!(b > a);
    }
}

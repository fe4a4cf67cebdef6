//! Client address extraction.

/// Pick the address to geolocate.
///
/// Prefers the forwarded-for chain when present, else the direct connection
/// address. Only the first hop of a comma-separated list is used.
pub fn client_ip(forwarded_for: Option<&str>, remote_addr: Option<&str>) -> Option<String> {
    let raw = forwarded_for
        .filter(|v| !v.trim().is_empty())
        .or(remote_addr)?;

    raw.split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_forwarded_hop_wins() {
        assert_eq!(
            client_ip(Some(" 1.1.1.1 , 2.2.2.2"), Some("9.9.9.9")).as_deref(),
            Some("1.1.1.1")
        );
    }

    #[test]
    fn test_falls_back_to_remote_addr() {
        assert_eq!(client_ip(None, Some("9.9.9.9")).as_deref(), Some("9.9.9.9"));
        assert_eq!(client_ip(Some("  "), Some("9.9.9.9")).as_deref(), Some("9.9.9.9"));
    }

    #[test]
    fn test_nothing_to_extract() {
        assert_eq!(client_ip(None, None), None);
        assert_eq!(client_ip(Some(", 2.2.2.2"), None), None);
    }
}

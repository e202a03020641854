//! Map transfer failures on direct links into retry kinds.

use super::policy::ErrorKind;

/// Errors that know whether they are worth retrying.
pub trait Retryable {
    fn error_kind(&self) -> ErrorKind;
}

/// Direct links come from a cache provider: 429/503 mean back off, 408 and
/// 5xx are worth another attempt. Everything else (403/410 on an expired
/// link, 404) will not improve by asking again.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    let connection = e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_ssl_connect_error()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file();
    match () {
        _ if e.is_operation_timedout() => ErrorKind::Timeout,
        _ if connection => ErrorKind::Connection,
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_statuses() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
        assert_eq!(classify_http_status(408), ErrorKind::Timeout);
        assert_eq!(classify_http_status(502), ErrorKind::Http5xx(502));
    }

    #[test]
    fn expired_or_missing_links_are_final() {
        for code in [403, 404, 410, 416] {
            assert!(!classify_http_status(code).is_transient(), "{}", code);
        }
    }
}

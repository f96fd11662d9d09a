//! Error rendering shared by the device and the services

use std::error::Error;

/// `err` followed by every distinct cause in its `source()` chain.
///
/// HTTP client errors keep the useful part (connection refused, DNS failure,
/// timeout) several levels down; their own `Display` only names the URL.
pub(crate) fn display_chain(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !cause_text.is_empty() && !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("request failed")]
    struct Outer(#[source] Middle);

    #[derive(Debug, thiserror::Error)]
    #[error("client error (Connect)")]
    struct Middle(#[source] io::Error);

    #[test]
    fn includes_every_cause() {
        let err = Outer(Middle(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        )));
        assert_eq!(
            display_chain(&err),
            "request failed: client error (Connect): Connection refused (os error 111)"
        );
    }

    #[test]
    fn repeated_causes_are_skipped() {
        let err = Outer(Middle(io::Error::new(io::ErrorKind::Other, "request failed")));
        assert_eq!(display_chain(&err), "request failed: client error (Connect)");
    }
}

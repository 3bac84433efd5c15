use super::sanitizer::{Sanitizer, WithCollapseSpaces};

#[test]
fn test_urls_and_hosts_collapse() {
    let s = Sanitizer::new(WithCollapseSpaces(true));

    let a = s.sanitize("transport failure: error trying to connect: https://img.cdn.test/a.jpg");
    let b = s.sanitize("transport failure: error trying to connect: https://img.cdn.test/b.jpg");

    assert_eq!(a, b);
    assert!(a.contains("<url>"), "{}", a);
}

#[test]
fn test_ips_and_durations() {
    let s = Sanitizer::new(WithCollapseSpaces(true));

    assert_eq!(
        s.sanitize("connect to 127.0.0.1:8090 failed after 300ms"),
        "connect to <ip4> failed after <dur>"
    );
}

#[test]
fn test_collapse_spaces() {
    let s = Sanitizer::new(WithCollapseSpaces(true));
    assert_eq!(s.sanitize("  quota   exceeded \n"), "quota exceeded");
    assert_eq!(s.sanitize(""), "");
}

//! End-to-end cases: a real origin server behind the proxy, driven over HTTP.


pub mod support;

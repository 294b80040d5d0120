//! Socket-level suites that drive the proxy through its public line
//! protocol.

mod support;

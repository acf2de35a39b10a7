//! Integration tests for livewatch.
//!
//! End-to-end scenarios against the real server and real loopback probes:
//! liveness endpoint behavior, probe classification, escalation timing.

mod cases_liveness_endpoint_test;
mod cases_supervisor_test;

pub mod support;

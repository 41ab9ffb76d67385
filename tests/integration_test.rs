//! Integration tests for sandsync

mod integration;

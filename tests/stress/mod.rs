//! Concurrency and load scenarios

mod load_tests;

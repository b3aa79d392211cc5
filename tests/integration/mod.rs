//! Integration tests for the sayml materialization engine

mod build_scenarios;
mod cli_commands;
mod store_integration;
mod support;

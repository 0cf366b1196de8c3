#![allow(dead_code)]
use std::path::Path;

use test_support::{Case, load_cases};

/// Fixture programs opted into benchmarking under `tag`, with their sources.
pub fn workloads(tag: &str) -> Vec<(String, String)> {
    let cases = load_cases(Path::new("tests/programs"))
        .unwrap_or_else(|err| panic!("load fixture cases: {err:#}"));
    cases
        .iter()
        .filter(|case| case.spec.bench.enabled && case.spec.bench.tags.iter().any(|t| t == tag))
        .map(|case| (case.name.clone(), load_source(case)))
        .collect()
}

pub fn load_source(case: &Case) -> String {
    case.program()
        .unwrap_or_else(|err| panic!("read {}: {err:#}", case.name))
}

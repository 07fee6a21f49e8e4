#[allow(dead_code)]
pub mod contract_harness;

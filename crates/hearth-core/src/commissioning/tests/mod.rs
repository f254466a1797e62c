// Commissioning system test module
#[cfg(test)]
mod engine_tests;

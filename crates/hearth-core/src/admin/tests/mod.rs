#[cfg(test)]
mod handler_tests;

#[cfg(test)]
mod supervisor_tests;
#[cfg(test)]
mod types_tests;

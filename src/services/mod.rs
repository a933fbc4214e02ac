pub mod payroll_batch;
pub mod report_lifecycle;

#[cfg(test)]
pub mod test_support;

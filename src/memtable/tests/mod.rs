mod tests_coverage;

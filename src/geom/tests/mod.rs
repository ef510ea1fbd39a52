mod test_spine_basic;

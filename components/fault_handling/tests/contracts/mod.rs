//! Contract test entry point for fault_handling

mod test_contract_compliance;

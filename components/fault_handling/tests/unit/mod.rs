//! Unit test entry point for fault_handling

mod test_handler;

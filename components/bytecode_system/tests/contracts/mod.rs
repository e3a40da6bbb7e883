//! Contract test entry point for bytecode_system

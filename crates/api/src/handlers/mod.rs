pub mod environments;
pub mod run_requests;
pub mod test_files;

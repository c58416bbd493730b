pub mod core {
    pub mod env;
    pub mod json_file_async;
    pub mod logging;
}

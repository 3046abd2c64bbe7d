const SOCKET_ENV: &str = "CORTEXD_SOCKET";

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/cortexd.sock";

pub fn get_default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

/// Socket path override from the environment, if set.
///
/// Applied after every config load, so it wins over both the defaults and the
/// file for the lifetime of the process.
pub fn get_socket_override() -> Option<String> {
    std::env::var(SOCKET_ENV).ok()
}

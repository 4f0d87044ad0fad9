pub mod capture_session;
pub mod stop_signal;
pub(crate) mod worker;
